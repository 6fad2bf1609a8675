use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("'{0}' is not a duration, expected something like '250ms' or '1m30s'")]
    Syntax(String),

    #[error("Unit '{0}' not supported")]
    UnitNotSupported(String),

    #[error("Duration '{0}' overflows")]
    Overflow(String),
}
