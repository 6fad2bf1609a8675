use crate::scenario::Disposition;
use crate::suite::SuitePhase;
use thiserror::Error;

/// Misuse of the assertion API. Failed checks are never reported through this type,
/// they become [`crate::AssertionResult`] records instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssertionError {
    #[error("Assertion result is immutable")]
    Immutable,

    #[error("{operation} can only be used on an array, got {actual}")]
    NotAnArray {
        operation: &'static str,
        actual: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScenarioError {
    #[error("Scenario '{0}' was already started")]
    AlreadyStarted(String),

    #[error("Scenario '{0}' is not ready to execute")]
    NotReady(String),

    #[error("Scenario '{0}' has already finished")]
    AlreadyFinished(String),

    #[error("Scenario cannot move from {from} to {to}")]
    InvalidTransition { from: Disposition, to: Disposition },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SuiteError {
    #[error("Suite '{0}' has already completed execution")]
    ExecutionCompleted(String),

    #[error("Can not register a {0} callback, that phase is closed")]
    PhaseClosed(SuitePhase),

    #[error("A {0} callback takes the wrong arguments")]
    CallbackMismatch(SuitePhase),

    #[error("Execution options can not be changed after the suite has started")]
    OptionsLocked,

    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid request url '{0}'")]
    InvalidUrl(String),

    #[error("Failed to build request: {0}")]
    Request(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u128),

    #[error("Connection error: {0}")]
    Connection(#[from] hyper::Error),

    #[error("Failed to build request: {0}")]
    Http(#[from] hyper::http::Error),
}

#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("Invalid selector '{path}': {reason}")]
    Selector { path: String, reason: String },

    #[error("Response body is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to load manifest: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Scenario '{scenario}' waits for unknown scenario '{dependency}'")]
    UnknownDependency { scenario: String, dependency: String },

    #[error("Invalid assertion in scenario '{scenario}': {reason}")]
    InvalidAssertion { scenario: String, reason: String },

    #[error(transparent)]
    Suite(#[from] SuiteError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write csv report: {0}")]
    Csv(#[from] csv::Error),
}
