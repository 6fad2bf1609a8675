pub mod error;
pub mod timeunit;

pub use timeunit::{DurationUnit, TimeUnit};
