//! Execution engine for suites of HTTP endpoint tests.
//!
//! A [`Suite`] runs its [`Scenario`]s under a concurrency limit, honours `wait_for` dependencies,
//! bounds every batch by a timeout and sequences the suite lifecycle callbacks. Each scenario
//! feeds the results of its [`Assertion`]s into its own result log, which decides whether it
//! passed.

#[macro_use]
extern crate log;

macro_rules! lock {
    ($name: expr) => {
        match $name.lock() {
            Ok(locked) => locked,
            Err(e) => panic!("{:#?}", e),
        }
    };
}

pub mod app;
pub mod assertion;
mod completion;
pub mod configuration;
pub mod connection;
pub mod error;
pub mod reporter;
pub mod scenario;
pub mod suite;
pub mod time;

pub use app::App;
pub use assertion::{
    Assertion, AssertionContext, AssertionResult, Classification, FailureDetail, Matcher,
};
pub use configuration::options::ExecutionOptions;
pub use connection::{HttpTransport, Request, Response, Transport};
pub use reporter::{Format, ScenarioReport, SuiteReport};
pub use scenario::{Disposition, Scenario};
pub use suite::{Callback, Suite, SuitePhase, SuiteTaskManager};
