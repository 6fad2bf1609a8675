use crate::configuration::constants::common::*;
use serde_derive::Deserialize;
use std::time::Duration;

/// Execution options threaded from a suite into every scenario and assertion context it creates.
///
/// The three delays are tuning knobs rather than semantics: `registration_delay` lets synchronous
/// construction code finish registering scenarios, `settle_delay` spaces out slot reuse after a
/// scenario finishes and `probe_delay` is how long the scheduler waits for a dependency chain to
/// make progress before it declares a deadlock.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    #[serde(deserialize_with = "crate::configuration::deserialize::concurrency_limit::deserialize")]
    pub concurrency_limit: usize,
    #[serde(with = "crate::configuration::deserialize::duration")]
    pub max_scenario_duration: Duration,
    #[serde(with = "crate::configuration::deserialize::duration")]
    pub request_timeout: Duration,
    #[serde(with = "crate::configuration::deserialize::duration")]
    pub registration_delay: Duration,
    #[serde(with = "crate::configuration::deserialize::duration")]
    pub settle_delay: Duration,
    #[serde(with = "crate::configuration::deserialize::duration")]
    pub probe_delay: Duration,
    pub base_url: Option<String>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            max_scenario_duration: DEFAULT_MAX_SCENARIO_DURATION,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            registration_delay: DEFAULT_REGISTRATION_DELAY,
            settle_delay: DEFAULT_SETTLE_DELAY,
            probe_delay: DEFAULT_PROBE_DELAY,
            base_url: None,
        }
    }
}

impl ExecutionOptions {
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.clamp(1, MAX_CONCURRENCY_LIMIT);
        self
    }

    pub fn with_max_scenario_duration(mut self, duration: Duration) -> Self {
        self.max_scenario_duration = duration;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_delays(mut self, registration: Duration, settle: Duration, probe: Duration) -> Self {
        self.registration_delay = registration;
        self.settle_delay = settle;
        self.probe_delay = probe;
        self
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Joins `url` onto the configured base unless it is already absolute.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.contains("://") {
            return url.to_owned();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            None => url.to_owned(),
        }
    }
}
