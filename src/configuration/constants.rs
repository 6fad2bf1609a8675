pub mod cargo_env {
    pub const CARGO_PKG_NAME: &str = env!("CARGO_PKG_NAME");
}

pub mod common {
    use std::time::Duration;

    pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;
    pub const MAX_CONCURRENCY_LIMIT: usize = 64;
    pub const DEFAULT_MAX_SCENARIO_DURATION: Duration = Duration::from_secs(30);
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_REGISTRATION_DELAY: Duration = Duration::from_millis(10);
    pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);
    pub const DEFAULT_PROBE_DELAY: Duration = Duration::from_millis(100);
}

pub mod reasons {
    pub const TIMED_OUT: &str = "Timed out";
    pub const NOT_ABLE_TO_EXECUTE: &str = "Not able to execute";
}
