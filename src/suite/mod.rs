pub mod callbacks;
pub mod task_manager;

pub use callbacks::{Callback, Registration, SuitePhase};
pub use task_manager::{SuiteTaskManager, SuiteTimestamps};

use crate::configuration::options::ExecutionOptions;
use crate::connection::{HttpTransport, Transport};
use crate::error::SuiteError;
use crate::reporter::SuiteReport;
use crate::scenario::Scenario;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A named collection of scenarios sharing lifecycle callbacks and a concurrency policy.
///
/// Scenarios created through the suite are registered right away and start running shortly
/// after the surrounding code yields to the runtime.
#[derive(Debug, Clone)]
pub struct Suite {
    manager: SuiteTaskManager,
}

impl Suite {
    pub fn new<S: Into<String>>(title: S) -> Self {
        Self::with_options(title, ExecutionOptions::default())
    }

    pub fn with_options<S: Into<String>>(title: S, options: ExecutionOptions) -> Self {
        Self::with_transport(title, options, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport<S: Into<String>>(
        title: S,
        options: ExecutionOptions,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::from_manager(SuiteTaskManager::new(title, options, transport))
    }

    pub(crate) fn from_manager(manager: SuiteTaskManager) -> Self {
        Self { manager }
    }

    pub fn title(&self) -> &str {
        self.manager.title()
    }

    pub fn options(&self) -> Arc<ExecutionOptions> {
        self.manager.options()
    }

    pub fn manager(&self) -> &SuiteTaskManager {
        &self.manager
    }

    /// Base URL relative scenario URLs are resolved against.
    pub fn base<S: Into<String>>(&self, url: S) -> Result<&Self, SuiteError> {
        let url = url.into();
        self.manager
            .update_options(|options| options.with_base_url(url))?;
        Ok(self)
    }

    pub fn set_concurrency_limit(&self, limit: usize) -> Result<&Self, SuiteError> {
        self.manager.set_concurrency_limit(limit)?;
        Ok(self)
    }

    pub fn set_max_scenario_duration(&self, duration: Duration) -> Result<&Self, SuiteError> {
        self.manager.set_max_scenario_duration(duration)?;
        Ok(self)
    }

    /// Creates and registers a scenario that uses this suite's options and transport.
    pub fn scenario<S: Into<String>>(&self, title: S) -> Result<Scenario, SuiteError> {
        let scenario = Scenario::new(title, self.manager.options(), self.manager.transport());
        self.manager.register_scenario(scenario)
    }

    /// Registers a scenario built elsewhere.
    pub fn import(&self, scenario: Scenario) -> Result<Scenario, SuiteError> {
        self.manager.register_scenario(scenario)
    }

    pub fn scenarios(&self) -> Vec<Scenario> {
        self.manager.scenarios()
    }

    pub fn on(
        &self,
        phase: SuitePhase,
        message: Option<String>,
        callback: Callback,
        prepend: bool,
    ) -> Result<&Self, SuiteError> {
        self.manager
            .register_callback(phase, Registration { message, callback }, prepend)?;
        Ok(self)
    }

    pub fn before_all<F, Fut>(&self, callback: F) -> Result<&Self, SuiteError>
    where
        F: Fn(Suite) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on(SuitePhase::BeforeAll, None, Callback::suite(callback), false)
    }

    pub fn after_all<F, Fut>(&self, callback: F) -> Result<&Self, SuiteError>
    where
        F: Fn(Suite) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on(SuitePhase::AfterAll, None, Callback::suite(callback), false)
    }

    pub fn before_each<F, Fut>(&self, callback: F) -> Result<&Self, SuiteError>
    where
        F: Fn(Suite, Scenario) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on(SuitePhase::BeforeEach, None, Callback::scenario(callback), false)
    }

    pub fn after_each<F, Fut>(&self, callback: F) -> Result<&Self, SuiteError>
    where
        F: Fn(Suite, Scenario) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on(SuitePhase::AfterEach, None, Callback::scenario(callback), false)
    }

    pub fn success<F, Fut>(&self, callback: F) -> Result<&Self, SuiteError>
    where
        F: Fn(Suite) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on(SuitePhase::Success, None, Callback::suite(callback), false)
    }

    pub fn failure<F, Fut>(&self, callback: F) -> Result<&Self, SuiteError>
    where
        F: Fn(Suite) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on(SuitePhase::Failure, None, Callback::suite(callback), false)
    }

    pub fn finally<F, Fut>(&self, callback: F) -> Result<&Self, SuiteError>
    where
        F: Fn(Suite) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on(SuitePhase::Finally, None, Callback::suite(callback), false)
    }

    /// Starts execution without waiting for the registration delay and resolves once the
    /// suite finished.
    pub async fn execute(&self) {
        self.manager.execute().await
    }

    pub async fn wait_for_finished(&self) {
        self.manager.wait_for_finished().await
    }

    pub fn has_started(&self) -> bool {
        self.manager.has_started()
    }

    pub fn has_finished(&self) -> bool {
        self.manager.has_finished()
    }

    pub fn has_passed(&self) -> bool {
        self.manager.has_passed()
    }

    pub fn timestamps(&self) -> SuiteTimestamps {
        self.manager.timestamps()
    }

    pub fn report(&self) -> SuiteReport {
        SuiteReport::from(self)
    }
}
