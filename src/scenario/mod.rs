pub mod disposition;

pub use disposition::{Disposition, Timestamps};

use crate::assertion::{AssertionContext, AssertionResult, ResultSink};
use crate::completion::Completion;
use crate::configuration::options::ExecutionOptions;
use crate::connection::{Request, Response, Transport};
use crate::error::ScenarioError;
use chrono::Utc;
use derivative::*;
use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::future::Future;
use std::mem;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

pub type StepFuture = BoxFuture<'static, anyhow::Result<()>>;
type NextStep = Box<dyn FnOnce(AssertionContext) -> StepFuture + Send>;
pub type ScenarioHook = Arc<dyn Fn(Scenario) -> StepFuture + Send + Sync>;

struct Step {
    message: Option<String>,
    callback: NextStep,
}

#[derive(Clone)]
struct Hook {
    message: Option<String>,
    callback: ScenarioHook,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct ScenarioState {
    options: Arc<ExecutionOptions>,
    disposition: Disposition,
    reason: Option<String>,
    request: Request,
    mock: Option<Response>,
    #[derivative(Debug = "ignore")]
    wait_for: Vec<Scenario>,
    #[derivative(Debug = "ignore")]
    steps: Vec<Step>,
    #[derivative(Debug = "ignore")]
    before: Vec<Hook>,
    #[derivative(Debug = "ignore")]
    after: Vec<Hook>,
    #[derivative(Debug = "ignore")]
    finally: Vec<Hook>,
    results: Vec<AssertionResult>,
    has_failed: bool,
    go_called: bool,
    timestamps: Timestamps,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct ScenarioInner {
    title: String,
    #[derivative(Debug = "ignore")]
    transport: Arc<dyn Transport>,
    state: Mutex<ScenarioState>,
    finished: Completion,
}

/// Everything `go` takes out of the scenario before running.
struct ExecutionPlan {
    options: Arc<ExecutionOptions>,
    request: Request,
    mock: Option<Response>,
    steps: Vec<Step>,
    before: Vec<Hook>,
    after: Vec<Hook>,
    finally: Vec<Hook>,
}

/// One test case: a request, the ordered steps that assert on its response and the result log
/// those assertions feed.
///
/// `Scenario` is a cheap handle, clones refer to the same test case.
#[derive(Debug, Clone)]
pub struct Scenario {
    inner: Arc<ScenarioInner>,
}

impl Scenario {
    pub fn new<S: Into<String>>(
        title: S,
        options: Arc<ExecutionOptions>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            inner: Arc::new(ScenarioInner {
                title: title.into(),
                transport,
                state: Mutex::new(ScenarioState {
                    options,
                    disposition: Disposition::Pending,
                    reason: None,
                    request: Request::default(),
                    mock: None,
                    wait_for: vec![],
                    steps: vec![],
                    before: vec![],
                    after: vec![],
                    finally: vec![],
                    results: vec![],
                    has_failed: false,
                    go_called: false,
                    timestamps: Timestamps::default(),
                }),
                finished: Completion::new(),
            }),
        }
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }

    pub fn options(&self) -> Arc<ExecutionOptions> {
        lock!(self.inner.state).options.clone()
    }

    /// Replaces the options of a scenario that has not started yet, so that suite level changes
    /// made after the scenario was created still apply to it.
    pub(crate) fn adopt_options(&self, options: Arc<ExecutionOptions>) {
        let mut state = lock!(self.inner.state);
        if !state.go_called && !state.disposition.is_terminal() {
            state.options = options;
        }
    }

    /// Two handles are the same scenario.
    pub fn same_as(&self, other: &Scenario) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn configure<F>(&self, change: F) -> Result<&Self, ScenarioError>
    where
        F: FnOnce(&mut ScenarioState),
    {
        let mut state = lock!(self.inner.state);
        if state.disposition.is_terminal() {
            return Err(ScenarioError::AlreadyFinished(self.inner.title.clone()));
        }
        if state.go_called {
            return Err(ScenarioError::AlreadyStarted(self.inner.title.clone()));
        }
        change(&mut state);
        Ok(self)
    }

    /// Sets the request this scenario will send.
    pub fn open(&self, request: Request) -> Result<&Self, ScenarioError> {
        self.configure(|state| state.request = request)
    }

    /// Uses a canned response instead of calling the transport.
    pub fn mock(&self, response: Response) -> Result<&Self, ScenarioError> {
        self.configure(|state| state.mock = Some(response))
    }

    /// Appends a step that runs against the response once it arrives.
    pub fn next<F, Fut>(&self, step: F) -> Result<&Self, ScenarioError>
    where
        F: FnOnce(AssertionContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.push_step(None, step)
    }

    pub fn next_named<S, F, Fut>(&self, message: S, step: F) -> Result<&Self, ScenarioError>
    where
        S: Into<String>,
        F: FnOnce(AssertionContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.push_step(Some(message.into()), step)
    }

    fn push_step<F, Fut>(&self, message: Option<String>, step: F) -> Result<&Self, ScenarioError>
    where
        F: FnOnce(AssertionContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let callback: NextStep = Box::new(move |context| Box::pin(step(context)));
        self.configure(|state| state.steps.push(Step { message, callback }))
    }

    /// This scenario will not start before `other` has finished.
    pub fn wait_for(&self, other: &Scenario) -> Result<&Self, ScenarioError> {
        let other = other.clone();
        self.configure(|state| state.wait_for.push(other))
    }

    pub fn before<F, Fut>(&self, callback: F) -> Result<&Self, ScenarioError>
    where
        F: Fn(Scenario) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let hook = hook(None, callback);
        self.configure(|state| state.before.push(hook))
    }

    pub fn after<F, Fut>(&self, callback: F) -> Result<&Self, ScenarioError>
    where
        F: Fn(Scenario) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let hook = hook(None, callback);
        self.configure(|state| state.after.push(hook))
    }

    pub fn finally<F, Fut>(&self, callback: F) -> Result<&Self, ScenarioError>
    where
        F: Fn(Scenario) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let hook = hook(None, callback);
        self.configure(|state| state.finally.push(hook))
    }

    pub(crate) fn before_hook(&self, message: Option<String>, callback: ScenarioHook) -> Result<&Self, ScenarioError> {
        self.configure(|state| state.before.push(Hook { message, callback }))
    }

    pub(crate) fn after_hook(&self, message: Option<String>, callback: ScenarioHook) -> Result<&Self, ScenarioError> {
        self.configure(|state| state.after.push(Hook { message, callback }))
    }

    pub(crate) fn mark_registered(&self) {
        lock!(self.inner.state).timestamps.registered = Some(Utc::now());
    }

    pub fn disposition(&self) -> Disposition {
        lock!(self.inner.state).disposition
    }

    /// Why the scenario ended the way it did, set for skipped, cancelled and aborted scenarios.
    pub fn disposition_reason(&self) -> Option<String> {
        lock!(self.inner.state).reason.clone()
    }

    pub fn request(&self) -> Request {
        lock!(self.inner.state).request.clone()
    }

    pub fn timestamps(&self) -> Timestamps {
        lock!(self.inner.state).timestamps.clone()
    }

    pub fn results(&self) -> Vec<AssertionResult> {
        lock!(self.inner.state).results.clone()
    }

    pub fn dependencies(&self) -> Vec<Scenario> {
        lock!(self.inner.state).wait_for.clone()
    }

    /// Set as soon as a hard failure lands in the result log.
    pub fn has_failed(&self) -> bool {
        lock!(self.inner.state).has_failed
    }

    pub fn has_started(&self) -> bool {
        lock!(self.inner.state).go_called
    }

    /// The whole lifecycle is over, including the `after` and `finally` hooks.
    pub fn has_finished(&self) -> bool {
        self.inner.finished.is_complete()
    }

    /// The disposition is final. `after` and `finally` hooks may still be running.
    pub fn is_completed(&self) -> bool {
        lock!(self.inner.state).disposition.is_terminal()
    }

    pub fn has_passed(&self) -> bool {
        self.disposition() == Disposition::Passed
    }

    /// Pending, not started, has something to execute and every dependency finished in a way
    /// that lets dependents run.
    pub fn is_ready_to_execute(&self) -> bool {
        let dependencies = {
            let state = lock!(self.inner.state);
            let resolvable = state.mock.is_some() || state.request.is_resolvable();
            if state.go_called || state.disposition != Disposition::Pending || !resolvable {
                return false;
            }
            state.wait_for.clone()
        };
        dependencies.iter().all(|dependency| {
            dependency.has_finished() && dependency.disposition().satisfies_dependency()
        })
    }

    /// Appends a result to the log. Rejected once the scenario reached a terminal disposition.
    pub fn result(&self, result: AssertionResult) -> Result<(), ScenarioError> {
        let mut state = lock!(self.inner.state);
        if state.disposition.is_terminal() {
            return Err(ScenarioError::AlreadyFinished(self.inner.title.clone()));
        }
        if result.is_hard_failure() {
            state.has_failed = true;
        }
        state.results.push(result);
        Ok(())
    }

    /// Marks a scenario that has not started as skipped.
    pub fn skip<S: Into<String>>(&self, reason: S) -> Result<(), ScenarioError> {
        if self.has_started() {
            return Err(ScenarioError::AlreadyStarted(self.inner.title.clone()));
        }
        self.terminate(Disposition::Skipped, reason.into())
    }

    /// Cancels a scenario that has not started.
    pub fn cancel<S: Into<String>>(&self, reason: S) -> Result<(), ScenarioError> {
        self.terminate(Disposition::Cancelled, reason.into())
    }

    /// Cancels a pending scenario or aborts an executing one. The in-flight work of an aborted
    /// scenario is not interrupted, whatever it produces afterwards is ignored.
    pub fn cancel_or_abort<S: Into<String>>(&self, reason: S) -> Result<(), ScenarioError> {
        let to = match self.disposition() {
            Disposition::Executing => Disposition::Aborted,
            _ => Disposition::Cancelled,
        };
        self.terminate(to, reason.into())
    }

    fn terminate(&self, to: Disposition, reason: String) -> Result<(), ScenarioError> {
        {
            let mut state = lock!(self.inner.state);
            if state.disposition.is_terminal() {
                return Err(ScenarioError::AlreadyFinished(self.inner.title.clone()));
            }
            if !state.disposition.can_transition(to) {
                return Err(ScenarioError::InvalidTransition {
                    from: state.disposition,
                    to,
                });
            }
            let now = Some(Utc::now());
            state.disposition = to;
            state.reason = Some(reason.clone());
            state.timestamps.completed = now;
            state.timestamps.finished = now;
        }
        info!("Scenario '{}' {}: {}", self.inner.title, to, reason);
        self.inner.finished.complete();
        Ok(())
    }

    /// Starts execution. The returned future drives the request, the steps and the after and
    /// finally hooks to completion; `go` may only succeed once and only when ready.
    pub fn go(&self) -> Result<BoxFuture<'static, ()>, ScenarioError> {
        if !self.is_ready_to_execute() {
            return match self.has_started() {
                true => Err(ScenarioError::AlreadyStarted(self.inner.title.clone())),
                false => Err(ScenarioError::NotReady(self.inner.title.clone())),
            };
        }
        let plan = {
            let mut state = lock!(self.inner.state);
            if state.go_called {
                return Err(ScenarioError::AlreadyStarted(self.inner.title.clone()));
            }
            if state.disposition != Disposition::Pending {
                return Err(ScenarioError::NotReady(self.inner.title.clone()));
            }
            state.go_called = true;
            state.disposition = Disposition::Executing;
            state.timestamps.started = Some(Utc::now());
            ExecutionPlan {
                options: state.options.clone(),
                request: state.request.clone(),
                mock: state.mock.take(),
                steps: mem::take(&mut state.steps),
                before: state.before.clone(),
                after: state.after.clone(),
                finally: state.finally.clone(),
            }
        };
        info!("Scenario '{}' started", self.inner.title);
        Ok(Box::pin(self.clone().run(plan)))
    }

    /// Resolves when the whole lifecycle of this scenario is over, however it ended.
    pub async fn wait_for_finished(&self) {
        self.inner.finished.wait().await
    }

    async fn run(self, plan: ExecutionPlan) {
        let ExecutionPlan {
            options,
            request,
            mock,
            steps,
            before,
            after,
            finally,
        } = plan;

        for hook in before {
            if let Err(e) = guarded((hook.callback)(self.clone())).await {
                let reason = describe_hook_error("before", &hook.message, &e);
                self.push_result(AssertionResult::fail(reason.clone(), None));
                self.finish(Disposition::Aborted, Some(reason), after, finally).await;
                return;
            }
        }
        if self.is_completed() {
            return;
        }
        lock!(self.inner.state).timestamps.execution_began = Some(Utc::now());

        let response = match mock {
            Some(response) => Ok(response),
            None => {
                let url = request
                    .url()
                    .map(|url| options.resolve_url(url))
                    .unwrap_or_default();
                let request = request.with_url(url);
                let send = self.inner.transport.send(request, &options);
                guarded(async move { send.await.map_err(anyhow::Error::from) }).await
            }
        };
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                let reason = format!("Request failed: {}", e);
                error!("Scenario '{}': {}", self.inner.title, reason);
                self.push_result(AssertionResult::fail(reason.clone(), None));
                self.finish(Disposition::Aborted, Some(reason), after, finally).await;
                return;
            }
        };

        let context = AssertionContext::new(
            self.inner.title.clone(),
            Arc::new(self.clone()),
            Some(Arc::new(response)),
            options,
        );
        for (index, step) in steps.into_iter().enumerate() {
            if self.is_completed() {
                return;
            }
            let label = step
                .message
                .clone()
                .unwrap_or_else(|| format!("Step {}", index + 1));
            trace!("Scenario '{}' running {}", self.inner.title, label);
            let callback = step.callback;
            let step_context = context.clone();
            let outcome = guarded(async move { callback(step_context).await }).await;
            context.assertions_resolved().await;
            for dangling in context.incomplete_assertions() {
                dangling.abandon();
                context.log_optional_failure(
                    format!("Incomplete assertion: {}", dangling.subject()),
                    None,
                );
            }
            if let Err(e) = outcome {
                context.log_failure(format!("{} failed: {}", label, e), None);
                break;
            }
        }

        let disposition = if self.has_failed() {
            Disposition::Failed
        } else {
            Disposition::Passed
        };
        self.finish(disposition, None, after, finally).await;
    }

    async fn finish(
        &self,
        disposition: Disposition,
        reason: Option<String>,
        after: Vec<Hook>,
        finally: Vec<Hook>,
    ) {
        {
            let mut state = lock!(self.inner.state);
            if !state.disposition.can_transition(disposition) {
                // Cancelled or aborted by the scheduler while running.
                return;
            }
            state.disposition = disposition;
            state.reason = reason;
            state.timestamps.completed = Some(Utc::now());
        }
        info!("Scenario '{}' {}", self.inner.title, disposition);

        for hook in after.into_iter().chain(finally) {
            if let Err(e) = guarded((hook.callback)(self.clone())).await {
                warn!("{}", describe_hook_error("after", &hook.message, &e));
            }
        }
        lock!(self.inner.state).timestamps.finished = Some(Utc::now());
        self.inner.finished.complete();
    }

    fn push_result(&self, result: AssertionResult) {
        if let Err(e) = self.result(result) {
            warn!("Dropped result: {}", e);
        }
    }
}

impl ResultSink for Scenario {
    fn record(&self, result: AssertionResult) {
        self.push_result(result)
    }
}

fn hook<F, Fut>(message: Option<String>, callback: F) -> Hook
where
    F: Fn(Scenario) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Hook {
        message,
        callback: Arc::new(move |scenario| Box::pin(callback(scenario))),
    }
}

/// Runs a user supplied future and turns a panic inside it into an error.
pub(crate) async fn guarded<F, T>(future: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(anyhow::anyhow!("panicked: {}", panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn describe_hook_error(kind: &str, message: &Option<String>, error: &anyhow::Error) -> String {
    match message {
        Some(message) => format!("{} hook '{}' failed: {}", kind, message, error),
        None => format!("{} hook failed: {}", kind, error),
    }
}
