use crate::completion::Completion;
use crate::configuration::constants::reasons::{NOT_ABLE_TO_EXECUTE, TIMED_OUT};
use crate::configuration::options::ExecutionOptions;
use crate::connection::Transport;
use crate::error::SuiteError;
use crate::scenario::{guarded, Disposition, Scenario, ScenarioHook};
use crate::suite::callbacks::{CallbackTable, Registration, SuitePhase};
use crate::suite::Suite;
use chrono::{DateTime, Utc};
use derivative::*;
use futures::future::{select_all, FutureExt};
use futures::stream::{self, StreamExt};
use serde_derive::Serialize;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::time::{sleep, timeout};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteTimestamps {
    pub started: Option<DateTime<Utc>>,
    pub execution_began: Option<DateTime<Utc>>,
    pub execution_completed: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct TaskState {
    options: Arc<ExecutionOptions>,
    scenarios: Vec<Scenario>,
    callbacks: CallbackTable,
    timestamps: SuiteTimestamps,
    scheduled: bool,
    started: bool,
    completed: bool,
    hook_failed: bool,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) struct ManagerInner {
    title: String,
    #[derivative(Debug = "ignore")]
    transport: Arc<dyn Transport>,
    state: Mutex<TaskState>,
    finished: Completion,
}

/// Runs the scenarios of one suite: bounded concurrency, `wait_for` ordering, batch timeouts,
/// deadlock detection and the suite lifecycle callbacks around all of it.
#[derive(Debug, Clone)]
pub struct SuiteTaskManager {
    inner: Arc<ManagerInner>,
}

impl SuiteTaskManager {
    pub fn new<S: Into<String>>(
        title: S,
        options: ExecutionOptions,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                title: title.into(),
                transport,
                state: Mutex::new(TaskState {
                    options: Arc::new(options),
                    scenarios: vec![],
                    callbacks: CallbackTable::default(),
                    timestamps: SuiteTimestamps::default(),
                    scheduled: false,
                    started: false,
                    completed: false,
                    hook_failed: false,
                }),
                finished: Completion::new(),
            }),
        }
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.inner.transport.clone()
    }

    pub fn options(&self) -> Arc<ExecutionOptions> {
        lock!(self.inner.state).options.clone()
    }

    fn suite(&self) -> Suite {
        Suite::from_manager(self.clone())
    }

    /// Replaces the execution options, only allowed before the suite started. Registered
    /// scenarios pick up the new options as well.
    pub fn update_options<F>(&self, change: F) -> Result<(), SuiteError>
    where
        F: FnOnce(ExecutionOptions) -> ExecutionOptions,
    {
        let mut state = lock!(self.inner.state);
        if state.started {
            return Err(SuiteError::OptionsLocked);
        }
        let options = Arc::new(change(state.options.as_ref().clone()));
        for scenario in &state.scenarios {
            scenario.adopt_options(options.clone());
        }
        state.options = options;
        Ok(())
    }

    pub fn set_concurrency_limit(&self, limit: usize) -> Result<(), SuiteError> {
        self.update_options(|options| options.with_concurrency_limit(limit))
    }

    pub fn set_max_scenario_duration(&self, duration: Duration) -> Result<(), SuiteError> {
        self.update_options(|options| options.with_max_scenario_duration(duration))
    }

    pub fn scenarios(&self) -> Vec<Scenario> {
        lock!(self.inner.state).scenarios.clone()
    }

    pub fn timestamps(&self) -> SuiteTimestamps {
        lock!(self.inner.state).timestamps.clone()
    }

    pub fn has_started(&self) -> bool {
        lock!(self.inner.state).started
    }

    pub fn has_finished(&self) -> bool {
        self.inner.finished.is_complete()
    }

    /// Every scenario finished as passed or skipped and no suite callback failed.
    pub fn has_passed(&self) -> bool {
        let (scenarios, hook_failed) = {
            let state = lock!(self.inner.state);
            (state.scenarios.clone(), state.hook_failed)
        };
        !hook_failed
            && scenarios.iter().all(|scenario| {
                matches!(
                    scenario.disposition(),
                    Disposition::Passed | Disposition::Skipped
                )
            })
    }

    /// Adds a scenario and wires the `beforeEach`/`afterEach` callbacks into it. Scheduling is
    /// deferred by the registration delay so that the rest of the suite can be declared first.
    pub fn register_scenario(&self, scenario: Scenario) -> Result<Scenario, SuiteError> {
        {
            let mut state = lock!(self.inner.state);
            if state.completed {
                return Err(SuiteError::ExecutionCompleted(self.inner.title.clone()));
            }
            if state.scenarios.iter().any(|known| known.same_as(&scenario)) {
                return Ok(scenario);
            }
            state.scenarios.push(scenario.clone());
        }
        scenario.mark_registered();
        if scenario.is_completed() {
            return Ok(scenario);
        }
        scenario.before_hook(
            Some(SuitePhase::BeforeEach.to_string()),
            self.scenario_hook(SuitePhase::BeforeEach),
        )?;
        scenario.after_hook(
            Some(SuitePhase::AfterEach.to_string()),
            self.scenario_hook(SuitePhase::AfterEach),
        )?;
        debug!(
            "Registered scenario '{}' in suite '{}'",
            scenario.title(),
            self.inner.title
        );
        let delay = self.options().registration_delay;
        self.schedule(delay);
        Ok(scenario)
    }

    fn scenario_hook(&self, phase: SuitePhase) -> ScenarioHook {
        let manager: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        Arc::new(move |scenario| {
            let manager = manager.clone();
            Box::pin(async move {
                match manager.upgrade() {
                    Some(inner) => {
                        SuiteTaskManager { inner }
                            .run_scenario_phase(phase, scenario)
                            .await
                    }
                    None => Ok(()),
                }
            })
        })
    }

    pub fn register_callback(
        &self,
        phase: SuitePhase,
        registration: Registration,
        prepend: bool,
    ) -> Result<(), SuiteError> {
        lock!(self.inner.state)
            .callbacks
            .register(phase, registration, prepend)
    }

    /// Spawns the driver after `delay` unless it was already scheduled. Without a running tokio
    /// runtime nothing happens and the suite starts on `execute` or `wait_for_finished`.
    fn schedule(&self, delay: Duration) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                trace!("No runtime yet, suite '{}' waits for execute", self.inner.title);
                return;
            }
        };
        {
            let mut state = lock!(self.inner.state);
            if state.scheduled {
                return;
            }
            state.scheduled = true;
        }
        let manager = self.clone();
        handle.spawn(async move {
            sleep(delay).await;
            manager.drive().await;
        });
    }

    /// Starts the suite now and waits for it to finish.
    pub async fn execute(&self) {
        {
            lock!(self.inner.state).scheduled = true;
        }
        self.drive().await;
        self.wait_for_finished().await;
    }

    pub async fn wait_for_finished(&self) {
        if !self.has_finished() {
            let delay = self.options().registration_delay;
            self.schedule(delay);
        }
        self.inner.finished.wait().await
    }

    async fn drive(&self) {
        {
            let mut state = lock!(self.inner.state);
            if state.started {
                return;
            }
            state.started = true;
            state.timestamps.started = Some(Utc::now());
            state.callbacks.close(SuitePhase::BeforeAll);
        }
        info!(
            "Starting suite '{}' with {} scenarios",
            self.inner.title,
            self.scenarios().len()
        );
        self.run_suite_phase(SuitePhase::BeforeAll).await;

        lock!(self.inner.state).timestamps.execution_began = Some(Utc::now());
        self.run_batches().await;
        {
            let mut state = lock!(self.inner.state);
            state.completed = true;
            state.timestamps.execution_completed = Some(Utc::now());
            state.callbacks.close(SuitePhase::BeforeEach);
            state.callbacks.close(SuitePhase::AfterEach);
            state.callbacks.close(SuitePhase::AfterAll);
        }
        self.run_suite_phase(SuitePhase::AfterAll).await;

        let passed = self.has_passed();
        {
            let mut state = lock!(self.inner.state);
            state.callbacks.close(SuitePhase::Success);
            state.callbacks.close(SuitePhase::Failure);
        }
        if passed {
            info!("Suite '{}' passed", self.inner.title);
            self.run_suite_phase(SuitePhase::Success).await;
        } else {
            warn!("Suite '{}' failed", self.inner.title);
            self.run_suite_phase(SuitePhase::Failure).await;
        }

        lock!(self.inner.state).callbacks.close(SuitePhase::Finally);
        self.run_suite_phase(SuitePhase::Finally).await;
        {
            let mut state = lock!(self.inner.state);
            state.timestamps.finished = Some(Utc::now());
            state.callbacks.clear();
        }
        info!("Suite '{}' finished", self.inner.title);
        self.inner.finished.complete();
    }

    async fn run_batches(&self) {
        loop {
            let (scenarios, options) = {
                let state = lock!(self.inner.state);
                (state.scenarios.clone(), state.options.clone())
            };
            let batch: Vec<Scenario> = scenarios
                .iter()
                .filter(|scenario| scenario.is_ready_to_execute())
                .cloned()
                .collect();

            if !batch.is_empty() {
                debug!(
                    "Suite '{}' running a batch of {} scenarios",
                    self.inner.title,
                    batch.len()
                );
                if !self.run_batch(batch.clone(), &options).await {
                    for scenario in self.scenarios() {
                        if !scenario.is_completed() {
                            let _ = scenario.cancel_or_abort(TIMED_OUT);
                        }
                    }
                    return;
                }
            }

            let waiting = self.waiting();
            if waiting.is_empty() {
                return;
            }
            if !batch.is_empty() {
                continue;
            }

            sleep(options.probe_delay).await;
            let waiting = self.waiting();
            if waiting.iter().any(|scenario| scenario.is_ready_to_execute()) {
                continue;
            }
            // Dependencies still running elsewhere, e.g. in another suite, are progress.
            let running: Vec<Scenario> = waiting
                .iter()
                .flat_map(Scenario::dependencies)
                .filter(|dependency| dependency.has_started() && !dependency.has_finished())
                .collect();
            if !running.is_empty() {
                trace!(
                    "Suite '{}' waiting for {} running dependencies",
                    self.inner.title,
                    running.len()
                );
                select_all(
                    running
                        .into_iter()
                        .map(|dependency| Box::pin(async move { dependency.wait_for_finished().await })),
                )
                .await;
                continue;
            }
            warn!(
                "Suite '{}' can not make progress, cancelling {} scenarios",
                self.inner.title,
                waiting.len()
            );
            for scenario in waiting {
                let _ = scenario.cancel(NOT_ABLE_TO_EXECUTE);
            }
            return;
        }
    }

    /// Runs one batch under the concurrency limit. Each started scenario gets
    /// `max_scenario_duration` to finish; when one overruns, the batch stops and `false` is
    /// returned.
    async fn run_batch(&self, batch: Vec<Scenario>, options: &ExecutionOptions) -> bool {
        let stop = Completion::new();
        let max_duration = options.max_scenario_duration;
        let settle = options.settle_delay;
        stream::iter(batch)
            .for_each_concurrent(options.concurrency_limit, |scenario| {
                let stop = stop.clone();
                async move {
                    if stop.is_complete() {
                        return;
                    }
                    let execution = match scenario.go() {
                        Ok(execution) => execution,
                        Err(e) => {
                            warn!("{}", e);
                            return;
                        }
                    };
                    let run = async {
                        if let Err(e) = guarded(execution.map(Ok::<(), anyhow::Error>)).await {
                            error!("Scenario '{}' {}", scenario.title(), e);
                            let _ = scenario.cancel_or_abort(e.to_string());
                        }
                        scenario.wait_for_finished().await;
                    };
                    tokio::select! {
                        outcome = timeout(max_duration, run) => {
                            if outcome.is_err() {
                                warn!(
                                    "Scenario '{}' in suite '{}' exceeded {:?}",
                                    scenario.title(),
                                    self.inner.title,
                                    max_duration
                                );
                                let _ = scenario.cancel_or_abort(TIMED_OUT);
                                stop.complete();
                            }
                        }
                        _ = stop.wait() => {}
                    }
                    if !stop.is_complete() {
                        sleep(settle).await;
                    }
                }
            })
            .await;
        !stop.is_complete()
    }

    /// Registered scenarios that neither started nor finished.
    fn waiting(&self) -> Vec<Scenario> {
        self.scenarios()
            .into_iter()
            .filter(|scenario| !scenario.has_started() && !scenario.has_finished())
            .collect()
    }

    async fn run_suite_phase(&self, phase: SuitePhase) {
        let callbacks = lock!(self.inner.state).callbacks.get(phase);
        if !callbacks.is_empty() {
            debug!("Suite '{}' running {} {} callbacks", self.inner.title, callbacks.len(), phase);
        }
        for registration in callbacks {
            if let Err(e) = guarded(registration.invoke(self.suite(), None)).await {
                error!("{} failed: {}", registration.label(phase), e);
                lock!(self.inner.state).hook_failed = true;
            }
        }
    }

    async fn run_scenario_phase(&self, phase: SuitePhase, scenario: Scenario) -> anyhow::Result<()> {
        let callbacks = lock!(self.inner.state).callbacks.get(phase);
        for registration in callbacks {
            if let Err(e) = guarded(registration.invoke(self.suite(), Some(scenario.clone()))).await {
                error!(
                    "{} failed for '{}': {}",
                    registration.label(phase),
                    scenario.title(),
                    e
                );
                lock!(self.inner.state).hook_failed = true;
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::configuration::options::ExecutionOptions;
    use crate::connection::{Request, Response, Transport};
    use crate::error::{SuiteError, TransportError};
    use crate::scenario::Disposition;
    use crate::suite::{Callback, Suite, SuitePhase};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    fn options(limit: usize) -> ExecutionOptions {
        ExecutionOptions::default()
            .with_base_url("http://test.local")
            .with_concurrency_limit(limit)
            .with_delays(Duration::ZERO, Duration::ZERO, Duration::from_millis(100))
    }

    /// Every request takes 100ms and tracks how many are in flight at once.
    fn slow_transport(in_flight: Arc<AtomicUsize>, peak: Arc<AtomicUsize>) -> Arc<dyn Transport> {
        Arc::new(move |_request: Request| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, TransportError>(Response::mock(200, "{}"))
            }
        })
    }

    fn quick_suite(limit: usize) -> Suite {
        let transport: Arc<dyn Transport> =
            Arc::new(|_request: Request| async { Ok::<_, TransportError>(Response::mock(200, "{}")) });
        Suite::with_transport("quick", options(limit), transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_scenarios_with_limit_two_take_two_rounds() {
        let peak = Arc::new(AtomicUsize::new(0));
        let suite = Suite::with_transport(
            "timing",
            options(2),
            slow_transport(Arc::new(AtomicUsize::new(0)), peak.clone()),
        );
        for i in 0..3 {
            suite.scenario(format!("scenario {}", i)).unwrap().open(Request::get("/")).unwrap();
        }

        let begin = Instant::now();
        suite.execute().await;
        let elapsed = begin.elapsed();

        assert!(elapsed >= Duration::from_millis(200), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(300), "{:?}", elapsed);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert!(suite.has_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_limit() {
        let peak = Arc::new(AtomicUsize::new(0));
        let suite = Suite::with_transport(
            "bounded",
            options(3),
            slow_transport(Arc::new(AtomicUsize::new(0)), peak.clone()),
        );
        for i in 0..10 {
            suite.scenario(format!("scenario {}", i)).unwrap().open(Request::get("/")).unwrap();
        }
        suite.wait_for_finished().await;

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert!(suite.scenarios().iter().all(|s| s.disposition() == Disposition::Passed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_runs_dependency_first() {
        let suite = Suite::with_transport(
            "ordered",
            options(4),
            slow_transport(Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0))),
        );
        let login = suite.scenario("login").unwrap();
        let profile = suite.scenario("profile").unwrap();
        login.open(Request::get("/login")).unwrap();
        profile.open(Request::get("/me")).unwrap().wait_for(&login).unwrap();
        suite.execute().await;

        let login_finished = login.timestamps().finished.unwrap();
        let profile_started = profile.timestamps().started.unwrap();
        assert!(profile_started >= login_finished);
        assert!(suite.has_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_dependency_cancels_dependent() {
        let suite = quick_suite(2);
        let first = suite.scenario("first").unwrap();
        let second = suite.scenario("second").unwrap();
        second.open(Request::get("/")).unwrap().wait_for(&first).unwrap();
        first.cancel("Disabled").unwrap();
        suite.execute().await;

        assert_eq!(second.disposition(), Disposition::Cancelled);
        assert_eq!(second.disposition_reason().as_deref(), Some("Not able to execute"));
        assert!(!suite.has_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependency_cycle_is_cancelled() {
        let suite = quick_suite(2);
        let a = suite.scenario("a").unwrap();
        let b = suite.scenario("b").unwrap();
        a.open(Request::get("/a")).unwrap().wait_for(&b).unwrap();
        b.open(Request::get("/b")).unwrap().wait_for(&a).unwrap();
        suite.execute().await;

        assert_eq!(a.disposition(), Disposition::Cancelled);
        assert_eq!(b.disposition(), Disposition::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_suite_of_healthy_scenarios_is_not_timed_out() {
        let suite = Suite::with_transport(
            "long",
            options(1),
            slow_transport(Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0))),
        );
        suite.set_max_scenario_duration(Duration::from_millis(250)).unwrap();
        for i in 0..3 {
            suite.scenario(format!("scenario {}", i)).unwrap().open(Request::get("/")).unwrap();
        }
        suite.execute().await;

        let outcomes: Vec<(Disposition, Option<String>)> = suite
            .scenarios()
            .iter()
            .map(|s| (s.disposition(), s.disposition_reason()))
            .collect();
        assert_eq!(outcomes, vec![(Disposition::Passed, None); 3]);
        assert!(suite.has_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_scenario_times_out_and_stops_the_rest() {
        let transport: Arc<dyn Transport> = Arc::new(|request: Request| async move {
            let delay = match request.url() {
                Some(url) if url.ends_with("/stuck") => 10_000,
                _ => 100,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, TransportError>(Response::mock(200, "{}"))
        });
        let suite = Suite::with_transport("stuck", options(2), transport);
        suite.set_max_scenario_duration(Duration::from_millis(300)).unwrap();
        let quick = suite.scenario("quick").unwrap();
        let stuck = suite.scenario("stuck").unwrap();
        let queued = suite.scenario("queued").unwrap();
        let later = suite.scenario("later").unwrap();
        quick.open(Request::get("/quick")).unwrap();
        stuck.open(Request::get("/stuck")).unwrap();
        queued.open(Request::get("/queued")).unwrap();
        later.open(Request::get("/later")).unwrap();

        let begin = Instant::now();
        suite.execute().await;

        assert!(begin.elapsed() < Duration::from_millis(500), "{:?}", begin.elapsed());
        assert_eq!(quick.disposition(), Disposition::Passed);
        assert_eq!(stuck.disposition(), Disposition::Aborted);
        assert_eq!(stuck.disposition_reason().as_deref(), Some("Timed out"));
        for scenario in [&queued, &later] {
            assert!(matches!(
                scenario.disposition(),
                Disposition::Passed | Disposition::Aborted | Disposition::Cancelled
            ));
        }
        assert!(!suite.has_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependent_waits_for_slow_after_each_of_dependency() {
        let suite = Suite::with_transport(
            "hooks",
            options(4),
            slow_transport(Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0))),
        );
        suite
            .after_each(|_, _| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(())
            })
            .unwrap();
        let login = suite.scenario("login").unwrap();
        let profile = suite.scenario("profile").unwrap();
        login.open(Request::get("/login")).unwrap();
        profile.open(Request::get("/me")).unwrap().wait_for(&login).unwrap();
        suite.execute().await;

        let login_finished = login.timestamps().finished.unwrap();
        let profile_started = profile.timestamps().started.unwrap();
        assert!(profile_started >= login_finished);
        assert!(suite.has_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependency_in_other_suite_with_slow_after_each() {
        let first = quick_suite(2);
        let second = quick_suite(2);
        first
            .after_each(|_, _| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .unwrap();
        let a = first.scenario("a").unwrap();
        let b = second.scenario("b").unwrap();
        a.open(Request::get("/a")).unwrap();
        b.open(Request::get("/b")).unwrap().wait_for(&a).unwrap();

        futures::join!(first.execute(), second.execute());

        assert_eq!(b.disposition(), Disposition::Passed);
        assert!(b.timestamps().started.unwrap() >= a.timestamps().finished.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_step_does_not_hang_the_suite() {
        let suite = quick_suite(2);
        suite.scenario("fine").unwrap().open(Request::get("/")).unwrap();
        suite
            .scenario("boom")
            .unwrap()
            .open(Request::get("/"))
            .unwrap()
            .next(|_| async {
                let missing: Option<u8> = None;
                missing.unwrap();
                Ok(())
            })
            .unwrap();

        let finished =
            tokio::time::timeout(Duration::from_secs(600), suite.wait_for_finished()).await;

        assert!(finished.is_ok());
        let dispositions: Vec<Disposition> =
            suite.scenarios().iter().map(|s| s.disposition()).collect();
        assert_eq!(dispositions, vec![Disposition::Passed, Disposition::Failed]);
        assert!(!suite.has_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_order_and_single_outcome() {
        let suite = quick_suite(2);
        let events = Arc::new(Mutex::new(vec![]));
        let record = |label: &'static str| {
            let events = events.clone();
            Callback::suite(move |_| {
                let events = events.clone();
                async move {
                    lock!(events).push(label.to_owned());
                    Ok(())
                }
            })
        };
        suite.on(SuitePhase::Finally, None, record("finally"), false).unwrap();
        suite.on(SuitePhase::Failure, None, record("failure"), false).unwrap();
        suite.on(SuitePhase::Success, None, record("success"), false).unwrap();
        suite.on(SuitePhase::AfterAll, None, record("afterAll"), false).unwrap();
        suite.on(SuitePhase::BeforeAll, None, record("beforeAll 2"), false).unwrap();
        suite.on(SuitePhase::BeforeAll, None, record("beforeAll 1"), true).unwrap();
        let each = events.clone();
        suite
            .before_each(move |_, scenario| {
                let events = each.clone();
                async move {
                    lock!(events).push(format!("beforeEach {}", scenario.title()));
                    Ok(())
                }
            })
            .unwrap();
        suite.scenario("only").unwrap().open(Request::get("/")).unwrap();
        suite.execute().await;

        assert_eq!(
            lock!(events).clone(),
            vec!["beforeAll 1", "beforeAll 2", "beforeEach only", "afterAll", "success", "finally"]
        );
        assert_eq!(
            suite.before_all(|_| async { Ok(()) }).unwrap_err(),
            SuiteError::PhaseClosed(SuitePhase::BeforeAll)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_hard_failure_fires_failure() {
        let suite = quick_suite(4);
        let outcome = Arc::new(Mutex::new(vec![]));
        let (ok, ko) = (outcome.clone(), outcome.clone());
        suite
            .success(move |_| {
                let outcome = ok.clone();
                async move {
                    lock!(outcome).push("success");
                    Ok(())
                }
            })
            .unwrap()
            .failure(move |_| {
                let outcome = ko.clone();
                async move {
                    lock!(outcome).push("failure");
                    Ok(())
                }
            })
            .unwrap();
        for i in 0..10 {
            let scenario = suite.scenario(format!("scenario {}", i)).unwrap();
            scenario
                .open(Request::get("/"))
                .unwrap()
                .next(move |context| async move {
                    context.assert(i).not().equals(7)?;
                    Ok(())
                })
                .unwrap();
        }
        suite.execute().await;

        assert_eq!(lock!(outcome).clone(), vec!["failure"]);
        let failed: Vec<String> = suite
            .scenarios()
            .iter()
            .filter(|s| s.has_failed())
            .map(|s| s.title().to_owned())
            .collect();
        assert_eq!(failed, vec!["scenario 7"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_suite_hook_forces_failure() {
        let suite = quick_suite(1);
        suite
            .before_all(|_| async { Err(anyhow::anyhow!("database unavailable")) })
            .unwrap();
        suite.scenario("fine").unwrap().open(Request::get("/")).unwrap();
        suite.execute().await;

        assert_eq!(suite.scenarios()[0].disposition(), Disposition::Passed);
        assert!(!suite.has_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_options_and_registration_lock_after_execution() {
        let suite = quick_suite(2);
        suite.execute().await;

        assert!(suite.has_finished());
        assert!(suite.has_passed());
        assert_eq!(suite.set_concurrency_limit(8).unwrap_err(), SuiteError::OptionsLocked);
        assert!(matches!(
            suite.scenario("late"),
            Err(SuiteError::ExecutionCompleted(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_schedules_driver_automatically() {
        let suite = quick_suite(2);
        let scenario = suite.scenario("auto").unwrap();
        scenario.open(Request::get("/")).unwrap();

        scenario.wait_for_finished().await;
        assert!(scenario.has_passed());
        suite.wait_for_finished().await;
        assert!(suite.timestamps().finished.is_some());
    }
}
