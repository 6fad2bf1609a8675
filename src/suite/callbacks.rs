use crate::error::SuiteError;
use crate::scenario::Scenario;
use crate::suite::Suite;
use futures::future::BoxFuture;
use serde_derive::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub type CallbackFuture = BoxFuture<'static, anyhow::Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SuitePhase {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
    Success,
    Failure,
    Finally,
}

impl SuitePhase {
    pub const ALL: [SuitePhase; 7] = [
        SuitePhase::BeforeAll,
        SuitePhase::AfterAll,
        SuitePhase::BeforeEach,
        SuitePhase::AfterEach,
        SuitePhase::Success,
        SuitePhase::Failure,
        SuitePhase::Finally,
    ];

    /// `beforeEach` and `afterEach` run around every scenario, the rest once per suite.
    pub fn is_scenario_scoped(self) -> bool {
        matches!(self, SuitePhase::BeforeEach | SuitePhase::AfterEach)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SuitePhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            SuitePhase::BeforeAll => "beforeAll",
            SuitePhase::AfterAll => "afterAll",
            SuitePhase::BeforeEach => "beforeEach",
            SuitePhase::AfterEach => "afterEach",
            SuitePhase::Success => "success",
            SuitePhase::Failure => "failure",
            SuitePhase::Finally => "finally",
        };
        f.write_str(label)
    }
}

#[derive(Clone)]
pub enum Callback {
    Suite(Arc<dyn Fn(Suite) -> CallbackFuture + Send + Sync>),
    Scenario(Arc<dyn Fn(Suite, Scenario) -> CallbackFuture + Send + Sync>),
}

impl Callback {
    pub fn suite<F, Fut>(callback: F) -> Self
    where
        F: Fn(Suite) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Callback::Suite(Arc::new(move |suite| Box::pin(callback(suite))))
    }

    pub fn scenario<F, Fut>(callback: F) -> Self
    where
        F: Fn(Suite, Scenario) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Callback::Scenario(Arc::new(move |suite, scenario| {
            Box::pin(callback(suite, scenario))
        }))
    }

    fn fits(&self, phase: SuitePhase) -> bool {
        match self {
            Callback::Suite(_) => !phase.is_scenario_scoped(),
            Callback::Scenario(_) => phase.is_scenario_scoped(),
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Callback::Suite(_) => f.write_str("Callback::Suite"),
            Callback::Scenario(_) => f.write_str("Callback::Scenario"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub message: Option<String>,
    pub callback: Callback,
}

impl Registration {
    pub fn invoke(&self, suite: Suite, scenario: Option<Scenario>) -> CallbackFuture {
        match (&self.callback, scenario) {
            (Callback::Suite(callback), _) => callback(suite),
            (Callback::Scenario(callback), Some(scenario)) => callback(suite, scenario),
            (Callback::Scenario(_), None) => Box::pin(async { Ok(()) }),
        }
    }

    pub fn label(&self, phase: SuitePhase) -> String {
        match &self.message {
            Some(message) => format!("{} '{}'", phase, message),
            None => phase.to_string(),
        }
    }
}

/// Ordered callback lists, one per [`SuitePhase`], each closing for registration once its
/// phase boundary has passed.
#[derive(Debug, Default)]
pub struct CallbackTable {
    lists: [Vec<Registration>; 7],
    closed: [bool; 7],
}

impl CallbackTable {
    pub fn register(
        &mut self,
        phase: SuitePhase,
        registration: Registration,
        prepend: bool,
    ) -> Result<(), SuiteError> {
        if self.closed[phase.index()] {
            return Err(SuiteError::PhaseClosed(phase));
        }
        if !registration.callback.fits(phase) {
            return Err(SuiteError::CallbackMismatch(phase));
        }
        let list = &mut self.lists[phase.index()];
        if prepend {
            list.insert(0, registration);
        } else {
            list.push(registration);
        }
        Ok(())
    }

    /// Snapshot of a phase's callbacks in run order.
    pub fn get(&self, phase: SuitePhase) -> Vec<Registration> {
        self.lists[phase.index()].clone()
    }

    pub fn close(&mut self, phase: SuitePhase) {
        self.closed[phase.index()] = true;
    }

    pub fn is_closed(&self, phase: SuitePhase) -> bool {
        self.closed[phase.index()]
    }

    pub fn len(&self, phase: SuitePhase) -> usize {
        self.lists[phase.index()].len()
    }

    /// Drops every callback and closes every phase.
    pub fn clear(&mut self) {
        for phase in SuitePhase::ALL.iter() {
            self.lists[phase.index()].clear();
            self.closed[phase.index()] = true;
        }
    }
}
