use chrono::{DateTime, Utc};
use serde_derive::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Pending,
    Executing,
    Passed,
    Failed,
    Aborted,
    Cancelled,
    Skipped,
}

impl Disposition {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Disposition::Pending | Disposition::Executing)
    }

    /// Dispositions only ever move forward: pending, then executing, then one terminal state.
    pub fn can_transition(self, to: Disposition) -> bool {
        use Disposition::*;
        match (self, to) {
            (Pending, Executing) | (Pending, Cancelled) | (Pending, Skipped) => true,
            (Executing, Passed) | (Executing, Failed) | (Executing, Aborted) | (Executing, Cancelled) => true,
            _ => false,
        }
    }

    /// Whether a dependent scenario may run after this one finished.
    pub fn satisfies_dependency(self) -> bool {
        matches!(
            self,
            Disposition::Passed | Disposition::Failed | Disposition::Skipped
        )
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Disposition::Pending => "pending",
            Disposition::Executing => "executing",
            Disposition::Passed => "passed",
            Disposition::Failed => "failed",
            Disposition::Aborted => "aborted",
            Disposition::Cancelled => "cancelled",
            Disposition::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    pub registered: Option<DateTime<Utc>>,
    pub started: Option<DateTime<Utc>>,
    pub execution_began: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
}

impl Timestamps {
    /// Milliseconds between start and finish, when both happened.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started, self.finished) {
            (Some(start), Some(finish)) => Some((finish - start).num_milliseconds()),
            _ => None,
        }
    }
}
