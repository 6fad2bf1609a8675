use chrono::{DateTime, Utc};
use serde_derive::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Classification {
    Pass,
    Fail,
    OptionalFail,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Classification::Pass => "pass",
            Classification::Fail => "fail",
            Classification::OptionalFail => "optionalFail",
        };
        f.write_str(label)
    }
}

/// What was compared when a check failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FailureDetail {
    pub actual: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
}

/// One immutable entry of a scenario's result log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionResult {
    message: String,
    classification: Classification,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<FailureDetail>,
}

impl AssertionResult {
    pub fn pass<S: Into<String>>(message: S) -> Self {
        Self::new(message.into(), Classification::Pass, None)
    }

    pub fn fail<S: Into<String>>(message: S, detail: Option<FailureDetail>) -> Self {
        Self::new(message.into(), Classification::Fail, detail)
    }

    pub fn optional_fail<S: Into<String>>(message: S, detail: Option<FailureDetail>) -> Self {
        Self::new(message.into(), Classification::OptionalFail, detail)
    }

    fn new(message: String, classification: Classification, detail: Option<FailureDetail>) -> Self {
        Self {
            message,
            classification,
            timestamp: Utc::now(),
            detail,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn detail(&self) -> Option<&FailureDetail> {
        self.detail.as_ref()
    }

    pub fn passed(&self) -> bool {
        self.classification == Classification::Pass
    }

    /// Only hard failures count against a scenario.
    pub fn is_hard_failure(&self) -> bool {
        self.classification == Classification::Fail
    }
}

impl fmt::Display for AssertionResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mark = match self.classification {
            Classification::Pass => "✔",
            Classification::Fail => "✕",
            Classification::OptionalFail => "‼",
        };
        write!(f, "{} {}", mark, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " (actual: {}", detail.actual)?;
            if let Some(expected) = &detail.expected {
                write!(f, ", expected: {}", expected)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Receives every result produced for one scenario.
pub trait ResultSink: Send + Sync {
    fn record(&self, result: AssertionResult);
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classification_of_constructors() {
        assert!(AssertionResult::pass("ok").passed());
        assert!(AssertionResult::fail("no", None).is_hard_failure());
        let optional = AssertionResult::optional_fail("meh", None);
        assert!(!optional.passed());
        assert!(!optional.is_hard_failure());
        assert_eq!(optional.classification().to_string(), "optionalFail");
    }

    #[test]
    fn test_serialized_failure_carries_detail() {
        let detail = FailureDetail {
            actual: json!(1),
            expected: Some(json!(2)),
            source: Some("status".to_owned()),
            highlight: None,
        };
        let result = AssertionResult::fail("status is equal to 2", Some(detail));
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["classification"], json!("fail"));
        assert_eq!(value["detail"]["expected"], json!(2));
        assert!(value["detail"].get("highlight").is_none());
        assert_eq!(
            result.to_string(),
            "✕ status is equal to 2 (actual: 1, expected: 2)"
        );
    }
}
