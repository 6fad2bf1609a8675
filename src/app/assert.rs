use crate::app::capture::Capturable;
use crate::assertion::{Assertion, AssertionContext, Matcher};
use crate::configuration::manifest::{AssertFunction, AssertionEntry, MatchEntry};
use crate::error::AssertionError;

pub trait Assertable {
    fn assert(&self, assertion: Assertion) -> Result<Assertion, AssertionError>;
}

impl Assertable for AssertFunction {
    fn assert(&self, assertion: Assertion) -> Result<Assertion, AssertionError> {
        trace!("Assertion of {} with {:?}", assertion.subject(), self);
        match self {
            AssertFunction::Equals(expected) => assertion.equals(expected.clone()),
            AssertFunction::Exactly(expected) => assertion.exactly(expected.clone()),
            AssertFunction::Like(expected) => assertion.like(expected.clone()),
            AssertFunction::Contains(needle) => assertion.contains(needle.clone()),
            AssertFunction::StartsWith(prefix) => assertion.starts_with(prefix.clone()),
            AssertFunction::EndsWith(suffix) => assertion.ends_with(suffix.clone()),
            AssertFunction::Matches(MatchEntry::Pattern(regex)) => {
                assertion.matches(Matcher::Pattern(regex.clone()))
            }
            AssertFunction::Matches(MatchEntry::Schema(template)) => {
                assertion.matches(Matcher::Schema(template.clone()))
            }
            AssertFunction::GreaterThan(limit) => assertion.greater_than(limit.clone()),
            AssertFunction::LessThan(limit) => assertion.less_than(limit.clone()),
            AssertFunction::Between(range) => match range.as_slice() {
                [min, max] => assertion.between(min.clone(), max.clone()),
                _ => Err(AssertionError::InvalidArgument(
                    "between takes exactly two bounds".to_owned(),
                )),
            },
            AssertFunction::In(options) => assertion.is_in(options.iter().cloned()),
            AssertFunction::Type(kind) => assertion.is_type(kind),
            AssertFunction::Length(expected) => {
                let message = assertion.custom_message();
                let mut length = assertion.length();
                if let Some(message) = message {
                    length = length.message(message);
                }
                length.equals(expected.clone())
            }
            AssertFunction::Exists => assertion.exists(),
            AssertFunction::Empty => assertion.is_empty(),
        }
    }
}

impl AssertionEntry {
    /// Fails early for entries that could never be evaluated.
    pub fn validate(&self) -> Result<(), String> {
        self.select.validate()?;
        match &self.expect {
            AssertFunction::Between(range) if range.len() != 2 => {
                Err(format!("between takes exactly two bounds, got {}", range.len()))
            }
            _ => Ok(()),
        }
    }

    /// Captures the selected value from the context's response and runs the comparator on it.
    /// A value that can not be captured is logged as a failure of this entry.
    pub fn check(&self, context: &AssertionContext) -> Result<(), AssertionError> {
        let subject = self.select.subject();
        let captured = match context.response() {
            Some(response) => self.select.capture(response),
            None => Ok(serde_json::Value::Null),
        };
        let value = match captured {
            Ok(value) => value,
            Err(e) => {
                let message = format!("{}: {}", self.message.as_deref().unwrap_or(&subject), e);
                if self.optional {
                    context.log_optional_failure(message, None);
                } else {
                    context.log_failure(message, None);
                }
                return Ok(());
            }
        };

        let mut assertion = context.assert_as(subject, value);
        if self.not {
            assertion = assertion.not();
        }
        if self.optional {
            assertion = assertion.optional();
        }
        if let Some(message) = &self.message {
            assertion = assertion.message(message.clone());
        }
        self.expect.assert(assertion).map(|_| ())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::assertion::{AssertionResult, Classification, ResultSink};
    use crate::configuration::manifest::Select;
    use crate::configuration::options::ExecutionOptions;
    use crate::connection::Response;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Collector(Mutex<Vec<AssertionResult>>);

    impl ResultSink for Collector {
        fn record(&self, result: AssertionResult) {
            lock!(self.0).push(result);
        }
    }

    fn context() -> (AssertionContext, Arc<Collector>) {
        let sink = Arc::new(Collector::default());
        let response = Response::mock(200, r#"{"id": 5, "name": "  ann ", "tags": ["x"]}"#)
            .with_header("content-type", "application/json");
        let context = AssertionContext::new(
            "manifest".to_owned(),
            sink.clone(),
            Some(Arc::new(response)),
            Arc::new(ExecutionOptions::default()),
        );
        (context, sink)
    }

    fn entry(select: Select, expect: AssertFunction) -> AssertionEntry {
        AssertionEntry {
            select,
            not: false,
            optional: false,
            message: None,
            expect,
        }
    }

    #[test]
    fn test_functions_map_to_comparators() {
        let (context, sink) = context();
        entry(Select::Status, AssertFunction::Equals(json!(200))).check(&context).unwrap();
        entry(Select::Json("$.id".into()), AssertFunction::Between(vec![json!(1), json!(10)]))
            .check(&context)
            .unwrap();
        entry(Select::Json("$.tags".into()), AssertFunction::Length(json!(1)))
            .check(&context)
            .unwrap();
        entry(
            Select::Header("content-type".into()),
            AssertFunction::Matches(MatchEntry::Pattern(regex::Regex::new("json$").unwrap())),
        )
        .check(&context)
        .unwrap();
        entry(
            Select::Body,
            AssertFunction::Matches(MatchEntry::Schema(json!({"id": "integer", "name": "string"}))),
        )
        .check(&context)
        .unwrap();
        entry(Select::Json("$.missing".into()), AssertFunction::Exists)
            .check(&context)
            .unwrap();

        let results = lock!(sink.0).clone();
        assert_eq!(results.len(), 6);
        assert!(results[..5].iter().all(AssertionResult::passed));
        assert_eq!(results[0].message(), "Status is equal to 200");
        assert_eq!(results[5].classification(), Classification::Fail);
    }

    #[test]
    fn test_modifiers_apply() {
        let (context, sink) = context();
        let mut negated = entry(Select::Status, AssertFunction::Equals(json!(500)));
        negated.not = true;
        negated.check(&context).unwrap();

        let mut optional = entry(Select::Json("$.id".into()), AssertFunction::GreaterThan(json!(10)));
        optional.optional = true;
        optional.message = Some("Id is large".to_owned());
        optional.check(&context).unwrap();

        let mut length = entry(Select::Json("$.tags".into()), AssertFunction::Length(json!(2)));
        length.message = Some("Two tags".to_owned());
        length.check(&context).unwrap();

        let results = lock!(sink.0).clone();
        assert_eq!(results[2].message(), "Two tags");
        assert_eq!(results[2].classification(), Classification::Fail);
        assert_eq!(results[0].message(), "Status is not equal to 500");
        assert!(results[0].passed());
        assert_eq!(results[1].classification(), Classification::OptionalFail);
        assert_eq!(results[1].message(), "Id is large");
    }

    #[test]
    fn test_capture_error_is_logged_as_failure() {
        let sink = Arc::new(Collector::default());
        let context = AssertionContext::new(
            "text".to_owned(),
            sink.clone(),
            Some(Arc::new(Response::mock(200, "plain"))),
            Arc::new(ExecutionOptions::default()),
        );
        entry(Select::Json("$.id".into()), AssertFunction::Exists)
            .check(&context)
            .unwrap();

        let results = lock!(sink.0).clone();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].classification(), Classification::Fail);
        assert!(results[0].message().starts_with("$.id: Response body is not valid JSON"));
    }

    #[test]
    fn test_validate_rejects_bad_between() {
        let bad = entry(Select::Status, AssertFunction::Between(vec![json!(1)]));
        assert!(bad.validate().is_err());
        assert!(entry(Select::Status, AssertFunction::Exists).validate().is_ok());
    }
}
