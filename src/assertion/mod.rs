pub mod compare;
pub mod context;
pub mod result;
pub mod schema;

pub use context::AssertionContext;
pub use result::{AssertionResult, Classification, FailureDetail, ResultSink};

use crate::completion::Completion;
use crate::error::AssertionError;
use compare::{describe, to_number, type_name};
use derivative::*;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, Mutex, Weak};

/// What `matches` compares against, decided by the caller rather than by inspecting the value.
#[derive(Debug, Clone)]
pub enum Matcher {
    Pattern(Regex),
    Schema(Value),
}

impl Matcher {
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Matcher::Pattern)
    }
}

impl From<Regex> for Matcher {
    fn from(regex: Regex) -> Self {
        Matcher::Pattern(regex)
    }
}

impl From<Value> for Matcher {
    fn from(template: Value) -> Self {
        Matcher::Schema(template)
    }
}

#[derive(Debug, Clone)]
enum Resolution {
    Open,
    Abandoned,
    Finalized(AssertionResult),
}

#[derive(Debug)]
struct AssertionState {
    not: bool,
    optional: bool,
    message: Option<String>,
    // (fail, pass)
    default_messages: Option<(String, String)>,
    resolution: Resolution,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct AssertionInner {
    input: Value,
    subject: String,
    #[derivative(Debug = "ignore")]
    sink: Arc<dyn ResultSink>,
    #[derivative(Debug = "ignore")]
    registry: Weak<Mutex<Vec<Assertion>>>,
    state: Mutex<AssertionState>,
    resolved: Completion,
}

/// A single boolean check over a value.
///
/// An assertion starts open and is finalized by exactly one terminal comparator such as
/// [`Assertion::equals`]. Handles are cheap clones sharing the same state, so flags set through
/// one handle are visible through the others.
#[derive(Debug, Clone)]
pub struct Assertion {
    inner: Arc<AssertionInner>,
}

impl Assertion {
    pub(crate) fn new(
        input: Value,
        subject: String,
        message: Option<String>,
        sink: Arc<dyn ResultSink>,
        registry: Weak<Mutex<Vec<Assertion>>>,
    ) -> Self {
        let assertion = Self {
            inner: Arc::new(AssertionInner {
                input,
                subject,
                sink,
                registry,
                state: Mutex::new(AssertionState {
                    not: false,
                    optional: false,
                    message,
                    default_messages: None,
                    resolution: Resolution::Open,
                }),
                resolved: Completion::new(),
            }),
        };
        if let Some(registry) = assertion.inner.registry.upgrade() {
            lock!(registry).push(assertion.clone());
        }
        assertion
    }

    /// Creates an assertion over `value` that inherits the `not`/`optional` flags of `parent`
    /// and reports to the same place. The parent is left untouched, see [`Assertion::abandon`].
    pub fn derive_from<S: Into<String>>(parent: &Assertion, value: Value, name: S) -> Assertion {
        let (not, optional) = {
            let state = lock!(parent.inner.state);
            (state.not, state.optional)
        };
        let child = Assertion::new(
            value,
            name.into(),
            None,
            parent.inner.sink.clone(),
            parent.inner.registry.clone(),
        );
        {
            let mut state = lock!(child.inner.state);
            state.not = not;
            state.optional = optional;
        }
        child
    }

    /// Marks an open assertion as resolved without a verdict.
    ///
    /// Abandoned assertions no longer count as incomplete. They may still be finalized later.
    pub fn abandon(&self) {
        let mut state = lock!(self.inner.state);
        if let Resolution::Open = state.resolution {
            state.resolution = Resolution::Abandoned;
            drop(state);
            self.inner.resolved.complete();
        }
    }

    pub fn value(&self) -> &Value {
        &self.inner.input
    }

    pub fn subject(&self) -> &str {
        &self.inner.subject
    }

    /// Inverts the next comparison.
    pub fn not(self) -> Self {
        {
            let mut state = lock!(self.inner.state);
            state.not = !state.not;
        }
        self
    }

    /// Failures of this assertion are recorded as optional and do not fail the scenario.
    pub fn optional(self) -> Self {
        lock!(self.inner.state).optional = true;
        self
    }

    /// Overrides the generated message of both outcomes.
    pub fn message<S: Into<String>>(self, message: S) -> Self {
        lock!(self.inner.state).message = Some(message.into());
        self
    }

    /// The message set through [`Assertion::message`] or `assert_named`, if any.
    pub fn custom_message(&self) -> Option<String> {
        lock!(self.inner.state).message.clone()
    }

    pub fn is_negated(&self) -> bool {
        lock!(self.inner.state).not
    }

    pub fn is_optional(&self) -> bool {
        lock!(self.inner.state).optional
    }

    pub fn is_finalized(&self) -> bool {
        matches!(lock!(self.inner.state).resolution, Resolution::Finalized(_))
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(lock!(self.inner.state).resolution, Resolution::Abandoned)
    }

    /// Neither finalized nor abandoned.
    pub fn is_open(&self) -> bool {
        matches!(lock!(self.inner.state).resolution, Resolution::Open)
    }

    /// The result, if a comparator already ran.
    pub fn current_result(&self) -> Option<AssertionResult> {
        match &lock!(self.inner.state).resolution {
            Resolution::Finalized(result) => Some(result.clone()),
            _ => None,
        }
    }

    /// Resolves once the assertion is finalized or abandoned. Abandoned assertions yield `None`.
    pub async fn result(&self) -> Option<AssertionResult> {
        self.inner.resolved.wait().await;
        self.current_result()
    }

    /// Finalizes the assertion with a computed outcome.
    ///
    /// `statement` is inverted when `not` is set. A failing statement is recorded as an optional
    /// failure when the assertion is optional and as a hard failure otherwise. Calling this on an
    /// already finalized assertion is an error.
    pub fn execute(
        &self,
        statement: bool,
        actual: Value,
        highlight: Option<String>,
        expected: Option<Value>,
    ) -> Result<Assertion, AssertionError> {
        let mut state = lock!(self.inner.state);
        if let Resolution::Finalized(_) = state.resolution {
            return Err(AssertionError::Immutable);
        }
        let passed = if state.not { !statement } else { statement };
        let (fail_message, pass_message) = state.default_messages.clone().unwrap_or_else(|| {
            (
                format!("{} failed", self.inner.subject),
                format!("{} passed", self.inner.subject),
            )
        });
        let message = match (&state.message, passed) {
            (Some(message), _) => message.clone(),
            (None, true) => pass_message,
            (None, false) => fail_message,
        };
        let result = if passed {
            AssertionResult::pass(message)
        } else {
            let detail = FailureDetail {
                actual,
                expected,
                source: Some(self.inner.subject.clone()),
                highlight,
            };
            if state.optional {
                AssertionResult::optional_fail(message, Some(detail))
            } else {
                AssertionResult::fail(message, Some(detail))
            }
        };
        state.resolution = Resolution::Finalized(result.clone());
        drop(state);

        if !result.passed() {
            debug!("Assertion failed: {}", result);
        }
        self.inner.sink.record(result);
        self.inner.resolved.complete();
        Ok(self.clone())
    }

    /// Stores the generated (fail, pass) message pair and runs [`Assertion::execute`].
    fn evaluate(
        &self,
        statement: bool,
        phrase: (&str, &str),
        expected: Option<Value>,
        highlight: Option<String>,
    ) -> Result<Assertion, AssertionError> {
        {
            let mut state = lock!(self.inner.state);
            let (affirmative, negative) = phrase;
            let asserted = if state.not { negative } else { affirmative };
            let pass = format!("{} {}", self.inner.subject, asserted);
            let fail = format!("{}, got {}", pass, describe(&self.inner.input));
            state.default_messages = Some((fail, pass));
        }
        self.execute(statement, self.inner.input.clone(), highlight, expected)
    }

    fn compare(
        &self,
        statement: bool,
        phrase: (&str, &str),
        expected: &Value,
    ) -> Result<Assertion, AssertionError> {
        let operand = describe(expected);
        let affirmative = format!("{} {}", phrase.0, operand);
        let negative = format!("{} {}", phrase.1, operand);
        self.evaluate(
            statement,
            (&affirmative, &negative),
            Some(expected.clone()),
            None,
        )
    }

    fn number(&self) -> Option<f64> {
        to_number(&self.inner.input)
    }

    fn array(&self, operation: &'static str) -> Result<&Vec<Value>, AssertionError> {
        match &self.inner.input {
            Value::Array(items) => Ok(items),
            other => Err(AssertionError::NotAnArray {
                operation,
                actual: type_name(other).to_owned(),
            }),
        }
    }

    /// Structural equality with scalar coercion.
    pub fn equals<T: Into<Value>>(&self, expected: T) -> Result<Assertion, AssertionError> {
        let expected = expected.into();
        let statement = compare::loose_equals(&self.inner.input, &expected);
        self.compare(statement, ("is equal to", "is not equal to"), &expected)
    }

    /// Equality requiring identical types and order at every position.
    pub fn exactly<T: Into<Value>>(&self, expected: T) -> Result<Assertion, AssertionError> {
        let expected = expected.into();
        let statement = compare::strict_equals(&self.inner.input, &expected);
        self.compare(statement, ("is exactly", "is not exactly"), &expected)
    }

    /// Case and whitespace insensitive equality.
    pub fn like<T: Into<Value>>(&self, expected: T) -> Result<Assertion, AssertionError> {
        let expected = expected.into();
        let statement = compare::like(&self.inner.input, &expected);
        self.compare(statement, ("is like", "is not like"), &expected)
    }

    pub fn contains<T: Into<Value>>(&self, needle: T) -> Result<Assertion, AssertionError> {
        let needle = needle.into();
        let statement = compare::contains(&self.inner.input, &needle);
        self.compare(statement, ("contains", "does not contain"), &needle)
    }

    pub fn starts_with<T: Into<Value>>(&self, prefix: T) -> Result<Assertion, AssertionError> {
        let prefix = prefix.into();
        let statement = compare::starts_with(&self.inner.input, &prefix);
        self.compare(statement, ("starts with", "does not start with"), &prefix)
    }

    pub fn ends_with<T: Into<Value>>(&self, suffix: T) -> Result<Assertion, AssertionError> {
        let suffix = suffix.into();
        let statement = compare::ends_with(&self.inner.input, &suffix);
        self.compare(statement, ("ends with", "does not end with"), &suffix)
    }

    pub fn greater_than<T: Into<Value>>(&self, limit: T) -> Result<Assertion, AssertionError> {
        let limit = limit.into();
        let statement = matches!((self.number(), to_number(&limit)), (Some(a), Some(b)) if a > b);
        self.compare(statement, ("is greater than", "is not greater than"), &limit)
    }

    pub fn greater_than_or_equals<T: Into<Value>>(&self, limit: T) -> Result<Assertion, AssertionError> {
        let limit = limit.into();
        let statement = matches!((self.number(), to_number(&limit)), (Some(a), Some(b)) if a >= b);
        self.compare(
            statement,
            ("is greater than or equal to", "is not greater than or equal to"),
            &limit,
        )
    }

    pub fn less_than<T: Into<Value>>(&self, limit: T) -> Result<Assertion, AssertionError> {
        let limit = limit.into();
        let statement = matches!((self.number(), to_number(&limit)), (Some(a), Some(b)) if a < b);
        self.compare(statement, ("is less than", "is not less than"), &limit)
    }

    pub fn less_than_or_equals<T: Into<Value>>(&self, limit: T) -> Result<Assertion, AssertionError> {
        let limit = limit.into();
        let statement = matches!((self.number(), to_number(&limit)), (Some(a), Some(b)) if a <= b);
        self.compare(
            statement,
            ("is less than or equal to", "is not less than or equal to"),
            &limit,
        )
    }

    /// Inclusive numeric range check.
    pub fn between<T: Into<Value>, U: Into<Value>>(&self, min: T, max: U) -> Result<Assertion, AssertionError> {
        let (min, max) = (min.into(), max.into());
        let statement = match (self.number(), to_number(&min), to_number(&max)) {
            (Some(value), Some(low), Some(high)) => value >= low && value <= high,
            _ => false,
        };
        let range = Value::Array(vec![min.clone(), max.clone()]);
        let bounds = format!("{} and {}", describe(&min), describe(&max));
        self.evaluate(
            statement,
            (
                &format!("is between {}", bounds),
                &format!("is not between {}", bounds),
            ),
            Some(range),
            None,
        )
    }

    /// Passes when the value loosely equals one of `options`.
    pub fn is_in<I, T>(&self, options: I) -> Result<Assertion, AssertionError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let options = Value::Array(options.into_iter().map(Into::into).collect());
        let statement = compare::contains(&options, &self.inner.input);
        self.compare(statement, ("is in", "is not in"), &options)
    }

    /// Pattern match for [`Matcher::Pattern`], structural validation for [`Matcher::Schema`].
    pub fn matches<M: Into<Matcher>>(&self, matcher: M) -> Result<Assertion, AssertionError> {
        match matcher.into() {
            Matcher::Pattern(regex) => {
                let text = compare::to_text(&self.inner.input);
                let statement = regex.is_match(&text);
                let pattern = Value::String(regex.as_str().to_owned());
                self.evaluate(
                    statement,
                    (
                        &format!("matches /{}/", regex.as_str()),
                        &format!("does not match /{}/", regex.as_str()),
                    ),
                    Some(pattern),
                    None,
                )
            }
            Matcher::Schema(template) => {
                let errors = schema::validate(&template, &self.inner.input);
                let highlight = if errors.is_empty() {
                    None
                } else {
                    Some(errors.join("; "))
                };
                self.evaluate(
                    errors.is_empty(),
                    ("matches schema", "does not match schema"),
                    Some(template),
                    highlight,
                )
            }
        }
    }

    /// Passes for any value other than `null`.
    pub fn exists(&self) -> Result<Assertion, AssertionError> {
        let statement = !self.inner.input.is_null();
        self.evaluate(statement, ("exists", "does not exist"), None, None)
    }

    pub fn is_empty(&self) -> Result<Assertion, AssertionError> {
        let statement = compare::is_empty(&self.inner.input);
        self.evaluate(statement, ("is empty", "is not empty"), None, None)
    }

    pub fn is_type(&self, kind: &str) -> Result<Assertion, AssertionError> {
        let statement = type_name(&self.inner.input) == kind;
        self.evaluate(
            statement,
            (&format!("is type {}", kind), &format!("is not type {}", kind)),
            Some(Value::String(kind.to_owned())),
            None,
        )
    }

    /// Array only: every element satisfies `predicate`.
    pub fn every<F: Fn(&Value) -> bool>(&self, predicate: F) -> Result<Assertion, AssertionError> {
        let items = self.array("every")?;
        let failing = items.iter().position(|item| !predicate(item));
        let highlight = failing.map(|index| format!("element {} did not match", index));
        self.evaluate(
            failing.is_none(),
            ("has every element matching", "does not have every element matching"),
            None,
            highlight,
        )
    }

    /// Array only: at least one element satisfies `predicate`.
    pub fn some<F: Fn(&Value) -> bool>(&self, predicate: F) -> Result<Assertion, AssertionError> {
        let statement = self.array("some")?.iter().any(|item| predicate(item));
        self.evaluate(
            statement,
            ("has some element matching", "has no element matching"),
            None,
            None,
        )
    }

    /// Array only: no element satisfies `predicate`.
    pub fn none<F: Fn(&Value) -> bool>(&self, predicate: F) -> Result<Assertion, AssertionError> {
        let items = self.array("none")?;
        let matching = items.iter().position(|item| predicate(item));
        let highlight = matching.map(|index| format!("element {} matched", index));
        self.evaluate(
            matching.is_none(),
            ("has no element matching", "has some element matching"),
            None,
            highlight,
        )
    }

    /// Array only: some element loosely equals `item`.
    pub fn includes<T: Into<Value>>(&self, item: T) -> Result<Assertion, AssertionError> {
        let item = item.into();
        let statement = self
            .array("includes")?
            .iter()
            .any(|candidate| compare::loose_equals(candidate, &item));
        self.compare(statement, ("includes", "does not include"), &item)
    }

    fn derive<S: Into<String>>(&self, value: Value, name: S) -> Assertion {
        let child = Assertion::derive_from(self, value, name);
        self.abandon();
        child
    }

    pub fn length(&self) -> Assertion {
        let length = match &self.inner.input {
            Value::String(text) => Value::from(text.chars().count()),
            Value::Array(items) => Value::from(items.len()),
            Value::Object(map) => Value::from(map.len()),
            _ => Value::Null,
        };
        self.derive(length, format!("Length of {}", self.inner.subject))
    }

    pub fn keys(&self) -> Assertion {
        let keys = match &self.inner.input {
            Value::Object(map) => map.keys().cloned().map(Value::String).collect(),
            Value::Array(items) => (0..items.len()).map(Value::from).collect(),
            _ => vec![],
        };
        self.derive(Value::Array(keys), format!("Keys of {}", self.inner.subject))
    }

    pub fn values(&self) -> Assertion {
        let values = match &self.inner.input {
            Value::Object(map) => map.values().cloned().collect(),
            Value::Array(items) => items.clone(),
            _ => vec![],
        };
        self.derive(Value::Array(values), format!("Values of {}", self.inner.subject))
    }

    pub fn type_of(&self) -> Assertion {
        let kind = Value::String(type_name(&self.inner.input).to_owned());
        self.derive(kind, format!("Type of {}", self.inner.subject))
    }

    pub fn trim(&self) -> Assertion {
        let trimmed = match &self.inner.input {
            Value::String(text) => Value::String(text.trim().to_owned()),
            other => other.clone(),
        };
        self.derive(trimmed, format!("Trimmed {}", self.inner.subject))
    }

    pub fn first(&self) -> Assertion {
        let first = element_at(&self.inner.input, 0);
        self.derive(first, format!("First of {}", self.inner.subject))
    }

    pub fn last(&self) -> Assertion {
        let last = match &self.inner.input {
            Value::Array(items) => items.last().cloned().unwrap_or(Value::Null),
            Value::String(text) => text
                .chars()
                .last()
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        };
        self.derive(last, format!("Last of {}", self.inner.subject))
    }

    pub fn at(&self, index: usize) -> Assertion {
        let item = element_at(&self.inner.input, index);
        self.derive(item, format!("{}[{}]", self.inner.subject, index))
    }

    /// Field `key` of an object, or of every element of an array.
    pub fn pluck(&self, key: &str) -> Assertion {
        let plucked = match &self.inner.input {
            Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| item.get(key).cloned().unwrap_or(Value::Null))
                    .collect(),
            ),
            _ => Value::Null,
        };
        self.derive(plucked, format!("{}.{}", self.inner.subject, key))
    }
}

fn element_at(value: &Value, index: usize) -> Value {
    match value {
        Value::Array(items) => items.get(index).cloned().unwrap_or(Value::Null),
        Value::String(text) => text
            .chars()
            .nth(index)
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
