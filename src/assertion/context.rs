use crate::assertion::compare::describe;
use crate::assertion::{Assertion, AssertionResult, FailureDetail, ResultSink};
use crate::configuration::options::ExecutionOptions;
use crate::connection::Response;
use crate::error::ResponseError;
use derivative::*;
use futures::future::join_all;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Derivative)]
#[derivative(Debug)]
struct ContextInner {
    scenario: String,
    #[derivative(Debug = "ignore")]
    sink: Arc<dyn ResultSink>,
    response: Option<Arc<Response>>,
    options: Arc<ExecutionOptions>,
    assertions: Arc<Mutex<Vec<Assertion>>>,
}

/// Per-scenario entry point for making assertions against a response.
///
/// Every assertion created here reports into the owning scenario's result log.
#[derive(Debug, Clone)]
pub struct AssertionContext {
    inner: Arc<ContextInner>,
}

impl AssertionContext {
    pub fn new(
        scenario: String,
        sink: Arc<dyn ResultSink>,
        response: Option<Arc<Response>>,
        options: Arc<ExecutionOptions>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                scenario,
                sink,
                response,
                options,
                assertions: Arc::new(Mutex::new(vec![])),
            }),
        }
    }

    pub fn scenario(&self) -> &str {
        &self.inner.scenario
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.inner.options
    }

    pub fn response(&self) -> Option<&Response> {
        self.inner.response.as_deref()
    }

    /// Looks up a single value in the response, `null` when there is no response or no match.
    pub fn find(&self, path: &str) -> Result<Value, ResponseError> {
        match self.response() {
            Some(response) => response.find(path),
            None => Ok(Value::Null),
        }
    }

    pub fn find_all(&self, path: &str) -> Result<Vec<Value>, ResponseError> {
        match self.response() {
            Some(response) => response.find_all(path),
            None => Ok(vec![]),
        }
    }

    /// Registers a new open assertion over `value`, named after the value itself.
    pub fn assert<T: Into<Value>>(&self, value: T) -> Assertion {
        let value = value.into();
        let subject = describe(&value);
        self.register(value, subject, None)
    }

    /// Registers a new open assertion whose results use `message` instead of a generated one.
    pub fn assert_named<S: Into<String>, T: Into<Value>>(&self, message: S, value: T) -> Assertion {
        let message = message.into();
        self.register(value.into(), message.clone(), Some(message))
    }

    /// Registers a new open assertion that calls the value `subject` in its generated messages.
    pub fn assert_as<S: Into<String>, T: Into<Value>>(&self, subject: S, value: T) -> Assertion {
        self.register(value.into(), subject.into(), None)
    }

    fn register(&self, value: Value, subject: String, message: Option<String>) -> Assertion {
        Assertion::new(
            value,
            subject,
            message,
            self.inner.sink.clone(),
            Arc::downgrade(&self.inner.assertions),
        )
    }

    pub fn assertions(&self) -> Vec<Assertion> {
        lock!(self.inner.assertions).clone()
    }

    /// Assertions that were created but never reached a terminal comparator.
    pub fn incomplete_assertions(&self) -> Vec<Assertion> {
        self.assertions()
            .into_iter()
            .filter(Assertion::is_open)
            .collect()
    }

    /// Waits for every assertion that reached a comparator and returns their results in
    /// registration order.
    pub async fn assertions_resolved(&self) -> Vec<AssertionResult> {
        let executed: Vec<Assertion> = self
            .assertions()
            .into_iter()
            .filter(Assertion::is_finalized)
            .collect();
        join_all(executed.iter().map(Assertion::result))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn log_passing<S: Into<String>>(&self, message: S) -> AssertionResult {
        self.log(AssertionResult::pass(message))
    }

    pub fn log_failure<S: Into<String>>(&self, message: S, detail: Option<FailureDetail>) -> AssertionResult {
        self.log(AssertionResult::fail(message, detail))
    }

    pub fn log_optional_failure<S: Into<String>>(
        &self,
        message: S,
        detail: Option<FailureDetail>,
    ) -> AssertionResult {
        self.log(AssertionResult::optional_fail(message, detail))
    }

    fn log(&self, result: AssertionResult) -> AssertionResult {
        self.inner.sink.record(result.clone());
        result
    }

    pub fn each<T, F>(&self, items: &[T], mut callback: F)
    where
        F: FnMut(&T, usize),
    {
        items.iter().enumerate().for_each(|(i, item)| callback(item, i));
    }

    pub fn map<T, R, F>(&self, items: &[T], mut callback: F) -> Vec<R>
    where
        F: FnMut(&T, usize) -> R,
    {
        items.iter().enumerate().map(|(i, item)| callback(item, i)).collect()
    }

    pub fn filter<'a, T, F>(&self, items: &'a [T], mut predicate: F) -> Vec<&'a T>
    where
        F: FnMut(&T, usize) -> bool,
    {
        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| if predicate(item, i) { Some(item) } else { None })
            .collect()
    }

    pub fn some<T, F>(&self, items: &[T], mut predicate: F) -> bool
    where
        F: FnMut(&T, usize) -> bool,
    {
        items.iter().enumerate().any(|(i, item)| predicate(item, i))
    }

    pub fn every<T, F>(&self, items: &[T], mut predicate: F) -> bool
    where
        F: FnMut(&T, usize) -> bool,
    {
        items.iter().enumerate().all(|(i, item)| predicate(item, i))
    }

    pub fn none<T, F>(&self, items: &[T], predicate: F) -> bool
    where
        F: FnMut(&T, usize) -> bool,
    {
        !self.some(items, predicate)
    }

    /// Runs `callback` for every item one after another.
    pub async fn each_async<'a, T, F, Fut>(&self, items: &'a [T], mut callback: F)
    where
        F: FnMut(&'a T, usize) -> Fut,
        Fut: Future<Output = ()>,
    {
        for (i, item) in items.iter().enumerate() {
            callback(item, i).await;
        }
    }

    /// Runs `callback` for every item concurrently and keeps the input order.
    pub async fn map_async<'a, T, R, F, Fut>(&self, items: &'a [T], mut callback: F) -> Vec<R>
    where
        F: FnMut(&'a T, usize) -> Fut,
        Fut: Future<Output = R>,
    {
        join_all(items.iter().enumerate().map(|(i, item)| callback(item, i))).await
    }

    pub async fn filter_async<'a, T, F, Fut>(&self, items: &'a [T], callback: F) -> Vec<&'a T>
    where
        F: FnMut(&'a T, usize) -> Fut,
        Fut: Future<Output = bool>,
    {
        let keep = self.map_async(items, callback).await;
        items
            .iter()
            .zip(keep)
            .filter_map(|(item, keep)| if keep { Some(item) } else { None })
            .collect()
    }

    pub async fn some_async<'a, T, F, Fut>(&self, items: &'a [T], callback: F) -> bool
    where
        F: FnMut(&'a T, usize) -> Fut,
        Fut: Future<Output = bool>,
    {
        self.map_async(items, callback).await.into_iter().any(|v| v)
    }

    pub async fn every_async<'a, T, F, Fut>(&self, items: &'a [T], callback: F) -> bool
    where
        F: FnMut(&'a T, usize) -> Fut,
        Fut: Future<Output = bool>,
    {
        self.map_async(items, callback).await.into_iter().all(|v| v)
    }

    pub async fn none_async<'a, T, F, Fut>(&self, items: &'a [T], callback: F) -> bool
    where
        F: FnMut(&'a T, usize) -> Fut,
        Fut: Future<Output = bool>,
    {
        !self.some_async(items, callback).await
    }
}
