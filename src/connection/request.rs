use bytes::Bytes;
use hyper::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Everything a transport needs to perform one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    url: Option<String>,
    headers: BTreeMap<String, String>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: Method::GET,
            url: None,
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
        }
    }
}

impl Request {
    pub fn new<S: Into<String>>(method: Method, url: S) -> Self {
        Self {
            method,
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn get<S: Into<String>>(url: S) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post<S: Into<String>>(url: S) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// A request can be sent once it knows where to go.
    pub fn is_resolvable(&self) -> bool {
        self.url.as_deref().map_or(false, |url| !url.trim().is_empty())
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON body and the matching content type.
    pub fn with_json(self, body: &Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
