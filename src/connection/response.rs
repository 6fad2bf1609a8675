use crate::error::ResponseError;
use bytes::Bytes;
use jsonpath::Selector;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// A protocol response that assertions can look values up in.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Bytes,
    elapsed: Duration,
}

impl Response {
    pub fn new<B: Into<Bytes>>(status: u16, headers: BTreeMap<String, String>, body: B) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_lowercase(), value))
            .collect();
        Self {
            status,
            headers,
            body: body.into(),
            elapsed: Duration::default(),
        }
    }

    /// A canned response, used by scenarios that do not hit a transport and by tests.
    pub fn mock<B: Into<Bytes>>(status: u16, body: B) -> Self {
        Self::new(status, BTreeMap::new(), body)
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn with_header<K: AsRef<str>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.insert(name.as_ref().to_lowercase(), value.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Header lookup is case insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<Value, ResponseError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Every value matched by a JSONPath expression.
    pub fn find_all(&self, path: &str) -> Result<Vec<Value>, ResponseError> {
        let selector = Selector::new(path).map_err(|e| ResponseError::Selector {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        let document = self.json()?;
        let found = selector.find(&document).cloned().collect();
        Ok(found)
    }

    /// A single match is returned as is, several as an array and none as `null`.
    pub fn find(&self, path: &str) -> Result<Value, ResponseError> {
        let mut found = self.find_all(path)?;
        Ok(match found.len() {
            0 => Value::Null,
            1 => found.remove(0),
            _ => Value::Array(found),
        })
    }
}

#[cfg(test)]
mod test {
    use super::Response;
    use crate::error::ResponseError;
    use serde_json::json;

    fn response() -> Response {
        Response::mock(
            200,
            r#"{"user": {"id": 7, "roles": ["admin", "dev"]}, "items": [{"n": 1}, {"n": 2}]}"#,
        )
        .with_header("Content-Type", "application/json")
    }

    #[test]
    fn test_find_single_many_and_none() {
        let response = response();
        assert_eq!(response.find("$.user.id").unwrap(), json!(7));
        assert_eq!(response.find("$.items[*].n").unwrap(), json!([1, 2]));
        assert_eq!(response.find("$.missing").unwrap(), json!(null));
        assert_eq!(response.find_all("$.user.roles[*]").unwrap().len(), 2);
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        assert_eq!(response().header("content-type"), Some("application/json"));
        assert_eq!(response().header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(response().header("x-missing"), None);
    }

    #[test]
    fn test_find_on_non_json_body() {
        let response = Response::mock(200, "<html></html>");
        assert!(matches!(response.find("$.a"), Err(ResponseError::NotJson(_))));
        assert_eq!(response.text(), "<html></html>");
    }
}
