use crate::configuration::manifest::Select;
use crate::connection::Response;
use crate::error::ResponseError;
use jsonpath::Selector;
use serde_json::Value;

pub(crate) trait Capturable<T> {
    fn capture(&self, data: &T) -> Result<Value, ResponseError>;
}

impl Capturable<Response> for Select {
    fn capture(&self, response: &Response) -> Result<Value, ResponseError> {
        let value = match self {
            Select::Status => Value::from(response.status()),
            Select::Body => match response.json() {
                Ok(document) => document,
                Err(_) => Value::String(response.text()),
            },
            Select::Header(name) => response
                .header(name)
                .map(Value::from)
                .unwrap_or(Value::Null),
            Select::Json(path) => response.find(path)?,
        };
        trace!("Captured {:?} as {}", self, value);
        Ok(value)
    }
}

impl Select {
    /// Name used in assertion messages.
    pub fn subject(&self) -> String {
        match self {
            Select::Status => "Status".to_owned(),
            Select::Body => "Body".to_owned(),
            Select::Header(name) => format!("Header {}", name),
            Select::Json(path) => path.clone(),
        }
    }

    /// Checks a JSONPath selector without needing a response.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Select::Json(path) => Selector::new(path).map(|_| ()).map_err(|e| e.to_string()),
            _ => Ok(()),
        }
    }
}
