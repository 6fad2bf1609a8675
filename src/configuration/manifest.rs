use crate::configuration::options::ExecutionOptions;
use crate::error::ManifestError;
use config::{Config, File, FileFormat};
use hyper::Method;
use regex::Regex;
use serde_derive::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEntry {
    Raw(String),
    Json(Value),
    Base64(#[serde(with = "crate::configuration::deserialize::base64_property")] Vec<u8>),
}

/// Which part of the response an assertion looks at.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Select {
    Status,
    Body,
    Header(String),
    Json(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MatchEntry {
    Pattern(#[serde(with = "serde_regex")] Regex),
    Schema(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertFunction {
    Equals(Value),
    Exactly(Value),
    Like(Value),
    Contains(Value),
    StartsWith(Value),
    EndsWith(Value),
    Matches(MatchEntry),
    GreaterThan(Value),
    LessThan(Value),
    Between(Vec<Value>),
    In(Vec<Value>),
    Type(String),
    Length(Value),
    Exists,
    Empty,
}

#[derive(Debug, Deserialize)]
pub struct AssertionEntry {
    pub select: Select,
    #[serde(default)]
    pub not: bool,
    #[serde(default)]
    pub optional: bool,
    pub message: Option<String>,
    pub expect: AssertFunction,
}

#[derive(Debug, Deserialize)]
pub struct MockEntry {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub body: Option<BodyEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioEntry {
    pub title: String,
    #[serde(default = "default_method", with = "crate::configuration::deserialize::http_method")]
    pub method: Method,
    pub url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub body: Option<BodyEntry>,
    #[serde(default, with = "crate::configuration::deserialize::optional_duration")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub wait_for: Vec<String>,
    pub skip: Option<String>,
    pub mock: Option<MockEntry>,
    #[serde(default)]
    pub assertions: Vec<AssertionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub base: Option<String>,
    #[serde(default)]
    pub settings: ExecutionOptions,
    #[serde(default)]
    pub vars: BTreeMap<String, Value>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioEntry>,
}

fn default_method() -> Method {
    Method::GET
}

fn default_status() -> u16 {
    200
}

impl Manifest {
    /// Loads a manifest, the format is picked from the file extension.
    pub fn from(file: PathBuf) -> Result<Self, ManifestError> {
        let config = Config::builder().add_source(File::from(file)).build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn from_str(content: &str, format: FileFormat) -> Result<Self, ManifestError> {
        let config = Config::builder()
            .add_source(File::from_str(content, format))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Drops every scenario whose title is not listed. An empty list keeps everything.
    pub fn retain_only(&mut self, titles: &[String]) {
        if titles.is_empty() {
            return;
        }
        self.scenarios
            .retain(|scenario| titles.iter().any(|title| title == &scenario.title));
    }
}

/// Replaces `{name}` placeholders with the matching variable. Unknown placeholders stay as is.
pub fn substitute(text: &str, vars: &BTreeMap<String, Value>) -> String {
    let mut result = text.to_owned();
    for (key, value) in vars {
        let replacement = match value {
            Value::String(string) => string.clone(),
            other => other.to_string(),
        };
        result = result.replace(format!("{{{}}}", key).as_str(), replacement.as_str());
    }
    result
}

/// Applies [`substitute`] to every string inside a JSON value.
pub fn substitute_json(value: &Value, vars: &BTreeMap<String, Value>) -> Value {
    match value {
        Value::String(string) => Value::String(substitute(string, vars)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_json(v, vars)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_json(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    const MANIFEST: &str = r#"
name: Users API
base: http://localhost:8080
settings:
  concurrency_limit: 2
  max_scenario_duration: 5s
  settle_delay: 0
vars:
  user_id: 42
  token: secret
scenarios:
  - title: Get user
    url: /users/{user_id}
    headers:
      authorization: Bearer {token}
    timeout: 1s
    assertions:
      - select: status
        expect:
          equals: 200
      - select:
          json: $.name
        optional: true
        message: User has a name
        expect: exists
      - select:
          header: content-type
        expect:
          matches: "^application/json"
  - title: Create user
    method: post
    url: /users
    wait_for: [Get user]
    body:
      json:
        name: Jane
        owner: "{user_id}"
    assertions:
      - select: body
        not: true
        expect:
          between: [1, 5]
      - select:
          json: $
        expect:
          matches:
            id: integer
  - title: Disabled
    skip: Not ready yet
    mock:
      status: 204
"#;

    #[test]
    fn test_manifest_from_yaml() {
        let manifest = Manifest::from_str(MANIFEST, FileFormat::Yaml).unwrap();

        assert_eq!(manifest.name, "Users API");
        assert_eq!(manifest.base.as_deref(), Some("http://localhost:8080"));
        assert_eq!(manifest.settings.concurrency_limit, 2);
        assert_eq!(manifest.settings.max_scenario_duration, Duration::from_secs(5));
        assert_eq!(manifest.settings.settle_delay, Duration::ZERO);
        assert_eq!(manifest.scenarios.len(), 3);

        let get = &manifest.scenarios[0];
        assert_eq!(get.method, Method::GET);
        assert_eq!(get.timeout, Some(Duration::from_secs(1)));
        assert_eq!(get.headers.get("authorization").map(String::as_str), Some("Bearer {token}"));
        assert_eq!(get.assertions[0].select, Select::Status);
        assert!(matches!(get.assertions[0].expect, AssertFunction::Equals(_)));
        assert!(get.assertions[1].optional);
        assert!(matches!(get.assertions[1].expect, AssertFunction::Exists));
        assert!(matches!(
            get.assertions[2].expect,
            AssertFunction::Matches(MatchEntry::Pattern(_))
        ));

        let create = &manifest.scenarios[1];
        assert_eq!(create.method, Method::POST);
        assert_eq!(create.wait_for, vec!["Get user".to_owned()]);
        assert!(matches!(create.body, Some(BodyEntry::Json(_))));
        assert!(create.assertions[0].not);
        assert!(matches!(create.assertions[0].expect, AssertFunction::Between(_)));
        assert!(matches!(
            create.assertions[1].expect,
            AssertFunction::Matches(MatchEntry::Schema(_))
        ));

        let disabled = &manifest.scenarios[2];
        assert_eq!(disabled.skip.as_deref(), Some("Not ready yet"));
        assert_eq!(disabled.mock.as_ref().map(|m| m.status), Some(204));
    }

    #[test]
    fn test_retain_only_filters_by_title() {
        let mut manifest = Manifest::from_str(MANIFEST, FileFormat::Yaml).unwrap();
        manifest.retain_only(&["Disabled".to_owned()]);
        assert_eq!(manifest.scenarios.len(), 1);

        let mut all = Manifest::from_str(MANIFEST, FileFormat::Yaml).unwrap();
        all.retain_only(&[]);
        assert_eq!(all.scenarios.len(), 3);
    }

    #[test]
    fn test_substitute_vars() {
        let vars: BTreeMap<String, Value> =
            vec![("id".to_owned(), json!(7)), ("name".to_owned(), json!("ann"))]
                .into_iter()
                .collect();

        assert_eq!(substitute("/users/{id}?q={name}&x={missing}", &vars), "/users/7?q=ann&x={missing}");
        assert_eq!(
            substitute_json(&json!({"id": "{id}", "tags": ["{name}"], "n": 1}), &vars),
            json!({"id": "7", "tags": ["ann"], "n": 1})
        );
    }

    #[test]
    fn test_zero_concurrency_limit_becomes_one() {
        let manifest = Manifest::from_str(
            "name: Serial\nsettings:\n  concurrency_limit: 0\nscenarios:\n  - title: Only\n    url: /only\n",
            FileFormat::Yaml,
        )
        .unwrap();
        assert_eq!(manifest.settings.concurrency_limit, 1);
    }

    #[test]
    fn test_invalid_manifest_is_an_error() {
        let result = Manifest::from_str("name: [unterminated", FileFormat::Yaml);
        assert!(matches!(result, Err(ManifestError::Config(_))));
    }
}
