pub(crate) mod assert;
pub(crate) mod capture;

use crate::configuration::manifest::{
    substitute, substitute_json, BodyEntry, Manifest, MockEntry, ScenarioEntry,
};
use crate::connection::{HttpTransport, Request, Response, Transport};
use crate::error::ManifestError;
use crate::reporter::SuiteReport;
use crate::scenario::Scenario;
use crate::suite::Suite;
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Turns a manifest into a ready to run [`Suite`].
pub struct App {
    suite: Suite,
}

impl App {
    pub fn new(manifest: Manifest) -> Result<Self, ManifestError> {
        App::with_transport(manifest, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(
        manifest: Manifest,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ManifestError> {
        let Manifest {
            name,
            base,
            settings,
            vars,
            scenarios: entries,
        } = manifest;

        for entry in &entries {
            for assertion in &entry.assertions {
                assertion
                    .validate()
                    .map_err(|reason| ManifestError::InvalidAssertion {
                        scenario: entry.title.clone(),
                        reason,
                    })?;
            }
        }

        let mut options = settings;
        if let Some(base) = base {
            options = options.with_base_url(substitute(&base, &vars));
        }
        let suite = Suite::with_transport(name, options, transport);

        let mut by_title: BTreeMap<String, Scenario> = BTreeMap::new();
        let mut skipped = vec![];
        let mut dependencies = vec![];
        for entry in entries {
            let scenario = suite.scenario(entry.title.clone())?;
            App::configure(&scenario, &entry, &vars)?;
            let ScenarioEntry {
                title,
                wait_for,
                skip,
                assertions,
                ..
            } = entry;
            if !assertions.is_empty() {
                scenario.next_named("Manifest assertions", move |context| async move {
                    for assertion in &assertions {
                        assertion.check(&context)?;
                    }
                    Ok(())
                })?;
            }
            if let Some(reason) = skip {
                skipped.push((scenario.clone(), reason));
            }
            dependencies.push((title.clone(), wait_for));
            by_title.insert(title, scenario);
        }

        for (title, wait_for) in dependencies {
            for dependency in wait_for {
                let (scenario, other) = match (by_title.get(&title), by_title.get(&dependency)) {
                    (Some(scenario), Some(other)) => (scenario, other),
                    _ => {
                        return Err(ManifestError::UnknownDependency {
                            scenario: title,
                            dependency,
                        })
                    }
                };
                scenario.wait_for(other)?;
            }
        }
        for (scenario, reason) in skipped {
            scenario.skip(reason)?;
        }

        Ok(App { suite })
    }

    fn configure(
        scenario: &Scenario,
        entry: &ScenarioEntry,
        vars: &BTreeMap<String, Value>,
    ) -> Result<(), ManifestError> {
        if let Some(url) = &entry.url {
            let mut request = Request::new(entry.method.clone(), substitute(url, vars));
            for (name, value) in &entry.headers {
                request = request.with_header(name.clone(), substitute(value, vars));
            }
            request = match &entry.body {
                Some(BodyEntry::Json(body)) => request.with_json(&substitute_json(body, vars)),
                Some(body) => request.with_body(body_bytes(body, vars)),
                None => request,
            };
            if let Some(timeout) = entry.timeout {
                request = request.with_timeout(timeout);
            }
            scenario.open(request)?;
        }
        if let Some(mock) = &entry.mock {
            scenario.mock(mock_response(mock, vars))?;
        }
        Ok(())
    }

    pub fn suite(&self) -> &Suite {
        &self.suite
    }

    pub async fn run(&self) -> SuiteReport {
        info!(
            "Starting suite '{}' with {} scenarios",
            self.suite.title(),
            self.suite.scenarios().len()
        );
        self.suite.execute().await;
        self.suite.report()
    }
}

fn body_bytes(body: &BodyEntry, vars: &BTreeMap<String, Value>) -> Bytes {
    match body {
        BodyEntry::Raw(raw) => Bytes::from(substitute(raw, vars)),
        BodyEntry::Json(json) => Bytes::from(substitute_json(json, vars).to_string()),
        BodyEntry::Base64(bytes) => Bytes::from(bytes.clone()),
    }
}

fn mock_response(mock: &MockEntry, vars: &BTreeMap<String, Value>) -> Response {
    let headers = mock
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), substitute(value, vars)))
        .collect();
    let body = mock
        .body
        .as_ref()
        .map(|body| body_bytes(body, vars))
        .unwrap_or_default();
    Response::new(mock.status, headers, body)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::assertion::Classification;
    use crate::error::TransportError;
    use crate::scenario::Disposition;
    use config::FileFormat;
    use std::sync::Mutex;

    const MANIFEST: &str = r#"
name: Users
base: http://api.{env}.local
settings:
  settle_delay: 0
  registration_delay: 0
vars:
  env: test
  id: 7
scenarios:
  - title: Fetch user
    url: /users/{id}
    headers:
      x-trace: trace-{id}
    assertions:
      - select: status
        expect:
          equals: 200
      - select:
          json: $.id
        expect:
          exactly: 7
      - select:
          json: $.roles
        optional: true
        expect:
          length: 3
  - title: Rename user
    method: PUT
    url: /users/{id}
    wait_for: [Fetch user]
    body:
      json:
        name: renamed-{id}
    assertions:
      - select:
          header: x-echo
        expect:
          contains: renamed-7
  - title: Offline
    mock:
      status: 503
      body:
        raw: maintenance
    assertions:
      - select: body
        expect:
          equals: maintenance
  - title: Later
    url: /later
    skip: Not implemented
"#;

    fn transport(seen: Arc<Mutex<Vec<String>>>) -> Arc<dyn Transport> {
        Arc::new(move |request: Request| {
            let seen = seen.clone();
            async move {
                let url = request.url().unwrap_or_default().to_owned();
                lock!(seen).push(format!("{} {}", request.method(), url));
                let body = request
                    .body()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .unwrap_or_default();
                let trace = request.headers().get("x-trace").cloned().unwrap_or_default();
                Ok::<_, TransportError>(
                    Response::mock(200, r#"{"id": 7, "roles": ["a"]}"#)
                        .with_header("x-echo", body)
                        .with_header("x-trace", trace),
                )
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_manifest_suite_runs() {
        let seen = Arc::new(Mutex::new(vec![]));
        let manifest = Manifest::from_str(MANIFEST, FileFormat::Yaml).unwrap();
        let app = App::with_transport(manifest, transport(seen.clone())).unwrap();
        let report = app.run().await;

        assert_eq!(
            lock!(seen).clone(),
            vec!["GET http://api.test.local/users/7", "PUT http://api.test.local/users/7"]
        );
        let dispositions: Vec<Disposition> =
            report.scenarios.iter().map(|s| s.disposition).collect();
        assert_eq!(
            dispositions,
            vec![
                Disposition::Passed,
                Disposition::Passed,
                Disposition::Passed,
                Disposition::Skipped
            ]
        );
        let fetch = &report.scenarios[0];
        assert_eq!(fetch.results.len(), 3);
        assert_eq!(fetch.results[2].classification(), Classification::OptionalFail);
        assert!(report.passed);
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let manifest = Manifest::from_str(
            r#"
name: Broken
scenarios:
  - title: Orphan
    url: http://localhost/
    wait_for: [Ghost]
"#,
            FileFormat::Yaml,
        )
        .unwrap();
        let result = App::with_transport(manifest, transport(Arc::new(Mutex::new(vec![]))));
        assert!(matches!(
            result,
            Err(ManifestError::UnknownDependency { ref dependency, .. }) if dependency == "Ghost"
        ));
    }

    #[test]
    fn test_invalid_assertion_is_rejected() {
        let manifest = Manifest::from_str(
            r#"
name: Broken
scenarios:
  - title: Range
    url: http://localhost/
    assertions:
      - select: status
        expect:
          between: [1, 2, 3]
"#,
            FileFormat::Yaml,
        )
        .unwrap();
        let result = App::with_transport(manifest, transport(Arc::new(Mutex::new(vec![]))));
        assert!(matches!(result, Err(ManifestError::InvalidAssertion { .. })));
    }
}
