pub mod console;
pub mod csv;
pub mod json;

use crate::assertion::{AssertionResult, Classification};
use crate::error::ReportError;
use crate::scenario::{Disposition, Scenario, Timestamps};
use crate::suite::{Suite, SuiteTimestamps};
use serde_derive::Serialize;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub aborted: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub pending: usize,
    pub optional_failures: usize,
}

impl Summary {
    fn add(&mut self, scenario: &ScenarioReport) {
        self.total += 1;
        match scenario.disposition {
            Disposition::Passed => self.passed += 1,
            Disposition::Failed => self.failed += 1,
            Disposition::Aborted => self.aborted += 1,
            Disposition::Cancelled => self.cancelled += 1,
            Disposition::Skipped => self.skipped += 1,
            Disposition::Pending | Disposition::Executing => self.pending += 1,
        }
        self.optional_failures += scenario
            .results
            .iter()
            .filter(|r| r.classification() == Classification::OptionalFail)
            .count();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub title: String,
    pub disposition: Disposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub timestamps: Timestamps,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    pub results: Vec<AssertionResult>,
}

impl From<&Scenario> for ScenarioReport {
    fn from(scenario: &Scenario) -> Self {
        let request = scenario.request();
        let timestamps = scenario.timestamps();
        Self {
            title: scenario.title().to_owned(),
            disposition: scenario.disposition(),
            reason: scenario.disposition_reason(),
            method: request.method().to_string(),
            url: request
                .url()
                .map(|url| scenario.options().resolve_url(url)),
            duration_ms: timestamps.duration_ms(),
            timestamps,
            results: scenario.results(),
        }
    }
}

/// Snapshot of a suite run, taken once the suite finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteReport {
    pub title: String,
    pub passed: bool,
    pub timestamps: SuiteTimestamps,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    pub summary: Summary,
    pub scenarios: Vec<ScenarioReport>,
}

impl From<&Suite> for SuiteReport {
    fn from(suite: &Suite) -> Self {
        let scenarios: Vec<ScenarioReport> =
            suite.scenarios().iter().map(ScenarioReport::from).collect();
        let mut summary = Summary::default();
        scenarios.iter().for_each(|scenario| summary.add(scenario));
        let timestamps = suite.timestamps();
        let duration_ms = match (timestamps.started, timestamps.finished) {
            (Some(start), Some(finish)) => Some((finish - start).num_milliseconds()),
            _ => None,
        };
        Self {
            title: suite.title().to_owned(),
            passed: suite.has_passed(),
            timestamps,
            duration_ms,
            summary,
            scenarios,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Console,
    Json,
    Csv,
}

impl Format {
    pub fn render(self, report: &SuiteReport, out: &mut dyn Write) -> Result<(), ReportError> {
        match self {
            Format::Console => console::render(report, out),
            Format::Json => json::render(report, out),
            Format::Csv => self::csv::render(report, out),
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "text" => Ok(Format::Console),
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            other => Err(format!("Unknown report format '{}'", other)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Format::Console => f.write_str("console"),
            Format::Json => f.write_str("json"),
            Format::Csv => f.write_str("csv"),
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::assertion::FailureDetail;
    use serde_json::json;

    pub(crate) fn sample_report() -> SuiteReport {
        let passed = ScenarioReport {
            title: "List users".to_owned(),
            disposition: Disposition::Passed,
            reason: None,
            method: "GET".to_owned(),
            url: Some("http://test.local/users".to_owned()),
            timestamps: Timestamps::default(),
            duration_ms: Some(12),
            results: vec![
                AssertionResult::pass("Status is equal to 200"),
                AssertionResult::optional_fail("Slow response", None),
            ],
        };
        let failed = ScenarioReport {
            title: "Create user".to_owned(),
            disposition: Disposition::Failed,
            reason: None,
            method: "POST".to_owned(),
            url: Some("http://test.local/users".to_owned()),
            timestamps: Timestamps::default(),
            duration_ms: Some(20),
            results: vec![AssertionResult::fail(
                "Status is equal to 201, got 500",
                Some(FailureDetail {
                    actual: json!(500),
                    expected: Some(json!(201)),
                    ..FailureDetail::default()
                }),
            )],
        };
        let cancelled = ScenarioReport {
            title: "Delete user".to_owned(),
            disposition: Disposition::Cancelled,
            reason: Some("Not able to execute".to_owned()),
            method: "DELETE".to_owned(),
            url: None,
            timestamps: Timestamps::default(),
            duration_ms: None,
            results: vec![],
        };
        let scenarios = vec![passed, failed, cancelled];
        let mut summary = Summary::default();
        scenarios.iter().for_each(|scenario| summary.add(scenario));
        SuiteReport {
            title: "Users".to_owned(),
            passed: false,
            timestamps: SuiteTimestamps::default(),
            duration_ms: Some(40),
            summary,
            scenarios,
        }
    }

    #[test]
    fn test_summary_counts_dispositions() {
        let report = sample_report();
        assert_eq!(
            report.summary,
            Summary {
                total: 3,
                passed: 1,
                failed: 1,
                cancelled: 1,
                optional_failures: 1,
                ..Summary::default()
            }
        );
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<Format>(), Ok(Format::Json));
        assert_eq!("console".parse::<Format>(), Ok(Format::Console));
        assert!("html".parse::<Format>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_from_finished_suite() {
        use crate::configuration::options::ExecutionOptions;
        use crate::connection::{Request, Response, Transport};
        use crate::error::TransportError;
        use std::sync::Arc;

        let transport: Arc<dyn Transport> =
            Arc::new(|_request: Request| async { Ok::<_, TransportError>(Response::mock(200, "{}")) });
        let suite = Suite::with_transport(
            "Reported",
            ExecutionOptions::default().with_base_url("http://test.local"),
            transport,
        );
        suite
            .scenario("ping")
            .unwrap()
            .open(Request::get("/ping"))
            .unwrap()
            .next(|context| async move {
                let status = context.response().map(Response::status).unwrap_or_default();
                context.assert_named("Status", status).equals(200)?;
                Ok(())
            })
            .unwrap();
        suite.execute().await;

        let report = suite.report();
        assert!(report.passed);
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.scenarios[0].url.as_deref(), Some("http://test.local/ping"));
        assert_eq!(report.scenarios[0].results.len(), 1);
        assert!(report.duration_ms.is_some());
    }
}
