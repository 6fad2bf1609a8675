use crate::error::ReportError;
use crate::reporter::SuiteReport;
use serde_derive::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct Row<'a> {
    suite: &'a str,
    scenario: &'a str,
    disposition: String,
    reason: &'a str,
    classification: String,
    message: &'a str,
    actual: String,
    expected: String,
    timestamp: String,
}

/// One row per result. Scenarios without results still get a row so cancellations show up.
pub fn render(report: &SuiteReport, out: &mut dyn Write) -> Result<(), ReportError> {
    let mut writer = ::csv::Writer::from_writer(out);
    for scenario in &report.scenarios {
        let disposition = scenario.disposition.to_string();
        let reason = scenario.reason.as_deref().unwrap_or_default();
        if scenario.results.is_empty() {
            writer.serialize(Row {
                suite: &report.title,
                scenario: &scenario.title,
                disposition: disposition.clone(),
                reason,
                classification: String::new(),
                message: "",
                actual: String::new(),
                expected: String::new(),
                timestamp: String::new(),
            })?;
            continue;
        }
        for result in &scenario.results {
            let detail = result.detail();
            writer.serialize(Row {
                suite: &report.title,
                scenario: &scenario.title,
                disposition: disposition.clone(),
                reason,
                classification: result.classification().to_string(),
                message: result.message(),
                actual: detail.map(|d| d.actual.to_string()).unwrap_or_default(),
                expected: detail
                    .and_then(|d| d.expected.as_ref())
                    .map(|e| e.to_string())
                    .unwrap_or_default(),
                timestamp: result.timestamp().to_rfc3339(),
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}
