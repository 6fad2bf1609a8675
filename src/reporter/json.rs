use crate::error::ReportError;
use crate::reporter::SuiteReport;
use std::io::Write;

pub fn render(report: &SuiteReport, out: &mut dyn Write) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::render;
    use crate::reporter::test::sample_report;
    use serde_json::Value;

    #[test]
    fn test_json_report_uses_camel_case() {
        let mut out = vec![];
        render(&sample_report(), &mut out).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["summary"]["optionalFailures"], 1);
        assert_eq!(value["scenarios"][1]["disposition"], "failed");
        assert_eq!(value["scenarios"][1]["results"][0]["classification"], "fail");
        assert_eq!(value["scenarios"][1]["results"][0]["detail"]["expected"], 201);
        assert_eq!(value["scenarios"][2]["reason"], "Not able to execute");
        assert!(value["scenarios"][2].get("url").is_none());
    }
}
