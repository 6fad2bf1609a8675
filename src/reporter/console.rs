use crate::error::ReportError;
use crate::reporter::SuiteReport;
use crate::scenario::Disposition;
use std::io::Write;

fn mark(disposition: Disposition) -> &'static str {
    match disposition {
        Disposition::Passed => "✔",
        Disposition::Skipped => "»",
        Disposition::Pending | Disposition::Executing => "…",
        _ => "✕",
    }
}

pub fn render(report: &SuiteReport, out: &mut dyn Write) -> Result<(), ReportError> {
    let verdict = if report.passed { "passed" } else { "failed" };
    write!(out, "Suite '{}' {}", report.title, verdict)?;
    if let Some(duration) = report.duration_ms {
        write!(out, " in {} ms", duration)?;
    }
    writeln!(out)?;

    for scenario in &report.scenarios {
        write!(
            out,
            "  {} {} [{}]",
            mark(scenario.disposition),
            scenario.title,
            scenario.disposition
        )?;
        if let Some(reason) = &scenario.reason {
            write!(out, " {}", reason)?;
        }
        if let Some(duration) = scenario.duration_ms {
            write!(out, " ({} ms)", duration)?;
        }
        writeln!(out)?;
        for result in &scenario.results {
            writeln!(out, "      {}", result)?;
        }
    }

    let summary = &report.summary;
    writeln!(
        out,
        "{} scenarios: {} passed, {} failed, {} aborted, {} cancelled, {} skipped, {} optional failures",
        summary.total,
        summary.passed,
        summary.failed,
        summary.aborted,
        summary.cancelled,
        summary.skipped,
        summary.optional_failures
    )?;
    Ok(())
}
