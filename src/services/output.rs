use crate::domain::models::{ErrorBody, ErrorOut, FixReport, JsonOut, RunReport};
use serde::Serialize;

pub fn print_out<T: Serialize>(
    json: bool,
    data: &[T],
    row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut { ok: true, data })?
        );
    } else {
        for d in data {
            println!("{}", row(d));
        }
    }
    Ok(())
}

pub fn print_one<T: Serialize>(
    json: bool,
    data: T,
    row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut { ok: true, data })?
        );
    } else {
        println!("{}", row(&data));
    }
    Ok(())
}

pub fn print_error(json: bool, code: &str, message: &str) {
    if json {
        let out = ErrorOut {
            ok: false,
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        };
        match serde_json::to_string_pretty(&out) {
            Ok(s) => println!("{s}"),
            Err(_) => println!("{{\"ok\":false}}"),
        }
    } else {
        eprintln!("error [{code}]: {message}");
    }
}

pub fn fix_report_lines(report: &FixReport) -> String {
    let mut lines = vec![format!(
        "{}\t{}\t{}",
        report.fixer,
        report.target,
        report.summary
    )];
    for f in &report.findings {
        lines.push(format!("  {}\t{}\t{}", f.status.as_str(), f.part, f.detail));
    }
    lines.join("\n")
}

pub fn run_report_lines(report: &RunReport) -> String {
    let mut lines = Vec::new();
    for step in &report.steps {
        let outcome = match (&step.report, &step.error) {
            (_, Some(err)) => format!("error: {err}"),
            (Some(r), None) => r.summary.clone(),
            (None, None) => String::new(),
        };
        lines.push(format!(
            "{}\t{}/{}\t{}\t{}",
            step.phase, step.index, step.total, step.fixer, outcome
        ));
    }
    let status = serde_json::to_value(report.status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    lines.push(format!(
        "{}\t{} fixer(s)\t{} error(s)\t{}",
        report.mode, report.total, report.errors, status
    ));
    lines.join("\n")
}
