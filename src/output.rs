use std::io::{self, Write};

use serde::Serialize;

use crate::command::Invocation;
use crate::results::ResultsReport;

pub struct ReportOutput;

impl ReportOutput {
    pub fn print_failed(report: &ResultsReport) -> io::Result<()> {
        Self::write_failed(&mut io::stdout().lock(), report)
    }

    pub fn write_failed<W: Write>(out: &mut W, report: &ResultsReport) -> io::Result<()> {
        if report.failed.is_empty() {
            return Ok(());
        }
        writeln!(out, "Failed DBS:")?;
        for accession in &report.failed {
            writeln!(out, "{accession}")?;
        }
        Ok(())
    }

    pub fn print_plan(invocations: &[Invocation]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        for invocation in invocations {
            writeln!(stdout, "# {}", invocation.kind)?;
            writeln!(stdout, "{}", invocation.command_line())?;
        }
        Ok(())
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
