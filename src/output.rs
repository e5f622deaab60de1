use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::report::{MirrorReport, Outcome};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &MirrorReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Per-entry progress lines on stderr.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("[{:>7.2}s] {}", elapsed.as_secs_f64(), event.message),
            None => eprintln!("{}", event.message),
        }
    }
}

pub fn print_summary(report: &MirrorReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}filestore mirror summary ({}){reset}", report.root);
    println!("{green}downloaded: {}{reset}", report.downloaded);
    println!("{yellow}skipped:    {}{reset}", report.skipped);
    if report.planned > 0 {
        println!("{cyan}planned:    {}{reset}", report.planned);
    }
    println!("{red}failed:     {}{reset}", report.failed);

    for entry in report.failures() {
        if let Outcome::Failed {
            kind,
            message,
            correlation_id,
            ..
        } = &entry.outcome
        {
            println!("{red}  x {} [{kind}] -> {}{reset}", entry.identifier, entry.destination);
            println!("{red}      {message}{reset}");
            if let Some(id) = correlation_id {
                println!("{red}      correlation id: {id}{reset}");
            }
        }
    }

    if !report.not_attempted.is_empty() {
        println!(
            "{yellow}not attempted after abort: {}{reset}",
            report.not_attempted.len()
        );
    }
}
