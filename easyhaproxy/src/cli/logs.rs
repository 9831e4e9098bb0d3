use anyhow::Result;
use serde_json::{Map, Value};
use std::io::{self, BufRead};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Pretty,
    Raw,
}

/// Formats the driver's JSON log stream from stdin.
pub fn run_logs(mode: LogMode) -> Result<()> {
    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        println!("{}", format_line(&line, mode));
    }

    Ok(())
}

/// One output line; non-JSON input passes through.
pub fn format_line(line: &str, mode: LogMode) -> String {
    if mode == LogMode::Raw {
        return line.to_string();
    }

    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(event)) => format_event(&event),
        _ => line.to_string(),
    }
}

fn format_event(event: &Map<String, Value>) -> String {
    let level = event.get("level").and_then(Value::as_str).unwrap_or("INFO");
    let target = event.get("target").and_then(Value::as_str).unwrap_or("");
    let message = event
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("<no message>");

    let mut out = if target.is_empty() {
        format!("[{level}] {message}")
    } else {
        format!("[{level}] {target}: {message}")
    };

    for (key, value) in event {
        if matches!(key.as_str(), "level" | "target" | "message" | "timestamp") {
            continue;
        }
        match value {
            Value::String(s) => out.push_str(&format!(" {key}={s}")),
            other => out.push_str(&format!(" {key}={other}")),
        }
    }

    out
}
