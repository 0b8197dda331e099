//! Parser for `launchctl list` rows (`PID  Status  Label`).

use super::{is_safe_label, parse_number};
use crate::types::ListEntry;
use regex::Regex;
use std::sync::LazyLock;

/// Rows start with `-` or a number followed by whitespace.
static DATA_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:-|\d+|0[xX][0-9a-fA-F]+)\s").expect("valid row regex"));

/// Prefixes of diagnostic lines launchctl interleaves with data.
const ERROR_PREFIXES: &[&str] = &[
    "could not",
    "couldn't",
    "error:",
    "error ",
    "permission denied",
    "warning:",
    "unable to",
    "launchctl:",
    "operation not permitted",
];

/// Parse list output into entries, in input order.
///
/// Empty or header-only input yields an empty list.
pub fn parse_list(output: &str) -> Vec<ListEntry> {
    output.lines().filter_map(parse_line).collect()
}

fn parse_line(raw: &str) -> Option<ListEntry> {
    let line = raw.trim();
    if line.is_empty() || is_header(line) || is_error_line(line) {
        return None;
    }

    let entry = split_tabs(line).or_else(|| split_whitespace(line))?;
    if !is_safe_label(&entry.label) {
        log::debug!("Discarding list row with unsafe label: {line:?}");
        return None;
    }
    Some(entry)
}

fn is_header(line: &str) -> bool {
    if DATA_ROW.is_match(line) {
        return false;
    }
    let lower = line.to_lowercase();
    lower.contains("pid") && (lower.contains("status") || lower.contains("label"))
}

fn is_error_line(line: &str) -> bool {
    // A data row wins even if its label contains an error word
    if DATA_ROW.is_match(line) {
        return false;
    }
    let lower = line.to_lowercase();
    ERROR_PREFIXES.iter().any(|p| lower.starts_with(p))
}

fn split_tabs(line: &str) -> Option<ListEntry> {
    // Runs of tabs count as one separator
    let fields: Vec<&str> = line
        .split('\t')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    if fields.len() < 3 {
        return None;
    }
    build_entry(fields[0], fields[1], fields[2])
}

fn split_whitespace(line: &str) -> Option<ListEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return None;
    }
    build_entry(fields[0], fields[1], fields[2])
}

fn build_entry(pid: &str, status: &str, label: &str) -> Option<ListEntry> {
    let pid = parse_number(pid).ok()?;
    let exit_status = parse_number(status).ok()?;
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    Some(ListEntry {
        pid: pid.and_then(|p| u32::try_from(p).ok()),
        exit_status: exit_status.and_then(|s| i32::try_from(s).ok()),
        label: label.to_string(),
    })
}
