//! Parser for `systemextensionsctl list` output.
//!
//! ```text
//! 2 extension(s)
//! --- com.apple.system_extension.network_extension
//! enabled  active  teamID      bundleID (version)            name         [state]
//! *        *       ABCDE12345  com.example.vpn (1.4.2/142)   Example VPN  [activated enabled]
//! ```

use super::is_safe_label;
use crate::types::{ExtensionRecord, ServiceStatus};
use regex::Regex;
use std::sync::LazyLock;

static SUMMARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s+extension\(s\)").expect("valid summary regex"));

static BUNDLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9._-]+)\s*(?:[\(\[]([^\)\]]*)[\)\]])?$").expect("valid bundle regex")
});

/// Parse the listing and deduplicate bundles across categories.
pub fn parse_extensions(output: &str) -> Vec<ExtensionRecord> {
    let mut category: Option<String> = None;
    let mut rows = Vec::new();

    for raw in output.lines() {
        let line = raw.trim_end();
        let trimmed = line.trim();
        if trimmed.is_empty() || SUMMARY.is_match(trimmed) || is_header(trimmed) {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("---") {
            let name = rest.trim();
            category = (!name.is_empty()).then(|| name.to_string());
            continue;
        }

        let parsed = if line.contains('\t') {
            parse_tab_row(line)
        } else {
            parse_whitespace_row(trimmed)
        };
        if let Some(mut record) = parsed {
            if let Some(c) = &category {
                record.categories.push(c.clone());
            }
            rows.push(record);
        }
    }

    merge_most_active(rows)
}

/// Dedup policy for extensions: one record per bundle id, keeping the most
/// active status observed and the union of categories.
pub fn merge_most_active(records: Vec<ExtensionRecord>) -> Vec<ExtensionRecord> {
    let mut merged: Vec<ExtensionRecord> = Vec::new();

    for record in records {
        match merged.iter_mut().find(|m| m.bundle_id == record.bundle_id) {
            Some(existing) => {
                let mut categories = std::mem::take(&mut existing.categories);
                for c in &record.categories {
                    if !categories.contains(c) {
                        categories.push(c.clone());
                    }
                }
                if record.status.activity_rank() > existing.status.activity_rank() {
                    *existing = record;
                }
                existing.categories = categories;
            }
            None => merged.push(record),
        }
    }

    merged
}

fn is_header(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("bundleid") && lower.contains("teamid")
}

fn parse_tab_row(line: &str) -> Option<ExtensionRecord> {
    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
    if fields.len() < 4 {
        return None;
    }
    let (bundle_id, version) = parse_bundle(fields[3])?;
    let state = fields.get(5).and_then(|s| strip_state(s));
    Some(build_record(
        fields[0] == "*",
        fields[1] == "*",
        fields[2],
        bundle_id,
        version,
        fields.get(4).copied(),
        state,
    ))
}

fn parse_whitespace_row(line: &str) -> Option<ExtensionRecord> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let stars = tokens.iter().take(2).take_while(|t| **t == "*").count();
    let rest = &tokens[stars..];
    if rest.len() < 2 {
        return None;
    }

    let team = rest[0];
    // The version may be glued to the bundle id or be its own token
    let (bundle_token, mut idx) = match rest.get(2) {
        Some(v) if v.starts_with('(') => (format!("{} {}", rest[1], v), 3),
        _ => (rest[1].to_string(), 2),
    };
    let (bundle_id, version) = parse_bundle(&bundle_token)?;

    let mut name_parts = Vec::new();
    while idx < rest.len() && !rest[idx].starts_with('[') {
        name_parts.push(rest[idx]);
        idx += 1;
    }
    let state_text = rest[idx..].join(" ");
    let name = name_parts.join(" ");

    Some(build_record(
        stars >= 1,
        stars >= 2,
        team,
        bundle_id,
        version,
        (!name.is_empty()).then_some(name.as_str()),
        strip_state(&state_text),
    ))
}

fn parse_bundle(field: &str) -> Option<(String, Option<String>)> {
    let caps = BUNDLE.captures(field.trim())?;
    let bundle_id = caps.get(1)?.as_str();
    if !is_safe_label(bundle_id) {
        return None;
    }
    let version = caps
        .get(2)
        .map(|v| v.as_str().trim().to_string())
        .filter(|v| !v.is_empty());
    Some((bundle_id.to_string(), version))
}

fn strip_state(raw: &str) -> Option<String> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']').trim();
    (!inner.is_empty()).then(|| inner.to_string())
}

fn build_record(
    enabled: bool,
    active: bool,
    team: &str,
    bundle_id: String,
    version: Option<String>,
    name: Option<&str>,
    state: Option<String>,
) -> ExtensionRecord {
    let status = extension_status(enabled, active, state.as_deref());
    let team = team.trim();
    ExtensionRecord {
        bundle_id,
        team_id: (!team.is_empty() && team != "-").then(|| team.to_string()),
        version,
        name: name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
        enabled,
        active,
        state,
        status,
        categories: Vec::new(),
    }
}

fn extension_status(enabled: bool, active: bool, state: Option<&str>) -> ServiceStatus {
    let state = state.map(str::to_lowercase).unwrap_or_default();
    if state.contains("fail") || state.contains("error") || state.contains("invalid") {
        return ServiceStatus::Error;
    }
    if state.contains("terminated") || state.contains("uninstall") {
        return ServiceStatus::Disabled;
    }
    match (enabled, active) {
        (true, true) => ServiceStatus::Running,
        (true, false) => ServiceStatus::Stopped,
        (false, _) if state.is_empty() => ServiceStatus::Unknown,
        (false, _) => ServiceStatus::Disabled,
    }
}
