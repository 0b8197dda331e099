//! Parser for `launchctl print-disabled <domain>` output.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static OVERRIDE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"([^"]+)"\s*=>\s*([A-Za-z]+)"#).expect("valid override regex")
});

/// Collect labels whose override marks them disabled.
///
/// Newer releases print `disabled`/`enabled`; older ones print `true`
/// (disabled) and `false`.
pub fn parse_disabled(output: &str) -> HashSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let caps = OVERRIDE_ROW.captures(line.trim())?;
            let label = caps.get(1)?.as_str();
            let value = caps.get(2)?.as_str().to_lowercase();
            matches!(value.as_str(), "disabled" | "true").then(|| label.to_string())
        })
        .collect()
}
