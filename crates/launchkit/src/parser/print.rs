//! Parser for detailed service blocks (`launchctl print` and the legacy
//! `launchctl list <label>` dictionary).
//!
//! Three line grammars are accepted at the service's own level:
//!
//! - `key = value`
//! - `key: value`
//! - `"Key" = "Value";` (legacy)
//!
//! Nested blocks (`= {` / `= (`) are skipped entirely. A wrapper block on
//! the first line (a `gui/501/com.example = {` target header or a bare `{`)
//! is the service itself and is parsed. Any other opening line is nested.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// `gui/501/com.example.agent = {` style header naming the print target.
static TARGET_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]+(?:/[^\s/=]+)+\s*=\s*\{$").expect("valid target header regex")
});

static LEGACY_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"([^"]+)"\s*=\s*(.*?)\s*;?\s*$"#).expect("valid legacy regex")
});

/// Known spellings collapsed to one canonical key, indexed by the key with
/// case and separators removed.
const SYNONYMS: &[(&str, &str)] = &[
    ("pid", "pid"),
    ("processid", "pid"),
    ("processidentifier", "pid"),
    ("lastexitcode", "last_exit_code"),
    ("lastexitstatus", "last_exit_status"),
    ("lastexitreason", "last_exit_reason"),
    ("status", "state"),
    ("state", "state"),
    ("label", "label"),
    ("path", "path"),
    ("plistpath", "path"),
    ("program", "program"),
    ("programpath", "program"),
    ("programarguments", "arguments"),
    ("arguments", "arguments"),
    ("domain", "domain"),
    ("type", "type"),
    ("servicetype", "type"),
    ("activecount", "active_count"),
    ("bundleid", "bundle_id"),
    ("bundleidentifier", "bundle_id"),
    ("teamid", "team_id"),
    ("teamidentifier", "team_id"),
];

/// Parse a detail block into a flat map of normalized keys.
///
/// Malformed or empty input yields an empty map.
pub fn parse_print(output: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();

    // The outermost wrapper, if present, is the service block itself
    let base = match lines.peek() {
        Some(first) if is_wrapper(first) => {
            lines.next();
            1
        }
        _ => 0,
    };
    let mut depth: usize = base;

    for line in lines {
        if depth > base {
            if is_opener(line) {
                depth += 1;
            } else if is_closer(line) {
                depth -= 1;
            }
            continue;
        }

        if is_closer(line) {
            depth = depth.saturating_sub(1);
            continue;
        }
        if is_opener(line) {
            depth += 1;
            continue;
        }
        if is_inline_block(line) {
            continue;
        }

        if let Some((key, value)) = parse_pair(line) {
            first_occurrence_wins(&mut map, normalize_key(&key), value);
        }
    }

    map
}

/// Dedup policy for detail keys: the first value seen for a key is kept.
///
/// Returns whether the value was inserted.
pub fn first_occurrence_wins(
    map: &mut BTreeMap<String, String>,
    key: String,
    value: String,
) -> bool {
    if map.contains_key(&key) {
        return false;
    }
    map.insert(key, value);
    true
}

/// Normalize a key: case and separator insensitive, synonyms collapsed,
/// otherwise snake_case of the raw key.
pub fn normalize_key(raw: &str) -> String {
    let snake = to_snake_case(raw);
    let compact: String = snake.chars().filter(|c| *c != '_').collect();
    SYNONYMS
        .iter()
        .find(|(spelling, _)| *spelling == compact)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(snake)
}

fn to_snake_case(raw: &str) -> String {
    let chars: Vec<char> = raw.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_lower);
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }

    out.trim_end_matches('_').to_string()
}

fn is_wrapper(line: &str) -> bool {
    line == "{" || TARGET_HEADER.is_match(line)
}

fn is_opener(line: &str) -> bool {
    line.ends_with('{') || line.ends_with('(')
}

fn is_closer(line: &str) -> bool {
    line.starts_with('}') || line.starts_with(')')
}

fn is_inline_block(line: &str) -> bool {
    line.contains('{') && line.ends_with('}')
}

fn parse_pair(line: &str) -> Option<(String, String)> {
    if let Some(caps) = LEGACY_PAIR.captures(line) {
        let key = caps.get(1)?.as_str().trim();
        let value = clean_value(caps.get(2)?.as_str());
        return (!key.is_empty()).then(|| (key.to_string(), value));
    }

    // Whichever separator comes first splits the line
    let eq = line.find('=');
    let colon = line.find(':');
    let (idx, sep_len) = match (eq, colon) {
        (Some(e), Some(c)) if c < e => (c, 1),
        (Some(e), _) => (e, if line[e..].starts_with("=>") { 2 } else { 1 }),
        (None, Some(c)) => (c, 1),
        (None, None) => return None,
    };

    let key = line[..idx].trim();
    if key.is_empty() || key.contains('"') {
        return None;
    }
    let value = clean_value(&line[idx + sep_len..]);
    Some((key.to_string(), value))
}

fn clean_value(raw: &str) -> String {
    let value = raw.trim().trim_end_matches(';').trim();
    let unquoted = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    unquoted.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key_synonyms() {
        assert_eq!(normalize_key("last exit status"), "last_exit_status");
        assert_eq!(normalize_key("lastExitStatus"), "last_exit_status");
        assert_eq!(normalize_key("LastExitStatus"), "last_exit_status");
        assert_eq!(normalize_key("last exit code"), "last_exit_code");
        assert_eq!(normalize_key("PID"), "pid");
        assert_eq!(normalize_key("process id"), "pid");
        assert_eq!(normalize_key("process-id"), "pid");
        assert_eq!(normalize_key("status"), "state");
        assert_eq!(normalize_key("ProgramArguments"), "arguments");
    }

    #[test]
    fn test_normalize_key_fallback_snake_case() {
        assert_eq!(normalize_key("active count"), "active_count");
        assert_eq!(normalize_key("LimitLoadToSessionType"), "limit_load_to_session_type");
        assert_eq!(normalize_key("XPCServiceName"), "xpc_service_name");
        assert_eq!(normalize_key("spawn type"), "spawn_type");
        assert_eq!(normalize_key("exec.context"), "exec_context");
        assert_eq!(normalize_key("  Trailing--Dashes-- "), "trailing_dashes");
    }

    #[test]
    fn test_parse_modern_print() {
        let output = "gui/501/com.example.agent = {\n\
                      \tactive count = 1\n\
                      \tpath = /Users/me/Library/LaunchAgents/com.example.agent.plist\n\
                      \ttype = LaunchAgent\n\
                      \tstate = running\n\
                      \tprogram = /usr/local/bin/agent\n\
                      \targuments = {\n\
                      \t\t/usr/local/bin/agent\n\
                      \t\t--serve\n\
                      \t}\n\
                      \tdomain = gui/501 [100005]\n\
                      \tpid = 4242\n\
                      \tlast exit code = (never exited)\n\
                      }\n";
        let map = parse_print(output);
        assert_eq!(map.get("active_count").map(String::as_str), Some("1"));
        assert_eq!(map.get("type").map(String::as_str), Some("LaunchAgent"));
        assert_eq!(map.get("state").map(String::as_str), Some("running"));
        assert_eq!(map.get("pid").map(String::as_str), Some("4242"));
        assert_eq!(
            map.get("last_exit_code").map(String::as_str),
            Some("(never exited)")
        );
        assert_eq!(map.get("domain").map(String::as_str), Some("gui/501 [100005]"));
        // Nested block contents never leak into the map
        assert!(!map.contains_key("arguments"));
        assert!(!map.values().any(|v| v == "--serve"));
    }

    #[test]
    fn test_nested_blocks_skipped_at_any_depth() {
        let output = "system/com.example.daemon = {\n\
                      \tpid = 1\n\
                      \tendpoints = {\n\
                      \t\t\"com.example.xpc\" = {\n\
                      \t\t\tport = 0x1234\n\
                      \t\t\tpid = 999\n\
                      \t\t}\n\
                      \t\tstate: inner\n\
                      \t}\n\
                      \tstate = waiting\n\
                      }\n";
        let map = parse_print(output);
        assert_eq!(map.get("pid").map(String::as_str), Some("1"));
        assert_eq!(map.get("state").map(String::as_str), Some("waiting"));
        assert!(!map.contains_key("port"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_leading_nested_block_without_wrapper() {
        let map = parse_print("endpoints = {\n\"com.x.port\" = 1\n}\npid = 5\n");
        assert_eq!(map.get("pid").map(String::as_str), Some("5"));
        assert!(!map.contains_key("com_x_port"));
        assert_eq!(map.len(), 1);

        let map = parse_print("arguments = (\n\t--flag\n)\nstate = running\n");
        assert_eq!(map.get("state").map(String::as_str), Some("running"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_wrapper_detection() {
        assert!(is_wrapper("{"));
        assert!(is_wrapper("gui/501/com.example.agent = {"));
        assert!(is_wrapper("system/com.example.daemon = {"));
        assert!(!is_wrapper("endpoints = {"));
        assert!(!is_wrapper("\"com.example.xpc\" = {"));
        assert!(!is_wrapper("arguments = ("));
    }

    #[test]
    fn test_parse_legacy_dictionary() {
        let output = "{\n\
                      \t\"LimitLoadToSessionType\" = \"Aqua\";\n\
                      \t\"Label\" = \"com.example.legacy\";\n\
                      \t\"OnDemand\" = true;\n\
                      \t\"LastExitStatus\" = 0;\n\
                      \t\"PID\" = 321;\n\
                      \t\"Program\" = \"/usr/bin/legacy\";\n\
                      \t\"ProgramArguments\" = (\n\
                      \t\t\"/usr/bin/legacy\";\n\
                      \t\t\"-x\";\n\
                      \t);\n\
                      };\n";
        let map = parse_print(output);
        assert_eq!(map.get("label").map(String::as_str), Some("com.example.legacy"));
        assert_eq!(map.get("pid").map(String::as_str), Some("321"));
        assert_eq!(map.get("last_exit_status").map(String::as_str), Some("0"));
        assert_eq!(map.get("program").map(String::as_str), Some("/usr/bin/legacy"));
        assert_eq!(map.get("on_demand").map(String::as_str), Some("true"));
        assert_eq!(
            map.get("limit_load_to_session_type").map(String::as_str),
            Some("Aqua")
        );
        assert!(!map.contains_key("arguments"));
    }

    #[test]
    fn test_colon_grammar_without_wrapper() {
        let output = "Label: com.example.colon\nStatus: running\nProcess ID: 77\n";
        let map = parse_print(output);
        assert_eq!(map.get("label").map(String::as_str), Some("com.example.colon"));
        assert_eq!(map.get("state").map(String::as_str), Some("running"));
        assert_eq!(map.get("pid").map(String::as_str), Some("77"));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let output = "pid = 10\nPID = 20\nprocess-id: 30\nstatus = running\nstate = exited\n";
        let map = parse_print(output);
        assert_eq!(map.get("pid").map(String::as_str), Some("10"));
        assert_eq!(map.get("state").map(String::as_str), Some("running"));

        let mut direct = BTreeMap::new();
        assert!(first_occurrence_wins(&mut direct, "k".into(), "a".into()));
        assert!(!first_occurrence_wins(&mut direct, "k".into(), "b".into()));
        assert_eq!(direct["k"], "a");
    }

    #[test]
    fn test_separator_precedence() {
        let map = parse_print("path = /tmp/a:b\nwhen: 10=ten\n");
        assert_eq!(map.get("path").map(String::as_str), Some("/tmp/a:b"));
        assert_eq!(map.get("when").map(String::as_str), Some("10=ten"));
    }

    #[test]
    fn test_malformed_input_yields_empty_map() {
        assert!(parse_print("").is_empty());
        assert!(parse_print("\n\n").is_empty());
        assert!(parse_print("just some words\nno separators here\n").is_empty());
        assert!(parse_print("= orphan value\n: another\n").is_empty());

        // Unterminated nested block swallows the rest
        let map = parse_print("state = ok\nbroken = {\npid = 3\n");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("state").map(String::as_str), Some("ok"));
        assert!(parse_print("inline = { a = b }\n").is_empty());
    }
}
