use colored::{ColoredString, Colorize};
use launchkit::{Protection, ServiceStatus};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Service Formatting
// ============================================================================

pub fn status(status: ServiceStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        ServiceStatus::Running => text.green(),
        ServiceStatus::Stopped => text.normal(),
        ServiceStatus::Error => text.red().bold(),
        ServiceStatus::Disabled => text.dimmed(),
        ServiceStatus::Unknown => text.yellow(),
    }
}

/// Short marker for protected services, empty otherwise.
pub fn protection_marker(protection: Protection) -> ColoredString {
    match protection {
        Protection::Normal => "".normal(),
        Protection::SystemOwned => "system".blue(),
        Protection::SipProtected => "sip".magenta(),
        Protection::Immutable => "immutable".red(),
    }
}

/// Bold the characters at `indices` (char positions).
pub fn highlight(text: &str, indices: &[usize]) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        if indices.binary_search(&i).is_ok() {
            out.push_str(&c.to_string().yellow().bold().to_string());
        } else {
            out.push(c);
        }
    }
    out
}

/// Truncate to `max_len` chars, ending with an ellipsis.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = text.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

// ============================================================================
// Tests
// ============================================================================
