//! Transient-error classification and retry notifications.
//!
//! Whether a failed command is worth retrying is decided from its stderr
//! text and exit code against [`TRANSIENT_PATTERNS`]. New OS quirks are
//! added as table rows.

/// Why a failure was considered transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientReason {
    /// The command or the daemon timed out
    Timeout,
    /// A resource was busy or temporarily unavailable
    Busy,
    /// launchd could not be reached
    DaemonUnreachable,
}

/// Ordered `(lowercase substring, reason)` pairs; first match wins.
pub const TRANSIENT_PATTERNS: &[(&str, TransientReason)] = &[
    ("timed out", TransientReason::Timeout),
    ("timeout", TransientReason::Timeout),
    ("resource busy", TransientReason::Busy),
    ("resource temporarily unavailable", TransientReason::Busy),
    ("try again", TransientReason::Busy),
    ("could not contact", TransientReason::DaemonUnreachable),
    ("couldn't contact", TransientReason::DaemonUnreachable),
    ("failed to contact", TransientReason::DaemonUnreachable),
    ("connection interrupted", TransientReason::DaemonUnreachable),
];

/// EAGAIN on Darwin.
const EXIT_EAGAIN: i32 = 35;
/// EBUSY.
const EXIT_EBUSY: i32 = 16;

/// Classify a failure as transient, or `None` when it is permanent.
pub fn classify_transient(stderr: &str, exit_code: i32) -> Option<TransientReason> {
    let lower = stderr.to_lowercase();
    if let Some((_, reason)) = TRANSIENT_PATTERNS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
    {
        return Some(*reason);
    }
    match exit_code {
        EXIT_EAGAIN | EXIT_EBUSY => Some(TransientReason::Busy),
        _ => None,
    }
}

/// Whether a failure should be retried.
pub fn is_transient(stderr: &str, exit_code: i32) -> bool {
    classify_transient(stderr, exit_code).is_some()
}

/// Callback trait for retry progress notifications.
pub trait RetryCallback: Send + Sync {
    /// Called when an operation is being retried.
    ///
    /// # Arguments
    /// * `attempt` - Attempt that just failed (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - Text of the failure that triggered the retry
    /// * `delay_ms` - Milliseconds until next attempt
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &str, delay_ms: u64);
}

/// No-op callback that does nothing.
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&self, _attempt: u32, _max_attempts: u32, _error: &str, _delay_ms: u64) {}
}

/// Callback that reports retries through the logger.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &str, delay_ms: u64) {
        log::warn!(
            "Attempt {}/{} failed: {}. Retrying in {}ms...",
            attempt,
            max_attempts,
            error,
            delay_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_pattern_is_transient() {
        for (pattern, reason) in TRANSIENT_PATTERNS {
            let stderr = format!("launchctl: {}", pattern.to_uppercase());
            assert_eq!(classify_transient(&stderr, 1), Some(*reason), "{pattern}");
        }
    }

    #[test]
    fn test_examples() {
        assert_eq!(
            classify_transient("Operation timed out", 1),
            Some(TransientReason::Timeout)
        );
        assert_eq!(
            classify_transient("Could not contact launchd: Connection interrupted", 5),
            Some(TransientReason::DaemonUnreachable)
        );
        assert_eq!(
            classify_transient("Resource busy", 1),
            Some(TransientReason::Busy)
        );
    }

    #[test]
    fn test_exit_codes() {
        assert!(is_transient("", EXIT_EAGAIN));
        assert!(is_transient("", EXIT_EBUSY));
        assert!(!is_transient("", 1));
    }

    #[test]
    fn test_permanent_failures() {
        assert!(!is_transient("Could not find service \"x\" in domain", 113));
        assert!(!is_transient("Operation not permitted", 1));
        assert!(!is_transient("Boot-out failed: 5: Input/output error", 5));
    }
}
