//! Single-target fuzzy matching.
//!
//! A contiguous case-insensitive substring always wins through a fixed
//! bonus. Otherwise the best order-preserving assignment of pattern
//! characters is found by memoized search over `(pattern index, target
//! index)`. Indices are char positions, not byte offsets.

use serde::Serialize;

/// Flat bonus for a contiguous substring match.
pub const SUBSTRING_BONUS: i64 = 200;
/// Per matched character on the substring path.
pub const SUBSTRING_CHAR_BONUS: i64 = 10;
/// Substring starts at index 0.
pub const SUBSTRING_START_BONUS: i64 = 20;
/// Substring starts after a separator or at a camelCase hump.
pub const SUBSTRING_BOUNDARY_BONUS: i64 = 15;
/// Per unmatched character after the substring.
pub const TRAILING_PENALTY: i64 = 1;

/// Base score per matched character on the fuzzy path.
pub const MATCH_SCORE: i64 = 10;
pub const START_BONUS: i64 = 15;
pub const BOUNDARY_BONUS: i64 = 12;
pub const CAMEL_BONUS: i64 = 10;
pub const CONSECUTIVE_BONUS: i64 = 8;
/// Per skipped character between two matches.
pub const GAP_PENALTY: i64 = 1;

const SEPARATORS: &[char] = &['.', '-', '_', ' ', '/', ':'];

/// A successful match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FuzzyMatch {
    pub score: i64,
    /// Matched char positions in the target, ascending
    pub indices: Vec<usize>,
}

/// Match `pattern` against `target`, or `None` when some pattern character
/// cannot be placed in order.
///
/// An empty pattern matches with score 0 and no indices.
pub fn fuzzy_match(pattern: &str, target: &str) -> Option<FuzzyMatch> {
    if pattern.is_empty() {
        return Some(FuzzyMatch {
            score: 0,
            indices: Vec::new(),
        });
    }

    let original: Vec<char> = target.chars().collect();
    let text: Vec<char> = original.iter().map(|c| fold(*c)).collect();
    let needle: Vec<char> = pattern.chars().map(fold).collect();
    if needle.len() > text.len() {
        return None;
    }

    substring_match(&needle, &text, &original).or_else(|| FuzzySearch::new(&needle, &text, &original).run())
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn is_boundary(original: &[char], idx: usize) -> bool {
    idx > 0 && SEPARATORS.contains(&original[idx - 1])
}

fn is_camel(original: &[char], idx: usize) -> bool {
    idx > 0 && original[idx - 1].is_lowercase() && original[idx].is_uppercase()
}

fn substring_match(needle: &[char], text: &[char], original: &[char]) -> Option<FuzzyMatch> {
    let len = needle.len();
    (0..=text.len() - len)
        .filter(|&start| &text[start..start + len] == needle)
        .map(|start| {
            let mut score = SUBSTRING_BONUS + SUBSTRING_CHAR_BONUS * len as i64;
            if start == 0 {
                score += SUBSTRING_START_BONUS;
            } else if is_boundary(original, start) || is_camel(original, start) {
                score += SUBSTRING_BOUNDARY_BONUS;
            }
            score -= TRAILING_PENALTY * (text.len() - start - len) as i64;
            (start, score)
        })
        // Ties keep the earliest occurrence
        .fold(None, |best: Option<(usize, i64)>, cand| match best {
            Some((_, s)) if s >= cand.1 => best,
            _ => Some(cand),
        })
        .map(|(start, score)| FuzzyMatch {
            score,
            indices: (start..start + len).collect(),
        })
}

/// Best score for `needle[pi..]` placed at or after `ti`, with the chosen
/// position for `needle[pi]`.
type Memo = Vec<Option<Option<(i64, usize)>>>;

struct FuzzySearch<'a> {
    needle: &'a [char],
    text: &'a [char],
    original: &'a [char],
    memo: Memo,
}

impl<'a> FuzzySearch<'a> {
    fn new(needle: &'a [char], text: &'a [char], original: &'a [char]) -> Self {
        Self {
            needle,
            text,
            original,
            memo: vec![None; (needle.len() + 1) * (text.len() + 1)],
        }
    }

    fn run(mut self) -> Option<FuzzyMatch> {
        let (score, _) = self.best(0, 0)?;
        let mut indices = Vec::with_capacity(self.needle.len());
        let mut ti = 0;
        for pi in 0..self.needle.len() {
            let (_, j) = self.best(pi, ti)?;
            indices.push(j);
            ti = j + 1;
        }
        Some(FuzzyMatch { score, indices })
    }

    fn char_score(&self, j: usize, consecutive: bool) -> i64 {
        let mut score = MATCH_SCORE;
        if j == 0 {
            score += START_BONUS;
        }
        if is_boundary(self.original, j) {
            score += BOUNDARY_BONUS;
        }
        if is_camel(self.original, j) {
            score += CAMEL_BONUS;
        }
        if consecutive {
            score += CONSECUTIVE_BONUS;
        }
        score
    }

    fn best(&mut self, pi: usize, ti: usize) -> Option<(i64, usize)> {
        if pi == self.needle.len() {
            return Some((0, ti));
        }
        let key = pi * (self.text.len() + 1) + ti;
        if let Some(cached) = self.memo[key] {
            return cached;
        }

        let remaining = self.needle.len() - pi;
        let mut best: Option<(i64, usize)> = None;
        for j in ti..=self.text.len().saturating_sub(remaining) {
            if self.text[j] != self.needle[pi] {
                continue;
            }
            let Some((rest, _)) = self.best(pi + 1, j + 1) else {
                continue;
            };
            let gap = if pi > 0 { (j - ti) as i64 * GAP_PENALTY } else { 0 };
            let score = self.char_score(j, pi > 0 && j == ti) - gap + rest;
            if best.is_none_or(|(s, _)| score > s) {
                best = Some((score, j));
            }
        }

        self.memo[key] = Some(best);
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern() {
        let m = fuzzy_match("", "anything").unwrap();
        assert_eq!(m.score, 0);
        assert!(m.indices.is_empty());
        assert!(fuzzy_match("", "").is_some());
    }

    #[test]
    fn test_substring_path() {
        let m = fuzzy_match("docker", "com.docker.helper").unwrap();
        assert_eq!(m.indices, vec![4, 5, 6, 7, 8, 9]);
        assert!(m.score >= SUBSTRING_BONUS);
        // boundary + per-char - trailing
        assert_eq!(m.score, 200 + 60 + 15 - 7);
    }

    #[test]
    fn test_case_insensitive() {
        let m = fuzzy_match("FINDER", "com.apple.Finder").unwrap();
        assert_eq!(m.indices, vec![10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn test_word_boundary_preference() {
        let boundary = fuzzy_match("ssh", "com.openssh.agent").unwrap();
        let scattered = fuzzy_match("ssh", "flashship").unwrap();
        assert!(boundary.score > scattered.score);
    }

    #[test]
    fn test_start_bonus() {
        let start = fuzzy_match("com", "com.example").unwrap();
        let middle = fuzzy_match("com", "x.com.example").unwrap();
        assert!(start.score > middle.score);
    }

    #[test]
    fn test_fuzzy_path() {
        let m = fuzzy_match("cdh", "com.docker.helper").unwrap();
        // c at start, d and h after separators
        assert_eq!(m.indices, vec![0, 4, 11]);
        assert!(m.score < SUBSTRING_BONUS);
    }

    #[test]
    fn test_fuzzy_prefers_camel_hump_over_first_occurrence() {
        // The first 'a' is at index 1, but "Agent" starts a hump
        let m = fuzzy_match("mag", "mailAgent").unwrap();
        assert_eq!(m.indices, vec![0, 4, 5]);
    }

    #[test]
    fn test_no_order_preserving_match() {
        assert!(fuzzy_match("xyz", "com.example").is_none());
        assert!(fuzzy_match("ba", "ab").is_none());
        assert!(fuzzy_match("longer than target", "short").is_none());
    }

    #[test]
    fn test_unicode_indices_are_chars() {
        let m = fuzzy_match("ü", "grüße").unwrap();
        assert_eq!(m.indices, vec![2]);
    }

    #[test]
    fn test_long_target_is_fast() {
        let target = "ax".repeat(200) + "b";
        let m = fuzzy_match("aaaab", &target).unwrap();
        assert_eq!(m.indices.len(), 5);
        assert_eq!(m.indices.last(), Some(&400));
    }
}
