//! Match Engine
//!
//! Literal substring matching and replace-all over video descriptions.
//! Matching is non-overlapping; substitution preserves every non-matched
//! byte. Case-insensitive mode folds ASCII only, so multi-byte sequences
//! must match exactly.

use crate::error::EngineError;
use crate::youtube::client::VideoRecord;

/// A proposed change for one video. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub video_id: String,
    pub title: String,
    pub original_description: String,
    pub proposed_description: String,
    /// Non-overlapping occurrences of the pattern, always >= 1
    pub match_count: usize,
}

/// Byte offsets of non-overlapping pattern occurrences.
///
/// Every returned offset is a char boundary: a hit either starts with an
/// ASCII byte or matches the pattern's lead byte exactly.
fn occurrences(text: &str, pattern: &str, case_sensitive: bool) -> Vec<usize> {
    let hay = text.as_bytes();
    let pat = pattern.as_bytes();
    let mut starts = Vec::new();

    if pat.is_empty() || pat.len() > hay.len() {
        return starts;
    }

    let mut i = 0;
    while i + pat.len() <= hay.len() {
        let window = &hay[i..i + pat.len()];
        let hit = if case_sensitive {
            window == pat
        } else {
            window.eq_ignore_ascii_case(pat)
        };

        if hit {
            starts.push(i);
            i += pat.len();
        } else {
            i += 1;
        }
    }

    starts
}

/// Replace all non-overlapping occurrences of `pattern` with `replacement`.
/// Returns the new text and the number of occurrences replaced.
pub fn replace_all(
    text: &str,
    pattern: &str,
    replacement: &str,
    case_sensitive: bool,
) -> (String, usize) {
    let starts = occurrences(text, pattern, case_sensitive);
    if starts.is_empty() {
        return (text.to_string(), 0);
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for &start in &starts {
        out.push_str(&text[last..start]);
        out.push_str(replacement);
        last = start + pattern.len();
    }
    out.push_str(&text[last..]);

    (out, starts.len())
}

/// Find every video whose description contains the pattern, paired with the
/// substituted text.
///
/// A match where the proposed text equals the original (replacement equals
/// the matched text) is still reported; callers may skip applying no-ops.
/// Results are per-record independent and deterministic.
pub fn find_matches(
    videos: &[VideoRecord],
    pattern: &str,
    replacement: &str,
    case_sensitive: bool,
) -> Result<Vec<MatchResult>, EngineError> {
    if pattern.is_empty() {
        return Err(EngineError::InvalidPattern);
    }

    let matches: Vec<MatchResult> = videos
        .iter()
        .filter_map(|video| {
            let (proposed, count) =
                replace_all(&video.description, pattern, replacement, case_sensitive);
            if count == 0 {
                return None;
            }
            Some(MatchResult {
                video_id: video.id.clone(),
                title: video.title.clone(),
                original_description: video.description.clone(),
                proposed_description: proposed,
                match_count: count,
            })
        })
        .collect();

    tracing::debug!(
        matched = matches.len(),
        scanned = videos.len(),
        "pattern scan complete"
    );

    Ok(matches)
}
