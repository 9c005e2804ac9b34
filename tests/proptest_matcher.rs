//! Property-based tests for the match engine using proptest
//!
//! The pattern alphabet (lowercase) and filler alphabet (digits/space) are
//! disjoint even under ASCII case folding, so occurrence counts can be
//! computed by construction and joining fillers can never fabricate a match.

use proptest::prelude::*;
use serde_json::json;

use ytbulk::engine::matcher::{find_matches, replace_all, MatchResult};
use ytbulk::youtube::client::VideoRecord;

/// Filler text guaranteed not to contain any lowercase pattern
fn arb_filler() -> impl Strategy<Value = String> {
    "[0-9 ]{0,20}"
}

/// Pattern drawn from a disjoint alphabet
fn arb_pattern() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

/// Replacement that can never reintroduce the pattern
fn arb_replacement() -> impl Strategy<Value = String> {
    "[A-Z0-9]{0,10}"
}

/// Build a text with exactly `fillers.len() - 1` pattern occurrences
fn interleave(fillers: &[String], pattern: &str) -> String {
    fillers.join(pattern)
}

fn video(id: &str, description: &str) -> VideoRecord {
    VideoRecord {
        id: id.to_string(),
        title: format!("title-{id}"),
        description: description.to_string(),
        etag: None,
        snippet: json!({}),
    }
}

proptest! {
    /// matchCount equals the number of occurrences built into the text
    #[test]
    fn match_count_is_exact(
        fillers in prop::collection::vec(arb_filler(), 2..8),
        pattern in arb_pattern(),
        replacement in arb_replacement(),
    ) {
        let text = interleave(&fillers, &pattern);
        let expected = fillers.len() - 1;

        let (_, count) = replace_all(&text, &pattern, &replacement, true);
        prop_assert_eq!(count, expected);
    }

    /// Substitution replaces every occurrence and leaves all other bytes unchanged
    #[test]
    fn replacement_preserves_unmatched_bytes(
        fillers in prop::collection::vec(arb_filler(), 2..8),
        pattern in arb_pattern(),
        replacement in arb_replacement(),
    ) {
        let text = interleave(&fillers, &pattern);
        let (out, _) = replace_all(&text, &pattern, &replacement, true);

        prop_assert_eq!(out, fillers.join(&replacement));
    }

    /// A second pass over already-replaced text finds nothing
    #[test]
    fn replacement_is_idempotent(
        fillers in prop::collection::vec(arb_filler(), 2..8),
        pattern in arb_pattern(),
        replacement in arb_replacement(),
    ) {
        let text = interleave(&fillers, &pattern);
        let (once, first) = replace_all(&text, &pattern, &replacement, true);
        prop_assert!(first >= 1);

        let (twice, second) = replace_all(&once, &pattern, &replacement, true);
        prop_assert_eq!(second, 0);
        prop_assert_eq!(once, twice);
    }

    /// Case folding never changes how many occurrences are found when the
    /// text already matches the pattern's case
    #[test]
    fn case_insensitive_finds_at_least_as_many(
        fillers in prop::collection::vec(arb_filler(), 2..6),
        pattern in arb_pattern(),
    ) {
        let text = interleave(&fillers, &pattern);
        let (_, sensitive) = replace_all(&text, &pattern, "X", true);
        let (_, insensitive) = replace_all(&text, &pattern.to_uppercase(), "X", false);
        prop_assert_eq!(sensitive, insensitive);
    }

    /// Texts without the pattern are never reported
    #[test]
    fn pattern_free_text_never_matches(
        filler in arb_filler(),
        pattern in arb_pattern(),
    ) {
        let (out, count) = replace_all(&filler, &pattern, "X", true);
        prop_assert_eq!(count, 0);
        prop_assert_eq!(out, filler);
    }

    /// Results are independent per record: a video's MatchResult does not
    /// depend on which other videos are scanned alongside it
    #[test]
    fn results_are_per_record_independent(
        fillers in prop::collection::vec(arb_filler(), 2..5),
        pattern in arb_pattern(),
        noise in prop::collection::vec(arb_filler(), 0..4),
    ) {
        let matching = video("target", &interleave(&fillers, &pattern));
        let alone = find_matches(&[matching.clone()], &pattern, "X", true).unwrap();

        let mut crowd: Vec<VideoRecord> = noise
            .iter()
            .enumerate()
            .map(|(i, text)| video(&format!("noise-{i}"), text))
            .collect();
        crowd.push(matching);

        let together = find_matches(&crowd, &pattern, "X", true).unwrap();
        let from_crowd: Vec<&MatchResult> = together
            .iter()
            .filter(|m| m.video_id == "target")
            .collect();

        prop_assert_eq!(from_crowd.len(), 1);
        prop_assert_eq!(from_crowd[0], &alone[0]);
    }
}
