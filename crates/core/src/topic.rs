//! Topic name normalization and drift-tolerant resolution.
//!
//! Clients address topics by URL slug ("history-and-heritage") while the
//! topic directory stores display names ("History And Heritage"). The
//! directory has accumulated naming drift over time, so resolution falls back
//! from exact match to case-insensitive, substring, and finally fuzzy match
//! before giving up.

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

/// Minimum skim score accepted as a fuzzy candidate.
const FUZZY_SCORE_FLOOR: i64 = 50;

/// Converts a hyphenated slug into its title-cased display form.
pub fn display_name(slug: &str) -> String {
    slug.split(['-', '_', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves `requested` against the known topic names, tolerating drift.
///
/// Returns the canonical stored name, or `None` when no plausible candidate
/// exists.
pub fn resolve<'a>(requested: &str, known: &'a [String]) -> Option<&'a str> {
    if let Some(name) = known.iter().find(|name| name.as_str() == requested) {
        return Some(name);
    }

    let requested_lower = requested.to_lowercase();
    if let Some(name) = known
        .iter()
        .find(|name| name.to_lowercase() == requested_lower)
    {
        return Some(name);
    }

    if let Some(name) = known.iter().find(|name| {
        let candidate = name.to_lowercase();
        candidate.contains(&requested_lower) || requested_lower.contains(&candidate)
    }) {
        return Some(name);
    }

    let matcher = SkimMatcherV2::default();
    known
        .iter()
        .filter_map(|name| {
            matcher
                .fuzzy_match(name, requested)
                .map(|score| (score, name))
        })
        .filter(|(score, _)| *score >= FUZZY_SCORE_FLOOR)
        .max_by_key(|(score, _)| *score)
        .map(|(_, name)| name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Vec<String> {
        vec![
            "History And Heritage".to_string(),
            "Food And Cooking".to_string(),
            "Travel".to_string(),
        ]
    }

    #[test]
    fn slug_becomes_title_case() {
        assert_eq!(display_name("history-and-heritage"), "History And Heritage");
        assert_eq!(display_name("travel"), "Travel");
        assert_eq!(display_name("FOOD_AND_COOKING"), "Food And Cooking");
    }

    #[test]
    fn exact_match_wins() {
        let known = directory();
        assert_eq!(resolve("Travel", &known), Some("Travel"));
    }

    #[test]
    fn case_insensitive_match() {
        let known = directory();
        assert_eq!(
            resolve("history and heritage", &known),
            Some("History And Heritage")
        );
    }

    #[test]
    fn substring_match_tolerates_drift() {
        let known = directory();
        assert_eq!(resolve("Heritage", &known), Some("History And Heritage"));
        assert_eq!(resolve("Food And Cooking Basics", &known), Some("Food And Cooking"));
    }

    #[test]
    fn fuzzy_match_catches_typos() {
        let known = directory();
        assert_eq!(resolve("Fod And Coking", &known), Some("Food And Cooking"));
    }

    #[test]
    fn unknown_topic_resolves_to_none() {
        let known = directory();
        assert_eq!(resolve("Quantum Mechanics", &known), None);
        assert_eq!(resolve("x", &[]), None);
    }
}
