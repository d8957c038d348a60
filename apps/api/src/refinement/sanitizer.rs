//! Bullet Sanitizer: turns free-form model output into a bounded, deduplicated bullet list.
//!
//! Pipeline: marker extraction (or heuristic fallback) → exact-duplicate removal →
//! near-duplicate removal by Jaccard similarity → truncation to `original + slack`.
//! Pure and network-free.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

/// Words that mark a line as the model talking about its own output.
const META_TOKENS: &[&str] = &["optimize", "bullet"];

/// Minimum token length (exclusive) for near-duplicate comparison.
const MIN_TOKEN_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct SanitizerConfig {
    /// Candidates whose similarity to an accepted bullet exceeds this are dropped.
    pub similarity_threshold: f64,
    /// Extra bullets allowed beyond the original count.
    pub bullet_slack: usize,
    /// Fallback lines must be longer than this many characters.
    pub fallback_min_chars: usize,
    pub fallback_max_lines: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            bullet_slack: 2,
            fallback_min_chars: 20,
            fallback_max_lines: 10,
        }
    }
}

/// Ordered bullets with no exact or near duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BulletSet {
    bullets: Vec<String>,
}

impl BulletSet {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.bullets.iter().map(String::as_str)
    }

    /// One `- `-prefixed line per bullet.
    pub fn to_markdown(&self) -> String {
        self.iter()
            .map(|b| format!("- {b}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Sanitizer outcome. `Verbatim` is the last resort when nothing bullet-like was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizedBullets {
    Bullets(BulletSet),
    Verbatim(String),
}

impl SanitizedBullets {
    pub fn render(&self) -> String {
        match self {
            SanitizedBullets::Bullets(set) => set.to_markdown(),
            SanitizedBullets::Verbatim(text) => text.clone(),
        }
    }
}

/// Number of bullets in user input: every non-blank line counts.
pub fn count_input_bullets(text: &str) -> usize {
    text.lines().filter(|l| !l.trim().is_empty()).count()
}

pub fn sanitize_bullets(
    raw: &str,
    original_count: Option<usize>,
    config: &SanitizerConfig,
) -> SanitizedBullets {
    let mut candidates = extract_marked_lines(raw);

    if candidates.is_empty() {
        candidates = extract_fallback_lines(raw, config);
        if candidates.is_empty() {
            debug!("No bullet-like lines in model output; passing it through verbatim");
            return SanitizedBullets::Verbatim(raw.to_string());
        }
        debug!(
            "No bullet markers in model output; recovered {} fallback lines",
            candidates.len()
        );
    }

    let total = candidates.len();
    let mut accepted: Vec<String> = Vec::with_capacity(total);
    let mut accepted_tokens: Vec<HashSet<String>> = Vec::with_capacity(total);
    let mut seen: HashSet<String> = HashSet::with_capacity(total);

    for bullet in candidates {
        let normalized = bullet.to_lowercase();
        if seen.contains(&normalized) {
            continue;
        }

        let tokens = significant_tokens(&normalized);
        let near_duplicate = accepted_tokens
            .iter()
            .any(|existing| jaccard_similarity(&tokens, existing) > config.similarity_threshold);
        if near_duplicate {
            continue;
        }

        seen.insert(normalized);
        accepted_tokens.push(tokens);
        accepted.push(bullet);
    }

    if let Some(count) = original_count {
        accepted.truncate(count + config.bullet_slack);
    }

    if accepted.len() < total {
        debug!("Sanitizer kept {} of {} bullets", accepted.len(), total);
    }

    SanitizedBullets::Bullets(BulletSet { bullets: accepted })
}

/// `|a ∩ b| / |a ∪ b|`. Two empty sets are identical (1.0); one empty set shares nothing (0.0).
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Whitespace-separated words longer than three characters.
fn significant_tokens(normalized: &str) -> HashSet<String> {
    normalized
        .split_whitespace()
        .filter(|w| w.chars().count() > MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

fn strip_marker(line: &str) -> Option<&str> {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .map(str::trim)
}

fn extract_marked_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| strip_marker(line.trim()))
        .filter(|bullet| !bullet.is_empty())
        .map(str::to_string)
        .collect()
}

fn extract_fallback_lines(raw: &str, config: &SanitizerConfig) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > config.fallback_min_chars)
        .filter(|line| {
            let lower = line.to_lowercase();
            !META_TOKENS.iter().any(|token| lower.contains(token))
        })
        .take(config.fallback_max_lines)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullets(result: &SanitizedBullets) -> Vec<String> {
        match result {
            SanitizedBullets::Bullets(set) => set.iter().map(str::to_string).collect(),
            SanitizedBullets::Verbatim(text) => panic!("expected bullets, got verbatim: {text}"),
        }
    }

    fn tokens(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_extracts_both_marker_styles() {
        let raw = "Here you go:\n- Led migration to Rust\n  * Cut p99 latency by 40%\n\nThanks!";
        let result = sanitize_bullets(raw, None, &SanitizerConfig::default());
        assert_eq!(
            bullets(&result),
            vec!["Led migration to Rust", "Cut p99 latency by 40%"]
        );
        assert_eq!(
            result.render(),
            "- Led migration to Rust\n- Cut p99 latency by 40%"
        );
    }

    #[test]
    fn test_bold_markdown_is_not_a_bullet_marker() {
        let raw = "**Summary**\n- Shipped the billing service";
        let result = sanitize_bullets(raw, None, &SanitizerConfig::default());
        assert_eq!(bullets(&result), vec!["Shipped the billing service"]);
    }

    #[test]
    fn test_exact_duplicates_removed_case_insensitively() {
        let raw = "- Built CI pipeline\n- built ci pipeline\n- BUILT CI PIPELINE\n- Wrote docs";
        let result = sanitize_bullets(raw, None, &SanitizerConfig::default());
        assert_eq!(bullets(&result), vec!["Built CI pipeline", "Wrote docs"]);
    }

    #[test]
    fn test_near_duplicates_over_threshold_collapse() {
        // tokens: {designed, scalable, payment, platform, serving, millions, users}
        // vs the same plus "daily": 7/8 = 0.875 > 0.8
        let raw = "- Designed scalable payment platform serving millions users\n\
                   - Designed scalable payment platform serving millions users daily\n\
                   - Mentored four junior engineers";
        let result = sanitize_bullets(raw, None, &SanitizerConfig::default());
        assert_eq!(
            bullets(&result),
            vec![
                "Designed scalable payment platform serving millions users",
                "Mentored four junior engineers"
            ]
        );
    }

    #[test]
    fn test_similarity_exactly_at_threshold_is_kept() {
        // {alpha, bravo, charlie, delta} vs {alpha, bravo, charlie, delta, echo}: 4/5 = 0.8
        let raw = "- alpha bravo charlie delta\n- alpha bravo charlie delta echo";
        let result = sanitize_bullets(raw, None, &SanitizerConfig::default());
        assert_eq!(bullets(&result).len(), 2);
    }

    #[test]
    fn test_led_team_example_under_default_threshold() {
        // "led team" → {team}; "led a team of five" → {team, five}: 0.5, not a near duplicate.
        let raw = "- Led team\n- Led a team of five\n- Built reports";
        let result = sanitize_bullets(raw, None, &SanitizerConfig::default());
        assert_eq!(
            bullets(&result),
            vec!["Led team", "Led a team of five", "Built reports"]
        );
    }

    #[test]
    fn test_led_team_example_with_lower_threshold() {
        let config = SanitizerConfig {
            similarity_threshold: 0.4,
            ..SanitizerConfig::default()
        };
        let raw = "- Led team\n- Led a team of five\n- Built reports";
        let result = sanitize_bullets(raw, None, &config);
        assert_eq!(bullets(&result), vec!["Led team", "Built reports"]);
    }

    #[test]
    fn test_short_word_bullets_count_as_duplicates() {
        // Neither bullet has a word longer than three characters: both token sets are empty.
        let raw = "- Led QA\n- Ran ops";
        let result = sanitize_bullets(raw, None, &SanitizerConfig::default());
        assert_eq!(bullets(&result), vec!["Led QA"]);
    }

    #[test]
    fn test_truncates_to_original_count_plus_slack() {
        let raw = (1..=8)
            .map(|i| format!("- Delivered project number{i} with distinct scope{i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = sanitize_bullets(&raw, Some(3), &SanitizerConfig::default());
        let kept = bullets(&result);
        assert_eq!(kept.len(), 5);
        assert!(kept[0].contains("number1"));
        assert!(kept[4].contains("number5"));
    }

    #[test]
    fn test_bound_holds_for_zero_original_count() {
        let raw = "- Alpha project delivery\n- Bravo migration effort\n- Charlie launch work";
        let result = sanitize_bullets(raw, Some(0), &SanitizerConfig::default());
        assert_eq!(bullets(&result).len(), 2);
    }

    #[test]
    fn test_fallback_keeps_long_lines_without_meta_commentary() {
        let raw = "Here are the optimized results for you\n\
                   Architected event-driven ingestion pipeline on Kafka\n\
                   short line\n\
                   Each bullet now leads with a verb and a metric\n\
                   Reduced cloud spend 30% by rightsizing clusters";
        let result = sanitize_bullets(raw, None, &SanitizerConfig::default());
        assert_eq!(
            bullets(&result),
            vec![
                "Architected event-driven ingestion pipeline on Kafka",
                "Reduced cloud spend 30% by rightsizing clusters"
            ]
        );
    }

    #[test]
    fn test_fallback_is_capped() {
        let raw = (0..15)
            .map(|i| format!("Delivered initiative{i:02} improving throughput{i:02} markedly"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = sanitize_bullets(&raw, None, &SanitizerConfig::default());
        assert_eq!(bullets(&result).len(), 10);
    }

    #[test]
    fn test_passthrough_when_nothing_usable() {
        let raw = "Sorry, no.";
        let result = sanitize_bullets(raw, Some(3), &SanitizerConfig::default());
        assert_eq!(result, SanitizedBullets::Verbatim(raw.to_string()));
        assert_eq!(result.render(), raw);
    }

    #[test]
    fn test_sanitize_is_idempotent_on_well_formed_input() {
        let raw = "- Led migration to Rust\n- led migration to rust\n- Built reports for finance\n\
                   - Mentored interns across three teams";
        let config = SanitizerConfig::default();
        let once = sanitize_bullets(raw, Some(3), &config).render();
        let twice = sanitize_bullets(&once, Some(3), &config).render();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_marker_only_lines_ignored() {
        let raw = "- \n-\n*   \n- Real bullet here";
        let result = sanitize_bullets(raw, None, &SanitizerConfig::default());
        assert_eq!(bullets(&result), vec!["Real bullet here"]);
    }

    #[test]
    fn test_jaccard_edge_cases() {
        let empty = HashSet::new();
        let some = tokens(&["team"]);
        assert_eq!(jaccard_similarity(&empty, &empty), 1.0);
        assert_eq!(jaccard_similarity(&empty, &some), 0.0);
        assert_eq!(jaccard_similarity(&some, &empty), 0.0);
        assert_eq!(
            jaccard_similarity(&tokens(&["team", "five"]), &tokens(&["team"])),
            0.5
        );
    }

    #[test]
    fn test_count_input_bullets_skips_blank_lines() {
        assert_eq!(count_input_bullets("- a\n\n   \n- b\nc"), 3);
        assert_eq!(count_input_bullets(""), 0);
    }
}
