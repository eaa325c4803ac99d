use tracing::debug;

use crate::history::format::split_into_sections;
use crate::history::keywords::{extract_keywords, KeywordSet};
use crate::history::prompts::{
    HISTORY_EXCERPT_HEADING, HISTORY_SUMMARY_HEADING, NO_HISTORY, RELEVANT_HISTORY_HEADING,
};

const MAX_RELEVANT_SECTIONS: usize = 5;

// Fallback summary when no section matches.
const SUMMARY_SCAN_LINES: usize = 20;
const SUMMARY_MAX_LINES: usize = 10;
const SUMMARY_MIN_LINE_CHARS: usize = 10;
const EXCERPT_CHARS: usize = 500;

/// A history section paired with its keyword score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedSection {
    pub score: usize,
    pub text: String,
}

/// Sum of non-overlapping, case-insensitive occurrences of every keyword in `section`.
pub fn score_section(section: &str, keywords: &KeywordSet) -> usize {
    let haystack = section.to_lowercase();
    keywords
        .iter()
        .map(|keyword| haystack.matches(keyword.to_lowercase().as_str()).count())
        .sum()
}

/// Scores every section and keeps those with at least one hit, highest first.
/// Ties keep their original order.
pub fn rank_sections(sections: Vec<String>, keywords: &KeywordSet) -> Vec<RankedSection> {
    let mut ranked: Vec<RankedSection> = sections
        .into_iter()
        .map(|text| RankedSection {
            score: score_section(&text, keywords),
            text,
        })
        .filter(|section| section.score > 0)
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Reduces `history` to the sections most relevant to `case_input`.
///
/// Returns `history` unchanged when either input is blank, when it is the
/// no-history placeholder, or when the case yields no keywords. If nothing
/// matches, a short summary of the first lines is returned instead.
pub fn filter_relevant_history(case_input: &str, history: &str) -> String {
    if case_input.trim().is_empty() || history.trim().is_empty() || history == NO_HISTORY {
        return history.to_string();
    }

    let keywords = extract_keywords(case_input);
    if keywords.is_empty() {
        return history.to_string();
    }

    let sections = split_into_sections(history);
    let total = sections.len();
    let ranked = rank_sections(sections, &keywords);
    debug!(
        "Relevance filter: {} keywords, {}/{} sections matched",
        keywords.len(),
        ranked.len(),
        total
    );

    if ranked.is_empty() {
        return summarize_history(history);
    }

    let mut parts = vec![format!("{RELEVANT_HISTORY_HEADING}\n")];
    for section in ranked.into_iter().take(MAX_RELEVANT_SECTIONS) {
        parts.push(section.text);
        parts.push(String::new());
    }
    parts.join("\n")
}

fn summarize_history(history: &str) -> String {
    let key_lines: Vec<&str> = history
        .split('\n')
        .take(SUMMARY_SCAN_LINES)
        .map(str::trim)
        .filter(|line| line.starts_with('#') || line.chars().count() > SUMMARY_MIN_LINE_CHARS)
        .collect();

    if key_lines.is_empty() {
        let excerpt: String = history.chars().take(EXCERPT_CHARS).collect();
        return format!("{HISTORY_EXCERPT_HEADING}\n\n{excerpt}...");
    }

    let shown = &key_lines[..key_lines.len().min(SUMMARY_MAX_LINES)];
    format!("{HISTORY_SUMMARY_HEADING}\n\n{}", shown.join("\n"))
}
