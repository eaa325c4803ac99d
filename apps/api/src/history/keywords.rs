//! Keyword extraction for relevance filtering.
//!
//! Two token sources are unioned:
//! - CJK n-grams of length 2–4 taken from each contiguous run of CJK ideographs
//! - ASCII alphabetic words of two or more letters, lowercased
//!
//! A non-CJK character always ends a run, so n-grams never bridge text that was
//! not adjacent in the input.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

pub type KeywordSet = HashSet<String>;

const NGRAM_LENGTHS: [usize; 3] = [2, 3, 4];
const MIN_KEYWORD_CHARS: usize = 2;

static ASCII_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-zA-Z]{2,}\b").expect("ASCII word pattern is valid"));

const STOP_WORDS: &[&str] = &[
    // CJK function words
    "的", "了", "在", "是", "我", "有", "和", "就", "不", "人", "都", "一", "一个", "上", "也",
    "很", "到", "说", "要", "去", "你", "会", "着", "没有", "看", "好", "自己", "这", "时",
    "需要",
    // English articles, prepositions, auxiliaries and modals
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "is", "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should",
];

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Extracts the candidate keyword set for a case description.
pub fn extract_keywords(text: &str) -> KeywordSet {
    let mut keywords = KeywordSet::new();

    for run in text.split(|c: char| !is_cjk(c)).filter(|run| !run.is_empty()) {
        let chars: Vec<char> = run.chars().collect();
        for start in 0..chars.len() {
            for len in NGRAM_LENGTHS {
                if let Some(window) = chars.get(start..start + len) {
                    keywords.insert(window.iter().collect());
                }
            }
        }
    }

    let lowered = text.to_lowercase();
    keywords.extend(ASCII_WORD.find_iter(&lowered).map(|m| m.as_str().to_string()));

    keywords.retain(|word| {
        word.chars().count() >= MIN_KEYWORD_CHARS && !STOP_WORDS.contains(&word.as_str())
    });
    keywords
}
