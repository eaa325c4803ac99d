//! Prompt assembly with length budgeting.
//!
//! The user prompt is built from up to three blocks (history, case, output
//! requirements). When the user prompt and system prompt together exceed the
//! configured budget the prompt is cut down line by line, keeping the case and
//! requirements blocks and as much leading history as still fits.
//!
//! All lengths are counted in characters, not bytes.

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::PromptSettings;
use crate::history::normalize_whitespace;
use crate::summary::prompts::{
    minimal_prompt, CASE_BLOCK_HEADING, CASE_MARKERS, DEFAULT_SYSTEM_PROMPT,
    HISTORY_BLOCK_HEADING, HISTORY_TRUNCATED_NOTICE, REQUIREMENTS_BLOCK_HEADING,
    REQUIREMENTS_CASE_ONLY, REQUIREMENTS_MARKERS, REQUIREMENTS_WITH_HISTORY,
};

/// Reserved below the budget before truncating the user prompt.
const SYSTEM_PROMPT_RESERVE: usize = 500;
/// Floor for the user prompt budget, however long the system prompt is.
const MIN_USER_PROMPT_LENGTH: usize = 1000;
/// Slack kept under the target while truncating line by line.
const TRUNCATION_BUFFER: usize = 100;
const SHORT_CASE_CHARS: usize = 10;

/// Reasons assembly fell back to the minimal prompt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyWarning {
    #[error("case input does not fit the {budget}-character prompt budget")]
    CaseDropped { budget: usize },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder {
    limits: PromptSettings,
}

impl PromptBuilder {
    pub fn new(limits: PromptSettings) -> Self {
        Self { limits }
    }

    /// Builds the user prompt. Never fails: any assembly warning degrades to
    /// the minimal prompt.
    pub fn build_prompt(
        &self,
        case_input: &str,
        history_reference: &str,
        system_prompt: &str,
    ) -> String {
        match self.try_build_prompt(case_input, history_reference, system_prompt) {
            Ok(prompt) => prompt,
            Err(warning) => {
                error!("Prompt assembly failed, using minimal prompt: {warning}");
                let budget = self.user_prompt_budget(system_prompt);
                let overhead = char_len(&minimal_prompt(""));
                let case = truncate_chars(case_input.trim(), budget.saturating_sub(overhead));
                minimal_prompt(case)
            }
        }
    }

    pub fn try_build_prompt(
        &self,
        case_input: &str,
        history_reference: &str,
        system_prompt: &str,
    ) -> Result<String, AssemblyWarning> {
        let case = case_input.trim();
        if case.is_empty() {
            warn!("Building prompt with an empty case block");
        }

        let history = self.format_history_reference(history_reference);
        let has_history = !history.trim().is_empty();

        let mut parts: Vec<&str> = Vec::new();
        if has_history {
            parts.extend([HISTORY_BLOCK_HEADING, history.as_str(), ""]);
        }
        parts.extend([CASE_BLOCK_HEADING, case, "", REQUIREMENTS_BLOCK_HEADING]);
        parts.extend(if has_history {
            REQUIREMENTS_WITH_HISTORY
        } else {
            REQUIREMENTS_CASE_ONLY
        });
        let user_prompt = parts.join("\n");

        let user_prompt = self.ensure_prompt_length(user_prompt, system_prompt);
        if !user_prompt.contains(case) {
            return Err(AssemblyWarning::CaseDropped {
                budget: self.user_prompt_budget(system_prompt),
            });
        }

        debug!("Built user prompt: {} chars", char_len(&user_prompt));
        Ok(user_prompt)
    }

    /// Normalizes whitespace and truncates the history once it passes
    /// `history_max_length`. Blank input gives an empty string.
    pub fn format_history_reference(&self, history: &str) -> String {
        if history.trim().is_empty() {
            return String::new();
        }
        let formatted = normalize_whitespace(history);
        if char_len(&formatted) > self.limits.history_max_length {
            return truncate_history(&formatted, self.limits.history_target_length);
        }
        formatted
    }

    fn ensure_prompt_length(&self, user_prompt: String, system_prompt: &str) -> String {
        let total = char_len(&user_prompt) + char_len(system_prompt);
        if total <= self.limits.max_prompt_length {
            return user_prompt;
        }

        let budget = self.user_prompt_budget(system_prompt);
        let truncated = truncate_prompt(&user_prompt, budget);
        warn!(
            "Prompt truncated from {} to {} chars",
            char_len(&user_prompt),
            char_len(&truncated)
        );
        truncated
    }

    fn user_prompt_budget(&self, system_prompt: &str) -> usize {
        let available = self
            .limits
            .max_prompt_length
            .saturating_sub(char_len(system_prompt))
            .saturating_sub(SYSTEM_PROMPT_RESERVE);
        if available < MIN_USER_PROMPT_LENGTH {
            warn!("System prompt is too long, user prompt budget raised to {MIN_USER_PROMPT_LENGTH}");
            return MIN_USER_PROMPT_LENGTH;
        }
        available
    }
}

/// Keeps every heading or important line, then fills with content lines in
/// order until `target_length`.
pub fn truncate_history(history: &str, target_length: usize) -> String {
    let lines: Vec<&str> = history.split('\n').collect();
    let (important, content): (Vec<&str>, Vec<&str>) = lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .partition(|line| is_important_line(line));

    let mut kept = important;
    let mut current = char_len(&kept.join("\n"));
    for line in content {
        let len = char_len(line);
        if current + len + 1 > target_length {
            break;
        }
        kept.push(line);
        current += len + 1;
    }

    if kept.len() < lines.len() {
        kept.push("");
        kept.push(HISTORY_TRUNCATED_NOTICE);
    }
    kept.join("\n")
}

fn is_important_line(line: &str) -> bool {
    if line.starts_with('#') || line.contains("重要") || line.contains("关键") {
        return true;
    }
    let lower = line.to_lowercase();
    lower.contains("important") || lower.contains("key")
}

/// Cuts `prompt` to at most `max_length` characters, favouring the case and
/// requirements blocks over the history that precedes them.
pub fn truncate_prompt(prompt: &str, max_length: usize) -> String {
    if char_len(prompt) <= max_length {
        return prompt.to_string();
    }

    let lines: Vec<&str> = prompt.split('\n').collect();
    let requirements_start = lines
        .iter()
        .rposition(|line| REQUIREMENTS_MARKERS.iter().any(|m| line.contains(m)));
    let case_start = lines[..requirements_start.unwrap_or(lines.len())]
        .iter()
        .rposition(|line| CASE_MARKERS.iter().any(|m| line.contains(m)));

    let essential = match case_start {
        Some(start) => &lines[start..],
        None => &lines[lines.len() / 2..],
    };

    let limit = max_length.saturating_sub(TRUNCATION_BUFFER);
    let mut kept: Vec<&str> = Vec::new();
    let mut current = 0;
    for line in essential {
        let len = char_len(line);
        if current + len + 1 > limit {
            break;
        }
        kept.push(line);
        current += len + 1;
    }

    // Leading history goes back in front, in its original order.
    let mut prefix: Vec<&str> = Vec::new();
    if let Some(start) = case_start.filter(|&start| start > 0) {
        if current * 5 < max_length * 4 {
            for line in &lines[..start] {
                let len = char_len(line);
                if current + len + 1 > limit {
                    break;
                }
                prefix.push(line);
                current += len + 1;
            }
        }
    }

    prefix.extend(kept);
    prefix.join("\n")
}

/// Trimmed system prompt, or the built-in default when blank.
pub fn create_system_message_format(system_prompt: &str) -> String {
    let prompt = if system_prompt.trim().is_empty() {
        DEFAULT_SYSTEM_PROMPT
    } else {
        system_prompt
    };
    prompt.trim().to_string()
}

/// Only an empty case is invalid; a short case or blank system prompt is logged.
pub fn validate_prompt_components(case_input: &str, system_prompt: &str) -> bool {
    let case = case_input.trim();
    if case.is_empty() {
        error!("Case input cannot be empty");
        return false;
    }
    if char_len(case) < SHORT_CASE_CHARS {
        warn!("Case input is very short, summary quality may suffer");
    }
    if system_prompt.trim().is_empty() {
        warn!("System prompt is empty, the default prompt will be used");
    }
    true
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PromptBuilder {
        PromptBuilder::default()
    }

    fn history_block(prompt: &str) -> &str {
        let start = prompt.find(HISTORY_BLOCK_HEADING).unwrap() + HISTORY_BLOCK_HEADING.len();
        let end = prompt.find(CASE_BLOCK_HEADING).unwrap();
        prompt[start..end].trim()
    }

    #[test]
    fn test_prompt_with_history_has_all_blocks() {
        let prompt = builder().build_prompt("  Login fails after reset  ", "## Past\nfix", "sys");
        assert_eq!(
            prompt,
            [
                HISTORY_BLOCK_HEADING,
                "## Past\nfix",
                "",
                CASE_BLOCK_HEADING,
                "Login fails after reset",
                "",
                REQUIREMENTS_BLOCK_HEADING,
                REQUIREMENTS_WITH_HISTORY[0],
                REQUIREMENTS_WITH_HISTORY[1],
            ]
            .join("\n")
        );
    }

    #[test]
    fn test_prompt_without_history_uses_case_only_requirements() {
        let prompt = builder().build_prompt("Payment timeout on checkout", "  \n ", "sys");
        assert!(!prompt.contains(HISTORY_BLOCK_HEADING));
        assert!(prompt.starts_with(CASE_BLOCK_HEADING));
        assert!(prompt.ends_with(REQUIREMENTS_CASE_ONLY[1]));
    }

    #[test]
    fn test_blank_case_keeps_history_block() {
        let prompt = builder().build_prompt("  ", "## Past\nfix applied", "sys");
        assert!(prompt.starts_with(HISTORY_BLOCK_HEADING));
        assert!(prompt.contains("fix applied"));
        assert!(prompt.contains(&format!("{CASE_BLOCK_HEADING}\n\n")));
        assert!(prompt.ends_with(REQUIREMENTS_WITH_HISTORY[1]));
        assert_ne!(prompt, minimal_prompt(""));
    }

    #[test]
    fn test_history_is_whitespace_normalized() {
        let prompt = builder().build_prompt("case text here", "\n\n  a  \n\n\n  b \n\n", "");
        assert_eq!(history_block(&prompt), "a\n\nb");
    }

    #[test]
    fn test_over_budget_prompt_fits_and_keeps_case() {
        let system = "s".repeat(25_000);
        let history: String = (0..600)
            .map(|i| format!("history line {i:04} with filler text"))
            .collect::<Vec<_>>()
            .join("\n");
        let case = "客户反馈登录失败，重置密码后仍无法进入系统";

        let prompt = builder().build_prompt(case, &history, &system);
        let total = prompt.chars().count() + system.chars().count();
        assert!(total <= 32_000, "total was {total}");
        assert!(prompt.contains(case));
        assert!(prompt.contains(REQUIREMENTS_BLOCK_HEADING));
        // leading history survives in original order
        let first = prompt.find("history line 0000").unwrap();
        let second = prompt.find("history line 0001").unwrap();
        assert!(first < second);
        assert!(first < prompt.find(CASE_BLOCK_HEADING).unwrap());
    }

    #[test]
    fn test_long_history_keeps_important_lines() {
        let mut history = vec!["# Important".to_string()];
        history.extend((0..2000).map(|i| format!("filler line number {i:05} padding")));
        let history = history.join("\n");
        assert!(history.chars().count() > 15_000);

        let prompt = builder().build_prompt("Server crashed during deploy", &history, "sys");
        let block = history_block(&prompt);
        assert!(block.contains("# Important"));
        assert!(block.ends_with(HISTORY_TRUNCATED_NOTICE));
        assert!(block.chars().count() <= 12_000 + HISTORY_TRUNCATED_NOTICE.chars().count() + 2);
    }

    #[test]
    fn test_truncate_history_keeps_keyword_lines_out_of_order() {
        let history = "plain one\nthe key finding\nplain two\n重要：数据库连接池耗尽";
        let truncated = truncate_history(history, 40);
        let lines: Vec<&str> = truncated.lines().collect();
        assert_eq!(lines[0], "the key finding");
        assert_eq!(lines[1], "重要：数据库连接池耗尽");
        assert_eq!(lines[2], "plain one");
        assert!(truncated.ends_with(HISTORY_TRUNCATED_NOTICE));
        assert!(!truncated.contains("plain two"));
    }

    #[test]
    fn test_truncate_prompt_within_budget_is_unchanged() {
        let prompt = "short prompt";
        assert_eq!(truncate_prompt(prompt, 100), prompt);
    }

    #[test]
    fn test_truncate_prompt_without_case_marker_keeps_latter_half() {
        let prompt: String = (0..10)
            .map(|i| format!("line {i} {}", "x".repeat(20)))
            .collect::<Vec<_>>()
            .join("\n");
        let truncated = truncate_prompt(&prompt, 250);
        assert!(truncated.starts_with("line 5"));
        assert!(truncated.contains("line 9"));
    }

    #[test]
    fn test_truncate_prompt_respects_limit() {
        let history: String = (0..200)
            .map(|i| format!("h{i} {}", "y".repeat(40)))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "{HISTORY_BLOCK_HEADING}\n{history}\n\n{CASE_BLOCK_HEADING}\ncase body\n\n{REQUIREMENTS_BLOCK_HEADING}\ndo it"
        );
        let truncated = truncate_prompt(&prompt, 1000);
        assert!(truncated.chars().count() <= 1000);
        assert!(truncated.starts_with(HISTORY_BLOCK_HEADING));
        assert!(truncated.contains("case body"));
        assert!(truncated.ends_with("do it"));
    }

    #[test]
    fn test_oversized_case_degrades_to_truncated_minimal_prompt() {
        let case: String = (0..400)
            .map(|i| format!("case line {i} {}", "z".repeat(80)))
            .collect::<Vec<_>>()
            .join("\n");
        let system = "s".repeat(31_000);

        let builder = builder();
        assert!(matches!(
            builder.try_build_prompt(&case, "", &system),
            Err(AssemblyWarning::CaseDropped { budget: 1000 })
        ));
        let prompt = builder.build_prompt(&case, "", &system);
        assert!(prompt.starts_with(CASE_BLOCK_HEADING));
        assert!(prompt.ends_with("请生成案例总结。"));
        assert!(prompt.chars().count() <= 1000);
    }

    #[test]
    fn test_custom_limits_are_honoured() {
        let builder = PromptBuilder::new(PromptSettings {
            max_prompt_length: 32_000,
            history_max_length: 50,
            history_target_length: 40,
        });
        let history = "# Title\nfirst content line\nsecond content line\nthird content line";
        let formatted = builder.format_history_reference(history);
        assert!(formatted.starts_with("# Title\nfirst content line"));
        assert!(formatted.ends_with(HISTORY_TRUNCATED_NOTICE));
    }

    #[test]
    fn test_system_message_defaults_when_blank() {
        assert_eq!(create_system_message_format("  "), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(create_system_message_format("  be brief \n"), "be brief");
    }

    #[test]
    fn test_validate_prompt_components() {
        assert!(!validate_prompt_components("  ", "sys"));
        assert!(validate_prompt_components("short", ""));
        assert!(validate_prompt_components("a sufficiently long case", "sys"));
    }
}
