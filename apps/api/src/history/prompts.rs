// Heading text emitted by the history formatter and relevance filter.
// The output is bilingual because the reference material and generated summaries are.

/// Returned by `format_history` when no history files were loaded.
pub const NO_HISTORY: &str = "暂无历史参考信息 / No historical reference information available";

pub const RELEVANT_HISTORY_HEADING: &str =
    "## 相关历史参考信息 / Relevant Historical Reference Information";

pub const HISTORY_SUMMARY_HEADING: &str = "## 历史参考信息摘要 / Historical Reference Summary";

pub const HISTORY_EXCERPT_HEADING: &str = "## 历史参考信息 / Historical Reference Information";

pub fn category_heading(category: &str) -> String {
    format!("\n## {category}类别参考 / {category} Category Reference\n")
}

pub fn file_heading(name: &str) -> String {
    format!("### 文件: {name} / File: {name}")
}
