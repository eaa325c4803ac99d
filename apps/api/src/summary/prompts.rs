// Prompt text for case summarization.
// Block headings double as truncation markers, see `prompt_builder::truncate_prompt`.

pub const HISTORY_BLOCK_HEADING: &str = "## 历史参考信息 / Historical Reference Information";
pub const CASE_BLOCK_HEADING: &str = "## 需要总结的案例 / Case to Summarize";
pub const REQUIREMENTS_BLOCK_HEADING: &str = "## 输出要求 / Output Requirements";

pub const CASE_MARKERS: [&str; 2] = ["需要总结的案例", "Case to Summarize"];
pub const REQUIREMENTS_MARKERS: [&str; 2] = ["输出要求", "Output Requirements"];

pub const REQUIREMENTS_WITH_HISTORY: [&str; 2] = [
    "请根据上述历史参考信息和案例内容，生成一个结构化、专业的案例总结。",
    "Please generate a structured and professional case summary based on the above historical reference information and case content.",
];

pub const REQUIREMENTS_CASE_ONLY: [&str; 2] = [
    "请根据案例内容，生成一个结构化、专业的案例总结。",
    "Please generate a structured and professional case summary based on the case content.",
];

pub const HISTORY_TRUNCATED_NOTICE: &str =
    "... (历史信息已截断以适应长度限制) / (History truncated to fit length limit) ...";

/// Prompt used when assembly cannot produce anything better.
pub fn minimal_prompt(case_input: &str) -> String {
    format!(
        "{CASE_BLOCK_HEADING}\n\n{case_input}\n\n{REQUIREMENTS_BLOCK_HEADING}\n\n请生成案例总结。"
    )
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "你是一个专业的案例总结助手。请根据提供的历史参考信息和新的案例输入，生成一个结构化、专业的案例总结。

总结应该包含：
1. 案例概述
2. 关键要点
3. 分析结论
4. 建议措施

请保持总结的客观性和专业性。";
