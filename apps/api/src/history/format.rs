use crate::history::loader::HistoryFile;
use crate::history::prompts::{category_heading, file_heading, NO_HISTORY};

/// Renders loaded history files as one markdown document, grouped by category
/// in order of first appearance.
pub fn format_history(files: &[HistoryFile]) -> String {
    if files.is_empty() {
        return NO_HISTORY.to_string();
    }

    let mut categories: Vec<(&str, Vec<&HistoryFile>)> = Vec::new();
    for file in files {
        match categories
            .iter()
            .position(|(category, _)| *category == file.category.as_str())
        {
            Some(idx) => categories[idx].1.push(file),
            None => categories.push((file.category.as_str(), vec![file])),
        }
    }

    categories
        .into_iter()
        .map(|(category, group)| {
            let mut lines = vec![category_heading(category)];
            for file in group {
                lines.push(file_heading(&file.name));
                lines.push(normalize_whitespace(&file.content));
                lines.push(String::new());
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Trims every line, collapses runs of blank lines into one and drops
/// leading and trailing blank lines.
pub fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line);
        } else if lines.last().is_some_and(|last| !last.is_empty()) {
            lines.push("");
        }
    }
    while lines.last() == Some(&"") {
        lines.pop();
    }
    lines.join("\n")
}

/// Splits formatted history into sections. A heading line (`#...`) always opens a
/// new section; a blank line closes the current one.
pub fn split_into_sections(history: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in history.split('\n') {
        let line = line.trim();
        if line.starts_with('#') || (!line.is_empty() && current.is_empty()) {
            if !current.is_empty() {
                sections.push(current.join("\n"));
                current.clear();
            }
            current.push(line);
        } else if !line.is_empty() {
            current.push(line);
        } else if !current.is_empty() {
            sections.push(current.join("\n"));
            current.clear();
        }
    }
    if !current.is_empty() {
        sections.push(current.join("\n"));
    }

    sections.retain(|section| !section.trim().is_empty());
    sections
}
