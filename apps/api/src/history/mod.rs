// History reference engine.
// Implements: file loading, category formatting, section splitting, keyword extraction,
// relevance scoring and filtering. Everything here is synchronous and request-scoped.

use std::path::PathBuf;

use thiserror::Error;

pub mod format;
pub mod keywords;
pub mod loader;
pub mod prompts;
pub mod relevance;

pub use format::{format_history, normalize_whitespace};
pub use loader::load_history;
pub use relevance::filter_relevant_history;

/// Category assigned to files that sit directly in the history root.
pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read history file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode history file {} with any supported encoding", .path.display())]
    Decode { path: PathBuf },

    #[error("failed to walk history folder: {0}")]
    Walk(#[from] walkdir::Error),
}
