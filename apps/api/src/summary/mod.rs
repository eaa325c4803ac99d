// Case summarization.
// Implements: prompt assembly with length budgets, the summary pipeline and its HTTP handlers.

pub mod handlers;
pub mod prompt_builder;
pub mod prompts;
pub mod service;

pub use service::{SummaryError, SummaryRequest, SummaryService};
