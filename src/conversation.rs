//! Per-conversation turn history and model-context assembly.

pub mod context;
pub mod history;

pub use context::assemble;
pub use history::HistoryStore;
