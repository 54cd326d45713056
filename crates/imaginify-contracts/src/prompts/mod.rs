mod recall;
mod store;

pub use recall::{PromptRecall, PROMPT_RECALL_LIMIT};
pub use store::{MemoryPromptStore, PromptStore};
