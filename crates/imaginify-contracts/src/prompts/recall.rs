use tracing::{debug, warn};

use super::store::PromptStore;

pub const PROMPT_RECALL_LIMIT: usize = 10;

/// Most-recent-first list of distinct prompts, written through to a store.
pub struct PromptRecall {
    entries: Vec<String>,
    store: Box<dyn PromptStore>,
}

impl PromptRecall {
    /// Restores the saved list. A missing or unreadable value yields an empty
    /// list; the failure is only logged.
    pub fn load(store: Box<dyn PromptStore>) -> Self {
        let entries = match store.load() {
            Ok(Some(saved)) => normalize(saved),
            Ok(None) => Vec::new(),
            Err(err) => {
                debug!("prompt history unreadable, starting empty: {err:#}");
                Vec::new()
            }
        };
        Self { entries, store }
    }

    pub fn record(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.entries.retain(|existing| existing != text);
        self.entries.insert(0, text.to_string());
        self.entries.truncate(PROMPT_RECALL_LIMIT);
        if let Err(err) = self.store.save(&self.entries) {
            warn!("failed to persist prompt history: {err:#}");
        }
        true
    }

    pub fn entries(&self) -> &[String] {
        self.entries.as_slice()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for PromptRecall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptRecall")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

fn normalize(saved: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for prompt in saved {
        if prompt.trim().is_empty() || out.contains(&prompt) {
            continue;
        }
        out.push(prompt);
        if out.len() == PROMPT_RECALL_LIMIT {
            break;
        }
    }
    out
}
