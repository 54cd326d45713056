use std::sync::{Arc, Mutex};

/// Durable backing for the prompt recall list.
///
/// `load` returns `Ok(None)` when nothing has been saved yet.
pub trait PromptStore: Send {
    fn load(&self) -> anyhow::Result<Option<Vec<String>>>;
    fn save(&self, prompts: &[String]) -> anyhow::Result<()>;
}

/// In-process store; clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemoryPromptStore {
    inner: Arc<Mutex<Option<Vec<String>>>>,
}

impl MemoryPromptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompts(prompts: Vec<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(prompts))),
        }
    }

    pub fn snapshot(&self) -> Option<Vec<String>> {
        self.inner.lock().ok().and_then(|guard| guard.clone())
    }
}

impl PromptStore for MemoryPromptStore {
    fn load(&self) -> anyhow::Result<Option<Vec<String>>> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("prompt store lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, prompts: &[String]) -> anyhow::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("prompt store lock poisoned"))?;
        *guard = Some(prompts.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryPromptStore, PromptStore};

    #[test]
    fn clones_share_saved_prompts() -> anyhow::Result<()> {
        let store = MemoryPromptStore::new();
        let handle = store.clone();
        assert_eq!(store.load()?, None);

        store.save(&["castle".to_string()])?;
        assert_eq!(handle.load()?, Some(vec!["castle".to_string()]));
        assert_eq!(handle.snapshot(), Some(vec!["castle".to_string()]));
        Ok(())
    }
}
