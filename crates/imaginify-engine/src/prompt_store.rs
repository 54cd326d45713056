use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use imaginify_contracts::prompts::PromptStore;
use serde_json::{Map, Value};

pub const PROMPT_HISTORY_KEY: &str = "promptHistory";

/// Prompt history kept under one key of a JSON object file. Other keys in
/// the file are preserved on save.
#[derive(Debug, Clone)]
pub struct JsonFilePromptStore {
    path: PathBuf,
    key: String,
}

impl JsonFilePromptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: PROMPT_HISTORY_KEY.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PromptStore for JsonFilePromptStore {
    fn load(&self) -> Result<Option<Vec<String>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let payload = read_json_object(&self.path)?;
        let Some(value) = payload.get(&self.key) else {
            return Ok(None);
        };
        let Some(rows) = value.as_array() else {
            bail!("{} in {} is not an array", self.key, self.path.display());
        };
        Ok(Some(
            rows.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ))
    }

    fn save(&self, prompts: &[String]) -> Result<()> {
        let mut payload = if self.path.exists() {
            read_json_object(&self.path).unwrap_or_default()
        } else {
            Map::new()
        };
        payload.insert(
            self.key.clone(),
            Value::Array(prompts.iter().cloned().map(Value::String).collect()),
        );
        write_json_object(&self.path, &payload)
    }
}

fn read_json_object(path: &Path) -> Result<Map<String, Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&raw)
        .with_context(|| format!("invalid JSON in {}", path.display()))?;
    match parsed {
        Value::Object(map) => Ok(map),
        _ => bail!("{} is not a JSON object", path.display()),
    }
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use imaginify_contracts::prompts::{PromptRecall, PromptStore};
    use serde_json::{json, Value};

    use super::JsonFilePromptStore;

    #[test]
    fn missing_file_loads_as_none() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = JsonFilePromptStore::new(temp.path().join("prompts.json"));
        assert_eq!(store.load()?, None);
        Ok(())
    }

    #[test]
    fn save_preserves_unrelated_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("prompts.json");
        fs::write(&path, r#"{"theme":"dark","promptHistory":["old"]}"#)?;

        let store = JsonFilePromptStore::new(&path);
        assert_eq!(store.load()?, Some(vec!["old".to_string()]));
        store.save(&["new".to_string(), "old".to_string()])?;

        let saved: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(saved["theme"], json!("dark"));
        assert_eq!(saved["promptHistory"], json!(["new", "old"]));
        Ok(())
    }

    #[test]
    fn malformed_history_is_an_error_and_recall_starts_empty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("prompts.json");
        fs::write(&path, r#"{"promptHistory":"not a list"}"#)?;
        let store = JsonFilePromptStore::new(&path);
        assert!(store.load().is_err());

        let recall = PromptRecall::load(Box::new(store));
        assert!(recall.is_empty());
        Ok(())
    }

    #[test]
    fn recall_round_trips_through_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("prompts.json");

        let mut recall = PromptRecall::load(Box::new(JsonFilePromptStore::new(&path)));
        recall.record("a castle");
        recall.record("a neon city");

        let reloaded = PromptRecall::load(Box::new(JsonFilePromptStore::new(&path)));
        assert_eq!(
            reloaded.entries(),
            &["a neon city".to_string(), "a castle".to_string()]
        );
        Ok(())
    }
}
