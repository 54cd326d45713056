use std::env;
use std::path::PathBuf;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GENERATE_MODEL: &str = "imagen-4.0-generate-001";
pub const DEFAULT_EDIT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_DATA_DIR: &str = ".imaginify";

const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;
const DEFAULT_TRANSPORT_RETRIES: usize = 2;
const DEFAULT_RETRY_BACKOFF_S: f64 = 1.2;

const API_KEY_VARS: [&str; 3] = ["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

/// Runtime settings for an [`crate::ImaginifyEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub events_path: Option<PathBuf>,
    pub api_key: Option<String>,
    pub api_base: String,
    pub generate_model: String,
    pub edit_model: String,
    pub request_timeout_s: f64,
    pub transport_retries: usize,
    pub retry_backoff_s: f64,
    pub dryrun: bool,
    pub persist_prompts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            events_path: None,
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            generate_model: DEFAULT_GENERATE_MODEL.to_string(),
            edit_model: DEFAULT_EDIT_MODEL.to_string(),
            request_timeout_s: DEFAULT_REQUEST_TIMEOUT_S,
            transport_retries: DEFAULT_TRANSPORT_RETRIES,
            retry_backoff_s: DEFAULT_RETRY_BACKOFF_S,
            dryrun: false,
            persist_prompts: true,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            data_dir: get("IMAGINIFY_HOME")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            events_path: None,
            api_key: API_KEY_VARS.iter().find_map(|key| get(key)),
            api_base: get("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            generate_model: get("IMAGINIFY_GENERATE_MODEL").unwrap_or(defaults.generate_model),
            edit_model: get("IMAGINIFY_EDIT_MODEL").unwrap_or(defaults.edit_model),
            request_timeout_s: get("IMAGINIFY_REQUEST_TIMEOUT")
                .and_then(|raw| raw.parse::<f64>().ok())
                .filter(|value| value.is_finite())
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_S)
                .clamp(15.0, 300.0),
            transport_retries: get("IMAGINIFY_TRANSPORT_RETRIES")
                .and_then(|raw| raw.parse::<usize>().ok())
                .unwrap_or(DEFAULT_TRANSPORT_RETRIES)
                .clamp(0, 4),
            retry_backoff_s: DEFAULT_RETRY_BACKOFF_S,
            dryrun: false,
            persist_prompts: true,
        }
    }

    pub fn prompts_path(&self) -> PathBuf {
        self.data_dir.join("prompts.json")
    }

    pub fn events_path(&self) -> PathBuf {
        self.events_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("events.jsonl"))
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::{EngineConfig, DEFAULT_API_BASE, DEFAULT_EDIT_MODEL, DEFAULT_GENERATE_MODEL};

    fn config_from(pairs: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]);
        assert!(config.api_key.is_none());
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.generate_model, DEFAULT_GENERATE_MODEL);
        assert_eq!(config.edit_model, DEFAULT_EDIT_MODEL);
        assert_eq!(config.request_timeout_s, 90.0);
        assert_eq!(config.transport_retries, 2);
        assert_eq!(config.prompts_path(), PathBuf::from(".imaginify/prompts.json"));
        assert_eq!(config.events_path(), PathBuf::from(".imaginify/events.jsonl"));
    }

    #[test]
    fn api_key_prefers_gemini_then_google_then_generic() {
        let config = config_from(&[("API_KEY", "generic"), ("GOOGLE_API_KEY", "google")]);
        assert_eq!(config.api_key.as_deref(), Some("google"));

        let config = config_from(&[
            ("API_KEY", "generic"),
            ("GEMINI_API_KEY", "gemini"),
            ("GOOGLE_API_KEY", "google"),
        ]);
        assert_eq!(config.api_key.as_deref(), Some("gemini"));

        let config = config_from(&[("GEMINI_API_KEY", "   "), ("API_KEY", "generic")]);
        assert_eq!(config.api_key.as_deref(), Some("generic"));
    }

    #[test]
    fn numeric_settings_are_clamped() {
        let config = config_from(&[
            ("IMAGINIFY_REQUEST_TIMEOUT", "5"),
            ("IMAGINIFY_TRANSPORT_RETRIES", "12"),
        ]);
        assert_eq!(config.request_timeout_s, 15.0);
        assert_eq!(config.transport_retries, 4);

        let config = config_from(&[("IMAGINIFY_REQUEST_TIMEOUT", "soon")]);
        assert_eq!(config.request_timeout_s, 90.0);
    }

    #[test]
    fn overrides_paths_and_models() {
        let config = config_from(&[
            ("IMAGINIFY_HOME", "/tmp/imaginify"),
            ("GEMINI_API_BASE", "https://proxy.test/v1beta/"),
            ("IMAGINIFY_EDIT_MODEL", "gemini-custom"),
        ]);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/imaginify"));
        assert_eq!(config.api_base, "https://proxy.test/v1beta");
        assert_eq!(config.edit_model, "gemini-custom");
        assert_eq!(
            config.downloads_dir(),
            PathBuf::from("/tmp/imaginify/downloads")
        );
    }
}
