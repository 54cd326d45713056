use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use imaginify_contracts::editor::{EditorSession, Outcome, SessionError, UploadTarget};
use imaginify_contracts::events::{EventPayload, EventWriter};
use imaginify_contracts::prompts::{MemoryPromptStore, PromptRecall, PromptStore};
use imaginify_contracts::service::ImageService;
use imaginify_contracts::{Artifact, EditorAction, EditorMode};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod config;
pub mod files;
pub mod prompt_store;
pub mod providers;

pub use config::EngineConfig;
pub use files::{export_artifact, ingest_file, DownloadFormat};
pub use prompt_store::JsonFilePromptStore;
pub use providers::{DryrunImageService, GoogleImageService};

/// An editor session wired to an image service and the event log.
pub struct ImaginifyEngine {
    config: EngineConfig,
    session_id: String,
    events: EventWriter,
    session: EditorSession,
    service: Box<dyn ImageService>,
}

impl ImaginifyEngine {
    /// Picks the service and prompt store from `config`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let service: Box<dyn ImageService> = if config.dryrun {
            Box::new(DryrunImageService::new())
        } else {
            Box::new(GoogleImageService::new(&config))
        };
        let store: Box<dyn PromptStore> = if config.persist_prompts {
            Box::new(JsonFilePromptStore::new(config.prompts_path()))
        } else {
            Box::new(MemoryPromptStore::new())
        };
        Self::with_parts(config, service, store)
    }

    pub fn with_parts(
        config: EngineConfig,
        service: Box<dyn ImageService>,
        store: Box<dyn PromptStore>,
    ) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("failed creating {}", config.data_dir.display()))?;
        let session_id = Uuid::new_v4().to_string();
        let events = EventWriter::new(config.events_path(), session_id.clone());

        let mut session = EditorSession::new(PromptRecall::load(store));
        session.subscribe(events.clone());

        events.emit(
            "session_started",
            map_object(json!({
                "data_dir": config.data_dir.to_string_lossy(),
                "service": service.name(),
                "prompt_count": session.prompts().len(),
                "persist_prompts": config.persist_prompts,
            })),
        )?;
        info!(
            session_id = %session_id,
            service = service.name(),
            "imaginify session started"
        );

        Ok(Self {
            config,
            session_id,
            events,
            session,
            service,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn events(&self) -> &EventWriter {
        &self.events
    }

    pub fn session(&self) -> &EditorSession {
        &self.session
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Runs one editor action against the configured service.
    pub fn run(&mut self, action: EditorAction) -> Result<Outcome, SessionError> {
        let kind = action.kind();
        let call = match self.session.begin(action) {
            Ok(call) => call,
            Err(err) => {
                self.emit(
                    "action_rejected",
                    map_object(json!({
                        "action": kind.as_str(),
                        "error": err.to_string(),
                    })),
                );
                return Err(err);
            }
        };
        self.emit("action_started", providers::describe_request(call.request()));

        let started = Instant::now();
        let result = self.service.run(call.request());
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let outcome = self.session.complete(call, result);

        match &outcome {
            Ok(Outcome::Committed(artifact)) => {
                let mut payload = artifact_payload(artifact);
                payload.insert("action".to_string(), json!(kind.as_str()));
                payload.insert("elapsed_ms".to_string(), json!(elapsed_ms));
                payload.insert(
                    "history_index".to_string(),
                    json!(self.session.history().current_index()),
                );
                self.emit("artifact_committed", payload);
            }
            Ok(Outcome::PreviewReady(artifact)) => {
                let mut payload = artifact_payload(artifact);
                payload.insert("elapsed_ms".to_string(), json!(elapsed_ms));
                self.emit("preview_ready", payload);
            }
            Ok(Outcome::SourceFaceSet(_)) => {}
            Err(err) => {
                debug!(action = kind.as_str(), "image action failed: {err}");
                self.emit(
                    "action_failed",
                    map_object(json!({
                        "action": kind.as_str(),
                        "error": err.to_string(),
                        "elapsed_ms": elapsed_ms,
                    })),
                );
            }
        }
        outcome
    }

    /// Loads an image file as the new editing target or as the source face.
    pub fn upload_file(
        &mut self,
        path: &Path,
        target: UploadTarget,
    ) -> Result<Outcome, SessionError> {
        let pending = self.session.begin_upload(target)?;
        let decoded = ingest_file(path).map_err(|err| format!("{err:#}"));
        let outcome = self.session.complete_upload(pending, decoded);

        let target_label = match target {
            UploadTarget::Target => "target",
            UploadTarget::SourceFace => "source_face",
        };
        match &outcome {
            Ok(Outcome::Committed(artifact)) | Ok(Outcome::SourceFaceSet(artifact)) => {
                let mut payload = artifact_payload(artifact);
                payload.insert("target".to_string(), json!(target_label));
                payload.insert("path".to_string(), json!(path.to_string_lossy()));
                self.emit("upload_committed", payload);
            }
            Ok(Outcome::PreviewReady(_)) => {}
            Err(err) => {
                self.emit(
                    "upload_failed",
                    map_object(json!({
                        "target": target_label,
                        "path": path.to_string_lossy(),
                        "error": err.to_string(),
                    })),
                );
            }
        }
        outcome
    }

    pub fn accept_preview(&mut self) -> Result<Artifact, SessionError> {
        let accepted = self.session.accept_preview()?;
        let mut payload = artifact_payload(&accepted);
        payload.insert(
            "history_index".to_string(),
            json!(self.session.history().current_index()),
        );
        self.emit("preview_committed", payload);
        Ok(accepted)
    }

    pub fn discard_preview(&mut self) -> Result<(), SessionError> {
        self.session.discard_preview()?;
        self.emit("preview_discarded", Map::new());
        Ok(())
    }

    pub fn undo(&mut self) -> Result<bool, SessionError> {
        self.session.undo()
    }

    pub fn redo(&mut self) -> Result<bool, SessionError> {
        self.session.redo()
    }

    pub fn set_mode(&mut self, mode: EditorMode) -> Result<(), SessionError> {
        self.session.set_mode(mode)
    }

    pub fn go_to_prompt(&mut self) -> Result<(), SessionError> {
        self.session.go_to_prompt()
    }

    pub fn clear_source_face(&mut self) -> Result<(), SessionError> {
        self.session.clear_source_face()
    }

    pub fn clear_error(&mut self) {
        self.session.clear_error();
    }

    /// Saves the current image. Without `dir` it lands in the data
    /// directory's `downloads/`.
    pub fn download(&self, format: DownloadFormat, dir: Option<&Path>) -> Result<PathBuf> {
        let Some(current) = self.session.current() else {
            bail!("no image to download");
        };
        let dir = dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.downloads_dir());
        let path = export_artifact(current, format, &dir)?;

        let mut payload = artifact_payload(current);
        payload.insert("format".to_string(), json!(format.extension()));
        payload.insert("path".to_string(), json!(path.to_string_lossy()));
        self.emit("download_written", payload);
        info!(path = %path.display(), "image downloaded");
        Ok(path)
    }

    fn emit(&self, event_type: &str, payload: EventPayload) {
        match self.events.emit(event_type, payload) {
            Ok(_) => debug!(event = event_type, "event written"),
            Err(err) => warn!("failed to write {event_type} event: {err:#}"),
        }
    }
}

impl std::fmt::Debug for ImaginifyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImaginifyEngine")
            .field("session_id", &self.session_id)
            .field("service", &self.service.name())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn artifact_payload(artifact: &Artifact) -> Map<String, Value> {
    map_object(json!({
        "artifact": artifact.id(),
        "mime_type": artifact.mime_type(),
        "bytes": artifact.len(),
    }))
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;

    use imaginify_contracts::editor::{Outcome, SessionError, UploadTarget};
    use imaginify_contracts::prompts::MemoryPromptStore;
    use imaginify_contracts::service::{ImageService, ServiceError, ServiceRequest};
    use imaginify_contracts::{Artifact, AspectRatio, EditorAction, EditorMode};
    use serde_json::Value;

    use super::{truncate_text, DownloadFormat, EngineConfig, ImaginifyEngine};

    struct FailingService {
        calls: RefCell<usize>,
    }

    impl ImageService for FailingService {
        fn name(&self) -> &str {
            "failing"
        }

        fn run(&self, _request: &ServiceRequest) -> Result<Artifact, ServiceError> {
            *self.calls.borrow_mut() += 1;
            Err(ServiceError::new("Image upscaling failed to produce an image."))
        }
    }

    fn dryrun_config(dir: &Path) -> EngineConfig {
        EngineConfig {
            data_dir: dir.to_path_buf(),
            dryrun: true,
            ..EngineConfig::default()
        }
    }

    fn event_types(path: &Path) -> anyhow::Result<Vec<String>> {
        let raw = fs::read_to_string(path)?;
        Ok(raw
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|row| row["type"].as_str().map(str::to_string))
            .collect())
    }

    #[test]
    fn generate_commits_and_logs_events() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut engine = ImaginifyEngine::new(dryrun_config(temp.path()))?;
        assert_eq!(engine.service_name(), "dryrun");

        let outcome = engine.run(EditorAction::Generate {
            prompt: "a castle".to_string(),
            aspect_ratio: AspectRatio::Square,
        })?;
        assert!(matches!(outcome, Outcome::Committed(_)));
        assert_eq!(engine.session().mode(), EditorMode::Edit);
        assert_eq!(engine.session().prompts().entries(), &["a castle".to_string()]);

        let types = event_types(&temp.path().join("events.jsonl"))?;
        assert_eq!(types.first().map(String::as_str), Some("session_started"));
        assert!(types.iter().any(|kind| kind == "action_started"));
        assert!(types.iter().any(|kind| kind == "artifact_committed"));
        assert!(types.iter().any(|kind| kind == "state_changed"));
        Ok(())
    }

    #[test]
    fn prompts_persist_across_engines() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        {
            let mut engine = ImaginifyEngine::new(dryrun_config(temp.path()))?;
            engine.run(EditorAction::Generate {
                prompt: "a castle".to_string(),
                aspect_ratio: AspectRatio::Portrait,
            })?;
        }
        let engine = ImaginifyEngine::new(dryrun_config(temp.path()))?;
        assert_eq!(engine.session().prompts().get(0), Some("a castle"));
        Ok(())
    }

    #[test]
    fn service_failure_is_logged_and_recoverable() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut engine = ImaginifyEngine::with_parts(
            dryrun_config(temp.path()),
            Box::new(FailingService {
                calls: RefCell::new(0),
            }),
            Box::new(MemoryPromptStore::new()),
        )?;

        let rejected = engine.run(EditorAction::Upscale).unwrap_err();
        assert_eq!(
            rejected,
            SessionError::Validation("Please generate or upload an image first.".to_string())
        );

        let image = temp.path().join("in.png");
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::new(8, 8)).write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )?;
        fs::write(&image, bytes)?;
        engine.upload_file(&image, UploadTarget::Target)?;

        let err = engine.run(EditorAction::Upscale).unwrap_err();
        assert_eq!(
            err,
            SessionError::Service("Image upscaling failed to produce an image.".to_string())
        );
        assert!(!engine.session().is_busy());
        assert_eq!(engine.session().history().len(), 1);

        let types = event_types(&temp.path().join("events.jsonl"))?;
        assert!(types.iter().any(|kind| kind == "action_rejected"));
        assert!(types.iter().any(|kind| kind == "upload_committed"));
        assert!(types.iter().any(|kind| kind == "action_failed"));
        Ok(())
    }

    #[test]
    fn bad_upload_reports_decode_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut engine = ImaginifyEngine::new(dryrun_config(temp.path()))?;
        let err = engine
            .upload_file(&temp.path().join("missing.png"), UploadTarget::Target)
            .unwrap_err();
        assert!(matches!(err, SessionError::Decode(_)));
        assert!(err.to_string().starts_with("Failed to load image."));
        assert!(engine.session().current().is_none());
        Ok(())
    }

    #[test]
    fn download_requires_an_image() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut engine = ImaginifyEngine::new(dryrun_config(temp.path()))?;
        assert!(engine.download(DownloadFormat::Png, None).is_err());

        engine.run(EditorAction::Generate {
            prompt: "a castle".to_string(),
            aspect_ratio: AspectRatio::Landscape,
        })?;
        let path = engine.download(DownloadFormat::Png, None)?;
        assert!(path.starts_with(temp.path().join("downloads")));
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        assert_eq!(truncate_text("abc", 5), "abc");
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }
}
