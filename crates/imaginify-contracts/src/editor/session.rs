use serde::Serialize;
use tracing::{debug, info};

use crate::artifact::Artifact;
use crate::options::{ArtStyle, AspectRatio, EditorMode};
use crate::prompts::PromptRecall;
use crate::service::{ActionKind, ImageService, ServiceError, ServiceRequest};

use super::history::ImageHistory;
use super::preview::{FaceSwapPreview, PreviewPhase};

const MISSING_PROMPT: &str = "Please enter a prompt.";
const MISSING_EDIT_INPUTS: &str = "Please upload an image and enter an edit prompt.";
const MISSING_IMAGE: &str = "Please generate or upload an image first.";
const MISSING_FACE_INPUTS: &str = "Please provide a target image and a source face image.";
const TARGET_LOAD_FAILED: &str = "Failed to load image.";
const FACE_LOAD_FAILED: &str = "Failed to load face image.";

#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    Generate {
        prompt: String,
        aspect_ratio: AspectRatio,
    },
    Edit {
        instruction: String,
    },
    Upscale,
    StyleTransfer {
        style: ArtStyle,
    },
    ReplaceFace,
}

impl EditorAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            EditorAction::Generate { .. } => ActionKind::Generate,
            EditorAction::Edit { .. } => ActionKind::Edit,
            EditorAction::Upscale => ActionKind::Upscale,
            EditorAction::StyleTransfer { .. } => ActionKind::StyleTransfer,
            EditorAction::ReplaceFace => ActionKind::ReplaceFace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadTarget {
    /// A new image to edit; pushed onto the history.
    Target,
    /// The face used by face replacement; kept beside the history.
    SourceFace,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),
    #[error("Another operation is still running.")]
    Busy,
    #[error("Accept or discard the face swap preview first.")]
    PreviewActive,
    #[error("There is no face swap preview to resolve.")]
    NoPreview,
    #[error("This result belongs to an operation that is no longer running.")]
    StaleCall,
    #[error("{0}")]
    Service(String),
    #[error("{0}")]
    Decode(String),
}

/// An operation that passed validation and holds the busy flag.
///
/// Hand it back to [`EditorSession::complete`] together with the service
/// result, or to [`EditorSession::abandon`].
#[derive(Debug)]
#[must_use = "an unfinished call keeps the session busy"]
pub struct PendingCall {
    ticket: u64,
    request: ServiceRequest,
}

impl PendingCall {
    pub fn request(&self) -> &ServiceRequest {
        &self.request
    }

    pub fn kind(&self) -> ActionKind {
        self.request.kind()
    }
}

#[derive(Debug)]
#[must_use = "an unfinished upload keeps the session busy"]
pub struct PendingUpload {
    ticket: u64,
    target: UploadTarget,
}

impl PendingUpload {
    pub fn target(&self) -> UploadTarget {
        self.target
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Committed(Artifact),
    PreviewReady(Artifact),
    SourceFaceSet(Artifact),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Action { ticket: u64, kind: ActionKind },
    Upload { ticket: u64, target: UploadTarget },
}

impl InFlight {
    fn ticket(self) -> u64 {
        match self {
            InFlight::Action { ticket, .. } | InFlight::Upload { ticket, .. } => ticket,
        }
    }

    fn label(self) -> &'static str {
        match self {
            InFlight::Action { kind, .. } => kind.as_str(),
            InFlight::Upload {
                target: UploadTarget::Target,
                ..
            } => "upload",
            InFlight::Upload {
                target: UploadTarget::SourceFace,
                ..
            } => "upload_face",
        }
    }
}

/// Point-in-time view handed to listeners after every state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub mode: EditorMode,
    pub busy: bool,
    pub in_flight: Option<&'static str>,
    pub preview: PreviewPhase,
    pub history_len: usize,
    pub current_index: Option<usize>,
    pub current_artifact: Option<String>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub has_source_face: bool,
    pub last_error: Option<String>,
    pub prompt_count: usize,
}

pub trait SessionListener: Send {
    fn on_change(&self, snapshot: &SessionSnapshot);
}

impl<F> SessionListener for F
where
    F: Fn(&SessionSnapshot) + Send,
{
    fn on_change(&self, snapshot: &SessionSnapshot) {
        self(snapshot)
    }
}

/// Single owner of all editor state.
///
/// At most one operation runs at a time. While a face swap preview is open
/// only [`EditorSession::accept_preview`] and
/// [`EditorSession::discard_preview`] may change anything.
pub struct EditorSession {
    history: ImageHistory,
    preview: FaceSwapPreview,
    prompts: PromptRecall,
    source_face: Option<Artifact>,
    mode: EditorMode,
    in_flight: Option<InFlight>,
    last_error: Option<String>,
    next_ticket: u64,
    listeners: Vec<Box<dyn SessionListener>>,
}

impl EditorSession {
    pub fn new(prompts: PromptRecall) -> Self {
        Self::with_history(prompts, ImageHistory::new())
    }

    pub fn with_history(prompts: PromptRecall, history: ImageHistory) -> Self {
        Self {
            history,
            preview: FaceSwapPreview::new(),
            prompts,
            source_face: None,
            mode: EditorMode::default(),
            in_flight: None,
            last_error: None,
            next_ticket: 1,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl SessionListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn history(&self) -> &ImageHistory {
        &self.history
    }

    pub fn preview(&self) -> &FaceSwapPreview {
        &self.preview
    }

    pub fn prompts(&self) -> &PromptRecall {
        &self.prompts
    }

    pub fn current(&self) -> Option<&Artifact> {
        self.history.current()
    }

    pub fn source_face(&self) -> Option<&Artifact> {
        self.source_face.as_ref()
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            busy: self.is_busy(),
            in_flight: self.in_flight.map(InFlight::label),
            preview: self.preview.phase(),
            history_len: self.history.len(),
            current_index: self.history.current_index(),
            current_artifact: self.history.current().map(Artifact::id),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            has_source_face: self.source_face.is_some(),
            last_error: self.last_error.clone(),
            prompt_count: self.prompts.len(),
        }
    }

    /// Validates `action`, records its prompt and takes the busy flag.
    pub fn begin(&mut self, action: EditorAction) -> Result<PendingCall, SessionError> {
        self.ensure_idle()?;
        let kind = action.kind();
        let request = match self.build_request(action) {
            Ok(request) => request,
            Err(err) => return Err(self.fail(err)),
        };

        match &request {
            ServiceRequest::Generate { prompt, .. } => {
                self.prompts.record(prompt);
            }
            ServiceRequest::Edit { instruction, .. } => {
                self.prompts.record(instruction);
            }
            ServiceRequest::ReplaceFace { target, .. } => {
                self.preview.start(target.clone());
            }
            _ => {}
        }

        let ticket = self.take_ticket();
        self.in_flight = Some(InFlight::Action { ticket, kind });
        self.last_error = None;
        info!(action = kind.as_str(), ticket, "dispatching image action");
        self.notify();
        Ok(PendingCall { ticket, request })
    }

    /// Applies the service result for `call` and releases the busy flag.
    pub fn complete(
        &mut self,
        call: PendingCall,
        result: Result<Artifact, ServiceError>,
    ) -> Result<Outcome, SessionError> {
        match self.in_flight {
            Some(flight @ InFlight::Action { .. }) if flight.ticket() == call.ticket => {}
            _ => return Err(SessionError::StaleCall),
        }
        self.in_flight = None;
        let kind = call.kind();

        let outcome = match result {
            Ok(artifact) if kind == ActionKind::ReplaceFace => {
                self.preview.ready(artifact.clone());
                Ok(Outcome::PreviewReady(artifact))
            }
            Ok(artifact) => {
                self.history.push(artifact.clone());
                if kind == ActionKind::Generate {
                    self.mode = EditorMode::Edit;
                }
                Ok(Outcome::Committed(artifact))
            }
            Err(err) => {
                if kind == ActionKind::ReplaceFace {
                    self.preview.fail();
                }
                debug!(action = kind.as_str(), "image action failed: {err}");
                let err = SessionError::Service(err.message().to_string());
                self.last_error = Some(err.to_string());
                Err(err)
            }
        };
        self.notify();
        outcome
    }

    pub fn dispatch(
        &mut self,
        action: EditorAction,
        service: &dyn ImageService,
    ) -> Result<Outcome, SessionError> {
        let call = self.begin(action)?;
        let result = service.run(call.request());
        self.complete(call, result)
    }

    /// Gives up on `call` without a result: busy clears, a pending face swap
    /// preview is dropped and nothing else changes.
    pub fn abandon(&mut self, call: PendingCall) -> Result<(), SessionError> {
        match self.in_flight {
            Some(flight @ InFlight::Action { .. }) if flight.ticket() == call.ticket => {}
            _ => return Err(SessionError::StaleCall),
        }
        self.in_flight = None;
        if call.kind() == ActionKind::ReplaceFace {
            self.preview.fail();
        }
        debug!(action = call.kind().as_str(), "image action abandoned");
        self.notify();
        Ok(())
    }

    pub fn begin_upload(&mut self, target: UploadTarget) -> Result<PendingUpload, SessionError> {
        self.ensure_idle()?;
        let ticket = self.take_ticket();
        self.in_flight = Some(InFlight::Upload { ticket, target });
        self.last_error = None;
        self.notify();
        Ok(PendingUpload { ticket, target })
    }

    /// Finishes an upload with the decoded file, or the decoding failure.
    pub fn complete_upload(
        &mut self,
        upload: PendingUpload,
        decoded: Result<Artifact, String>,
    ) -> Result<Outcome, SessionError> {
        match self.in_flight {
            Some(flight @ InFlight::Upload { .. }) if flight.ticket() == upload.ticket => {}
            _ => return Err(SessionError::StaleCall),
        }
        self.in_flight = None;

        let outcome = match (upload.target, decoded) {
            (UploadTarget::Target, Ok(artifact)) => {
                self.history.push(artifact.clone());
                self.mode = EditorMode::Edit;
                Ok(Outcome::Committed(artifact))
            }
            (UploadTarget::SourceFace, Ok(artifact)) => {
                self.source_face = Some(artifact.clone());
                Ok(Outcome::SourceFaceSet(artifact))
            }
            (target, Err(detail)) => {
                let headline = match target {
                    UploadTarget::Target => TARGET_LOAD_FAILED,
                    UploadTarget::SourceFace => FACE_LOAD_FAILED,
                };
                let message = if detail.trim().is_empty() {
                    headline.to_string()
                } else {
                    format!("{headline} {}", detail.trim())
                };
                let err = SessionError::Decode(message);
                self.last_error = Some(err.to_string());
                Err(err)
            }
        };
        self.notify();
        outcome
    }

    pub fn abandon_upload(&mut self, upload: PendingUpload) -> Result<(), SessionError> {
        match self.in_flight {
            Some(flight @ InFlight::Upload { .. }) if flight.ticket() == upload.ticket => {}
            _ => return Err(SessionError::StaleCall),
        }
        self.in_flight = None;
        self.notify();
        Ok(())
    }

    pub fn upload(
        &mut self,
        target: UploadTarget,
        decoded: Result<Artifact, String>,
    ) -> Result<Outcome, SessionError> {
        let pending = self.begin_upload(target)?;
        self.complete_upload(pending, decoded)
    }

    pub fn accept_preview(&mut self) -> Result<Artifact, SessionError> {
        let Some(after) = self.preview.take_ready() else {
            return Err(SessionError::NoPreview);
        };
        self.history.push(after.clone());
        info!(artifact = %after.id(), "face swap accepted");
        self.notify();
        Ok(after)
    }

    pub fn discard_preview(&mut self) -> Result<(), SessionError> {
        if !self.preview.discard() {
            return Err(SessionError::NoPreview);
        }
        info!("face swap discarded");
        self.notify();
        Ok(())
    }

    pub fn undo(&mut self) -> Result<bool, SessionError> {
        self.ensure_idle()?;
        let moved = self.history.undo();
        if moved {
            self.notify();
        }
        Ok(moved)
    }

    pub fn redo(&mut self) -> Result<bool, SessionError> {
        self.ensure_idle()?;
        let moved = self.history.redo();
        if moved {
            self.notify();
        }
        Ok(moved)
    }

    pub fn set_mode(&mut self, mode: EditorMode) -> Result<(), SessionError> {
        self.ensure_idle()?;
        if self.mode != mode {
            self.mode = mode;
            self.notify();
        }
        Ok(())
    }

    /// Back to the prompt page; history and source face are kept.
    pub fn go_to_prompt(&mut self) -> Result<(), SessionError> {
        self.set_mode(EditorMode::Generate)
    }

    pub fn clear_source_face(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        if self.source_face.take().is_some() {
            self.notify();
        }
        Ok(())
    }

    pub fn clear_error(&mut self) {
        if self.last_error.take().is_some() {
            self.notify();
        }
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.in_flight.is_some() {
            return Err(SessionError::Busy);
        }
        if self.preview.is_active() {
            return Err(SessionError::PreviewActive);
        }
        Ok(())
    }

    fn build_request(&self, action: EditorAction) -> Result<ServiceRequest, SessionError> {
        let current = self.history.current().cloned();
        match action {
            EditorAction::Generate {
                prompt,
                aspect_ratio,
            } => {
                if prompt.trim().is_empty() {
                    return Err(SessionError::Validation(MISSING_PROMPT.to_string()));
                }
                Ok(ServiceRequest::Generate {
                    prompt,
                    aspect_ratio,
                })
            }
            EditorAction::Edit { instruction } => match current {
                Some(image) if !instruction.trim().is_empty() => {
                    Ok(ServiceRequest::Edit { image, instruction })
                }
                _ => Err(SessionError::Validation(MISSING_EDIT_INPUTS.to_string())),
            },
            EditorAction::Upscale => current
                .map(|image| ServiceRequest::Upscale { image })
                .ok_or_else(|| SessionError::Validation(MISSING_IMAGE.to_string())),
            EditorAction::StyleTransfer { style } => current
                .map(|image| ServiceRequest::StyleTransfer { image, style })
                .ok_or_else(|| SessionError::Validation(MISSING_IMAGE.to_string())),
            EditorAction::ReplaceFace => match (current, self.source_face.clone()) {
                (Some(target), Some(source_face)) => Ok(ServiceRequest::ReplaceFace {
                    target,
                    source_face,
                }),
                _ => Err(SessionError::Validation(MISSING_FACE_INPUTS.to_string())),
            },
        }
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        self.last_error = Some(err.to_string());
        self.notify();
        err
    }

    fn take_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    fn notify(&self) {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for listener in &self.listeners {
            listener.on_change(&snapshot);
        }
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}
