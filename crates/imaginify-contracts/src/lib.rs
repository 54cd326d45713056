pub mod artifact;
pub mod chat;
pub mod editor;
pub mod events;
pub mod options;
pub mod prompts;
pub mod service;

pub use artifact::Artifact;
pub use editor::{EditorAction, EditorSession, ImageHistory, Outcome, SessionError};
pub use options::{ArtStyle, AspectRatio, EditorMode};
pub use service::{ActionKind, ImageService, ServiceError, ServiceRequest};
