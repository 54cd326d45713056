mod history;
mod preview;
mod session;

pub use history::ImageHistory;
pub use preview::{FaceSwapPreview, PreviewPhase};
pub use session::{
    EditorAction, EditorSession, Outcome, PendingCall, PendingUpload, SessionError,
    SessionListener, SessionSnapshot, UploadTarget,
};
