use serde::Serialize;

use crate::artifact::Artifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewPhase {
    Idle,
    Pending,
    Ready,
}

#[derive(Debug, Clone, Default)]
enum PreviewState {
    #[default]
    Idle,
    Pending {
        before: Artifact,
    },
    Ready {
        before: Artifact,
        after: Artifact,
    },
}

/// Accept/discard gate for face replacement results.
///
/// `Idle -> Pending -> Ready -> Idle`, with `Pending -> Idle` on failure and
/// `Ready -> Idle` on either commit or discard. Every other transition is
/// refused and leaves the state untouched.
#[derive(Debug, Clone, Default)]
pub struct FaceSwapPreview {
    state: PreviewState,
}

impl FaceSwapPreview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> PreviewPhase {
        match self.state {
            PreviewState::Idle => PreviewPhase::Idle,
            PreviewState::Pending { .. } => PreviewPhase::Pending,
            PreviewState::Ready { .. } => PreviewPhase::Ready,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, PreviewState::Idle)
    }

    pub fn before(&self) -> Option<&Artifact> {
        match &self.state {
            PreviewState::Idle => None,
            PreviewState::Pending { before } | PreviewState::Ready { before, .. } => Some(before),
        }
    }

    pub fn after(&self) -> Option<&Artifact> {
        match &self.state {
            PreviewState::Ready { after, .. } => Some(after),
            _ => None,
        }
    }

    pub(crate) fn start(&mut self, before: Artifact) -> bool {
        if self.is_active() {
            return false;
        }
        self.state = PreviewState::Pending { before };
        true
    }

    pub(crate) fn ready(&mut self, after: Artifact) -> bool {
        match std::mem::take(&mut self.state) {
            PreviewState::Pending { before } => {
                self.state = PreviewState::Ready { before, after };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Drops a pending request after the service failed.
    pub(crate) fn fail(&mut self) -> bool {
        if matches!(self.state, PreviewState::Pending { .. }) {
            self.state = PreviewState::Idle;
            return true;
        }
        false
    }

    /// Returns the candidate to commit and resets to idle.
    pub(crate) fn take_ready(&mut self) -> Option<Artifact> {
        match std::mem::take(&mut self.state) {
            PreviewState::Ready { after, .. } => Some(after),
            other => {
                self.state = other;
                None
            }
        }
    }

    pub(crate) fn discard(&mut self) -> bool {
        if matches!(self.state, PreviewState::Ready { .. }) {
            self.state = PreviewState::Idle;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use crate::artifact::Artifact;

    use super::{FaceSwapPreview, PreviewPhase};

    fn art(tag: &str) -> Artifact {
        Artifact::new(tag.as_bytes().to_vec(), "image/png")
    }

    #[test]
    fn commit_path_walks_every_phase() {
        let mut preview = FaceSwapPreview::new();
        assert_eq!(preview.phase(), PreviewPhase::Idle);
        assert!(preview.start(art("before")));
        assert_eq!(preview.phase(), PreviewPhase::Pending);
        assert_eq!(preview.before(), Some(&art("before")));
        assert!(preview.after().is_none());

        assert!(preview.ready(art("after")));
        assert_eq!(preview.phase(), PreviewPhase::Ready);
        assert_eq!(preview.after(), Some(&art("after")));

        assert_eq!(preview.take_ready(), Some(art("after")));
        assert_eq!(preview.phase(), PreviewPhase::Idle);
        assert!(preview.before().is_none());
    }

    #[test]
    fn discard_only_resolves_ready_previews() {
        let mut preview = FaceSwapPreview::new();
        assert!(!preview.discard());
        preview.start(art("before"));
        assert!(!preview.discard());
        assert_eq!(preview.phase(), PreviewPhase::Pending);
        preview.ready(art("after"));
        assert!(preview.discard());
        assert_eq!(preview.phase(), PreviewPhase::Idle);
    }

    #[test]
    fn refused_transitions_leave_state_untouched() {
        let mut preview = FaceSwapPreview::new();
        assert!(!preview.ready(art("stray")));
        assert!(preview.take_ready().is_none());
        assert!(!preview.fail());
        assert_eq!(preview.phase(), PreviewPhase::Idle);

        preview.start(art("before"));
        assert!(!preview.start(art("again")));
        assert!(preview.take_ready().is_none());
        assert_eq!(preview.before(), Some(&art("before")));

        assert!(preview.fail());
        assert_eq!(preview.phase(), PreviewPhase::Idle);
    }
}
