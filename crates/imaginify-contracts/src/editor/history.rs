use crate::artifact::Artifact;

/// Linear undo/redo stack of artifacts.
///
/// Pushing after an undo drops every entry past the current position, so the
/// history never branches.
#[derive(Debug, Clone, Default)]
pub struct ImageHistory {
    entries: Vec<Artifact>,
    current: Option<usize>,
}

impl ImageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the stack; the last entry becomes current.
    pub fn with_entries(entries: Vec<Artifact>) -> Self {
        let current = entries.len().checked_sub(1);
        Self { entries, current }
    }

    pub fn push(&mut self, artifact: Artifact) {
        let keep = self.current.map(|index| index + 1).unwrap_or(0);
        self.entries.truncate(keep);
        self.entries.push(artifact);
        self.current = Some(self.entries.len() - 1);
    }

    pub fn undo(&mut self) -> bool {
        match self.current {
            Some(index) if index > 0 => {
                self.current = Some(index - 1);
                true
            }
            _ => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.current {
            Some(index) if index + 1 < self.entries.len() => {
                self.current = Some(index + 1);
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&Artifact> {
        self.current.and_then(|index| self.entries.get(index))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn can_undo(&self) -> bool {
        self.current.map(|index| index > 0).unwrap_or(false)
    }

    pub fn can_redo(&self) -> bool {
        self.current
            .map(|index| index + 1 < self.entries.len())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Artifact] {
        self.entries.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use crate::artifact::Artifact;

    use super::ImageHistory;

    fn art(tag: &str) -> Artifact {
        Artifact::new(tag.as_bytes().to_vec(), "image/png")
    }

    fn assert_bounds(history: &ImageHistory) {
        match history.current_index() {
            None => {
                assert!(history.is_empty());
                assert!(!history.can_undo());
                assert!(!history.can_redo());
            }
            Some(index) => {
                assert!(index < history.len());
                assert_eq!(history.can_undo(), index > 0);
                assert_eq!(history.can_redo(), index < history.len() - 1);
            }
        }
    }

    #[test]
    fn empty_history_is_inert() {
        let mut history = ImageHistory::new();
        assert!(history.current().is_none());
        assert_eq!(history.current_index(), None);
        assert!(!history.undo());
        assert!(!history.redo());
        assert_bounds(&history);
    }

    #[test]
    fn push_undo_push_discards_redo_branch() {
        let mut history = ImageHistory::new();
        history.push(art("a"));
        history.push(art("b"));
        assert_eq!(history.current(), Some(&art("b")));
        assert_eq!(history.current_index(), Some(1));
        assert!(history.can_undo());
        assert!(!history.can_redo());

        assert!(history.undo());
        assert_eq!(history.current(), Some(&art("a")));
        assert!(!history.can_undo());
        assert!(history.can_redo());

        history.push(art("c"));
        assert_eq!(history.entries(), &[art("a"), art("c")]);
        assert_eq!(history.current_index(), Some(1));
        assert!(!history.redo());
        assert_eq!(history.current(), Some(&art("c")));
    }

    #[test]
    fn undo_and_redo_clamp_at_edges() {
        let mut history = ImageHistory::with_entries(vec![art("a"), art("b"), art("c")]);
        assert_eq!(history.current_index(), Some(2));
        assert!(!history.redo());
        assert!(history.undo());
        assert!(history.undo());
        assert!(!history.undo());
        assert_eq!(history.current_index(), Some(0));
        assert!(history.redo());
        assert_eq!(history.current(), Some(&art("b")));
    }

    #[test]
    fn push_after_multiple_undos_drops_everything_after_current() {
        let mut history = ImageHistory::new();
        for tag in ["a", "b", "c", "d"] {
            history.push(art(tag));
        }
        history.undo();
        history.undo();
        history.undo();
        history.push(art("e"));
        assert_eq!(history.entries(), &[art("a"), art("e")]);
        assert!(!history.can_redo());
    }

    #[test]
    fn index_stays_in_bounds_over_mixed_operations() {
        let mut history = ImageHistory::new();
        // Deterministic pseudo-random walk over push/undo/redo.
        let mut state: u32 = 0x9e37_79b9;
        for step in 0..500u32 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            match state % 3 {
                0 => history.push(art(&format!("img-{step}"))),
                1 => {
                    history.undo();
                }
                _ => {
                    history.redo();
                }
            }
            assert_bounds(&history);
        }
    }
}
