//! # Reveal Sequencer
//!
//! Drives the multi-winner reveal workflow: one winner shown at a time,
//! with explicit states. The sequencer is a pure controller over an
//! ordered list; it holds no randomness and performs no I/O. Time-gating
//! of the Drawing -> Revealed transition belongs to the caller (the
//! controller sleeps out the animation), never to the sequencer choosing
//! a winner: winners are fixed at draw time.

use crate::errors::DrawError;
use crate::models::Attendee;

/// Workflow states for the active batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawingState {
    /// No active draw; the entry point.
    Idle,
    /// A batch has been chosen; the current winner's reveal animation is
    /// running.
    Drawing,
    /// The current winner is shown; the operator decides what happens
    /// next.
    Revealed,
    /// Terminal for this batch; a new batch may be started.
    Confirmed,
}

/// Controller over the drawn batch and the position of the reveal.
pub struct RevealSequencer {
    state: DrawingState,
    batch: Vec<Attendee>,
    index: usize,
}

impl Default for RevealSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl RevealSequencer {
    pub fn new() -> Self {
        Self {
            state: DrawingState::Idle,
            batch: Vec::new(),
            index: 0,
        }
    }

    pub fn state(&self) -> DrawingState {
        self.state
    }

    /// The full batch in reveal order.
    pub fn batch(&self) -> &[Attendee] {
        &self.batch
    }

    /// Zero-based position of the current winner within the batch.
    pub fn current_index(&self) -> usize {
        self.index
    }

    /// The winner currently being animated or shown.
    pub fn current_winner(&self) -> Option<&Attendee> {
        if self.state == DrawingState::Idle {
            return None;
        }
        self.batch.get(self.index)
    }

    /// Whether winners beyond the current one remain in the batch.
    pub fn has_next(&self) -> bool {
        self.index + 1 < self.batch.len()
    }

    /// Accepts a freshly drawn batch of 1..N winners and enters
    /// `Drawing` on its first member.
    pub fn begin(&mut self, batch: Vec<Attendee>) -> Result<(), DrawError> {
        if self.state != DrawingState::Idle {
            return Err(DrawError::InvalidTransition(
                "a draw can only start from the idle state",
            ));
        }
        if batch.is_empty() {
            return Err(DrawError::EmptyPoolOrOutOfStock);
        }
        self.batch = batch;
        self.index = 0;
        self.state = DrawingState::Drawing;
        Ok(())
    }

    /// Marks the current winner's animation as finished.
    pub fn mark_revealed(&mut self) -> Result<&Attendee, DrawError> {
        if self.state != DrawingState::Drawing {
            return Err(DrawError::InvalidTransition(
                "only an in-progress animation can be revealed",
            ));
        }
        self.state = DrawingState::Revealed;
        Ok(&self.batch[self.index])
    }

    /// Advances to the next winner in the batch, re-entering `Drawing`
    /// so the next reveal animation can run.
    pub fn advance(&mut self) -> Result<&Attendee, DrawError> {
        if self.state != DrawingState::Revealed {
            return Err(DrawError::InvalidTransition(
                "advancing requires the current winner to be revealed",
            ));
        }
        if !self.has_next() {
            return Err(DrawError::InvalidTransition(
                "no further winners remain in this batch",
            ));
        }
        self.index += 1;
        self.state = DrawingState::Drawing;
        Ok(&self.batch[self.index])
    }

    /// Confirms the full batch. Only legal once the batch is revealed.
    pub fn confirm(&mut self) -> Result<&[Attendee], DrawError> {
        if self.state != DrawingState::Revealed {
            return Err(DrawError::InvalidTransition(
                "confirmation requires a revealed batch",
            ));
        }
        self.state = DrawingState::Confirmed;
        Ok(&self.batch)
    }

    /// Abandons the batch and returns to `Idle`. Legal from any state.
    /// Never mutates persisted eligibility or stock; only an explicit
    /// confirm or redraw does that.
    pub fn reset(&mut self) -> Vec<Attendee> {
        self.state = DrawingState::Idle;
        self.index = 0;
        std::mem::take(&mut self.batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(ids: &[&str]) -> Vec<Attendee> {
        ids.iter()
            .map(|id| Attendee {
                id: id.to_string(),
                name: id.to_uppercase(),
                organization: String::new(),
                avatar: String::new(),
                checked_in: true,
                is_eligible: true,
            })
            .collect()
    }

    #[test]
    fn happy_path_through_a_two_winner_batch() {
        let mut seq = RevealSequencer::new();
        assert_eq!(seq.state(), DrawingState::Idle);
        assert!(seq.current_winner().is_none());

        seq.begin(batch(&["a", "b"])).unwrap();
        assert_eq!(seq.state(), DrawingState::Drawing);
        assert_eq!(seq.current_winner().unwrap().id, "a");

        assert_eq!(seq.mark_revealed().unwrap().id, "a");
        assert!(seq.has_next());

        assert_eq!(seq.advance().unwrap().id, "b");
        assert_eq!(seq.state(), DrawingState::Drawing);
        seq.mark_revealed().unwrap();
        assert!(!seq.has_next());

        let confirmed = seq.confirm().unwrap();
        assert_eq!(confirmed.len(), 2);
        assert_eq!(seq.state(), DrawingState::Confirmed);
    }

    #[test]
    fn begin_rejects_active_batches_and_empty_ones() {
        let mut seq = RevealSequencer::new();
        assert!(matches!(
            seq.begin(Vec::new()),
            Err(DrawError::EmptyPoolOrOutOfStock)
        ));

        seq.begin(batch(&["a"])).unwrap();
        assert!(matches!(
            seq.begin(batch(&["b"])),
            Err(DrawError::InvalidTransition(_))
        ));
    }

    #[test]
    fn confirm_requires_a_revealed_winner() {
        let mut seq = RevealSequencer::new();
        seq.begin(batch(&["a"])).unwrap();
        assert!(matches!(seq.confirm(), Err(DrawError::InvalidTransition(_))));
        seq.mark_revealed().unwrap();
        assert!(seq.confirm().is_ok());
    }

    #[test]
    fn advance_past_the_last_winner_is_rejected() {
        let mut seq = RevealSequencer::new();
        seq.begin(batch(&["a"])).unwrap();
        seq.mark_revealed().unwrap();
        assert!(matches!(seq.advance(), Err(DrawError::InvalidTransition(_))));
    }

    #[test]
    fn reset_abandons_any_state_and_returns_the_batch() {
        let mut seq = RevealSequencer::new();
        seq.begin(batch(&["a", "b"])).unwrap();
        seq.mark_revealed().unwrap();

        let abandoned = seq.reset();
        assert_eq!(abandoned.len(), 2);
        assert_eq!(seq.state(), DrawingState::Idle);
        assert!(seq.batch().is_empty());
        assert!(seq.current_winner().is_none());
    }
}
