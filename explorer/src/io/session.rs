//! Session abstraction between the search engine and an interpreter backend.
//!
//! The [`Session`] trait decouples the search from the process actually
//! playing the game (currently a dfrotz child, [`crate::io::terp`]). Tests
//! drive the engine against a scripted in-memory game instead of a real
//! interpreter.

use anyhow::Result;

use crate::core::types::{StateFrame, StateView, walkthrough_key};

/// Contract the search engine consumes. The interpreter subprocess and its
/// save artifacts are exclusively owned by the implementation; the engine
/// only ever touches them through these methods.
pub trait Session {
    /// Opaque handle that restores the backend to an earlier state.
    type Checkpoint: Clone;

    /// Read-only snapshot of the current state for legality predicates.
    fn view(&self) -> StateView<'_>;

    /// The frame chain, root first (opening frame included).
    fn frames(&self) -> &[StateFrame];

    /// Checkpoint already attached to the current frame, when the backend
    /// captured one while executing the last command.
    fn current_checkpoint(&self) -> Option<Self::Checkpoint>;

    /// Capture a checkpoint of the current state.
    fn save_state(&mut self) -> Result<Self::Checkpoint>;

    /// Execute one command, classify the response, and append the resulting
    /// frame to the chain. An `Err` here means the backend's state is of
    /// unknown integrity; callers must treat it as fatal.
    fn make_single_move(&mut self, command: &str) -> Result<StateFrame>;

    /// Roll the backend back to `checkpoint`. Does not touch the frame
    /// chain; callers pair this with [`Session::drop_last_frame`].
    fn restore_to(&mut self, checkpoint: &Self::Checkpoint) -> Result<()>;

    /// Discard the most recent frame.
    fn drop_last_frame(&mut self);

    /// End the session cleanly, releasing the backend.
    fn end(&mut self) -> Result<()>;

    /// Player commands executed so far, oldest first.
    fn list_walkthrough(&self) -> Vec<String> {
        self.view().commands().map(str::to_string).collect()
    }

    /// The canonical walkthrough key for the current state; doubles as the
    /// terse human-readable walkthrough.
    fn text_walkthrough(&self) -> String {
        walkthrough_key(self.view().commands())
    }
}
