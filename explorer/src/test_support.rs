//! Test-only session backend: a tiny deterministic game in memory.
//!
//! [`ToySession`] implements [`Session`] over a hand-built room graph with a
//! turn limit and a win condition, so engine behavior (exhaustiveness,
//! determinism, resumption) can be asserted without an interpreter binary.

use std::collections::BTreeMap;

use anyhow::{Result, bail};

use crate::core::types::{OPENING_COMMAND, Outcome, StateFrame, StateView};
use crate::io::session::Session;

/// Deterministic world definition for a scripted game.
#[derive(Debug, Clone)]
pub struct ToyWorld {
    pub start: String,
    pub win_room: String,
    /// Reaching the win room counts only with at least this many moves taken.
    pub min_moves_to_win: usize,
    /// A move beyond this many total moves loses the game.
    pub turn_limit: usize,
    transitions: BTreeMap<(String, String), String>,
    poison_command: Option<String>,
}

impl ToyWorld {
    pub fn new(
        start: impl Into<String>,
        win_room: impl Into<String>,
        min_moves_to_win: usize,
        turn_limit: usize,
    ) -> Self {
        Self {
            start: start.into(),
            win_room: win_room.into(),
            min_moves_to_win,
            turn_limit,
            transitions: BTreeMap::new(),
            poison_command: None,
        }
    }

    /// Declare that `command` in `from` leads to `to`.
    pub fn transition(
        mut self,
        from: impl Into<String>,
        command: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.transitions
            .insert((from.into(), command.into()), to.into());
        self
    }

    /// Declare a command whose execution errors out, for integrity-failure
    /// tests.
    pub fn poison(mut self, command: impl Into<String>) -> Self {
        self.poison_command = Some(command.into());
        self
    }
}

/// In-memory checkpoint: the toy game's whole state is its room.
#[derive(Debug, Clone)]
pub struct ToyCheckpoint {
    room: String,
}

/// Scripted [`Session`] over a [`ToyWorld`].
#[derive(Debug)]
pub struct ToySession {
    world: ToyWorld,
    room: String,
    frames: Vec<StateFrame>,
    inventory: Vec<String>,
    /// Every executed command as `"room:command"`, for determinism
    /// assertions.
    pub executed: Vec<String>,
}

impl ToySession {
    pub fn new(world: ToyWorld) -> Self {
        let room = world.start.clone();
        let opening = StateFrame {
            command: OPENING_COMMAND.to_string(),
            outcome: Outcome::Progress,
            output: format!("You are in {room}."),
            room: Some(room.clone()),
            inventory: Some(Vec::new()),
            clock: None,
            checkpoint: None,
        };
        Self {
            world,
            room,
            frames: vec![opening],
            inventory: Vec::new(),
            executed: Vec::new(),
        }
    }
}

impl Session for ToySession {
    type Checkpoint = ToyCheckpoint;

    fn view(&self) -> StateView<'_> {
        StateView {
            room: &self.room,
            inventory: &self.inventory,
            frames: &self.frames,
        }
    }

    fn frames(&self) -> &[StateFrame] {
        &self.frames
    }

    fn current_checkpoint(&self) -> Option<ToyCheckpoint> {
        Some(ToyCheckpoint {
            room: self.room.clone(),
        })
    }

    fn save_state(&mut self) -> Result<ToyCheckpoint> {
        Ok(ToyCheckpoint {
            room: self.room.clone(),
        })
    }

    fn make_single_move(&mut self, command: &str) -> Result<StateFrame> {
        if self.world.poison_command.as_deref() == Some(command) {
            bail!("toy interpreter crashed on command {command:?}");
        }
        self.executed.push(format!("{}:{command}", self.room));

        // Opening frame plus prior commands, plus this one.
        let moves_after = self.frames.len();
        let destination = self
            .world
            .transitions
            .get(&(self.room.clone(), command.to_string()))
            .cloned();

        let (outcome, output) = match destination {
            None => (
                Outcome::Mistake,
                "There is no obvious way to do that.".to_string(),
            ),
            Some(dest) => {
                if moves_after > self.world.turn_limit {
                    (Outcome::Failed, "*** Time has run out ***".to_string())
                } else if dest == self.world.win_room && moves_after >= self.world.min_moves_to_win
                {
                    self.room = dest;
                    (Outcome::Success, "*** You have won ***".to_string())
                } else {
                    self.room = dest.clone();
                    (Outcome::Progress, format!("You are in {dest}."))
                }
            }
        };

        let frame = StateFrame {
            command: command.to_string(),
            outcome,
            output,
            room: Some(self.room.clone()),
            inventory: Some(self.inventory.clone()),
            clock: None,
            checkpoint: None,
        };
        self.frames.push(frame.clone());
        Ok(frame)
    }

    fn restore_to(&mut self, checkpoint: &ToyCheckpoint) -> Result<()> {
        self.room = checkpoint.room.clone();
        Ok(())
    }

    fn drop_last_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_classify_against_the_world() {
        let world = ToyWorld::new("a", "c", 2, 3)
            .transition("a", "go north", "b")
            .transition("b", "go north", "c");
        let mut session = ToySession::new(world);

        let frame = session.make_single_move("go north").expect("move");
        assert_eq!(frame.outcome, Outcome::Progress);
        assert_eq!(session.view().room, "b");

        let frame = session.make_single_move("go north").expect("move");
        assert_eq!(frame.outcome, Outcome::Success);

        let frame = session.make_single_move("dance").expect("move");
        assert_eq!(frame.outcome, Outcome::Mistake);
    }

    #[test]
    fn restore_and_drop_rewind_the_session() {
        let world = ToyWorld::new("a", "c", 5, 9).transition("a", "go north", "b");
        let mut session = ToySession::new(world);
        let checkpoint = session.save_state().expect("save");

        session.make_single_move("go north").expect("move");
        assert_eq!(session.view().room, "b");

        session.restore_to(&checkpoint).expect("restore");
        session.drop_last_frame();
        assert_eq!(session.view().room, "a");
        assert_eq!(session.text_walkthrough(), "");
    }
}
