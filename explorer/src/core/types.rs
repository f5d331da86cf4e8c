//! Shared deterministic types for the possibility-space search.
//!
//! These types define the contract between the session controller, the
//! legality oracle, and the search engine. They carry no I/O and must stay
//! deterministic across runs: the walkthrough key built here is the identity
//! of a search branch everywhere (progress store, checkpoints, archives).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Command recorded for the frame that represents the interpreter's opening
/// text, before any player input.
pub const OPENING_COMMAND: &str = "[game start]";

/// Classification of one executed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The interpreter rejected the command or it achieved nothing.
    Mistake,
    /// The game ended in failure.
    Failed,
    /// The game ended in lasting success.
    Success,
    /// An ordinary turn: the game state advanced and the search may recurse.
    Progress,
}

impl Outcome {
    /// Mistakes and failures terminate a branch without recursion.
    pub fn is_dead_end(self) -> bool {
        matches!(self, Outcome::Mistake | Outcome::Failed)
    }
}

/// One executed command plus everything scraped from the interpreter's
/// response to it.
///
/// Frames form the session's command-history chain, root first. Walking the
/// chain and concatenating the command fields reconstructs the walkthrough
/// that produced the current game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFrame {
    /// The command whose execution produced this frame.
    pub command: String,
    pub outcome: Outcome,
    /// Raw response text the classification was derived from.
    pub output: String,
    /// Room name detected in the response, when one was.
    pub room: Option<String>,
    /// Inventory captured right after the command, when per-turn capture is on.
    pub inventory: Option<Vec<String>>,
    /// In-game clock reading scraped from the status line, when configured.
    pub clock: Option<String>,
    /// Save-state artifact sufficient to restore the interpreter to exactly
    /// this frame. Absent for frames that ended the branch.
    pub checkpoint: Option<PathBuf>,
}

/// Read-only snapshot of session state handed to legality predicates.
///
/// Predicates receive this instead of the session itself so they stay pure
/// and independently testable.
#[derive(Debug, Clone, Copy)]
pub struct StateView<'a> {
    /// Current room, lowercase. `"[unknown]"` when no room has been detected.
    pub room: &'a str,
    /// Most recent inventory reading.
    pub inventory: &'a [String],
    /// Full frame chain, root first (the opening frame is `frames[0]`).
    pub frames: &'a [StateFrame],
}

impl<'a> StateView<'a> {
    /// Player commands executed so far, excluding the opening marker.
    pub fn commands(&self) -> impl Iterator<Item = &'a str> {
        self.frames
            .iter()
            .map(|f| f.command.as_str())
            .filter(|c| *c != OPENING_COMMAND)
    }

    pub fn command_count(&self) -> usize {
        self.commands().count()
    }

    /// The most recent player command, if any has been executed.
    pub fn last_command(&self) -> Option<&'a str> {
        self.commands().last()
    }

    /// Case-insensitive substring test against the inventory, so
    /// `has("batt")` matches "a battery" or "two batteries".
    pub fn has(&self, fragment: &str) -> bool {
        let fragment = fragment.to_lowercase();
        self.inventory
            .iter()
            .any(|item| item.to_lowercase().contains(&fragment))
    }

    /// True once `event` has appeared in the walkthrough text.
    pub fn walkthrough_contains(&self, event: &str) -> bool {
        let event = event.to_uppercase();
        self.walkthrough_key().contains(&event)
    }

    /// Canonical key for the current command sequence.
    pub fn walkthrough_key(&self) -> String {
        walkthrough_key(self.commands())
    }
}

/// Build the canonical textual key for a command sequence: the commands
/// uppercased and joined by `". "`, with a trailing period. The empty
/// sequence maps to the empty key.
pub fn walkthrough_key<'a, I>(commands: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let joined = commands
        .into_iter()
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join(". ");
    if joined.is_empty() {
        joined
    } else {
        joined + "."
    }
}

/// Number of commands a walkthrough key encodes.
pub fn key_elements(key: &str) -> usize {
    let trimmed = key.trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        0
    } else {
        trimmed.split(". ").count()
    }
}

/// True if `stored` (trailing separators stripped) is a strict prefix of
/// `queried` on a command boundary. Identical keys do not count.
pub fn is_strict_key_prefix(stored: &str, queried: &str) -> bool {
    if stored == queried {
        return false;
    }
    let stripped = stored.trim_end_matches(['.', ' ']);
    if stripped.is_empty() {
        // The empty key denotes the root; every non-empty key extends it.
        return !queried.is_empty();
    }
    match queried.strip_prefix(stripped) {
        // Requiring a separator right after the match keeps "GO N" from
        // claiming "GO NORTH." as a continuation.
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(command: &str) -> StateFrame {
        StateFrame {
            command: command.to_string(),
            outcome: Outcome::Progress,
            output: String::new(),
            room: None,
            inventory: None,
            clock: None,
            checkpoint: None,
        }
    }

    #[test]
    fn walkthrough_key_is_uppercase_with_trailing_period() {
        let key = walkthrough_key(["get battery", "go north"]);
        assert_eq!(key, "GET BATTERY. GO NORTH.");
    }

    #[test]
    fn walkthrough_key_of_no_commands_is_empty() {
        assert_eq!(walkthrough_key([]), "");
        assert_eq!(key_elements(""), 0);
    }

    #[test]
    fn key_elements_counts_commands_not_characters() {
        assert_eq!(key_elements("GO NORTH."), 1);
        assert_eq!(key_elements("GO NORTH. WAIT. GO SOUTH."), 3);
    }

    #[test]
    fn strict_prefix_requires_command_boundary() {
        assert!(is_strict_key_prefix("GO NORTH.", "GO NORTH. WAIT."));
        assert!(!is_strict_key_prefix("GO N.", "GO NORTH. WAIT."));
        assert!(!is_strict_key_prefix("GO NORTH.", "GO NORTH."));
        assert!(!is_strict_key_prefix("GO NORTH. WAIT.", "GO NORTH."));
    }

    #[test]
    fn empty_key_is_prefix_of_everything_but_itself() {
        assert!(is_strict_key_prefix("", "WAIT."));
        assert!(!is_strict_key_prefix("", ""));
    }

    #[test]
    fn view_skips_opening_marker_and_matches_inventory_fragments() {
        let frames = vec![frame(OPENING_COMMAND), frame("get battery"), frame("go north")];
        let inventory = vec!["a battery".to_string(), "your ID card".to_string()];
        let view = StateView {
            room: "foyer",
            inventory: &inventory,
            frames: &frames,
        };

        assert_eq!(view.command_count(), 2);
        assert_eq!(view.last_command(), Some("go north"));
        assert_eq!(view.walkthrough_key(), "GET BATTERY. GO NORTH.");
        assert!(view.has("BATT"));
        assert!(!view.has("timer"));
        assert!(view.walkthrough_contains("get battery"));
        assert!(!view.walkthrough_contains("press button"));
    }
}
