//! Legality oracle: per-command predicate rules that prune the move tree.
//!
//! Each rule pairs a command with a conjunction of small pure predicates.
//! The oracle is advisory pruning only: a predicate may reject a command
//! solely for reasons derivable from the game's own rules, because every
//! false negative silently and permanently shrinks the explored space.
//! Predicates read an explicit [`StateView`] snapshot and never mutate
//! anything.

use std::collections::BTreeMap;

use crate::core::types::StateView;

/// Compass and vertical directions a movement command can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// The command text the rule table uses for this direction.
    pub fn command(self) -> &'static str {
        match self {
            Direction::North => "go north",
            Direction::South => "go south",
            Direction::East => "go east",
            Direction::West => "go west",
            Direction::Up => "go up",
            Direction::Down => "go down",
        }
    }

    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            "go north" => Some(Direction::North),
            "go south" => Some(Direction::South),
            "go east" => Some(Direction::East),
            "go west" => Some(Direction::West),
            "go up" => Some(Direction::Up),
            "go down" => Some(Direction::Down),
            _ => None,
        }
    }
}

/// Static description of one room.
#[derive(Debug, Clone)]
pub struct Room {
    /// Whether the room offers somewhere to hide. Movement filters allow an
    /// immediate reversal only into rooms that do.
    pub hideable: bool,
    /// Exits as (direction, destination room) pairs.
    pub exits: Vec<(Direction, String)>,
}

/// The game map consulted by movement predicates, keyed by lowercase room
/// name.
#[derive(Debug, Clone, Default)]
pub struct WorldMap {
    rooms: BTreeMap<String, Room>,
}

impl WorldMap {
    pub fn new<I>(rooms: I) -> Self
    where
        I: IntoIterator<Item = (String, Room)>,
    {
        Self {
            rooms: rooms
                .into_iter()
                .map(|(name, room)| (name.to_lowercase(), room))
                .collect(),
        }
    }

    pub fn contains(&self, room: &str) -> bool {
        self.rooms.contains_key(&room.to_lowercase())
    }

    pub fn room_names(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }

    pub fn has_exit(&self, room: &str, direction: Direction) -> bool {
        self.rooms
            .get(&room.to_lowercase())
            .is_some_and(|r| r.exits.iter().any(|(d, _)| *d == direction))
    }

    pub fn hideable(&self, room: &str) -> bool {
        self.rooms
            .get(&room.to_lowercase())
            .is_some_and(|r| r.hideable)
    }

    /// Check the map for internal consistency: every exit must lead to a
    /// known room, and the destination must have the reverse exit back.
    /// Returns a list of human-readable problems, empty when the map is
    /// sound.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, room) in &self.rooms {
            for (direction, destination) in &room.exits {
                let Some(dest) = self.rooms.get(destination) else {
                    errors.push(format!("{name}: exit {direction:?} leads to unknown room {destination}"));
                    continue;
                };
                let reverse = direction.reverse();
                if !dest.exits.iter().any(|(d, back)| *d == reverse && back == name) {
                    errors.push(format!(
                        "{destination}: missing {reverse:?} exit back to {name}"
                    ));
                }
            }
        }
        errors
    }
}

/// A single legality predicate, pure over the state snapshot.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Admissible only while in one of the named rooms.
    InRooms(Vec<String>),
    /// Not admissible twice in a row.
    NotTwiceInARow,
    /// Admissible at most once per run.
    OncePerRun,
    /// Requires an inventory item matching this fragment.
    RequiresItem(String),
    /// Only after this event appears in the walkthrough text.
    AfterEvent(String),
    /// Only before this event appears in the walkthrough text.
    BeforeEvent(String),
    /// The current room must have this exit.
    ExitExists(Direction),
    /// Forbid immediately reversing the previous movement unless the room
    /// being left again supports concealment (entering it then made sense).
    NoImmediateBacktrack(Direction),
}

impl Predicate {
    pub fn holds(&self, view: &StateView<'_>, map: &WorldMap) -> bool {
        match self {
            Predicate::InRooms(rooms) => rooms.iter().any(|r| r.eq_ignore_ascii_case(view.room)),
            // These two are evaluated in `Rule::admissible`, which knows the
            // candidate command text.
            Predicate::NotTwiceInARow | Predicate::OncePerRun => true,
            Predicate::RequiresItem(fragment) => view.has(fragment),
            Predicate::AfterEvent(event) => view.walkthrough_contains(event),
            Predicate::BeforeEvent(event) => !view.walkthrough_contains(event),
            Predicate::ExitExists(direction) => map.has_exit(view.room, *direction),
            Predicate::NoImmediateBacktrack(direction) => {
                match view.last_command().and_then(Direction::from_command) {
                    Some(last) if last == direction.reverse() => map.hideable(view.room),
                    _ => true,
                }
            }
        }
    }
}

/// One command plus the ANDed predicates gating it.
#[derive(Debug, Clone)]
pub struct Rule {
    command: String,
    predicates: Vec<Predicate>,
}

impl Rule {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            predicates: Vec::new(),
        }
    }

    /// A movement rule: the exit must exist and immediate reversals are
    /// filtered.
    pub fn movement(direction: Direction) -> Self {
        Rule::new(direction.command())
            .with(Predicate::ExitExists(direction))
            .with(Predicate::NoImmediateBacktrack(direction))
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn only_in<I, S>(self, rooms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(Predicate::InRooms(
            rooms.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn not_twice_in_a_row(self) -> Self {
        self.with(Predicate::NotTwiceInARow)
    }

    pub fn once_per_run(self) -> Self {
        self.with(Predicate::OncePerRun)
    }

    pub fn needs_item(self, fragment: impl Into<String>) -> Self {
        self.with(Predicate::RequiresItem(fragment.into()))
    }

    pub fn after(self, event: impl Into<String>) -> Self {
        self.with(Predicate::AfterEvent(event.into()))
    }

    pub fn before(self, event: impl Into<String>) -> Self {
        self.with(Predicate::BeforeEvent(event.into()))
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// True when every predicate admits the command in this state.
    pub fn admissible(&self, view: &StateView<'_>, map: &WorldMap) -> bool {
        self.predicates.iter().all(|p| match p {
            // These two need the candidate command itself.
            Predicate::NotTwiceInARow => view.last_command() != Some(self.command.as_str()),
            Predicate::OncePerRun => !view
                .commands()
                .any(|c| c.eq_ignore_ascii_case(&self.command)),
            other => other.holds(view, map),
        })
    }
}

/// The static rule table: the single source of truth for the branching
/// factor and ordering of the search. Built once at startup; candidates are
/// always tried in declaration order so reruns from the same checkpoint
/// explore identically.
#[derive(Debug, Clone)]
pub struct RuleTable {
    world: WorldMap,
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(world: WorldMap, rules: Vec<Rule>) -> Self {
        Self { world, rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn world(&self) -> &WorldMap {
        &self.world
    }

    pub fn rule(&self, index: usize) -> &Rule {
        &self.rules[index]
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Commands currently worth trying, in table order.
    pub fn admissible_commands<'a>(&'a self, view: &StateView<'_>) -> Vec<&'a str> {
        self.rules
            .iter()
            .filter(|r| r.admissible(view, &self.world))
            .map(Rule::command)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{OPENING_COMMAND, Outcome, StateFrame};

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

    fn two_room_map() -> WorldMap {
        WorldMap::new([
            (
                "cellar".to_string(),
                Room {
                    hideable: true,
                    exits: vec![(Direction::Up, "hall".to_string())],
                },
            ),
            (
                "hall".to_string(),
                Room {
                    hideable: false,
                    exits: vec![(Direction::Down, "cellar".to_string())],
                },
            ),
        ])
    }

    fn view<'a>(room: &'a str, inventory: &'a [String], frames: &'a [StateFrame]) -> StateView<'a> {
        StateView {
            room,
            inventory,
            frames,
        }
    }

    #[test]
    fn in_rooms_is_case_insensitive() {
        let map = two_room_map();
        let frames = [frame(OPENING_COMMAND)];
        let rule = Rule::new("look under bench").only_in(["Cellar"]);
        assert!(rule.admissible(&view("cellar", &[], &frames), &map));
        assert!(!rule.admissible(&view("hall", &[], &frames), &map));
    }

    #[test]
    fn not_twice_in_a_row_blocks_only_immediate_repeats() {
        let map = two_room_map();
        let rule = Rule::new("wait").not_twice_in_a_row();
        let waited = [frame(OPENING_COMMAND), frame("wait")];
        let moved_on = [frame(OPENING_COMMAND), frame("wait"), frame("go up")];
        assert!(!rule.admissible(&view("hall", &[], &waited), &map));
        assert!(rule.admissible(&view("hall", &[], &moved_on), &map));
    }

    #[test]
    fn once_per_run_blocks_any_repeat() {
        let map = two_room_map();
        let rule = Rule::new("pull lever").once_per_run();
        let fresh = [frame(OPENING_COMMAND)];
        let pulled = [frame(OPENING_COMMAND), frame("pull lever"), frame("wait")];
        assert!(rule.admissible(&view("hall", &[], &fresh), &map));
        assert!(!rule.admissible(&view("hall", &[], &pulled), &map));
    }

    #[test]
    fn requires_item_matches_inventory_fragment() {
        let map = two_room_map();
        let rule = Rule::new("unlock door with key").needs_item("key");
        let frames = [frame(OPENING_COMMAND)];
        let with_key = vec!["a rusty key".to_string()];
        assert!(rule.admissible(&view("hall", &with_key, &frames), &map));
        assert!(!rule.admissible(&view("hall", &[], &frames), &map));
    }

    #[test]
    fn event_ordering_predicates_read_the_walkthrough() {
        let map = two_room_map();
        let before = [frame(OPENING_COMMAND), frame("wait")];
        let after = [frame(OPENING_COMMAND), frame("press button")];
        let needs_button = Rule::new("open hatch").after("press button");
        let until_button = Rule::new("press button").before("press button");
        assert!(!needs_button.admissible(&view("hall", &[], &before), &map));
        assert!(needs_button.admissible(&view("hall", &[], &after), &map));
        assert!(until_button.admissible(&view("hall", &[], &before), &map));
        assert!(!until_button.admissible(&view("hall", &[], &after), &map));
    }

    #[test]
    fn movement_requires_a_matching_exit() {
        let map = two_room_map();
        let frames = [frame(OPENING_COMMAND)];
        let up = Rule::movement(Direction::Up);
        assert!(up.admissible(&view("cellar", &[], &frames), &map));
        assert!(!up.admissible(&view("hall", &[], &frames), &map));
    }

    #[test]
    fn backtracking_is_allowed_only_out_of_hideable_rooms() {
        let map = two_room_map();
        // Went down into the (hideable) cellar; coming straight back up is
        // allowed because entering to hide made sense.
        let into_cellar = [frame(OPENING_COMMAND), frame("go down")];
        let up = Rule::movement(Direction::Up);
        assert!(up.admissible(&view("cellar", &[], &into_cellar), &map));

        // Went up into the (non-hideable) hall; reversing straight back down
        // is filtered.
        let into_hall = [frame(OPENING_COMMAND), frame("go up")];
        let down = Rule::movement(Direction::Down);
        assert!(!down.admissible(&view("hall", &[], &into_hall), &map));
    }

    #[test]
    fn table_reports_candidates_in_declaration_order() {
        let map = two_room_map();
        let table = RuleTable::new(
            map,
            vec![
                Rule::movement(Direction::Up),
                Rule::new("wait").not_twice_in_a_row(),
                Rule::new("hide").only_in(["cellar"]),
            ],
        );
        let frames = [frame(OPENING_COMMAND)];
        let commands = table.admissible_commands(&view("cellar", &[], &frames));
        assert_eq!(commands, vec!["go up", "wait", "hide"]);
    }

    #[test]
    fn validate_flags_one_way_exits() {
        let map = WorldMap::new([
            (
                "a".to_string(),
                Room {
                    hideable: false,
                    exits: vec![(Direction::North, "b".to_string())],
                },
            ),
            (
                "b".to_string(),
                Room {
                    hideable: false,
                    exits: Vec::new(),
                },
            ),
        ]);
        let errors = map.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("missing South"));
    }
}
