//! Game data for *All Things Devours*: the map, the message sets, and the
//! command rule table the search explores.
//!
//! ATD is a tightly interlocked time-travel puzzle; the interesting thing
//! about its possibility space is how few commands are ever worth trying in
//! a given state. Every predicate below encodes a constraint the game
//! itself enforces, so the pruning can never hide an undiscovered solution.

use std::path::PathBuf;

use anyhow::{Context, Result};
use regex::Regex;

use crate::core::rules::{Direction, Room, Rule, RuleTable, WorldMap};
use crate::io::terp::GameSpec;

/// Rooms the game announces, with whether each offers somewhere to hide.
/// Hiding matters twice over: the HIDE command only works in these rooms,
/// and movement filters allow doubling straight back only out of them.
const ROOMS: [(&str, bool); 12] = [
    ("balcony", true),
    ("basement corridor", false),
    ("basement equipment room", true),
    ("basement landing", false),
    ("conference room", true),
    ("first floor corridor", true),
    ("first floor equipment room", true),
    ("foyer", false),
    ("inside the prototype", false),
    ("second floor corridor", true),
    ("the deutsch laboratory", false),
    ("upstairs landing", true),
];

pub fn world_map() -> WorldMap {
    use Direction::{Down, East, North, South, Up, West};
    let exits: [(&str, &[(Direction, &str)]); 12] = [
        ("balcony", &[(South, "conference room")]),
        (
            "conference room",
            &[(North, "balcony"), (East, "second floor corridor")],
        ),
        (
            "second floor corridor",
            &[(West, "conference room"), (South, "upstairs landing")],
        ),
        (
            "upstairs landing",
            &[(North, "second floor corridor"), (Down, "foyer")],
        ),
        ("foyer", &[(Up, "upstairs landing"), (North, "first floor corridor")]),
        (
            "first floor corridor",
            &[
                (South, "foyer"),
                (East, "first floor equipment room"),
                (Down, "basement landing"),
            ],
        ),
        ("first floor equipment room", &[(West, "first floor corridor")]),
        (
            "basement landing",
            &[(Up, "first floor corridor"), (North, "basement corridor")],
        ),
        (
            "basement corridor",
            &[
                (South, "basement landing"),
                (East, "basement equipment room"),
                (West, "the deutsch laboratory"),
            ],
        ),
        ("basement equipment room", &[(West, "basement corridor")]),
        ("the deutsch laboratory", &[(East, "basement corridor")]),
        // Entered and left by dedicated commands, not compass directions.
        ("inside the prototype", &[]),
    ];

    WorldMap::new(exits.into_iter().map(|(name, exits)| {
        let hideable = ROOMS
            .iter()
            .find(|(room, _)| *room == name)
            .is_some_and(|(_, h)| *h);
        (
            name.to_string(),
            Room {
                hideable,
                exits: exits
                    .iter()
                    .map(|(d, to)| (*d, (*to).to_string()))
                    .collect(),
            },
        )
    }))
}

fn hideable_rooms() -> Vec<&'static str> {
    ROOMS
        .iter()
        .filter(|(_, hideable)| *hideable)
        .map(|(name, _)| *name)
        .collect()
}

/// The static rule table. Declaration order is the search order and must
/// never change between a checkpoint and the run resuming from it.
pub fn rule_table() -> RuleTable {
    use Direction::{Down, East, North, South, Up, West};
    let rules = vec![
        Rule::movement(North),
        Rule::movement(South),
        Rule::movement(East),
        Rule::movement(West),
        Rule::movement(Up),
        Rule::movement(Down),
        Rule::new("wait").not_twice_in_a_row(),
        Rule::new("hide").only_in(hideable_rooms()).not_twice_in_a_row(),
        Rule::new("get battery")
            .only_in(["first floor equipment room", "basement equipment room"])
            .once_per_run(),
        Rule::new("get cable")
            .only_in(["basement equipment room"])
            .once_per_run(),
        Rule::new("get papers")
            .only_in(["conference room"])
            .once_per_run(),
        Rule::new("put battery in flashlight")
            .needs_item("battery")
            .once_per_run(),
        Rule::new("turn on flashlight")
            .needs_item("flashlight")
            .after("put battery in flashlight")
            .not_twice_in_a_row(),
        Rule::new("open window")
            .only_in(["conference room", "balcony"])
            .once_per_run(),
        Rule::new("go through window")
            .only_in(["balcony"])
            .after("open window"),
        Rule::new("insert card into slot")
            .only_in(["first floor corridor", "the deutsch laboratory"])
            .needs_item("card"),
        Rule::new("attach cable to prototype")
            .only_in(["the deutsch laboratory"])
            .needs_item("cable")
            .once_per_run(),
        Rule::new("enter prototype").only_in(["the deutsch laboratory"]),
        Rule::new("get out of prototype").only_in(["inside the prototype"]),
        Rule::new("set timer to 30")
            .only_in(["inside the prototype"])
            .before("press the button"),
        Rule::new("press the button")
            .only_in(["inside the prototype"])
            .after("set timer to 30"),
        Rule::new("read papers").needs_item("papers").not_twice_in_a_row(),
        Rule::new("drop battery").needs_item("battery"),
    ];
    RuleTable::new(world_map(), rules)
}

/// ATD-specific additions to the stock mistake phrasings.
fn atd_mistake_messages() -> Vec<String> {
    [
        "but it barely leaves a mark.",
        "but the glass stays in place.",
        "but there's no water here",
        "error: overflow in",
        "error: unknown door status",
        "for example, with 'set timer to 30'.",
        "if you could do that",
        "is locked in place.",
        "is that the best you can",
        "it is not clear what",
        "nothing happens -- the button must be",
        "switching on the overhead lights would",
        "you lack the nerve",
        "that doesn't seem to be something",
        "that would scarcely",
        "that's not something you can",
        "the challenge can only be initiated in the first turn",
        "the challenge has already been initiated",
        "the only exit is",
        "the only exits are",
        "the prototype's control panel only accepts",
        "you have not yet set",
        "the slot emits a small beep and your card is rejected",
        "the switch clicks, but no light",
        "the window appears to be locked",
        "the window is already",
        "there is no obvious way to",
        "there is no way that you could tear them up in time.",
        "there is nothing here that you could",
        "there is nothing to",
        "there's not enough water",
        "there's nothing sensible",
        "you can't, since",
        "there's nothing suitable to drink",
        "you would achieve nothing",
        "this one closes of its own accord.",
        "to set the explosive device, you need to",
        "try as you might, none of",
        "you cannot attach the cable to",
        "until you complete the modifications.",
        "you would have to",
        "you are not strong enough to break",
        "you can hear nothing but",
        "you can see clearly enough in the gloom.",
        "you can't see anything of interest",
        "you cannot get the window open",
        "you cannot make out any",
        "you cannot open the door with",
        "you can\u{2019}t since",
        "you cannot see what",
        "you cannot do that",
        "you discover nothing of interest",
        "you do not have the key",
        "you won't be able to",
        "you don't have anything heavy enough",
        "you don't need to worry about",
        "you'll have to say which",
        "your timer only accepts",
        "you will have to be more specific about",
        "you would need to be near the prototype",
        "you would need you id card to",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Assemble the full session spec for ATD.
pub fn game_spec(interpreter: PathBuf, story_file: PathBuf) -> Result<GameSpec> {
    let mut spec = GameSpec::frotz_defaults("All Things Devours", interpreter, story_file);
    spec.rooms = ROOMS.iter().map(|(name, _)| (*name).to_string()).collect();
    spec.mistake_messages.extend(atd_mistake_messages());
    spec.failure_messages
        .push("*** you have failed ***".to_string());
    spec.success_messages
        .push("*** success. final, lasting success. ***".to_string());
    // The in-game clock runs from 4:17 in five-second steps; it shows up in
    // the status bar dfrotz mixes into the output stream.
    spec.clock_pattern = Some(Regex::new(r"4:\d\d:\d\d").context("compile clock pattern")?);
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{OPENING_COMMAND, Outcome, StateFrame, StateView};
    use crate::io::terp::evaluate_response;
    use std::collections::BTreeSet;

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
    fn map_is_internally_consistent() {
        let errors = world_map().validate();
        assert!(errors.is_empty(), "map problems: {errors:?}");
    }

    #[test]
    fn every_game_room_is_on_the_map() {
        let map = world_map();
        for (room, _) in ROOMS {
            assert!(map.contains(room), "missing room {room}");
        }
    }

    #[test]
    fn rule_commands_are_unique() {
        let table = rule_table();
        let commands: BTreeSet<&str> = table.rules().map(|r| r.command()).collect();
        assert_eq!(commands.len(), table.len());
    }

    #[test]
    fn hide_is_admissible_only_where_concealment_exists() {
        let table = rule_table();
        let frames = [frame(OPENING_COMMAND)];
        let in_balcony = StateView {
            room: "balcony",
            inventory: &[],
            frames: &frames,
        };
        let in_foyer = StateView {
            room: "foyer",
            inventory: &[],
            frames: &frames,
        };
        assert!(table.admissible_commands(&in_balcony).contains(&"hide"));
        assert!(!table.admissible_commands(&in_foyer).contains(&"hide"));
    }

    #[test]
    fn prototype_controls_unlock_in_order() {
        let table = rule_table();
        let before = [frame(OPENING_COMMAND), frame("enter prototype")];
        let view = StateView {
            room: "inside the prototype",
            inventory: &[],
            frames: &before,
        };
        let commands = table.admissible_commands(&view);
        assert!(commands.contains(&"set timer to 30"));
        assert!(!commands.contains(&"press the button"));

        let after = [
            frame(OPENING_COMMAND),
            frame("enter prototype"),
            frame("set timer to 30"),
        ];
        let view = StateView {
            room: "inside the prototype",
            inventory: &[],
            frames: &after,
        };
        let commands = table.admissible_commands(&view);
        assert!(commands.contains(&"press the button"));
    }

    #[test]
    fn spec_classifies_atd_endings_and_clock() {
        let spec = game_spec(PathBuf::from("/usr/bin/dfrotz"), PathBuf::from("devours.z5"))
            .expect("spec");

        let eval = evaluate_response(&spec, "   *** You have failed ***");
        assert_eq!(eval.outcome, Outcome::Failed);

        let eval = evaluate_response(&spec, "*** Success. Final, lasting success. ***");
        assert_eq!(eval.outcome, Outcome::Success);

        let eval = evaluate_response(&spec, "The Deutsch Laboratory      4:17:05\nThe lab hums.");
        assert_eq!(eval.outcome, Outcome::Progress);
        assert_eq!(eval.room.as_deref(), Some("the deutsch laboratory"));
        assert_eq!(eval.clock.as_deref(), Some("4:17:05"));
    }

    #[test]
    fn movement_rules_track_the_map() {
        let table = rule_table();
        let frames = [frame(OPENING_COMMAND)];
        let view = StateView {
            room: "foyer",
            inventory: &[],
            frames: &frames,
        };
        let commands = table.admissible_commands(&view);
        assert!(commands.contains(&"go north"));
        assert!(commands.contains(&"go up"));
        assert!(!commands.contains(&"go south"));
        assert!(!commands.contains(&"go down"));
    }
}
