//! Interpreter-session controller: drives a dfrotz-style interpreter child.
//!
//! The controller owns the subprocess, its stdio plumbing, the command
//! history chain, and every save-state artifact. Classification of the
//! interpreter's raw text output happens here, against the curated message
//! sets in [`GameSpec`]; the search engine only ever sees [`StateFrame`]s.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Local;
use crossbeam_channel::{Receiver, unbounded};
use regex::Regex;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::{OPENING_COMMAND, Outcome, StateFrame, StateView};
use crate::io::paths::WorkPaths;
use crate::io::session::Session;

/// Room string reported while no room has been detected yet.
pub const UNKNOWN_ROOM: &str = "[unknown]";

/// How long to wait for more output before deciding the interpreter is done
/// talking.
const QUIET_WINDOW: Duration = Duration::from_millis(100);
/// Patience retries when output is expected but slow to arrive, with the
/// backoff factor applied to the sleep between retries.
const PATIENCE_RETRIES: u32 = 20;
const PATIENCE_BACKOFF: f64 = 1.48;
/// Limits on the QUIT confirmation loop during shutdown.
const QUIT_CONFIRMATIONS: u32 = 20;
const QUIT_GRACE: Duration = Duration::from_secs(10);

/// Everything game- and machine-specific about one interpreter session.
#[derive(Debug, Clone)]
pub struct GameSpec {
    pub name: String,
    pub interpreter: PathBuf,
    pub interpreter_flags: Vec<String>,
    pub story_file: PathBuf,
    /// Known room names, lowercase. Used both to detect room changes and to
    /// filter status-line leakage out of inventory listings.
    pub rooms: Vec<String>,
    /// Phrases (lowercase) that begin or end a response line when the
    /// interpreter considers the command a mistake.
    pub mistake_messages: Vec<String>,
    pub disambiguation_messages: Vec<String>,
    /// Phrases appearing anywhere in a response that ends the game.
    pub failure_messages: Vec<String>,
    pub success_messages: Vec<String>,
    /// Lowercase first line of the interpreter's inventory answer.
    pub inventory_answer_tag: String,
    /// When set, responses are scanned for an in-game clock reading.
    pub clock_pattern: Option<Regex>,
    pub save_every_turn: bool,
    pub inventory_every_turn: bool,
    pub keep_transcript: bool,
}

impl GameSpec {
    /// Baseline for dfrotz-driven games: the stock Inform mistake and
    /// disambiguation phrasings plus the default game-over lines. Game
    /// modules extend these sets.
    pub fn frotz_defaults(
        name: impl Into<String>,
        interpreter: impl Into<PathBuf>,
        story_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            interpreter: interpreter.into(),
            interpreter_flags: vec!["-m".to_string()],
            story_file: story_file.into(),
            rooms: Vec::new(),
            mistake_messages: base_mistake_messages(),
            disambiguation_messages: vec![
                "which do you mean".to_string(),
                "please give one of the answers above".to_string(),
            ],
            failure_messages: vec!["*** you have died ***".to_string()],
            success_messages: vec!["*** you have won ***".to_string()],
            inventory_answer_tag: "you are carrying:".to_string(),
            clock_pattern: None,
            save_every_turn: true,
            inventory_every_turn: true,
            keep_transcript: true,
        }
    }
}

fn base_mistake_messages() -> Vec<String> {
    [
        r#""oops" can only correct"#,
        "after a few moments, you realise that",
        "already closed.",
        "beg your pardon?",
        "but you aren't",
        "but you aren't in anything",
        "darkness, noun.  an absence of light",
        "digging would achieve nothing here",
        "does not open.",
        "error: unknown reason for",
        "for a while, but don't achieve much.",
        "i didn't understand that",
        "i didn't understand the way",
        "i don't think much is to be achieved",
        "i only understood you as far as",
        "impossible to place objects on top of it.",
        "is already here.",
        "it is pitch dark, and you can't",
        "no pronouns are known to the game",
        "nothing practical results",
        "real adventurers do not",
        "seem to be something you can lock.",
        "seem to be something you can unlock.",
        "sorry, you can only have one",
        "that would be less than courteous",
        "that's not a verb i recognise",
        "that's not something you need to refer to",
        "the dreadful truth is, this is not a dream.",
        "this dangerous act would achieve little",
        "to talk to someone, try",
        "violence isn't the answer",
        "you aren't feeling especially",
        "you can only do that to",
        "you can only get into something",
        "you can only use multiple objects",
        "you can't put something inside",
        "you can't put something on",
        "you can't see any such thing",
        "you can't use multiple objects",
        "you're carrying too many",
        "you excepted something not included",
        "you jump on the spot, fruitlessly",
        "you see nothing",
        "you seem to have said too little",
        "you seem to want to talk to someone, but",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// What classification found in one interpreter response.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub outcome: Outcome,
    pub room: Option<String>,
    pub clock: Option<String>,
    /// The response was a disambiguation question (classified as a mistake,
    /// but worth a problem report: the rule table should not produce these).
    pub disambiguation: bool,
    /// Game-ending asterisk lines that matched no known message.
    pub unknown_asterisks: Vec<String>,
}

/// Classify a raw interpreter response against a game's message sets.
///
/// Pure over its inputs so it can be tested without a subprocess. Order
/// matters and mirrors the game's own signaling: outright failure, then
/// success, then disambiguation/mistake phrasings, then room detection.
pub fn evaluate_response(spec: &GameSpec, output: &str) -> Evaluation {
    let lower = output.to_lowercase();
    let lines: Vec<&str> = output.lines().map(str::trim).collect();
    let mut eval = Evaluation {
        outcome: Outcome::Progress,
        room: None,
        clock: None,
        disambiguation: false,
        unknown_asterisks: Vec::new(),
    };

    for message in &spec.failure_messages {
        if lower.contains(message) {
            eval.outcome = Outcome::Failed;
            return eval;
        }
    }
    for message in &spec.success_messages {
        if lower.contains(message) {
            eval.outcome = Outcome::Success;
            return eval;
        }
    }
    for line in lines.iter().filter(|l| l.starts_with("**")) {
        // "*******" is just a textual separator that turns up occasionally.
        if line.chars().all(|c| c == '*') {
            continue;
        }
        eval.unknown_asterisks.push((*line).to_string());
    }

    for line in &lines {
        let line = line.to_lowercase();
        for message in &spec.disambiguation_messages {
            if line.starts_with(message) || line.ends_with(message) {
                eval.disambiguation = true;
                eval.outcome = Outcome::Mistake;
                return eval;
            }
        }
        for message in &spec.mistake_messages {
            if line.starts_with(message) || line.ends_with(message) {
                eval.outcome = Outcome::Mistake;
                return eval;
            }
        }
    }

    // Room names appear at the start of their own line (dfrotz mixes the
    // status bar into the text, so a clock reading may trail the name).
    for line in &lines {
        let line = line.to_lowercase();
        let matched = spec
            .rooms
            .iter()
            .filter(|room| line.starts_with(room.as_str()))
            .max_by_key(|room| room.len());
        if let Some(room) = matched {
            eval.room = Some(room.clone());
        }
    }

    if let Some(pattern) = &spec.clock_pattern {
        for line in &lines {
            if let Some(found) = pattern.find(line) {
                eval.clock = Some(found.as_str().to_string());
            }
        }
    }

    eval
}

/// Extract inventory items from the interpreter's INVENTORY answer,
/// dropping the answer tag and any status-line leakage.
pub fn parse_inventory(spec: &GameSpec, text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.trim_matches('.').trim().is_empty())
        .filter(|l| {
            !l.trim_start_matches('>')
                .trim()
                .to_lowercase()
                .starts_with(&spec.inventory_answer_tag)
        })
        .filter(|l| {
            let lower = l.to_lowercase();
            !spec.rooms.iter().any(|room| lower.starts_with(room.as_str()))
        })
        .map(str::to_string)
        .collect()
}

/// A save-state artifact on disk. The file is unlinked when the last handle
/// drops; stale files are also swept at the next session start.
#[derive(Debug)]
pub struct SaveFile {
    path: PathBuf,
}

impl SaveFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SaveFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Non-blocking wrapper around the child's stdout: a reader thread feeds a
/// channel so the controller can drain whatever is waiting without
/// deadlocking on a quiet interpreter.
struct OutputReader {
    rx: Receiver<String>,
}

impl OutputReader {
    fn spawn(stdout: ChildStdout) -> Self {
        let (tx, rx) = unbounded();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self { rx }
    }

    /// Everything currently waiting, joined and stripped of prompt noise.
    fn drain(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        while let Ok(line) = self.rx.recv_timeout(QUIET_WINDOW) {
            lines.push(line.trim_end().to_string());
        }
        lines
            .join("\n")
            .trim()
            .trim_start_matches('>')
            .trim_start()
            .to_string()
    }

    /// Drain output, optionally retrying with backoff when the interpreter
    /// is slow. Some prompts legitimately produce nothing (the 'terp holds
    /// its reply until the next input line), so `patient` is off for those.
    fn read_text(&self, patient: bool) -> String {
        let mut text = self.drain();
        if text.is_empty() && patient {
            let mut sleep = Duration::from_millis(100);
            for _ in 0..PATIENCE_RETRIES {
                text = self.drain();
                if !text.is_empty() {
                    break;
                }
                thread::sleep(sleep);
                sleep = sleep.mul_f64(PATIENCE_BACKOFF);
            }
        }
        text
    }
}

/// A live interpreter session playing one game.
pub struct FrotzSession {
    spec: GameSpec,
    paths: WorkPaths,
    child: Child,
    stdin: ChildStdin,
    reader: OutputReader,
    frames: Vec<StateFrame>,
    /// Save artifact per frame, parallel to `frames`.
    checkpoints: Vec<Option<Arc<SaveFile>>>,
    save_seq: u64,
}

impl FrotzSession {
    /// Spawn the interpreter, read its opening text, and record the opening
    /// frame (with its checkpoint and inventory).
    #[instrument(skip_all, fields(game = %spec.name))]
    pub fn spawn(spec: GameSpec, paths: &WorkPaths) -> Result<Self> {
        paths.ensure_layout()?;
        sweep_save_files(&paths.saves_dir)?;

        info!(
            interpreter = %spec.interpreter.display(),
            story = %spec.story_file.display(),
            "spawning interpreter"
        );
        let mut command = Command::new(&spec.interpreter);
        command
            .args(&spec.interpreter_flags)
            .arg(&spec.story_file)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = command
            .spawn()
            .with_context(|| format!("spawn interpreter {}", spec.interpreter.display()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let reader = OutputReader::spawn(stdout);

        let mut session = Self {
            spec,
            paths: paths.clone(),
            child,
            stdin,
            reader,
            frames: Vec::new(),
            checkpoints: Vec::new(),
            save_seq: 0,
        };

        let opening = session.reader.read_text(true);
        if opening.is_empty() {
            bail!("interpreter produced no opening text");
        }
        let eval = evaluate_response(&session.spec, &opening);
        let mut frame = StateFrame {
            command: OPENING_COMMAND.to_string(),
            outcome: Outcome::Progress,
            output: opening,
            room: eval.room,
            inventory: None,
            clock: eval.clock,
            checkpoint: None,
        };
        let save = session.save_file()?;
        frame.checkpoint = Some(save.path().to_path_buf());
        if session.spec.inventory_every_turn {
            frame.inventory = Some(session.fetch_inventory()?);
        }
        session.frames.push(frame);
        session.checkpoints.push(Some(save));

        if session.spec.keep_transcript {
            session.start_transcript()?;
        }
        debug!(room = session.current_room(), "session ready");
        Ok(session)
    }

    pub fn current_room(&self) -> &str {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.room.as_deref())
            .unwrap_or(UNKNOWN_ROOM)
    }

    fn current_inventory(&self) -> &[String] {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.inventory.as_deref())
            .unwrap_or(&[])
    }

    /// Pass one line to the interpreter and return whatever it says back.
    fn exchange(&mut self, command: &str, patient: bool) -> Result<String> {
        debug!(command, "to interpreter");
        writeln!(self.stdin, "{}", command.trim()).context("write to interpreter stdin")?;
        self.stdin.flush().context("flush interpreter stdin")?;
        let output = self.reader.read_text(patient);
        if output.is_empty() && patient {
            self.document_problem(
                "no_data",
                json!({ "command": command, "note": "no output even after patience" }),
            );
        }
        Ok(output)
    }

    /// Cause the interpreter to write a save file and hand back the owned
    /// artifact.
    fn save_file(&mut self) -> Result<Arc<SaveFile>> {
        self.save_seq += 1;
        let path = self.paths.saves_dir.join(format!("{:08}", self.save_seq));
        // No response expected after SAVE: the 'terp holds the filename
        // prompt until it sees the next line.
        let prompt = self.exchange("save", false)?;
        let answer = self.exchange(&path.display().to_string(), false)?;
        if answer.to_lowercase().contains("save failed") || !path.exists() {
            self.document_problem(
                "save_failed",
                json!({
                    "filename": path.display().to_string(),
                    "output": [prompt, answer],
                    "exists": path.exists(),
                }),
            );
            bail!("interpreter failed to save state to {}", path.display());
        }
        Ok(Arc::new(SaveFile { path }))
    }

    /// Undo the last in-game turn. Used to roll back probe commands like
    /// INVENTORY, never for backtracking (that always goes through a save
    /// artifact).
    fn undo(&mut self) -> Result<bool> {
        let text = self.exchange("undo", true)?;
        let lower = text.to_lowercase();
        if lower.contains(r#"can't "undo" what hasn't been done"#) {
            // Nothing was done; that is as good as successfully undoing.
            return Ok(true);
        }
        if text.is_empty() {
            self.document_problem("cannot_undo", json!({ "output": null }));
            return Ok(false);
        }
        if lower.contains("undone.]") {
            Ok(true)
        } else {
            self.document_problem(
                "cannot_undo",
                json!({ "output": text, "note": "\"undone.]\" not in output" }),
            );
            Ok(false)
        }
    }

    fn fetch_inventory(&mut self) -> Result<Vec<String>> {
        let text = self.exchange("inventory", true)?;
        if !self.undo()? {
            warn!("unable to undo INVENTORY command");
        }
        let items = parse_inventory(&self.spec, &text);
        if items.is_empty() {
            self.document_problem(
                "cannot_get_inventory",
                json!({
                    "inventory_text": text,
                    "note": format!("'{}' answer yielded no items", self.spec.inventory_answer_tag),
                }),
            );
        }
        Ok(items)
    }

    fn start_transcript(&mut self) -> Result<()> {
        let name = format!("transcript_{}", Local::now().format("%Y-%m-%dT%H_%M_%S"));
        let path = self.paths.root.join(name);
        debug!(path = %path.display(), "starting game transcript");
        let _ = self.exchange("script", false)?;
        let _ = self.exchange(&path.display().to_string(), false)?;
        Ok(())
    }

    /// Record an anomaly as a structured JSON report in the logs directory.
    /// Reporting never fails the session; a report that cannot be written is
    /// only logged.
    pub fn document_problem(&self, kind: &str, data: serde_json::Value) {
        warn!(kind, %data, "interpreter anomaly");
        let stamp = Local::now().format("%Y-%m-%dT%H_%M_%S%.6f");
        let path = self.paths.logs_dir.join(format!("{kind}_{stamp}.json"));
        let report = json!({
            "kind": kind,
            "data": data,
            "walkthrough": self.text_walkthrough(),
        });
        let payload = match serde_json::to_string_pretty(&report) {
            Ok(p) => p,
            Err(err) => {
                warn!(%err, "could not serialize problem report");
                return;
            }
        };
        if let Err(err) = fs::write(&path, payload) {
            warn!(path = %path.display(), %err, "could not write problem report");
        }
    }
}

impl Session for FrotzSession {
    type Checkpoint = Arc<SaveFile>;

    fn view(&self) -> StateView<'_> {
        StateView {
            room: self.current_room(),
            inventory: self.current_inventory(),
            frames: &self.frames,
        }
    }

    fn frames(&self) -> &[StateFrame] {
        &self.frames
    }

    fn current_checkpoint(&self) -> Option<Arc<SaveFile>> {
        self.checkpoints.last().cloned().flatten()
    }

    fn save_state(&mut self) -> Result<Arc<SaveFile>> {
        self.save_file()
    }

    #[instrument(skip(self), fields(room = %self.current_room()))]
    fn make_single_move(&mut self, command: &str) -> Result<StateFrame> {
        let output = self.exchange(command, true)?;
        let eval = evaluate_response(&self.spec, &output);
        for line in &eval.unknown_asterisks {
            self.document_problem(
                "asterisk_line",
                json!({ "line": line, "note": "cannot interpret this game-ending line" }),
            );
        }
        if eval.disambiguation {
            self.document_problem("disambiguation", json!({ "command": command, "output": output }));
        }

        let mut frame = StateFrame {
            command: command.to_string(),
            outcome: eval.outcome,
            output,
            room: eval.room,
            inventory: None,
            clock: eval.clock,
            checkpoint: None,
        };
        let mut artifact = None;
        // The game is over or unchanged on a dead end, so there is nothing
        // worth saving or inventorying.
        if frame.outcome == Outcome::Progress {
            if self.spec.save_every_turn {
                let save = self.save_file()?;
                frame.checkpoint = Some(save.path().to_path_buf());
                artifact = Some(save);
            }
            if self.spec.inventory_every_turn {
                frame.inventory = Some(self.fetch_inventory()?);
            }
        }
        self.frames.push(frame.clone());
        self.checkpoints.push(artifact);
        Ok(frame)
    }

    fn restore_to(&mut self, checkpoint: &Arc<SaveFile>) -> Result<()> {
        let prompt = self.exchange("restore", false)?;
        let output = self.exchange(&checkpoint.path().display().to_string(), true)?;
        if output.to_lowercase().contains("failed") {
            self.document_problem(
                "restore_failed",
                json!({
                    "filename": checkpoint.path().display().to_string(),
                    "output": [prompt, output],
                }),
            );
            bail!("restore from {} failed", checkpoint.path().display());
        }
        Ok(())
    }

    fn drop_last_frame(&mut self) {
        // The opening frame anchors the chain and is never discarded.
        if self.frames.len() > 1 {
            self.frames.pop();
            self.checkpoints.pop();
        }
    }

    fn end(&mut self) -> Result<()> {
        debug!("ending interpreter session");
        let _ = self.exchange("quit", false);
        for _ in 0..QUIT_CONFIRMATIONS {
            if matches!(self.child.try_wait(), Ok(Some(_))) {
                break;
            }
            if self.exchange("y", false).is_err() {
                break;
            }
        }
        match self
            .child
            .wait_timeout(QUIT_GRACE)
            .context("wait for interpreter exit")?
        {
            Some(status) => debug!(?status, "interpreter exited"),
            None => {
                warn!("interpreter did not quit in time, killing");
                self.child.kill().context("kill interpreter")?;
                self.child.wait().context("wait after kill")?;
            }
        }
        Ok(())
    }
}

/// Remove leftover save files from a previous run.
fn sweep_save_files(saves_dir: &Path) -> Result<()> {
    if !saves_dir.exists() {
        return Ok(());
    }
    let entries =
        fs::read_dir(saves_dir).with_context(|| format!("read {}", saves_dir.display()))?;
    let mut swept = 0usize;
    for entry in entries {
        let entry = entry.with_context(|| format!("read {}", saves_dir.display()))?;
        if entry.path().is_file() {
            fs::remove_file(entry.path())
                .with_context(|| format!("remove stale save {}", entry.path().display()))?;
            swept += 1;
        }
    }
    if swept > 0 {
        debug!(swept, "cleared stale save files");
    }
    Ok(())
}
