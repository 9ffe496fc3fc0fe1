//! Plays a linearized dialogue one line at a time.
//!
//! The player is a state machine driven by [`DialoguePlayer::tick`]. Each call
//! spends the elapsed time on whatever the session is waiting for (the start
//! delay, typing, a portrait fade) and keeps going until it has to wait again,
//! returning the reason as a [`SuspendReason`].

use std::collections::HashMap;
use std::time::Duration;

use log::*;

use crate::dialogue_proto::{Character, DialogueTree, Side};
use crate::errors::{Collaborator, DialogueError};
use crate::format::LineFormatter;
use crate::loader::{self, LinearizedDialogue};
use crate::presenter::{CancelToken, InputSource, Portrait, PortraitSpec, TextBox};
use crate::store::GraphStore;

pub const DEFAULT_CHARACTER_DELAY: Duration = Duration::from_millis(30);
pub const DEFAULT_START_DELAY: Duration = Duration::from_millis(500);
/// Opacity of the portrait whose character isn't speaking.
pub const DEFAULT_PARTIAL_FADE_OPACITY: f32 = 0.5;
pub const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// Time between two revealed characters.
    pub character_delay: Duration,
    /// Time between loading a scene and its first line.
    pub start_delay: Duration,
    pub partial_fade_opacity: f32,
    /// Locale used to pick plural forms in format functions.
    pub locale: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            character_delay: DEFAULT_CHARACTER_DELAY,
            start_delay: DEFAULT_START_DELAY,
            partial_fade_opacity: DEFAULT_PARTIAL_FADE_OPACITY,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransitionPhase {
    /// The previous character is fading out of the active side.
    FadingOut,
    /// The speaker is fading in, or back in from a partial fade.
    FadingIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Loading,
    StartDelay { remaining: Duration },
    Transitioning { line_id: u32, phase: TransitionPhase },
    Presenting { line_id: u32, revealed: usize, until_next: Duration },
    AwaitingAdvance { line_id: u32 },
    Closing,
    Finished { lines_shown: usize },
}

/// Why [`DialoguePlayer::tick`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuspendReason {
    StartDelay,
    PortraitTransition { line_id: u32 },
    Typing { line_id: u32, revealed: usize, total: usize },
    AwaitingSubmit { line_id: u32 },
    Closing,
    DialogueComplete { lines_shown: usize },
    Cancelled,
}

enum Step {
    Continue,
    Suspend(SuspendReason),
}

/// Input already consumed during the current tick.
#[derive(Default)]
struct Frame {
    submit_polled: bool,
    skip_polled: bool,
}

#[derive(Default)]
struct Stage {
    left: Option<Box<dyn Portrait>>,
    right: Option<Box<dyn Portrait>>,
    text_box: Option<Box<dyn TextBox>>,
    input: Option<Box<dyn InputSource>>,
}

impl Stage {
    fn check(&self) -> Result<(), DialogueError> {
        let missing = if self.left.is_none() {
            Some(Collaborator::LeftPortrait)
        } else if self.right.is_none() {
            Some(Collaborator::RightPortrait)
        } else if self.text_box.is_none() {
            Some(Collaborator::TextBox)
        } else if self.input.is_none() {
            Some(Collaborator::Input)
        } else {
            None
        };

        match missing {
            Some(collaborator) => Err(DialogueError::MissingCollaborator(collaborator)),
            None => Ok(()),
        }
    }

    fn portrait(&mut self, side: Side) -> Result<&mut (dyn Portrait + 'static), DialogueError> {
        let (portrait, collaborator) = match side {
            Side::Left => (&mut self.left, Collaborator::LeftPortrait),
            Side::Right => (&mut self.right, Collaborator::RightPortrait),
        };
        portrait
            .as_deref_mut()
            .ok_or(DialogueError::MissingCollaborator(collaborator))
    }

    fn text_box(&mut self) -> Result<&mut (dyn TextBox + 'static), DialogueError> {
        self.text_box
            .as_deref_mut()
            .ok_or(DialogueError::MissingCollaborator(Collaborator::TextBox))
    }

    fn input(&mut self) -> Result<&mut (dyn InputSource + 'static), DialogueError> {
        self.input
            .as_deref_mut()
            .ok_or(DialogueError::MissingCollaborator(Collaborator::Input))
    }

    fn is_transitioning(&self) -> bool {
        self.left.iter().chain(self.right.iter()).any(|portrait| portrait.is_transitioning())
    }

    /// Puts every collaborator back to its resting state, ignoring absent ones.
    fn reset(&mut self) {
        for portrait in self.left.iter_mut().chain(self.right.iter_mut()) {
            portrait.stop_talking();
            portrait.hide();
        }
        if let Some(text_box) = self.text_box.as_mut() {
            text_box.clear();
        }
    }
}

struct Session {
    scene_name: String,
    dialogue: LinearizedDialogue,
    line_table: HashMap<u32, String>,
    formatter: LineFormatter,
    warm_tint: bool,
    cold_tint: bool,
    /// Character currently displayed on each side, indexed by [`slot`].
    shown: [Option<Character>; 2],
    previous_side: Option<Side>,
    current_text: Vec<char>,
    lines_shown: usize,
}

impl Session {
    fn speaker(&self, line_id: u32) -> Result<(Side, PortraitSpec), DialogueError> {
        let node = &self
            .dialogue
            .line(line_id)
            .ok_or_else(|| DialogueError::General(format!("line {} is not in the dialogue", line_id)))?
            .node;
        let spec = PortraitSpec {
            character: node.character(),
            expression: node.expression(),
            warm_tint: self.warm_tint,
            cold_tint: self.cold_tint,
            animated: node.animated,
        };
        Ok((node.side(), spec))
    }
}

fn slot(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}

fn active(session: &mut Option<Session>) -> Result<&mut Session, DialogueError> {
    session
        .as_mut()
        .ok_or_else(|| DialogueError::from("no dialogue session is running"))
}

pub struct DialoguePlayer {
    store: GraphStore,
    config: PlayerConfig,
    stage: Stage,
    cancel: CancelToken,
    variables: HashMap<String, String>,
    state: PlayerState,
    session: Option<Session>,
}

impl DialoguePlayer {
    pub fn new(store: GraphStore, config: PlayerConfig) -> Self {
        Self {
            store,
            config,
            stage: Stage::default(),
            cancel: CancelToken::new(),
            variables: HashMap::new(),
            state: PlayerState::Idle,
            session: None,
        }
    }

    pub fn with_portraits(mut self, left: Box<dyn Portrait>, right: Box<dyn Portrait>) -> Self {
        self.stage.left = Some(left);
        self.stage.right = Some(right);
        self
    }

    pub fn with_text_box(mut self, text_box: Box<dyn TextBox>) -> Self {
        self.stage.text_box = Some(text_box);
        self
    }

    pub fn with_input(mut self, input: Box<dyn InputSource>) -> Self {
        self.stage.input = Some(input);
        self
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    /// A handle that stops the current session at its next suspension point.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Sets a value for `{name}` placeholders in line text.
    pub fn set_variable(&mut self, name: &str, value: impl Into<String>) {
        self.variables.insert(name.to_string(), value.into());
    }

    /// Loads the graph of `scene_name` from the store and starts playing it.
    ///
    /// Any session already running is torn down first. On failure nothing is
    /// presented and the player goes back to [`PlayerState::Idle`].
    pub fn begin(&mut self, scene_name: &str) -> Result<(), DialogueError> {
        self.prepare()?;
        info!("Loading dialogue for scene {}", scene_name);

        let result = self.store.read_scene(scene_name).and_then(|tree| {
            let line_table = self.store.read_line_table(scene_name)?;
            Ok((tree, line_table))
        });
        let result = result.and_then(|(tree, line_table)| self.start_session(scene_name, &tree, line_table));

        if let Err(e) = &result {
            error!("Dialogue for scene {} aborted: {}", scene_name, e);
            self.state = PlayerState::Idle;
        }
        result
    }

    /// Starts playing an in-memory tree.
    pub fn begin_with_tree(&mut self, tree: &DialogueTree) -> Result<(), DialogueError> {
        self.prepare()?;

        let result = self.start_session(&tree.scene_name, tree, HashMap::new());
        if let Err(e) = &result {
            error!("Dialogue for scene {} aborted: {}", tree.scene_name, e);
            self.state = PlayerState::Idle;
        }
        result
    }

    fn prepare(&mut self) -> Result<(), DialogueError> {
        self.stage.check()?;
        self.teardown();
        self.cancel.reset();
        self.state = PlayerState::Loading;
        Ok(())
    }

    fn start_session(
        &mut self,
        scene_name: &str,
        tree: &DialogueTree,
        line_table: HashMap<u32, String>,
    ) -> Result<(), DialogueError> {
        let dialogue = loader::linearize(tree)?;
        let formatter = LineFormatter::new(&self.config.locale)?;

        let mut shown = [None, None];
        for &side in &[Side::Left, Side::Right] {
            if let Some((character, expression)) = tree.initial_speaker(side) {
                let portrait = self.stage.portrait(side)?;
                portrait.display_portrait(PortraitSpec {
                    character,
                    expression,
                    warm_tint: tree.warm_tint,
                    cold_tint: tree.cold_tint,
                    animated: true,
                });
                portrait.fade_in();
                shown[slot(side)] = Some(character);
            }
        }

        info!(
            "Starting dialogue for scene {} at line {} ({} lines)",
            scene_name,
            dialogue.head(),
            dialogue.len()
        );
        self.session = Some(Session {
            scene_name: scene_name.to_string(),
            dialogue,
            line_table,
            formatter,
            warm_tint: tree.warm_tint,
            cold_tint: tree.cold_tint,
            shown,
            previous_side: None,
            current_text: Vec::new(),
            lines_shown: 0,
        });
        self.state = PlayerState::StartDelay {
            remaining: self.config.start_delay,
        };
        Ok(())
    }

    /// Advances the session by `elapsed` and reports what it waits on next.
    ///
    /// Errors end the session.
    pub fn tick(&mut self, elapsed: Duration) -> Result<SuspendReason, DialogueError> {
        let mut budget = elapsed;
        let mut frame = Frame::default();

        loop {
            if self.session.is_some() && self.cancel.is_cancelled() {
                let scene = self.session.as_ref().map(|s| s.scene_name.clone()).unwrap_or_default();
                info!("Dialogue for scene {} cancelled", scene);
                self.teardown();
                return Ok(SuspendReason::Cancelled);
            }

            match self.step(&mut budget, &mut frame) {
                Ok(Step::Continue) => {}
                Ok(Step::Suspend(reason)) => return Ok(reason),
                Err(e) => {
                    if self.session.is_some() {
                        error!("Dialogue stopped: {}", e);
                        self.teardown();
                    }
                    return Err(e);
                }
            }
        }
    }

    fn step(&mut self, budget: &mut Duration, frame: &mut Frame) -> Result<Step, DialogueError> {
        match self.state.clone() {
            PlayerState::Idle | PlayerState::Loading => Err("no dialogue session is running".into()),
            PlayerState::StartDelay { remaining } => {
                if *budget < remaining {
                    self.state = PlayerState::StartDelay {
                        remaining: remaining - *budget,
                    };
                    *budget = Duration::from_secs(0);
                    return Ok(Step::Suspend(SuspendReason::StartDelay));
                }

                *budget -= remaining;
                let head = active(&mut self.session)?.dialogue.head();
                self.enter_line(head)?;
                Ok(Step::Continue)
            }
            PlayerState::Transitioning { line_id, phase } => {
                if self.stage.is_transitioning() {
                    return Ok(Step::Suspend(SuspendReason::PortraitTransition { line_id }));
                }

                match phase {
                    TransitionPhase::FadingOut => {
                        let (side, spec) = active(&mut self.session)?.speaker(line_id)?;
                        let portrait = self.stage.portrait(side)?;
                        portrait.display_portrait(spec);
                        portrait.fade_in();
                        self.state = PlayerState::Transitioning {
                            line_id,
                            phase: TransitionPhase::FadingIn,
                        };
                    }
                    TransitionPhase::FadingIn => self.start_typing(line_id)?,
                }
                Ok(Step::Continue)
            }
            PlayerState::Presenting {
                line_id,
                mut revealed,
                mut until_next,
            } => {
                let total = active(&mut self.session)?.current_text.len();

                if !frame.skip_polled && !frame.submit_polled {
                    frame.skip_polled = true;
                    if self.stage.input()?.skip_requested() {
                        debug!("Skipped typing line {} at {}/{}", line_id, revealed, total);
                        self.finish_line(line_id)?;
                        return Ok(Step::Continue);
                    }
                }

                let before = revealed;
                while revealed < total && *budget >= until_next {
                    *budget -= until_next;
                    revealed += 1;
                    until_next = self.config.character_delay;
                }

                if revealed >= total {
                    self.finish_line(line_id)?;
                    return Ok(Step::Continue);
                }

                until_next -= *budget;
                *budget = Duration::from_secs(0);
                if revealed != before {
                    let text: String = active(&mut self.session)?.current_text[..revealed].iter().collect();
                    self.stage.text_box()?.set_text(&text);
                }
                self.state = PlayerState::Presenting {
                    line_id,
                    revealed,
                    until_next,
                };
                Ok(Step::Suspend(SuspendReason::Typing {
                    line_id,
                    revealed,
                    total,
                }))
            }
            PlayerState::AwaitingAdvance { line_id } => {
                let waiting = Step::Suspend(SuspendReason::AwaitingSubmit { line_id });
                if frame.submit_polled {
                    return Ok(waiting);
                }
                frame.submit_polled = true;
                if !self.stage.input()?.submit_pressed() {
                    return Ok(waiting);
                }

                let next = active(&mut self.session)?
                    .dialogue
                    .line(line_id)
                    .and_then(|line| line.next());
                match next {
                    Some(next) => self.enter_line(next)?,
                    None => self.close()?,
                }
                Ok(Step::Continue)
            }
            PlayerState::Closing => {
                if self.stage.is_transitioning() {
                    return Ok(Step::Suspend(SuspendReason::Closing));
                }

                let session = self.session.take();
                let lines_shown = session.as_ref().map_or(0, |s| s.lines_shown);
                if let Some(session) = session {
                    info!(
                        "Dialogue for scene {} complete after {} lines",
                        session.scene_name, lines_shown
                    );
                }
                self.state = PlayerState::Finished { lines_shown };
                Ok(Step::Continue)
            }
            PlayerState::Finished { lines_shown } => {
                Ok(Step::Suspend(SuspendReason::DialogueComplete { lines_shown }))
            }
        }
    }

    /// Applies the portrait rules for `line_id` and starts its transition or
    /// its typing.
    fn enter_line(&mut self, line_id: u32) -> Result<(), DialogueError> {
        let session = active(&mut self.session)?;
        let (side, spec) = session.speaker(line_id)?;

        let raw_text = match session.line_table.get(&line_id) {
            Some(text) => text.as_str(),
            None => session
                .dialogue
                .line(line_id)
                .map_or("", |line| line.node.text.as_str()),
        };
        session.current_text = session.formatter.compose(raw_text, &self.variables)?.chars().collect();
        session.lines_shown += 1;
        debug!("Entering line {} ({:?} on the {:?} side)", line_id, spec.character, side);

        self.stage.text_box()?.clear();

        let other = side.opposite();
        if session.shown[slot(other)].is_some() {
            let portrait = self.stage.portrait(other)?;
            portrait.stop_talking();
            portrait.partial_fade(self.config.partial_fade_opacity);
        }

        let side_changed = session.previous_side != Some(side);
        session.previous_side = Some(side);
        let displayed = session.shown[slot(side)].replace(spec.character);

        let portrait = self.stage.portrait(side)?;
        let phase = match displayed {
            Some(character) if character != spec.character => {
                debug!("Replacing {:?} with {:?}", character, spec.character);
                portrait.stop_talking();
                portrait.fade_out();
                Some(TransitionPhase::FadingOut)
            }
            Some(_) if !side_changed => {
                portrait.display_portrait(spec);
                None
            }
            _ => {
                portrait.display_portrait(spec);
                portrait.fade_in();
                Some(TransitionPhase::FadingIn)
            }
        };

        match phase {
            Some(phase) => {
                self.state = PlayerState::Transitioning { line_id, phase };
                Ok(())
            }
            None => self.start_typing(line_id),
        }
    }

    fn start_typing(&mut self, line_id: u32) -> Result<(), DialogueError> {
        let session = active(&mut self.session)?;
        let (side, _) = session.speaker(line_id)?;

        if session.current_text.is_empty() {
            return self.finish_line(line_id);
        }

        let first: String = session.current_text[..1].iter().collect();
        self.stage.portrait(side)?.start_talking();
        self.stage.text_box()?.set_text(&first);
        self.state = PlayerState::Presenting {
            line_id,
            revealed: 1,
            until_next: self.config.character_delay,
        };
        Ok(())
    }

    fn finish_line(&mut self, line_id: u32) -> Result<(), DialogueError> {
        let session = active(&mut self.session)?;
        let (side, _) = session.speaker(line_id)?;
        let text: String = session.current_text.iter().collect();

        self.stage.text_box()?.set_text(&text);
        self.stage.portrait(side)?.stop_talking();
        self.state = PlayerState::AwaitingAdvance { line_id };
        Ok(())
    }

    fn close(&mut self) -> Result<(), DialogueError> {
        let session = active(&mut self.session)?;
        for &side in &[Side::Left, Side::Right] {
            if session.shown[slot(side)].take().is_some() {
                let portrait = self.stage.portrait(side)?;
                portrait.stop_talking();
                portrait.fade_out();
            }
        }
        self.stage.text_box()?.clear();
        self.state = PlayerState::Closing;
        Ok(())
    }

    fn teardown(&mut self) {
        if self.session.take().is_some() {
            self.stage.reset();
        }
        self.state = PlayerState::Idle;
    }
}
