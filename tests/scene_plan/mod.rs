use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use colloquy::*;

pub const FRAME: Duration = Duration::from_millis(16);
/// Ticks a fade keeps a portrait busy for.
pub const FADE_TICKS: u32 = 3;
const MAX_TICKS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    Display(String, String, String),
    FadeIn(String),
    FadeOut(String),
    PartialFade(String),
    Hide(String),
    Line(String),
    Stop,
}

impl PlanStep {
    pub fn new(line: &str) -> Self {
        let mut split_line = line.splitn(2, ": ");
        let step = split_line.next();
        let rest = split_line.next().unwrap_or_default().to_owned();
        match step {
            Some("display") => {
                let parts: Vec<&str> = rest.split_whitespace().collect();
                assert_eq!(parts.len(), 3, "display needs a side, character and expression: {}", line);
                Self::Display(parts[0].to_owned(), parts[1].to_owned(), parts[2].to_owned())
            }
            Some("fade_in") => Self::FadeIn(rest),
            Some("fade_out") => Self::FadeOut(rest),
            Some("partial_fade") => Self::PartialFade(rest),
            Some("hide") => Self::Hide(rest),
            Some("line") => Self::Line(rest),
            Some("stop") => Self::Stop,
            Some(step) => panic!("Could not parse scene plan step \"{}\" in line \"{}\"", step, line),
            None => panic!("Could not parse scene plan step in line \"{}\"", line),
        }
    }
}

pub fn parse_plan(plan: &str) -> Vec<PlanStep> {
    plan.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PlanStep::new)
        .collect()
}

pub type Recording = Rc<RefCell<Vec<PlanStep>>>;

fn side_name(side: Side) -> String {
    match side {
        Side::Left => "left".to_owned(),
        Side::Right => "right".to_owned(),
    }
}

pub struct RecordingPortrait {
    side: Side,
    recording: Recording,
    fade_ticks: Rc<Cell<u32>>,
    pub talking: Rc<Cell<bool>>,
}

impl Portrait for RecordingPortrait {
    fn fade_in(&mut self) {
        self.recording.borrow_mut().push(PlanStep::FadeIn(side_name(self.side)));
        self.fade_ticks.set(FADE_TICKS);
    }

    fn fade_out(&mut self) {
        self.recording.borrow_mut().push(PlanStep::FadeOut(side_name(self.side)));
        self.fade_ticks.set(FADE_TICKS);
    }

    fn hide(&mut self) {
        self.recording.borrow_mut().push(PlanStep::Hide(side_name(self.side)));
        self.fade_ticks.set(0);
    }

    fn partial_fade(&mut self, opacity: f32) {
        assert!(opacity > 0.0 && opacity < 1.0);
        self.recording.borrow_mut().push(PlanStep::PartialFade(side_name(self.side)));
    }

    fn display_portrait(&mut self, spec: PortraitSpec) {
        self.recording.borrow_mut().push(PlanStep::Display(
            side_name(self.side),
            format!("{:?}", spec.character),
            format!("{:?}", spec.expression),
        ));
    }

    fn start_talking(&mut self) {
        self.talking.set(true);
    }

    fn stop_talking(&mut self) {
        self.talking.set(false);
    }

    fn is_transitioning(&self) -> bool {
        self.fade_ticks.get() > 0
    }
}

pub struct RecordingTextBox {
    text: Rc<RefCell<String>>,
    updates: Rc<Cell<usize>>,
}

impl TextBox for RecordingTextBox {
    fn set_text(&mut self, text: &str) {
        *self.text.borrow_mut() = text.to_owned();
        self.updates.set(self.updates.get() + 1);
    }
}

pub struct ScriptedInput {
    submit: Rc<Cell<bool>>,
    skip: Rc<Cell<bool>>,
}

impl InputSource for ScriptedInput {
    fn submit_pressed(&mut self) -> bool {
        self.submit.replace(false)
    }

    fn skip_requested(&mut self) -> bool {
        self.skip.replace(false)
    }
}

/// A player wired to recording collaborators.
pub struct SceneRunner {
    pub player: DialoguePlayer,
    pub recording: Recording,
    pub text: Rc<RefCell<String>>,
    pub text_updates: Rc<Cell<usize>>,
    pub submit: Rc<Cell<bool>>,
    pub skip: Rc<Cell<bool>>,
    pub left_talking: Rc<Cell<bool>>,
    pub right_talking: Rc<Cell<bool>>,
    fades: [Rc<Cell<u32>>; 2],
}

impl SceneRunner {
    pub fn new(store: GraphStore, config: PlayerConfig) -> Self {
        let _ = pretty_env_logger::try_init();

        let recording = Recording::default();
        let text = Rc::new(RefCell::new(String::new()));
        let text_updates = Rc::new(Cell::new(0));
        let submit = Rc::new(Cell::new(false));
        let skip = Rc::new(Cell::new(false));
        let fades = [Rc::new(Cell::new(0)), Rc::new(Cell::new(0))];
        let left_talking = Rc::new(Cell::new(false));
        let right_talking = Rc::new(Cell::new(false));

        let portrait = |side: Side, fade: &Rc<Cell<u32>>, talking: &Rc<Cell<bool>>| {
            Box::new(RecordingPortrait {
                side,
                recording: recording.clone(),
                fade_ticks: fade.clone(),
                talking: talking.clone(),
            })
        };
        let player = DialoguePlayer::new(store, config)
            .with_portraits(
                portrait(Side::Left, &fades[0], &left_talking),
                portrait(Side::Right, &fades[1], &right_talking),
            )
            .with_text_box(Box::new(RecordingTextBox {
                text: text.clone(),
                updates: text_updates.clone(),
            }))
            .with_input(Box::new(ScriptedInput {
                submit: submit.clone(),
                skip: skip.clone(),
            }));

        Self {
            player,
            recording,
            text,
            text_updates,
            submit,
            skip,
            left_talking,
            right_talking,
            fades,
        }
    }

    /// Uses no delays at all, so only fades take more than one tick.
    pub fn instant() -> Self {
        Self::new(
            GraphStore::new("unused"),
            PlayerConfig {
                character_delay: Duration::from_secs(0),
                start_delay: Duration::from_secs(0),
                ..PlayerConfig::default()
            },
        )
    }

    /// Ticks once, then lets the fades advance as a host would.
    pub fn tick(&mut self, elapsed: Duration) -> Result<SuspendReason, DialogueError> {
        let reason = self.player.tick(elapsed);
        for fade in &self.fades {
            fade.set(fade.get().saturating_sub(1));
        }
        reason
    }

    /// Runs the current session to its end, pressing submit on every line.
    /// Returns the ids of the lines shown, in order.
    pub fn run_to_end(&mut self) -> Result<Vec<u32>, DialogueError> {
        let mut shown = Vec::new();
        for _ in 0..MAX_TICKS {
            match self.tick(FRAME)? {
                SuspendReason::AwaitingSubmit { line_id } => {
                    if shown.last() != Some(&line_id) {
                        shown.push(line_id);
                        let text = self.text.borrow().clone();
                        self.recording.borrow_mut().push(PlanStep::Line(text));
                    }
                    self.submit.set(true);
                }
                SuspendReason::DialogueComplete { lines_shown } => {
                    assert_eq!(lines_shown, shown.len());
                    self.recording.borrow_mut().push(PlanStep::Stop);
                    return Ok(shown);
                }
                SuspendReason::Cancelled => return Ok(shown),
                _ => {}
            }
        }
        panic!("Dialogue did not finish within {} ticks", MAX_TICKS);
    }

    /// Asserts that everything recorded so far matches `plan`.
    pub fn assert_plan(&self, plan: &str) {
        let expected = parse_plan(plan);
        let recorded = self.recording.borrow();
        for (i, (got, want)) in recorded.iter().zip(&expected).enumerate() {
            assert_eq!(got, want, "[{}] plan mismatch, recorded {:#?}", i, *recorded);
        }
        assert_eq!(
            recorded.len(),
            expected.len(),
            "plan length mismatch, recorded {:#?}",
            *recorded
        );
    }
}
