//! Interfaces the player drives. The host implements these on top of its
//! sprites, text widgets and input devices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::dialogue_proto::{Character, Expression};

/// What a portrait should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortraitSpec {
    pub character: Character,
    pub expression: Expression,
    pub warm_tint: bool,
    pub cold_tint: bool,
    /// False when the portrait's transforms are baked into the sprite.
    pub animated: bool,
}

/// One side of the dialogue box.
pub trait Portrait {
    fn fade_in(&mut self);
    fn fade_out(&mut self);
    fn hide(&mut self);
    /// Dims the portrait to `opacity` while the other side speaks.
    fn partial_fade(&mut self, opacity: f32);
    fn display_portrait(&mut self, spec: PortraitSpec);
    fn start_talking(&mut self) {}
    fn stop_talking(&mut self);
    /// True while a fade started by this trait is still playing.
    fn is_transitioning(&self) -> bool {
        false
    }
}

pub trait TextBox {
    /// Shows the part of the current line revealed so far.
    fn set_text(&mut self, text: &str);
    fn clear(&mut self) {
        self.set_text("");
    }
}

pub trait InputSource {
    /// Whether submit was pressed since the last call.
    fn submit_pressed(&mut self) -> bool;
    /// Whether the player asked to reveal the current line at once.
    fn skip_requested(&mut self) -> bool;
}

/// Stops a running session at its next suspension point. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
