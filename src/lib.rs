//! Dialogue graphs for portrait dialogues: authoring, storage, loading and
//! playback.
//!
//! A scene's [`DialogueTree`] is written by the [`GraphStore`], resolved into a
//! chain of lines by [`linearize`], and played by a [`DialoguePlayer`] that
//! drives host-provided [`Portrait`], [`TextBox`] and [`InputSource`]
//! implementations.

pub use crate::{
    dialogue_proto::{
        Character, Connection, ConnectionPoint, ConnectionPointKind, DialogueNode, DialogueTree,
        Expression, Side,
    },
    errors::{Collaborator, DialogueError, IntegrityIssue},
    format::{substitute_variables, LineFormatter},
    loader::{linearize, DialogueLine, LinearizedDialogue},
    player::{DialoguePlayer, PlayerConfig, PlayerState, SuspendReason, TransitionPhase},
    presenter::{CancelToken, InputSource, Portrait, PortraitSpec, TextBox},
    store::{load_tree, read_tree, write_tree, GraphStore, LineRecord},
    tree::NodeSpec,
};

pub mod dialogue_proto {
    include!(concat!(env!("OUT_DIR"), "/dialogue.rs"));
}

mod errors;
mod format;
mod loader;
pub mod player;
mod presenter;
pub mod store;
mod tree;
