use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Structural problems found while resolving a dialogue graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// The tree has no nodes, so there is nothing to play.
    EmptyGraph,
    /// Two nodes share the same id.
    DuplicateNodeId(u32),
    /// A connection references a node that isn't in the tree.
    DanglingConnection { from: u32, to: u32 },
    /// Walking `parents[0]` from `start` came back to `repeated`.
    ParentCycle { start: u32, repeated: u32 },
    /// Walking `connections[0]` from the head came back to `repeated`.
    ChainCycle { head: u32, repeated: u32 },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGraph => write!(f, "the dialogue graph has no nodes"),
            Self::DuplicateNodeId(id) => write!(f, "node id {} is used more than once", id),
            Self::DanglingConnection { from, to } => {
                write!(f, "connection {} -> {} references a missing node", from, to)
            }
            Self::ParentCycle { start, repeated } => write!(
                f,
                "parent chain starting at node {} loops back to node {}",
                start, repeated
            ),
            Self::ChainCycle { head, repeated } => write!(
                f,
                "playback chain from head {} loops back to node {}",
                head, repeated
            ),
        }
    }
}

/// Which injected collaborator was absent when a session started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    LeftPortrait,
    RightPortrait,
    TextBox,
    Input,
}

#[derive(Debug)]
pub enum DialogueError {
    /// The backing file is missing or could not be parsed
    GraphLoad { path: PathBuf, reason: String },
    /// A graph or line table could not be saved
    GraphWrite { path: PathBuf, reason: String },
    /// The graph loaded but cannot be traversed safely
    GraphIntegrity(IntegrityIssue),
    /// A presentation or input collaborator was never provided
    MissingCollaborator(Collaborator),
    /// An authoring operation tried to create an invalid edge
    InvalidConnection { from: u32, to: u32, reason: &'static str },
    /// A line contains a malformed format function, or the locale is unknown
    Format(String),
    /// A general logic or usage error
    General(String),
}

impl fmt::Display for DialogueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GraphLoad { path, reason } => {
                write!(f, "Could not load dialogue graph {}: {}", path.display(), reason)
            }
            Self::GraphWrite { path, reason } => {
                write!(f, "Could not write dialogue graph {}: {}", path.display(), reason)
            }
            Self::GraphIntegrity(issue) => write!(f, "Dialogue graph integrity warning: {}", issue),
            Self::MissingCollaborator(which) => {
                write!(f, "Dialogue player is missing its {:?} collaborator", which)
            }
            Self::InvalidConnection { from, to, reason } => {
                write!(f, "Cannot connect node {} to node {}: {}", from, to, reason)
            }
            Self::Format(message) => write!(f, "Bad format function: {}", message),
            Self::General(message) => write!(f, "A dialogue error was encountered: {}", message),
        }
    }
}

impl Error for DialogueError {}

impl From<IntegrityIssue> for DialogueError {
    fn from(issue: IntegrityIssue) -> Self {
        Self::GraphIntegrity(issue)
    }
}

impl From<String> for DialogueError {
    fn from(message: String) -> Self {
        Self::General(message)
    }
}

impl From<&str> for DialogueError {
    fn from(message: &str) -> Self {
        Self::General(message.to_owned())
    }
}
