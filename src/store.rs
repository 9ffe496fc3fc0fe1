//! Reading and writing dialogue graph files and their line tables.
//!
//! Every scene has a graph file named `Dialogue<scene>.dialogue` and, optionally,
//! a `Dialogue<scene>-Lines.csv` string table that overrides node text by id.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::*;
use prost::Message;
use serde::{Deserialize, Serialize};

use crate::dialogue_proto::DialogueTree;
use crate::errors::DialogueError;

pub const FILE_PREFIX: &str = "Dialogue";
pub const GRAPH_EXTENSION: &str = "dialogue";
const LINE_TABLE_SUFFIX: &str = "-Lines.csv";

/// A row of a line table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LineRecord {
    pub id: u32,
    pub text: String,
}

/// Locates scene files under a single resource directory.
#[derive(Debug, Clone)]
pub struct GraphStore {
    directory: PathBuf,
}

impl GraphStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn graph_path(&self, scene_name: &str) -> PathBuf {
        self.directory
            .join(format!("{}{}.{}", FILE_PREFIX, scene_name, GRAPH_EXTENSION))
    }

    pub fn line_table_path(&self, scene_name: &str) -> PathBuf {
        self.directory
            .join(format!("{}{}{}", FILE_PREFIX, scene_name, LINE_TABLE_SUFFIX))
    }

    /// Loads the graph for `scene_name`, surfacing why it failed.
    pub fn read_scene(&self, scene_name: &str) -> Result<DialogueTree, DialogueError> {
        read_tree(&self.graph_path(scene_name))
    }

    /// Loads the graph for `scene_name`. Failures are logged and yield `None`.
    pub fn load_scene(&self, scene_name: &str) -> Option<DialogueTree> {
        load_tree(&self.graph_path(scene_name))
    }

    /// Writes `tree` as the graph file of `scene_name`.
    pub fn write_scene(&self, tree: &DialogueTree, scene_name: &str) -> Result<PathBuf, DialogueError> {
        write_tree(tree, scene_name, &self.directory)
    }

    /// Reads the optional line table of a scene. A missing table is an empty one.
    pub fn read_line_table(&self, scene_name: &str) -> Result<HashMap<u32, String>, DialogueError> {
        let path = self.line_table_path(scene_name);
        if !path.exists() {
            debug!("No line table at {}", path.display());
            return Ok(HashMap::new());
        }

        let load_error = |reason: String| DialogueError::GraphLoad {
            path: path.clone(),
            reason,
        };

        let mut csv_reader = csv::Reader::from_path(&path).map_err(|e| load_error(e.to_string()))?;
        let mut table = HashMap::new();
        for record in csv_reader.deserialize() {
            let record: LineRecord = record.map_err(|e| load_error(e.to_string()))?;
            if table.insert(record.id, record.text).is_some() {
                warn!("Line table {} overrides node {} twice", path.display(), record.id);
            }
        }

        info!("Loaded {} lines from {}", table.len(), path.display());
        Ok(table)
    }

    /// Exports the text of every node so it can be translated.
    pub fn write_line_table(&self, tree: &DialogueTree, scene_name: &str) -> Result<PathBuf, DialogueError> {
        let path = self.line_table_path(scene_name);
        let write_error = |reason: String| DialogueError::GraphWrite {
            path: path.clone(),
            reason,
        };

        fs::create_dir_all(&self.directory).map_err(|e| write_error(e.to_string()))?;
        let mut csv_writer = csv::Writer::from_path(&path).map_err(|e| write_error(e.to_string()))?;
        for node in &tree.nodes {
            csv_writer
                .serialize(LineRecord {
                    id: node.id,
                    text: node.text.clone(),
                })
                .map_err(|e| write_error(e.to_string()))?;
        }
        csv_writer.flush().map_err(|e| write_error(e.to_string()))?;

        Ok(path)
    }
}

/// Decodes a graph file.
pub fn read_tree(path: &Path) -> Result<DialogueTree, DialogueError> {
    let load_error = |reason: String| DialogueError::GraphLoad {
        path: path.to_path_buf(),
        reason,
    };

    let data = fs::read(path).map_err(|e| load_error(e.to_string()))?;
    let tree = DialogueTree::decode(&*data).map_err(|e| load_error(e.to_string()))?;
    debug!(
        "Read scene {:?} from {}: {} nodes, {} connections",
        tree.scene_name,
        path.display(),
        tree.nodes.len(),
        tree.connections.len()
    );
    Ok(tree)
}

/// Lenient version of [`read_tree`]: a missing or malformed file is logged and
/// treated as absent.
pub fn load_tree(path: &Path) -> Option<DialogueTree> {
    match read_tree(path) {
        Ok(tree) => Some(tree),
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

/// Encodes `tree` to `<directory>/Dialogue<name>.dialogue`, creating the
/// directory if needed.
pub fn write_tree(tree: &DialogueTree, name: &str, directory: &Path) -> Result<PathBuf, DialogueError> {
    let path = GraphStore::new(directory).graph_path(name);
    let write_error = |reason: String| DialogueError::GraphWrite {
        path: path.clone(),
        reason,
    };

    let mut data = Vec::with_capacity(tree.encoded_len());
    tree.encode(&mut data).map_err(|e| write_error(e.to_string()))?;

    fs::create_dir_all(directory).map_err(|e| write_error(e.to_string()))?;
    fs::write(&path, &data).map_err(|e| write_error(e.to_string()))?;

    info!("Wrote scene {:?} to {}", name, path.display());
    Ok(path)
}
