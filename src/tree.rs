//! Authoring operations on [`DialogueTree`].
//!
//! The tree itself is the generated protobuf message, so whatever is built here
//! can be written by the store as-is.

use log::*;

use crate::dialogue_proto::{
    Character, Connection, ConnectionPoint, ConnectionPointKind, DialogueNode, DialogueTree,
    Expression, Rect, Side,
};
use crate::errors::DialogueError;

const FIRST_NODE_ID: u32 = 1;
const NODE_WIDTH: f32 = 200.0;
const NODE_HEIGHT: f32 = 50.0;
const POINT_SIZE: f32 = 10.0;

/// Everything needed to create a node, apart from its id.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub text: String,
    pub character: Character,
    pub expression: Expression,
    pub side: Side,
    pub animated: bool,
    pub position: (f32, f32),
}

impl NodeSpec {
    pub fn new(text: impl Into<String>, character: Character, side: Side) -> Self {
        Self {
            text: text.into(),
            character,
            expression: Expression::Neutral,
            side,
            animated: true,
            position: (0.0, 0.0),
        }
    }

    pub fn expression(mut self, expression: Expression) -> Self {
        self.expression = expression;
        self
    }

    pub fn animated(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = (x, y);
        self
    }
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl ConnectionPoint {
    fn attached(node_id: u32, kind: ConnectionPointKind, node_rect: &Rect) -> Self {
        let x = match kind {
            ConnectionPointKind::In => node_rect.x - POINT_SIZE,
            ConnectionPointKind::Out => node_rect.x + node_rect.width,
        };
        let mut point = Self {
            node_id,
            kind: 0,
            rect: Some(Rect {
                x,
                y: node_rect.y + (node_rect.height - POINT_SIZE) / 2.0,
                width: POINT_SIZE,
                height: POINT_SIZE,
            }),
        };
        point.set_kind(kind);
        point
    }
}

impl Connection {
    /// Id of the node the edge leaves from.
    pub fn from_id(&self) -> Option<u32> {
        self.out_point.as_ref().map(|point| point.node_id)
    }

    /// Id of the node the edge leads to.
    pub fn to_id(&self) -> Option<u32> {
        self.in_point.as_ref().map(|point| point.node_id)
    }
}

impl DialogueTree {
    pub fn new(scene_name: &str) -> Self {
        Self {
            scene_name: scene_name.to_string(),
            next_node_id: FIRST_NODE_ID,
            ..Self::default()
        }
    }

    /// Sets the idle portrait shown on `side` before the first line.
    pub fn enable_side(&mut self, side: Side, character: Character, expression: Expression) {
        match side {
            Side::Left => {
                self.left_enabled = true;
                self.set_left_character(character);
                self.set_left_expression(expression);
            }
            Side::Right => {
                self.right_enabled = true;
                self.set_right_character(character);
                self.set_right_expression(expression);
            }
        }
    }

    /// Returns the idle portrait for `side`, if that side starts visible.
    pub fn initial_speaker(&self, side: Side) -> Option<(Character, Expression)> {
        match side {
            Side::Left if self.left_enabled => Some((self.left_character(), self.left_expression())),
            Side::Right if self.right_enabled => {
                Some((self.right_character(), self.right_expression()))
            }
            _ => None,
        }
    }

    /// Adds a node and returns its freshly assigned id.
    ///
    /// Fails once the id space is used up, since ids are never handed out twice.
    pub fn add_node(&mut self, spec: NodeSpec) -> Result<u32, DialogueError> {
        let exhausted = || DialogueError::General(format!("scene {} has run out of node ids", self.scene_name));

        // Trees written by older tools may not carry the counter.
        let highest = self.nodes.iter().map(|node| node.id).max().unwrap_or(0);
        let after_highest = highest.checked_add(1).ok_or_else(exhausted)?;
        let id = self.next_node_id.max(after_highest).max(FIRST_NODE_ID);
        self.next_node_id = id.checked_add(1).ok_or_else(exhausted)?;

        let rect = Rect {
            x: spec.position.0,
            y: spec.position.1,
            width: NODE_WIDTH,
            height: NODE_HEIGHT,
        };
        let mut node = DialogueNode {
            id,
            text: spec.text,
            animated: spec.animated,
            in_point: Some(ConnectionPoint::attached(id, ConnectionPointKind::In, &rect)),
            out_point: Some(ConnectionPoint::attached(id, ConnectionPointKind::Out, &rect)),
            rect: Some(rect),
            ..DialogueNode::default()
        };
        node.set_character(spec.character);
        node.set_expression(spec.expression);
        node.set_side(spec.side);

        debug!("Added node {} to scene {}", id, self.scene_name);
        self.nodes.push(node);
        Ok(id)
    }

    pub fn node(&self, id: u32) -> Option<&DialogueNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Connects the out point of `from` to the in point of `to`.
    pub fn connect(&mut self, from: u32, to: u32) -> Result<(), DialogueError> {
        if from == to {
            return Err(DialogueError::InvalidConnection { from, to, reason: "a node cannot follow itself" });
        }

        let out_point = self.node(from).and_then(|node| node.out_point.clone());
        let in_point = self.node(to).and_then(|node| node.in_point.clone());
        let (out_point, in_point) = match (out_point, in_point) {
            (Some(out_point), Some(in_point)) => (out_point, in_point),
            _ => return Err(DialogueError::InvalidConnection { from, to, reason: "unknown node" }),
        };

        if self.is_connected(from, to) {
            return Err(DialogueError::InvalidConnection { from, to, reason: "already connected" });
        }

        self.connections.push(Connection {
            in_point: Some(in_point),
            out_point: Some(out_point),
        });
        Ok(())
    }

    pub fn is_connected(&self, from: u32, to: u32) -> bool {
        self.connections
            .iter()
            .any(|connection| connection.from_id() == Some(from) && connection.to_id() == Some(to))
    }

    /// Removes the edge `from -> to`, returning whether one existed.
    pub fn disconnect(&mut self, from: u32, to: u32) -> bool {
        let before = self.connections.len();
        self.connections
            .retain(|connection| !(connection.from_id() == Some(from) && connection.to_id() == Some(to)));
        self.connections.len() != before
    }

    /// Removes a node together with every connection touching it. The id is
    /// not handed out again.
    pub fn remove_node(&mut self, id: u32) -> Option<DialogueNode> {
        let index = self.nodes.iter().position(|node| node.id == id)?;
        self.connections
            .retain(|connection| connection.from_id() != Some(id) && connection.to_id() != Some(id));
        Some(self.nodes.remove(index))
    }
}
