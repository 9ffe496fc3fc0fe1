//! Resolves a stored [`DialogueTree`] into lines linked by id and finds the head.

use std::collections::{HashMap, HashSet};

use log::*;

use crate::dialogue_proto::{DialogueNode, DialogueTree};
use crate::errors::{DialogueError, IntegrityIssue};

/// A node together with its resolved neighbours.
#[derive(Debug, Clone)]
pub struct DialogueLine {
    pub node: DialogueNode,
    /// Ids of the lines that can follow this one, in connection order.
    pub connections: Vec<u32>,
    /// Ids of the lines that lead into this one, in connection order.
    pub parents: Vec<u32>,
}

impl DialogueLine {
    fn new(node: DialogueNode) -> Self {
        Self {
            node,
            connections: Vec::new(),
            parents: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.node.id
    }

    /// The line playback moves to next. Only the first connection is followed.
    pub fn next(&self) -> Option<u32> {
        self.connections.first().copied()
    }

    pub fn is_terminal(&self) -> bool {
        self.connections.is_empty()
    }
}

/// A dialogue ready to be played, starting at `head`.
#[derive(Debug, Clone)]
pub struct LinearizedDialogue {
    lines: HashMap<u32, DialogueLine>,
    head: u32,
}

impl LinearizedDialogue {
    pub fn head(&self) -> u32 {
        self.head
    }

    pub fn line(&self, id: u32) -> Option<&DialogueLine> {
        self.lines.get(&id)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Ids in playback order, from the head to the first terminal line.
    pub fn chain(&self) -> Vec<u32> {
        let mut chain = Vec::new();
        let mut current = Some(self.head);
        while let Some(id) = current {
            chain.push(id);
            current = self.lines.get(&id).and_then(DialogueLine::next);
        }
        chain
    }
}

/// Builds the traversal structure for `tree`.
///
/// Fails with [`DialogueError::GraphIntegrity`] if the tree is empty, reuses an
/// id, has a connection to a missing node, or if following either the parent
/// chain or the playback chain would loop forever.
pub fn linearize(tree: &DialogueTree) -> Result<LinearizedDialogue, DialogueError> {
    let first = tree.nodes.first().ok_or(IntegrityIssue::EmptyGraph)?.id;

    let mut lines = HashMap::with_capacity(tree.nodes.len());
    for node in &tree.nodes {
        if lines.insert(node.id, DialogueLine::new(node.clone())).is_some() {
            return Err(IntegrityIssue::DuplicateNodeId(node.id).into());
        }
    }

    for connection in &tree.connections {
        let (from, to) = match (connection.from_id(), connection.to_id()) {
            (Some(from), Some(to)) if lines.contains_key(&from) && lines.contains_key(&to) => (from, to),
            (from, to) => {
                return Err(IntegrityIssue::DanglingConnection {
                    from: from.unwrap_or_default(),
                    to: to.unwrap_or_default(),
                }
                .into());
            }
        };

        if let Some(line) = lines.get_mut(&from) {
            line.connections.push(to);
        }
        if let Some(line) = lines.get_mut(&to) {
            line.parents.push(from);
        }
    }

    let head = resolve_head(&lines, first)?;
    let dialogue = LinearizedDialogue { lines, head };
    check_chain(&dialogue)?;
    report_oddities(&dialogue, tree);

    debug!(
        "Linearized scene {:?}: {} lines, head {}",
        tree.scene_name,
        dialogue.len(),
        head
    );
    Ok(dialogue)
}

fn resolve_head(lines: &HashMap<u32, DialogueLine>, start: u32) -> Result<u32, IntegrityIssue> {
    let mut seen = HashSet::new();
    let mut current = start;
    loop {
        if !seen.insert(current) {
            return Err(IntegrityIssue::ParentCycle {
                start,
                repeated: current,
            });
        }
        match lines.get(&current).and_then(|line| line.parents.first()) {
            Some(&parent) => current = parent,
            None => return Ok(current),
        }
    }
}

fn check_chain(dialogue: &LinearizedDialogue) -> Result<(), IntegrityIssue> {
    let mut seen = HashSet::new();
    let mut current = Some(dialogue.head);
    while let Some(id) = current {
        if !seen.insert(id) {
            return Err(IntegrityIssue::ChainCycle {
                head: dialogue.head,
                repeated: id,
            });
        }
        current = dialogue.line(id).and_then(DialogueLine::next);
    }
    Ok(())
}

fn report_oddities(dialogue: &LinearizedDialogue, tree: &DialogueTree) {
    for node in &tree.nodes {
        if let Some(line) = dialogue.line(node.id) {
            if line.connections.len() > 1 {
                warn!(
                    "Line {} has {} outgoing connections, only {} will be played",
                    line.id(),
                    line.connections.len(),
                    line.connections[0]
                );
            }
            if line.parents.len() > 1 {
                warn!(
                    "Line {} has {} parents, head resolution only follows {}",
                    line.id(),
                    line.parents.len(),
                    line.parents[0]
                );
            }
        }
    }

    let reachable = dialogue.chain().len();
    if reachable < dialogue.len() {
        warn!(
            "Only {} of {} lines in scene {:?} are reachable from head {}",
            reachable,
            dialogue.len(),
            tree.scene_name,
            dialogue.head
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue_proto::{Character, Side};
    use crate::tree::NodeSpec;

    fn chain_tree(len: usize) -> (DialogueTree, Vec<u32>) {
        let mut tree = DialogueTree::new("Chain");
        let ids: Vec<u32> = (0..len)
            .map(|i| tree.add_node(NodeSpec::new(format!("Line {}", i), Character::Protagonist, Side::Left)).unwrap())
            .collect();
        for pair in ids.windows(2) {
            tree.connect(pair[0], pair[1]).unwrap();
        }
        (tree, ids)
    }

    #[test]
    fn test_head_of_chain() {
        let (tree, ids) = chain_tree(5);
        let dialogue = linearize(&tree).unwrap();
        assert_eq!(dialogue.head(), ids[0]);
        assert_eq!(dialogue.chain(), ids);
    }

    #[test]
    fn test_head_found_from_any_first_node() {
        let (mut tree, ids) = chain_tree(4);
        // Head resolution starts from whatever node is stored first.
        tree.nodes.reverse();
        let dialogue = linearize(&tree).unwrap();
        assert_eq!(dialogue.head(), ids[0]);
        assert_eq!(dialogue.chain(), ids);
    }

    #[test]
    fn test_neighbours_are_wired_both_ways() {
        let (tree, ids) = chain_tree(3);
        let dialogue = linearize(&tree).unwrap();
        let middle = dialogue.line(ids[1]).unwrap();
        assert_eq!(middle.connections, vec![ids[2]]);
        assert_eq!(middle.parents, vec![ids[0]]);
        assert!(dialogue.line(ids[2]).unwrap().is_terminal());
    }

    #[test]
    fn test_sparse_ids_need_no_fixed_table() {
        let (mut tree, _) = chain_tree(0);
        tree.next_node_id = 5000;
        let a = tree.add_node(NodeSpec::new("a", Character::Elder, Side::Right)).unwrap();
        let b = tree.add_node(NodeSpec::new("b", Character::Elder, Side::Right)).unwrap();
        tree.connect(a, b).unwrap();
        let dialogue = linearize(&tree).unwrap();
        assert_eq!(dialogue.chain(), vec![5000, 5001]);
    }

    #[test]
    fn test_single_node() {
        let (tree, ids) = chain_tree(1);
        let dialogue = linearize(&tree).unwrap();
        assert_eq!(dialogue.head(), ids[0]);
        assert_eq!(dialogue.chain(), ids);
    }

    #[test]
    fn test_cycle_is_reported() {
        let (mut tree, ids) = chain_tree(3);
        tree.connect(ids[2], ids[0]).unwrap();
        match linearize(&tree) {
            Err(DialogueError::GraphIntegrity(IntegrityIssue::ParentCycle { start, .. })) => {
                assert_eq!(start, ids[0]);
            }
            other => panic!("Expected a parent cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_loop_is_reported() {
        let (mut tree, _) = chain_tree(2);
        // The authoring API refuses self loops, so build one by hand.
        let connection = tree.connections[0].clone();
        tree.connections.push(crate::dialogue_proto::Connection {
            in_point: connection.out_point.clone(),
            out_point: connection.out_point,
        });
        let result = linearize(&tree);
        assert!(
            matches!(result, Err(DialogueError::GraphIntegrity(IntegrityIssue::ParentCycle { .. }))),
            "{:?}",
            result
        );
    }

    #[test]
    fn test_cycle_below_the_head_is_reported() {
        // 1 -> 2 -> 3 -> 2: the parent walk from 1 ends immediately, but
        // playback would never finish.
        let (mut tree, ids) = chain_tree(3);
        tree.connect(ids[2], ids[1]).unwrap();
        let result = linearize(&tree);
        assert!(
            matches!(result, Err(DialogueError::GraphIntegrity(IntegrityIssue::ChainCycle { .. }))),
            "{:?}",
            result
        );
    }

    #[test]
    fn test_empty_tree() {
        let tree = DialogueTree::new("Empty");
        assert!(matches!(
            linearize(&tree),
            Err(DialogueError::GraphIntegrity(IntegrityIssue::EmptyGraph))
        ));
    }

    #[test]
    fn test_duplicate_ids() {
        let (mut tree, _) = chain_tree(2);
        let copy = tree.nodes[0].clone();
        tree.nodes.push(copy);
        assert!(matches!(
            linearize(&tree),
            Err(DialogueError::GraphIntegrity(IntegrityIssue::DuplicateNodeId(1)))
        ));
    }

    #[test]
    fn test_dangling_connection() {
        let (mut tree, ids) = chain_tree(2);
        tree.nodes.retain(|node| node.id != ids[1]);
        assert!(matches!(
            linearize(&tree),
            Err(DialogueError::GraphIntegrity(IntegrityIssue::DanglingConnection { .. }))
        ));
    }

    #[test]
    fn test_branches_follow_first_connection() {
        let (mut tree, ids) = chain_tree(2);
        let extra = tree.add_node(NodeSpec::new("aside", Character::Stranger, Side::Right)).unwrap();
        tree.connect(ids[0], extra).unwrap();
        let dialogue = linearize(&tree).unwrap();
        assert_eq!(dialogue.chain(), ids);
        assert_eq!(dialogue.line(ids[0]).unwrap().connections, vec![ids[1], extra]);
    }
}
