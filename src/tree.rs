//! Status tree mirroring the controlled hierarchy.
//!
//! The tree never tracks per-node state: a transition rewrites every node with
//! the same value. Only the shape changes, between the skeletal form (top node
//! and empty categories) and the full form (categories with their applications).

use crate::model::{State, Topology};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub name: String,
    pub state: String,
    pub children: Vec<Node>,
}

impl Node {
    fn new(name: &str, state: &str, children: Vec<Node>) -> Self {
        Self {
            name: name.to_string(),
            state: state.to_string(),
            children,
        }
    }

    /// Depth-first, parents before children.
    pub fn walk(&self) -> Vec<&Node> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct StatusTree {
    topology: Topology,
    root: Node,
    full: bool,
}

impl StatusTree {
    /// A skeletal tree with every node in `none`.
    pub fn new(topology: Topology) -> Self {
        let mut tree = Self {
            root: Node::new(&topology.top, "", Vec::new()),
            topology,
            full: false,
        };
        tree.reset_skeletal(State::None);
        tree
    }

    pub fn reset_skeletal(&mut self, state: State) {
        let state = state.to_string();
        let categories = self
            .topology
            .categories
            .iter()
            .map(|c| Node::new(&c.name, &state, Vec::new()))
            .collect();
        self.root = Node::new(&self.topology.top, &state, categories);
        self.full = false;
    }

    pub fn stamp_full(&mut self, state: State) {
        let state = state.to_string();
        let categories = self
            .topology
            .categories
            .iter()
            .map(|c| {
                let apps = c
                    .applications
                    .iter()
                    .map(|a| Node::new(a, &state, Vec::new()))
                    .collect();
                Node::new(&c.name, &state, apps)
            })
            .collect();
        self.root = Node::new(&self.topology.top, &state, categories);
        self.full = true;
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn is_full(&self) -> bool {
        self.full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tree_is_skeletal_and_none() {
        let tree = StatusTree::new(Topology::default());
        assert!(!tree.is_full());
        let root = tree.root();
        assert_eq!(root.name, "daq");
        assert_eq!(root.children.len(), 2);
        assert!(root.children.iter().all(Node::is_leaf));
        assert!(root.walk().iter().all(|n| n.state == "none"));
    }

    #[test]
    fn stamp_full_adds_every_application() {
        let mut tree = StatusTree::new(Topology::default());
        tree.stamp_full(State::Configured);
        let names: Vec<&str> = tree.root().walk().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(
            names,
            ["daq", "dataflow", "dfo", "dataflow-writer", "trigger", "mlt", "tp-source"]
        );
        assert!(tree.root().walk().iter().all(|n| n.state == "configured"));
    }

    #[test]
    fn reset_drops_applications_again() {
        let mut tree = StatusTree::new(Topology::default());
        tree.stamp_full(State::Ready);
        tree.reset_skeletal(State::None);
        assert_eq!(tree.root().walk().len(), 3);
        assert!(!tree.is_full());
    }
}
