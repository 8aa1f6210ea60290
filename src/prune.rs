//! Don't-care pruning: removing leaves whose value is the caller's
//! "irrelevant" marker and collapsing the ancestors that pointed at them.
//!
//! A decision node that loses one branch is replaced by the surviving
//! branch's child in every parent; a node that loses both branches is
//! removed outright and the loss propagates upward. Only the root cannot be
//! replaced, so pruning is the one operation that may leave root slots
//! empty. When *every* leaf carried the marker the diagram ends up holding
//! just the root, and `resolve` fails with the "no value" error from then
//! on.

use log::debug;

use crate::diagram::Diagram;
use crate::node::Node;
use crate::types::{Bit, Level, NodeId};

impl Diagram {
    /// Removes every leaf whose value equals `marker` and collapses the
    /// affected ancestors, bottom-up, until the structure is consistent
    /// again.
    ///
    /// # Post-conditions
    ///
    /// No leaf in the diagram has the marker value, and the serialized form
    /// ([`to_json`][Diagram::to_json]) contains no occurrence of the marker
    /// string.
    pub fn remove_irrelevant_leaf_nodes(&mut self, marker: &str) {
        let doomed: Vec<NodeId> = self
            .leaf_nodes()
            .iter()
            .copied()
            .filter(|&id| self.node(id).value() == Some(marker))
            .collect();
        if doomed.is_empty() {
            return;
        }
        debug!(
            "pruning {} leaves with marker {:?} out of {}",
            doomed.len(),
            marker,
            self.leaf_nodes().len()
        );

        for leaf in doomed {
            let edges: Vec<(NodeId, Bit)> = self
                .node(leaf)
                .parents()
                .expect("leaf has parents")
                .entries()
                .to_vec();
            for (parent, bit) in edges {
                self.clear_branch(parent, bit);
            }
            self.remove_node(leaf);
        }

        // Children settle before their parents: walk the internal levels
        // deepest-first, fixing every node whose branch set changed.
        for index in (1..self.depth()).rev() {
            let snapshot = self.nodes_of_level(Level::new(index)).to_vec();
            for id in snapshot {
                self.collapse_after_pruning(id);
            }
        }

        self.debug_validate();
    }

    /// Restores the two-branch shape of one internal node after pruning
    /// removed children below it.
    fn collapse_after_pruning(&mut self, id: NodeId) {
        let Node::Internal { branches, .. } = self.node(id) else {
            return;
        };

        match (branches.get(Bit::Zero), branches.get(Bit::One)) {
            (Some(zero), Some(one)) => {
                if zero == one {
                    self.apply_elimination_rule(id);
                }
            }
            (Some(survivor), None) | (None, Some(survivor)) => {
                debug!("prune collapse: {} survives only via {}", id, survivor);
                let edges: Vec<(NodeId, Bit)> = self
                    .node(id)
                    .parents()
                    .expect("internal node has parents")
                    .entries()
                    .to_vec();
                for (parent, bit) in edges {
                    self.set_branch(parent, bit, survivor);
                }
                self.remove_node(id);
            }
            (None, None) => {
                debug!("prune collapse: {} lost both branches", id);
                let edges: Vec<(NodeId, Bit)> = self
                    .node(id)
                    .parents()
                    .expect("internal node has parents")
                    .entries()
                    .to_vec();
                for (parent, bit) in edges {
                    self.clear_branch(parent, bit);
                }
                self.remove_node(id);
            }
        }
    }
}
