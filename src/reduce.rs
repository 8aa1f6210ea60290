//! The two reduction rules and the fixed-point minimize driver.
//!
//! **Reduction rule**: two nodes at the same level are *similar* iff they
//! are leaves with equal values, or internals whose `0` children are the
//! same node by identity and whose `1` children are the same node by
//! identity. Similar nodes are merged: every edge into one is rewired to
//! the other.
//!
//! **Elimination rule**: an internal node whose two branches hold the same
//! child is spliced out: its parents point at the child directly. This is
//! where edges start skipping levels.
//!
//! Each rule either removes a node or does nothing, so the minimize loop
//! terminates after work bounded by the initial node count.

use log::debug;

use crate::diagram::Diagram;
use crate::node::Node;
use crate::types::{Bit, Level, NodeId};

impl Diagram {
    /// Structural similarity of two live nodes at the same level.
    ///
    /// The root is similar to nothing, not even another root. Internals
    /// compare children **by identity**; structurally equal but distinct
    /// children do not make their parents similar (they make the children
    /// themselves candidates first).
    pub fn is_similar(&self, a: NodeId, b: NodeId) -> bool {
        match (self.node(a), self.node(b)) {
            (Node::Leaf { value: va, .. }, Node::Leaf { value: vb, .. }) => va == vb,
            (
                Node::Internal {
                    level: la,
                    branches: ba,
                    ..
                },
                Node::Internal {
                    level: lb,
                    branches: bb,
                    ..
                },
            ) => {
                la == lb
                    && matches!(
                        (ba.get(Bit::Zero), bb.get(Bit::Zero)),
                        (Some(x), Some(y)) if x == y
                    )
                    && matches!(
                        (ba.get(Bit::One), bb.get(Bit::One)),
                        (Some(x), Some(y)) if x == y
                    )
            }
            _ => false,
        }
    }

    /// The first candidate similar to `node`, skipping `node` itself and
    /// anything no longer in the diagram. Returns `None` when nothing
    /// matches; the root never matches.
    pub fn find_similar_node(&self, node: NodeId, candidates: &[NodeId]) -> Option<NodeId> {
        candidates
            .iter()
            .copied()
            .find(|&c| c != node && self.contains(c) && self.is_similar(node, c))
    }

    /// Merges `id` into a similar node at its level, if one exists.
    ///
    /// Every edge `(parent, bit)` into `id` is rewired to the merge target
    /// with multiplicity preserved, then `id` is dropped. Returns whether
    /// the diagram changed. Safe to call with an id that was already
    /// merged away earlier in the same pass.
    pub fn apply_reduction_rule(&mut self, id: NodeId) -> bool {
        if !self.contains(id) || id == self.root() {
            return false;
        }

        let level = self.level_of(id);
        let candidates = self.nodes_of_level(level).to_vec();
        let Some(target) = self.find_similar_node(id, &candidates) else {
            return false;
        };
        debug!("reduction at {}: merging {} into {}", level, id, target);

        let edges: Vec<(NodeId, Bit)> = self
            .node(id)
            .parents()
            .expect("non-root node has parents")
            .entries()
            .to_vec();
        for (parent, bit) in edges {
            self.set_branch(parent, bit, target);
        }
        self.remove_node(id);
        true
    }

    /// Splices out the internal node `id` if its two branches hold the same
    /// child.
    ///
    /// Each edge `(parent, bit)` into `id` becomes an edge to the shared
    /// child; the child loses its two up-edges from `id` and gains one
    /// up-edge per rewired parent edge. Returns whether the diagram
    /// changed. Leaves and the root are never eliminated.
    pub fn apply_elimination_rule(&mut self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let node = self.node(id);
        if !node.is_internal() {
            return false;
        }
        let branches = node.branches().expect("internal node has branches");
        if !branches.has_equal_branches() {
            return false;
        }
        let child = branches
            .get(Bit::Zero)
            .expect("equal branches are both present");
        debug!("elimination: splicing {} out, parents move to {}", id, child);

        let edges: Vec<(NodeId, Bit)> = node
            .parents()
            .expect("internal node has parents")
            .entries()
            .to_vec();
        for (parent, bit) in edges {
            self.set_branch(parent, bit, child);
        }
        self.remove_node(id);
        true
    }

    /// One minimize pass: levels N down to 1, reduction first, then
    /// elimination, with the level's node list snapshotted before each
    /// sweep because nodes disappear mid-iteration. Returns whether
    /// anything changed.
    ///
    /// Leaves first is load-bearing: merging leaves creates the sharing
    /// that makes their parents similar on the next level up.
    pub fn minimize_once(&mut self) -> bool {
        let mut changed = false;

        for index in (1..=self.depth()).rev() {
            let level = Level::new(index);

            let snapshot = self.nodes_of_level(level).to_vec();
            for id in snapshot {
                if self.apply_reduction_rule(id) {
                    changed = true;
                }
            }

            let snapshot = self.nodes_of_level(level).to_vec();
            for id in snapshot {
                if self.apply_elimination_rule(id) {
                    changed = true;
                }
            }
        }

        debug!("minimize pass done, changed = {}, {:?}", changed, self);
        self.debug_validate();
        changed
    }

    /// Runs minimize passes until a full pass produces no structural
    /// change.
    ///
    /// # Post-conditions
    ///
    /// No two distinct nodes at any level are similar, and no internal
    /// node has equal branches.
    pub fn minimize(&mut self) {
        while self.minimize_once() {}
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::builder::{create_bdd_from_truth_table, TruthTable};
    use crate::diagram::bit_resolvers;
    use crate::types::{Bit, Level};
    use crate::validate::ensure_correct_bdd;

    fn build(pairs: &[(&str, &str)]) -> crate::diagram::Diagram {
        let table = TruthTable::from_entries(
            pairs
                .iter()
                .map(|&(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap();
        create_bdd_from_truth_table(&table).unwrap()
    }

    #[test]
    fn test_constant_table_collapses_to_root_and_leaf() {
        let mut bdd = build(&[("00", "a"), ("01", "a"), ("10", "a"), ("11", "a")]);
        assert_eq!(bdd.count_nodes(), 7);

        bdd.minimize();

        assert_eq!(bdd.count_nodes(), 2);
        let root_branches = bdd.branches();
        assert!(root_branches.has_equal_branches());
        let leaf = root_branches.get(Bit::Zero).unwrap();
        assert_eq!(bdd.node(leaf).value(), Some("a"));
        ensure_correct_bdd(&bdd).unwrap();
    }

    #[test]
    fn test_leaf_reduction_merges_equal_values() {
        let mut bdd = build(&[("0", "x"), ("1", "x")]);
        let first_leaf = bdd.leaf_nodes()[0];
        let second_leaf = bdd.leaf_nodes()[1];

        assert!(bdd.is_similar(first_leaf, second_leaf));
        assert!(bdd.apply_reduction_rule(first_leaf));
        assert_eq!(bdd.leaf_nodes().len(), 1);

        // The survivor now carries both root edges (multiplicity 2).
        let survivor = bdd.leaf_nodes()[0];
        let parents = bdd.node(survivor).parents().unwrap();
        assert_eq!(parents.size(), 2);
        assert_eq!(parents.get_all(), vec![bdd.root()]);
        ensure_correct_bdd(&bdd).unwrap();
    }

    #[test]
    fn test_reduction_is_idempotent_on_removed_node() {
        let mut bdd = build(&[("0", "x"), ("1", "x")]);
        let gone = bdd.leaf_nodes()[0];
        assert!(bdd.apply_reduction_rule(gone));
        assert!(!bdd.apply_reduction_rule(gone));
    }

    #[test]
    fn test_elimination_requires_identity() {
        let mut bdd = build(&[("00", "a"), ("01", "b"), ("10", "a"), ("11", "b")]);
        let internal = bdd.nodes_of_level(Level::new(1))[0];

        // Children "a"/"b" are distinct nodes, so nothing to eliminate.
        assert!(!bdd.apply_elimination_rule(internal));

        // After merging the leaves, both level-1 internals become similar,
        // but still not eliminable (their two children differ).
        bdd.minimize();
        assert_eq!(bdd.nodes_of_level(Level::new(1)).len(), 1);
        assert_eq!(bdd.leaf_nodes().len(), 2);
        ensure_correct_bdd(&bdd).unwrap();
    }

    #[test]
    fn test_single_pass_reaches_fixed_point_here() {
        let mut bdd = build(&[
            ("000", "a"),
            ("001", "a"),
            ("010", "a"),
            ("011", "a"),
            ("100", "a"),
            ("101", "a"),
            ("110", "a"),
            ("111", "a"),
        ]);

        assert!(bdd.minimize_once());
        assert!(!bdd.minimize_once());
        assert_eq!(bdd.count_nodes(), 2);
    }

    #[test]
    fn test_minimize_preserves_semantics() {
        let mut bdd = build(&[
            ("000", "a"),
            ("001", "a"),
            ("010", "a"),
            ("011", "b"),
            ("100", "b"),
            ("101", "b"),
            ("110", "b"),
            ("111", "b"),
        ]);
        let resolvers = bit_resolvers(3);
        let before: Vec<String> = (0..8)
            .map(|i| {
                let key = format!("{:03b}", i);
                bdd.resolve(&resolvers, &key).unwrap().to_string()
            })
            .collect();

        bdd.minimize();

        for (i, expected) in before.iter().enumerate() {
            let key = format!("{:03b}", i);
            assert_eq!(bdd.resolve(&resolvers, &key).unwrap(), expected);
        }
        assert!(bdd.count_nodes() < 15);
        ensure_correct_bdd(&bdd).unwrap();
    }

    #[test]
    fn test_no_similar_pairs_after_minimize() {
        let mut bdd = build(&[
            ("000", "a"),
            ("001", "b"),
            ("010", "a"),
            ("011", "b"),
            ("100", "a"),
            ("101", "b"),
            ("110", "a"),
            ("111", "b"),
        ]);
        bdd.minimize();

        for index in 0..=bdd.depth() {
            let level = bdd.nodes_of_level(Level::new(index)).to_vec();
            for &x in &level {
                assert!(
                    bdd.find_similar_node(x, &level).is_none(),
                    "{} still has a similar sibling after minimize",
                    x
                );
            }
        }
    }
}
