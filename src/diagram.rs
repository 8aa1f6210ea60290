//! The diagram manager: node registry, level index, navigation, evaluation,
//! and the plain-structure serialization.
//!
//! All structural mutation goes through the `Diagram` so the derived views
//! (`nodes`, `levels`) and the parent sets stay exact in the same step as
//! the edit. A node is *in* the diagram iff it is reachable from the root;
//! mutations drop orphaned nodes from the indexes before returning, never
//! lazily.
//!
//! # Structure
//!
//! ```text
//! level 0   Root ── "0"/"1" branches
//! level L   Internal nodes (1 <= L <= N-1), each with two branches
//! level N   Leaf nodes carrying the output values
//! ```
//!
//! Edges always point to a strictly deeper level. A freshly built diagram
//! steps one level per edge; minimization and pruning may splice edges
//! across levels (the root of a constant diagram points straight at the
//! single remaining leaf).

use std::fmt::Debug;

use hashbrown::HashMap;
use log::debug;

use crate::error::BddError;
use crate::node::{Branches, Node};
use crate::types::{Bit, Level, NodeId};

/// A resolver binds one diagram variable to a predicate over the caller's
/// state. The resolver for variable `i` is consulted at decision nodes of
/// level `i`.
pub type ResolverFn = Box<dyn Fn(&str) -> bool>;

/// Resolvers for the common binding where the state *is* an `n`-bit key and
/// variable `i` is its `i`-th bit.
///
/// `resolve(&bit_resolvers(n), key)` returns exactly the truth-table value
/// of `key`, before and after minimization.
pub fn bit_resolvers(n: usize) -> Vec<ResolverFn> {
    (0..n)
        .map(|i| Box::new(move |state: &str| state.chars().nth(i) == Some('1')) as ResolverFn)
        .collect()
}

/// A reduced ordered decision diagram with string-valued leaves.
///
/// Created by [`create_bdd_from_truth_table`][crate::builder::create_bdd_from_truth_table];
/// minimized in place by [`minimize`][Diagram::minimize]; evaluated by
/// [`resolve`][Diagram::resolve].
pub struct Diagram {
    nodes: HashMap<NodeId, Node>,
    /// Per-level node lists in insertion order, indexes `0..=depth`.
    levels: Vec<Vec<NodeId>>,
    root: NodeId,
    depth: usize,
    next_id: u32,
}

impl Diagram {
    /// A diagram holding only a fresh root. The builder wires the rest.
    pub(crate) fn new(depth: usize) -> Self {
        assert!(depth >= 1, "Diagram depth must be >= 1");
        assert!(depth <= 32, "Diagram depth must be <= 32");

        let root = NodeId::new(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::root());

        let mut levels = vec![Vec::new(); depth + 1];
        levels[0].push(root);

        Self {
            nodes,
            levels,
            root,
            depth,
            next_id: 1,
        }
    }

    /// The leaf level N; decision nodes sit at `0..N`.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The identifier of the unique root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The root's branch container, for navigation.
    pub fn branches(&self) -> &Branches {
        self.node(self.root)
            .branches()
            .expect("root node has branches")
    }

    /// Whether `id` is currently in the diagram.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The node behind `id`, if it is in the diagram.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// The node behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not in the diagram; callers inside the engine hold
    /// ids they just read from an index.
    pub fn node(&self, id: NodeId) -> &Node {
        self.get_node(id)
            .unwrap_or_else(|| panic!("node {} is not in the diagram", id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes
            .get_mut(&id)
            .unwrap_or_else(|| panic!("node {} is not in the diagram", id))
    }

    /// The level `id` sits at. Nodes never move between levels.
    pub fn level_of(&self, id: NodeId) -> Level {
        match self.node(id) {
            Node::Root { .. } => Level::new(0),
            Node::Internal { level, .. } => *level,
            Node::Leaf { .. } => Level::new(self.depth),
        }
    }

    /// Total reachable nodes, leaves included.
    pub fn count_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// All node identifiers currently registered, in arbitrary order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// The nodes at `level`, in insertion order.
    pub fn nodes_of_level(&self, level: Level) -> &[NodeId] {
        assert!(
            level.index() <= self.depth,
            "level {} out of range for depth {}",
            level,
            self.depth
        );
        &self.levels[level.index()]
    }

    /// Shorthand for the leaf level.
    pub fn leaf_nodes(&self) -> &[NodeId] {
        self.nodes_of_level(Level::new(self.depth))
    }

    // ------------------------------------------------------------------
    // Mutation primitives. Everything below keeps `nodes`, `levels`, and
    // the parent sets in agreement before returning.
    // ------------------------------------------------------------------

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Creates an internal node at `level` with the given children and
    /// records the two down-edges in the children's parent sets.
    pub(crate) fn alloc_internal(&mut self, level: Level, zero: NodeId, one: NodeId) -> NodeId {
        let id = self.fresh_id();
        debug!("alloc internal {} at {} (0 -> {}, 1 -> {})", id, level, zero, one);

        self.nodes
            .insert(id, Node::internal(level, Branches::new(zero, one)));
        self.levels[level.index()].push(id);

        self.parents_of_mut(zero).add(id, Bit::Zero);
        self.parents_of_mut(one).add(id, Bit::One);
        id
    }

    /// Creates a leaf carrying `value`. The caller wires the edge to it.
    pub(crate) fn alloc_leaf(&mut self, value: String) -> NodeId {
        let id = self.fresh_id();
        debug!("alloc leaf {} ({:?})", id, value);

        self.nodes.insert(id, Node::leaf(value));
        self.levels[self.depth].push(id);
        id
    }

    fn parents_of_mut(&mut self, id: NodeId) -> &mut crate::parents::ParentSet {
        self.node_mut(id)
            .parents_mut()
            .unwrap_or_else(|| panic!("node {} has no parent set", id))
    }

    /// Points `parent`'s `label` branch at `child`, updating the prior
    /// child's and the new child's parent sets in the same step.
    ///
    /// The prior child, if any, merely loses this one up-edge; dropping it
    /// from the diagram when it became unreachable is the caller's half of
    /// the mutation.
    pub(crate) fn set_branch(&mut self, parent: NodeId, label: Bit, child: NodeId) {
        let prior = self
            .node_mut(parent)
            .branches_mut()
            .unwrap_or_else(|| panic!("node {} has no branches", parent))
            .set(label, Some(child));

        if prior == Some(child) {
            return;
        }
        debug!("set_branch {} -{}-> {} (was {:?})", parent, label, child, prior);

        if let Some(prior) = prior {
            self.parents_of_mut(prior).remove(parent, label);
        }
        self.parents_of_mut(child).add(parent, label);
    }

    /// Empties `parent`'s `label` slot, removing the matching up-edge from
    /// the prior child.
    pub(crate) fn clear_branch(&mut self, parent: NodeId, label: Bit) {
        let prior = self
            .node_mut(parent)
            .branches_mut()
            .unwrap_or_else(|| panic!("node {} has no branches", parent))
            .set(label, None);

        if let Some(prior) = prior {
            debug!("clear_branch {} -{}-> {}", parent, label, prior);
            self.parents_of_mut(prior).remove(parent, label);
        }
    }

    /// Drops `id` from the diagram: unregisters its remaining down-edges
    /// from its children's parent sets and removes it from both indexes.
    ///
    /// The caller must have rewired or cleared every edge *into* `id`
    /// first; removing a node that something still points at would leave a
    /// dangling branch.
    pub(crate) fn remove_node(&mut self, id: NodeId) {
        let node = self.node(id);
        debug_assert!(!node.is_root(), "the root is never removed");
        debug_assert!(
            node.parents().map_or(true, |p| p.is_empty()),
            "removing {} while {} edges still point at it",
            id,
            node.parents().map_or(0, |p| p.size())
        );

        let children: Vec<(Bit, NodeId)> = node
            .branches()
            .map(|b| {
                Bit::BOTH
                    .iter()
                    .filter_map(|&bit| b.get(bit).map(|c| (bit, c)))
                    .collect()
            })
            .unwrap_or_default();

        for (bit, child) in children {
            self.parents_of_mut(child).remove(id, bit);
        }

        let level = self.level_of(id);
        self.levels[level.index()].retain(|&n| n != id);
        self.nodes.remove(&id);
        debug!("removed {} from {}", id, level);
    }

    /// Re-checks every invariant in debug builds; free in release builds.
    pub(crate) fn debug_validate(&self) {
        #[cfg(debug_assertions)]
        if let Err(err) = crate::validate::ensure_correct_bdd(self) {
            panic!("{}", err);
        }
    }

    // ------------------------------------------------------------------
    // Evaluation and serialization.
    // ------------------------------------------------------------------

    /// Descends from the root, consulting `resolvers[level]` at each
    /// decision node, and returns the reached leaf's value.
    ///
    /// Fails with [`BddError::MissingResolver`] if a needed variable has no
    /// resolver, and with [`BddError::NoValue`] when the selected branch was
    /// removed by don't-care pruning (including the emptied-diagram case).
    pub fn resolve(&self, resolvers: &[ResolverFn], state: &str) -> Result<&str, BddError> {
        let mut current = self.root;
        loop {
            let node = self.node(current);
            if let Some(value) = node.value() {
                return Ok(value);
            }

            let level = self.level_of(current);
            let resolver =
                resolvers
                    .get(level.index())
                    .ok_or_else(|| BddError::MissingResolver {
                        index: level.index(),
                        node: current,
                    })?;
            let bit = Bit::from(resolver(state));

            let branches = node.branches().expect("decision node has branches");
            current = branches
                .get(bit)
                .ok_or(BddError::NoValue { node: current })?;
        }
    }

    /// The stable plain representation: decision nodes become objects with
    /// `"0"`/`"1"` keys (absent slots omitted), leaves become
    /// `{"value": …}`. With `include_ids`, every node also carries its
    /// identifier.
    ///
    /// Sharing is lost on purpose: a leaf reached over two paths is emitted
    /// twice. The form exists for equality comparison and for the
    /// "marker appears nowhere" assertion after pruning.
    pub fn to_json(&self, include_ids: bool) -> serde_json::Value {
        self.node_json(self.root, include_ids)
    }

    fn node_json(&self, id: NodeId, include_ids: bool) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        if include_ids {
            obj.insert("id".to_string(), id.to_string().into());
        }

        let node = self.node(id);
        if let Some(value) = node.value() {
            obj.insert("value".to_string(), value.into());
        } else {
            let branches = node.branches().expect("decision node has branches");
            for bit in Bit::BOTH {
                if let Some(child) = branches.get(bit) {
                    obj.insert(bit.to_string(), self.node_json(child, include_ids));
                }
            }
        }
        serde_json::Value::Object(obj)
    }
}

impl Debug for Diagram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagram")
            .field("depth", &self.depth)
            .field("nodes", &self.nodes.len())
            .field(
                "per_level",
                &self.levels.iter().map(Vec::len).collect::<Vec<_>>(),
            )
            .finish()
    }
}
