//! The full-graph structural audit.
//!
//! [`ensure_correct_bdd`] walks the entire diagram and checks every
//! invariant the engine promises to uphold after a public operation:
//! registry and level index agree with reachability, every down-edge is
//! mirrored by an up-edge and vice versa, edges point strictly downward,
//! levels are uniform, and the root is alone and parentless. A violation is
//! an engine bug; the returned error carries the offending node and names
//! the broken clause.
//!
//! Tests call this after every scenario; in debug builds the engine itself
//! re-runs it at the end of each mutating operation.

use hashbrown::HashSet;

use crate::diagram::Diagram;
use crate::error::BddError;
use crate::node::Node;
use crate::types::{Bit, Level, NodeId};

fn violation(node: NodeId, detail: String) -> BddError {
    BddError::InvariantViolation { node, detail }
}

/// Audits `bdd` against every structural invariant.
pub fn ensure_correct_bdd(bdd: &Diagram) -> Result<(), BddError> {
    check_root_shape(bdd)?;
    let reachable = check_edges_and_reachability(bdd)?;
    check_level_index(bdd, &reachable)?;
    for id in bdd.node_ids() {
        check_node(bdd, id)?;
    }
    Ok(())
}

fn check_root_shape(bdd: &Diagram) -> Result<(), BddError> {
    let root = bdd.root();
    let node = bdd
        .get_node(root)
        .ok_or_else(|| violation(root, "the root is not in the registry".to_string()))?;
    if !node.is_root() {
        return Err(violation(
            root,
            "registered as the root but not a Root node".to_string(),
        ));
    }
    let level_zero = bdd.nodes_of_level(Level::new(0));
    if level_zero.len() != 1 || level_zero[0] != root {
        return Err(violation(
            root,
            format!("level 0 must hold exactly the root, found {:?}", level_zero),
        ));
    }
    Ok(())
}

/// Sweeps the graph from the root, checking each edge on the way, and
/// verifies that the registry holds exactly the reachable set.
fn check_edges_and_reachability(bdd: &Diagram) -> Result<HashSet<NodeId>, BddError> {
    let mut reachable = HashSet::new();
    let mut stack = vec![bdd.root()];

    while let Some(id) = stack.pop() {
        if !reachable.insert(id) {
            continue;
        }
        let node = bdd.get_node(id).ok_or_else(|| {
            violation(id, "an edge points here but the node is not registered".to_string())
        })?;

        let Some(branches) = node.branches() else {
            continue;
        };
        let level = bdd.level_of(id);
        for bit in Bit::BOTH {
            let Some(child) = branches.get(bit) else {
                continue;
            };
            let child_node = bdd.get_node(child).ok_or_else(|| {
                violation(id, format!("branch {} points at {}, which is not registered", bit, child))
            })?;
            if bdd.level_of(child) <= level {
                return Err(violation(
                    id,
                    format!(
                        "branch {} points at {} on {}, not strictly deeper than {}",
                        bit,
                        child,
                        bdd.level_of(child),
                        level
                    ),
                ));
            }
            let recorded = child_node
                .parents()
                .map_or(false, |p| p.has_edge(id, bit));
            if !recorded {
                return Err(violation(
                    child,
                    format!("missing the parent entry ({}, {}) for an actual edge", id, bit),
                ));
            }
            stack.push(child);
        }
    }

    for id in bdd.node_ids() {
        if !reachable.contains(&id) {
            return Err(violation(
                id,
                "registered but unreachable from the root".to_string(),
            ));
        }
    }
    Ok(reachable)
}

/// The level index must list every registered node exactly once, at the
/// level the node reports for itself.
fn check_level_index(bdd: &Diagram, reachable: &HashSet<NodeId>) -> Result<(), BddError> {
    let mut listed = HashSet::new();
    for index in 0..=bdd.depth() {
        let level = Level::new(index);
        for &id in bdd.nodes_of_level(level) {
            if bdd.get_node(id).is_none() {
                return Err(violation(id, format!("listed at {} but not registered", level)));
            }
            if bdd.level_of(id) != level {
                return Err(violation(
                    id,
                    format!("listed at {} but reports {}", level, bdd.level_of(id)),
                ));
            }
            if !listed.insert(id) {
                return Err(violation(id, "appears twice in the level index".to_string()));
            }
        }
    }
    for &id in reachable {
        if !listed.contains(&id) {
            return Err(violation(
                id,
                "reachable but missing from the level index".to_string(),
            ));
        }
    }
    Ok(())
}

fn check_node(bdd: &Diagram, id: NodeId) -> Result<(), BddError> {
    let node = bdd.node(id);
    match node {
        Node::Root { .. } => {
            if id != bdd.root() {
                return Err(violation(id, "a second Root node".to_string()));
            }
            Ok(())
        }
        Node::Internal { level, branches, .. } => {
            if level.is_root() || level.index() >= bdd.depth() {
                return Err(violation(
                    id,
                    format!("internal node at {}, outside [1, {})", level, bdd.depth()),
                ));
            }
            for bit in Bit::BOTH {
                if branches.get(bit).is_none() {
                    return Err(violation(id, format!("internal node with no {} branch", bit)));
                }
            }
            check_parent_entries(bdd, id)
        }
        Node::Leaf { value, .. } => {
            if value.is_empty() {
                return Err(violation(id, "leaf with an empty value".to_string()));
            }
            check_parent_entries(bdd, id)
        }
    }
}

/// Every up-edge must be backed by the matching down-edge, no entry may be
/// duplicated, and a non-root node must have at least one.
fn check_parent_entries(bdd: &Diagram, id: NodeId) -> Result<(), BddError> {
    let parents = bdd.node(id).parents().expect("non-root node has parents");
    if parents.is_empty() {
        return Err(violation(id, "no parents recorded but not the root".to_string()));
    }

    let mut seen = HashSet::new();
    for &(parent, bit) in parents.entries() {
        if !seen.insert((parent, bit)) {
            return Err(violation(
                id,
                format!("parent edge ({}, {}) recorded twice", parent, bit),
            ));
        }
        let backing = bdd
            .get_node(parent)
            .and_then(|p| p.branches())
            .and_then(|b| b.get(bit));
        if backing != Some(id) {
            return Err(violation(
                id,
                format!(
                    "records parent edge ({}, {}) but that branch holds {:?}",
                    parent, bit, backing
                ),
            ));
        }
    }
    Ok(())
}
