// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Strategy records and the index-addressed group arena.
//!
//! Every array value in the graph gets a *strategy group* holding its
//! candidate shardings. Groups live in a flat arena and reference each
//! other by [`GroupId`], so tuple nesting and follow relations are plain
//! index links rather than owned pointers:
//!
//! ```text
//!   arena ──▶ [ Leaf(param)  Leaf(dot)  Tuple ──▶ children: [3, 4]
//!               Leaf(elem0, follow=1)  Leaf(elem1) ]
//! ```
//!
//! Leaf groups additionally carry a dense *leaf id*, the decision index
//! used by the cost graph and the solver.

use std::collections::HashMap;
use std::fmt;

use mesh_core::Sharding;

/// Arena index of a strategy group.
pub type GroupId = usize;

/// One candidate sharding for a node output, with its modeled costs.
#[derive(Debug, Clone)]
pub struct ShardingStrategy {
    /// Human-readable label, e.g. `"S[0@1]"` or `"R"`.
    pub name: String,
    /// Output sharding this candidate assigns.
    pub output_sharding: Sharding,
    /// Per-device compute cost. Tilings divide work evenly, so this is
    /// normally zero and only breaks ties.
    pub compute_cost: f64,
    /// Communication the candidate itself performs (e.g. an all-reduce
    /// of partial contraction sums).
    pub communication_cost: f64,
    /// Per-device bytes of the output under this candidate.
    pub memory_cost: f64,
    /// `communication_resharding_costs[k][j]` prices converting operand
    /// `k`'s candidate `j` into the layout this candidate expects.
    pub communication_resharding_costs: Vec<Vec<f64>>,
    /// Same indexing as `communication_resharding_costs`, in bytes of
    /// transient per-device memory.
    pub memory_resharding_costs: Vec<Vec<f64>>,
    /// The operand layout this candidate expects, per operand slot.
    /// `None` means any layout is acceptable as priced.
    pub input_shardings: Vec<Option<Sharding>>,
    /// Mesh axes over which this candidate leaves an unreduced partial
    /// sum, discharged by an implied all-reduce.
    pub all_reduce_axes: Vec<usize>,
}

impl ShardingStrategy {
    /// A candidate with the given sharding and no costs filled in yet.
    pub fn new(name: impl Into<String>, output_sharding: Sharding) -> Self {
        Self {
            name: name.into(),
            output_sharding,
            compute_cost: 0.0,
            communication_cost: 0.0,
            memory_cost: 0.0,
            communication_resharding_costs: Vec::new(),
            memory_resharding_costs: Vec::new(),
            input_shardings: Vec::new(),
            all_reduce_axes: Vec::new(),
        }
    }

    /// Node cost excluding resharding: compute plus own communication.
    pub fn base_cost(&self) -> f64 {
        self.compute_cost + self.communication_cost
    }
}

impl fmt::Display for ShardingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (comm {:.1}, mem {:.0})", self.name, self.communication_cost, self.memory_cost)
    }
}

/// A leaf group: the candidate set of one array value.
#[derive(Debug, Clone)]
pub struct LeafGroup {
    /// Graph node that produces this value.
    pub node_index: usize,
    /// Dense decision index among all leaves, in creation order.
    pub leaf_id: usize,
    /// Candidate strategies. Never empty after enumeration.
    pub strategies: Vec<ShardingStrategy>,
    /// Operand groups this leaf's resharding vectors are priced against,
    /// one per entry in each strategy's resharding vectors.
    pub operands: Vec<GroupId>,
    /// Group this leaf mirrors candidate-for-candidate, if any.
    pub follow: Option<GroupId>,
    /// Set when follow priorities were within the tie tolerance and the
    /// node kept its full candidate set instead of following.
    pub tied: bool,
}

/// A strategy group: either one array value or a tuple of groups.
#[derive(Debug, Clone)]
pub enum StrategyGroup {
    Leaf(LeafGroup),
    Tuple {
        node_index: usize,
        children: Vec<GroupId>,
    },
}

impl StrategyGroup {
    pub fn node_index(&self) -> usize {
        match self {
            StrategyGroup::Leaf(leaf) => leaf.node_index,
            StrategyGroup::Tuple { node_index, .. } => *node_index,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafGroup> {
        match self {
            StrategyGroup::Leaf(leaf) => Some(leaf),
            StrategyGroup::Tuple { .. } => None,
        }
    }
}

/// Flat arena of strategy groups plus the node-to-group map.
#[derive(Debug, Default)]
pub struct GroupArena {
    groups: Vec<StrategyGroup>,
    node_to_group: HashMap<usize, GroupId>,
    num_leaves: usize,
}

impl GroupArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a leaf group and returns its arena index.
    pub fn push_leaf(
        &mut self,
        node_index: usize,
        strategies: Vec<ShardingStrategy>,
        operands: Vec<GroupId>,
        follow: Option<GroupId>,
        tied: bool,
    ) -> GroupId {
        let id = self.groups.len();
        let leaf_id = self.num_leaves;
        self.num_leaves += 1;
        self.groups.push(StrategyGroup::Leaf(LeafGroup {
            node_index,
            leaf_id,
            strategies,
            operands,
            follow,
            tied,
        }));
        id
    }

    /// Adds a tuple group over previously pushed children.
    pub fn push_tuple(&mut self, node_index: usize, children: Vec<GroupId>) -> GroupId {
        let id = self.groups.len();
        self.groups.push(StrategyGroup::Tuple { node_index, children });
        id
    }

    /// Records `group` as the root group of graph node `node_index`.
    pub fn bind_node(&mut self, node_index: usize, group: GroupId) {
        self.node_to_group.insert(node_index, group);
    }

    /// Root group of a graph node. Panics if the node was never bound;
    /// enumeration binds every node before anything looks one up.
    pub fn node_group(&self, node_index: usize) -> GroupId {
        self.node_to_group[&node_index]
    }

    /// Like [`GroupArena::node_group`], but `None` for nodes appended
    /// to the graph after enumeration.
    pub fn try_node_group(&self, node_index: usize) -> Option<GroupId> {
        self.node_to_group.get(&node_index).copied()
    }

    pub fn get(&self, id: GroupId) -> &StrategyGroup {
        &self.groups[id]
    }

    pub fn get_mut(&mut self, id: GroupId) -> &mut StrategyGroup {
        &mut self.groups[id]
    }

    /// The leaf at `id`. Panics on a tuple group; callers hold leaf ids
    /// obtained from [`GroupArena::leaf_operand`] or enumeration.
    pub fn leaf(&self, id: GroupId) -> &LeafGroup {
        match &self.groups[id] {
            StrategyGroup::Leaf(leaf) => leaf,
            StrategyGroup::Tuple { node_index, .. } => {
                panic!("group {id} (node {node_index}) is a tuple, expected a leaf")
            }
        }
    }

    pub fn leaf_mut(&mut self, id: GroupId) -> &mut LeafGroup {
        match &mut self.groups[id] {
            StrategyGroup::Leaf(leaf) => leaf,
            StrategyGroup::Tuple { node_index, .. } => {
                panic!("group {id} (node {node_index}) is a tuple, expected a leaf")
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of leaf groups, i.e. solver decision variables before
    /// follow merging.
    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    /// All groups in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &StrategyGroup)> {
        self.groups.iter().enumerate()
    }

    /// Leaf groups in leaf-id order.
    pub fn leaves(&self) -> impl Iterator<Item = &LeafGroup> {
        let mut leaves: Vec<&LeafGroup> = self
            .groups
            .iter()
            .filter_map(|g| g.as_leaf())
            .collect();
        leaves.sort_by_key(|l| l.leaf_id);
        leaves.into_iter()
    }

    /// Resolves a follow chain to its terminal group.
    pub fn canonical(&self, id: GroupId) -> GroupId {
        let mut current = id;
        loop {
            match &self.groups[current] {
                StrategyGroup::Leaf(leaf) => match leaf.follow {
                    Some(next) if next != current => current = next,
                    _ => return current,
                },
                StrategyGroup::Tuple { .. } => return current,
            }
        }
    }
}

/// Candidate sets removed when a user-annotated sharding trims a group,
/// keyed by graph node index. Restoring puts the full set back so a
/// later solve can reconsider the node.
#[derive(Debug, Default)]
pub struct StashedStrategies {
    saved: HashMap<usize, Vec<ShardingStrategy>>,
}

impl StashedStrategies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves the pre-trim candidate set of a node. Keeps the first save
    /// if called twice for the same node.
    pub fn save(&mut self, node_index: usize, strategies: Vec<ShardingStrategy>) {
        self.saved.entry(node_index).or_insert(strategies);
    }

    /// Takes back the saved set for a node, if any.
    pub fn restore(&mut self, node_index: usize) -> Option<Vec<ShardingStrategy>> {
        self.saved.remove(&node_index)
    }

    pub fn contains(&self, node_index: usize) -> bool {
        self.saved.contains_key(&node_index)
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy(name: &str) -> ShardingStrategy {
        ShardingStrategy::new(name, Sharding::Replicated)
    }

    #[test]
    fn leaf_ids_are_dense_and_ordered() {
        let mut arena = GroupArena::new();
        let a = arena.push_leaf(0, vec![strategy("R")], vec![], None, false);
        let t = arena.push_tuple(1, vec![]);
        let b = arena.push_leaf(2, vec![strategy("R")], vec![], None, false);
        assert_eq!(arena.leaf(a).leaf_id, 0);
        assert_eq!(arena.leaf(b).leaf_id, 1);
        assert_eq!(arena.num_leaves(), 2);
        assert!(arena.get(t).as_leaf().is_none());

        let ids: Vec<usize> = arena.leaves().map(|l| l.leaf_id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn canonical_resolves_follow_chains() {
        let mut arena = GroupArena::new();
        let root = arena.push_leaf(0, vec![strategy("R")], vec![], None, false);
        let mid = arena.push_leaf(1, vec![strategy("R")], vec![root], Some(root), false);
        let tail = arena.push_leaf(2, vec![strategy("R")], vec![mid], Some(mid), false);
        assert_eq!(arena.canonical(tail), root);
        assert_eq!(arena.canonical(mid), root);
        assert_eq!(arena.canonical(root), root);
    }

    #[test]
    fn stash_restores_once() {
        let mut stash = StashedStrategies::new();
        stash.save(3, vec![strategy("R"), strategy("S[0@0]")]);
        assert!(stash.contains(3));
        let restored = stash.restore(3).unwrap();
        assert_eq!(restored.len(), 2);
        assert!(stash.restore(3).is_none());
    }
}
