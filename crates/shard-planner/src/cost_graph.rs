// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Cost graph: leaf groups condensed into solver decisions.
//!
//! Each leaf group is one decision variable, except that follow links
//! merge mirrored groups into the group they mirror. A merge records a
//! bijection from the merged group's candidate indices to the terminal
//! group's, and folds the merged group's node costs through it; edges
//! touching the merged group are re-indexed onto the terminal.
//!
//! Aliased output/input pairs whose candidate sets line up one-to-one
//! (equal counts, equivalent shardings index-for-index, so the diagonal
//! of any resharding matrix between them is zero) are converted into
//! the same kind of merge; pairs that do not line up but have equal
//! counts travel to the solver as equality constraints.
//!
//! Memory vectors fold in the worst-case transient of each candidate's
//! resharding vectors, so a budget check over the condensed graph never
//! underestimates a conversion spike.

use std::collections::HashMap;

use mesh_core::DeviceMesh;
use op_graph::{graph::Validated, AliasSet, OpGraph};
use shard_solver::{EdgeCosts, NodeCosts};

use crate::strategy::{GroupArena, LeafGroup, StrategyGroup};

/// The condensed decision graph handed to the solver.
#[derive(Debug)]
pub struct CostGraph {
    /// Per leaf: the terminal leaf its decision collapsed into.
    terminal: Vec<usize>,
    /// Per leaf: own candidate index -> terminal candidate index.
    bijection: Vec<Vec<usize>>,
    /// Per leaf: compact decision index, for terminals only.
    compact: Vec<Option<usize>>,
    /// Compact decision index -> terminal leaf id.
    decisions: Vec<usize>,
    node_costs: Vec<NodeCosts>,
    edges: Vec<EdgeCosts>,
    aliases: Vec<(usize, usize)>,
}

impl CostGraph {
    /// Condenses the arena into decisions, edges and alias constraints.
    pub fn build(
        graph: &OpGraph<Validated>,
        arena: &GroupArena,
        aliases: &AliasSet,
        mesh: &DeviceMesh,
    ) -> Self {
        let leaves: Vec<&LeafGroup> = arena.leaves().collect();
        let num_leaves = leaves.len();
        let leaf_id_of_gid = |gid: usize| arena.leaf(gid).leaf_id;

        let mut terminal: Vec<usize> = (0..num_leaves).collect();
        let mut bijection: Vec<Vec<usize>> = leaves
            .iter()
            .map(|l| (0..l.strategies.len()).collect())
            .collect();

        let find = |terminal: &[usize], mut l: usize| -> usize {
            while terminal[l] != l {
                l = terminal[l];
            }
            l
        };

        // Follow merges. Leaves arrive in topological order, so a
        // follow target is already resolved when its mirror shows up.
        for leaf in &leaves {
            let Some(follow_gid) = leaf.follow else { continue };
            let target = find(&terminal, leaf_id_of_gid(follow_gid));
            if !Self::mergeable(leaf, leaves[target], follow_gid) {
                continue;
            }
            // The mirror copies candidates 1:1, so its bijection into
            // the terminal is the target's own.
            bijection[leaf.leaf_id] = bijection[target].clone();
            terminal[leaf.leaf_id] = target;
        }

        // Alias conversion: merge pairs whose candidates line up.
        let mut solver_aliases_raw: Vec<(usize, usize)> = Vec::new();
        for &(a, b) in aliases.pairs() {
            let (Some(la), Some(lb)) = (leaf_of_node(arena, a), leaf_of_node(arena, b))
            else {
                tracing::warn!("alias ({a}, {b}) touches a tuple group, ignored");
                continue;
            };
            let ta = find(&terminal, la);
            let tb = find(&terminal, lb);
            if ta == tb {
                continue;
            }
            let sa = &leaves[ta].strategies;
            let sb = &leaves[tb].strategies;
            let aligned = sa.len() == sb.len()
                && sa
                    .iter()
                    .zip(sb)
                    .all(|(x, y)| x.output_sharding.equivalent(&y.output_sharding, mesh));
            if aligned {
                for l in 0..num_leaves {
                    if find(&terminal, l) == tb {
                        terminal[l] = ta;
                    }
                }
                tracing::debug!(
                    a = %graph.nodes()[a].name,
                    b = %graph.nodes()[b].name,
                    "alias converted to a merged decision"
                );
            } else if sa.len() == sb.len() {
                solver_aliases_raw.push((ta, tb));
            } else {
                tracing::warn!(
                    a = %graph.nodes()[a].name,
                    b = %graph.nodes()[b].name,
                    "alias candidate counts differ ({} vs {}), ignored",
                    sa.len(),
                    sb.len()
                );
            }
        }

        // Path-compress and assign compact decision indices.
        for l in 0..num_leaves {
            terminal[l] = find(&terminal, l);
        }
        let mut compact: Vec<Option<usize>> = vec![None; num_leaves];
        let mut decisions = Vec::new();
        for l in 0..num_leaves {
            if terminal[l] == l {
                compact[l] = Some(decisions.len());
                decisions.push(l);
            }
        }

        // Node costs, folded through the bijections.
        let mut node_costs: Vec<NodeCosts> = decisions
            .iter()
            .map(|&t| {
                let n = leaves[t].strategies.len();
                NodeCosts {
                    compute: vec![0.0; n],
                    communication: vec![0.0; n],
                    memory: vec![0.0; n],
                }
            })
            .collect();
        for leaf in &leaves {
            let t = terminal[leaf.leaf_id];
            let Some(decision) = compact[t] else { continue };
            let costs = &mut node_costs[decision];
            for (j, strategy) in leaf.strategies.iter().enumerate() {
                let idx = bijection[leaf.leaf_id][j];
                costs.compute[idx] += strategy.compute_cost;
                costs.communication[idx] += strategy.communication_cost;
                let transient: f64 = strategy
                    .memory_resharding_costs
                    .iter()
                    .map(|v| v.iter().copied().fold(0.0, f64::max))
                    .sum();
                costs.memory[idx] += strategy.memory_cost + transient;
            }
        }

        // Edges, re-indexed onto terminal decisions.
        let mut matrices: HashMap<(usize, usize), Vec<Vec<f64>>> = HashMap::new();
        for leaf in &leaves {
            let t_dst = terminal[leaf.leaf_id];
            for (slot, &operand_gid) in leaf.operands.iter().enumerate() {
                let src = leaf_id_of_gid(operand_gid);
                let t_src = terminal[src];
                if t_src == t_dst {
                    continue;
                }
                let n_src = leaves[t_src].strategies.len();
                let n_dst = leaves[t_dst].strategies.len();
                let matrix = matrices
                    .entry((t_src, t_dst))
                    .or_insert_with(|| vec![vec![0.0; n_dst]; n_src]);
                for (j, strategy) in leaf.strategies.iter().enumerate() {
                    let d = bijection[leaf.leaf_id][j];
                    for (s_own, &cost) in strategy.communication_resharding_costs[slot]
                        .iter()
                        .enumerate()
                    {
                        let s = bijection[src][s_own];
                        matrix[s][d] += cost;
                    }
                }
            }
        }
        let mut keys: Vec<(usize, usize)> = matrices.keys().copied().collect();
        keys.sort_unstable();
        let edges = keys
            .into_iter()
            .map(|key| {
                let costs = matrices.remove(&key).unwrap_or_default();
                EdgeCosts {
                    src: compact[key.0].unwrap_or_default(),
                    dst: compact[key.1].unwrap_or_default(),
                    costs,
                }
            })
            .collect();

        let mut solver_aliases: Vec<(usize, usize)> = solver_aliases_raw
            .into_iter()
            .filter_map(|(a, b)| {
                let (ta, tb) = (terminal[a], terminal[b]);
                if ta == tb {
                    return None;
                }
                Some((compact[ta].unwrap_or_default(), compact[tb].unwrap_or_default()))
            })
            .collect();
        solver_aliases.sort_unstable();
        solver_aliases.dedup();

        let graph_decisions = decisions.len();
        tracing::debug!(
            leaves = num_leaves,
            decisions = graph_decisions,
            "cost graph condensed"
        );

        CostGraph {
            terminal,
            bijection,
            compact,
            decisions,
            node_costs,
            edges,
            aliases: solver_aliases,
        }
    }

    /// A mirror can merge when the candidate counts match and resharding
    /// into the followed operand is free index-for-index.
    fn mergeable(leaf: &LeafGroup, target: &LeafGroup, follow_gid: usize) -> bool {
        if leaf.strategies.len() != target.strategies.len() {
            return false;
        }
        let Some(slot) = leaf.operands.iter().position(|&g| g == follow_gid) else {
            return false;
        };
        leaf.strategies.iter().enumerate().all(|(j, s)| {
            s.communication_resharding_costs
                .get(slot)
                .and_then(|v| v.get(j))
                .is_some_and(|&c| c == 0.0)
        })
    }

    pub fn num_decisions(&self) -> usize {
        self.decisions.len()
    }

    pub fn node_costs(&self) -> &[NodeCosts] {
        &self.node_costs
    }

    pub fn edges(&self) -> &[EdgeCosts] {
        &self.edges
    }

    pub fn aliases(&self) -> &[(usize, usize)] {
        &self.aliases
    }

    /// Compact decision index deciding the given leaf.
    pub fn decision_of_leaf(&self, leaf_id: usize) -> usize {
        self.compact[self.terminal[leaf_id]].unwrap_or_default()
    }

    /// Expands a compact solver solution into a per-leaf candidate
    /// choice, applying the recorded bijections in reverse.
    pub fn expand_solution(&self, chosen: &[usize]) -> Vec<usize> {
        (0..self.terminal.len())
            .map(|leaf| {
                let decision = self.decision_of_leaf(leaf);
                let terminal_idx = chosen[decision];
                self.bijection[leaf]
                    .iter()
                    .position(|&t| t == terminal_idx)
                    .unwrap_or(terminal_idx)
            })
            .collect()
    }
}

/// Leaf id of a node's root group, `None` for tuple-shaped nodes.
fn leaf_of_node(arena: &GroupArena, node_index: usize) -> Option<usize> {
    match arena.get(arena.node_group(node_index)) {
        StrategyGroup::Leaf(leaf) => Some(leaf.leaf_id),
        StrategyGroup::Tuple { .. } => None,
    }
}
