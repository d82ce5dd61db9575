// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Assembly of the solver hand-off from the condensed cost graph.

use op_graph::{graph::Validated, LivenessSchedule, OpGraph};
use shard_solver::{reduce_intervals, SolverRequest};

use crate::config::AutoShardingConfig;
use crate::cost_graph::CostGraph;
use crate::error::PlannerError;
use crate::strategy::{GroupArena, StrategyGroup};

/// Builds the [`SolverRequest`] for a condensed cost graph.
///
/// Liveness intervals come per graph node; each node maps to the
/// decisions of its leaf groups, and the interval set is reduced to at
/// most `max_liveness_groups` groups before hand-off. The warm start is
/// a greedy per-decision minimum of the node cost vectors, which the
/// solver may use to seed its incumbent.
pub fn build_request(
    graph: &OpGraph<Validated>,
    arena: &GroupArena,
    cost_graph: &CostGraph,
    liveness: &LivenessSchedule,
    config: &AutoShardingConfig,
) -> Result<SolverRequest, PlannerError> {
    let nodes = cost_graph.node_costs().to_vec();
    let edges = cost_graph.edges().to_vec();
    let aliases = cost_graph.aliases().to_vec();

    let node_groups = reduce_intervals(liveness.intervals(), config.max_liveness_groups);
    let mut liveness_groups = Vec::with_capacity(node_groups.len());
    for group in node_groups {
        let mut decisions: Vec<usize> = group
            .iter()
            .flat_map(|&node| node_decisions(arena, cost_graph, node))
            .collect();
        decisions.sort_unstable();
        decisions.dedup();
        if !decisions.is_empty() {
            liveness_groups.push(decisions);
        }
    }

    let warm_start = greedy_warm_start(&nodes);
    let request = SolverRequest {
        nodes,
        edges,
        aliases,
        liveness_groups,
        memory_budget: config.budget_bytes()?,
        deterministic: config.deterministic,
        warm_start: Some(warm_start),
        timeout: config.solver_timeout(),
    };
    request.validate()?;
    tracing::debug!(
        graph = %graph.name,
        decisions = request.nodes.len(),
        edges = request.edges.len(),
        groups = request.liveness_groups.len(),
        "solver request assembled"
    );
    Ok(request)
}

/// Compact decisions deciding a node's value(s).
fn node_decisions(arena: &GroupArena, cost_graph: &CostGraph, node: usize) -> Vec<usize> {
    fn walk(arena: &GroupArena, cost_graph: &CostGraph, gid: usize, out: &mut Vec<usize>) {
        match arena.get(gid) {
            StrategyGroup::Leaf(leaf) => out.push(cost_graph.decision_of_leaf(leaf.leaf_id)),
            StrategyGroup::Tuple { children, .. } => {
                for &child in children {
                    walk(arena, cost_graph, child, out);
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(arena, cost_graph, arena.node_group(node), &mut out);
    out
}

/// Per-decision candidate with the lowest standalone cost, ignoring
/// edges.
fn greedy_warm_start(nodes: &[shard_solver::NodeCosts]) -> Vec<usize> {
    nodes
        .iter()
        .map(|costs| {
            let mut best = 0;
            for i in 1..costs.num_candidates() {
                if costs.total(i) < costs.total(best) {
                    best = i;
                }
            }
            best
        })
        .collect()
}
