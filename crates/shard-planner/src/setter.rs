// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Back-annotation: writing the solved assignment onto the graph.
//!
//! Annotation happens in two fixed-order passes over the nodes. The
//! first pass writes every non-replicated assignment; nodes that
//! resolved to full replication are deferred, since a replicated
//! annotation written early would mask a more specific layout that
//! later processing could still derive. The final pass writes the
//! deferred replications, after which every node is annotated.
//!
//! [`repair_reshards`] then walks users in the same order and inserts
//! exactly one explicit resharding copy wherever a chosen candidate
//! expects an operand layout that differs from the operand's annotated
//! one. Inserted copies already carry the expected layout, so running
//! the repair again inserts nothing.

use mesh_core::ClusterEnv;
use op_graph::{graph::Validated, NodeOutput, OpGraph, OpKind, ShardingAnnotation};

use crate::error::PlannerError;
use crate::strategy::{GroupArena, StrategyGroup};

/// Writes the chosen shardings onto the graph.
///
/// `leaf_chosen` is the per-leaf candidate choice (see
/// [`CostGraph::expand_solution`]). When `final_pass` is false, nodes
/// whose whole annotation is fully replicated are skipped.
///
/// [`CostGraph::expand_solution`]: crate::cost_graph::CostGraph::expand_solution
pub fn set_shardings(
    graph: &mut OpGraph<Validated>,
    arena: &GroupArena,
    mesh: &mesh_core::DeviceMesh,
    leaf_chosen: &[usize],
    final_pass: bool,
) -> usize {
    let num_nodes = graph.num_nodes();
    let mut written = 0;
    for node_index in 0..num_nodes {
        let annotation = annotation_for(arena, leaf_chosen, arena.node_group(node_index));
        if !final_pass && all_replicated(&annotation, mesh) {
            continue;
        }
        graph.set_sharding(node_index, annotation);
        written += 1;
    }
    written
}

fn annotation_for(
    arena: &GroupArena,
    leaf_chosen: &[usize],
    gid: usize,
) -> ShardingAnnotation {
    match arena.get(gid) {
        StrategyGroup::Leaf(leaf) => {
            let choice = leaf_chosen[leaf.leaf_id];
            ShardingAnnotation::Leaf(leaf.strategies[choice].output_sharding.clone())
        }
        StrategyGroup::Tuple { children, .. } => ShardingAnnotation::Tuple(
            children
                .iter()
                .map(|&c| annotation_for(arena, leaf_chosen, c))
                .collect(),
        ),
    }
}

fn all_replicated(annotation: &ShardingAnnotation, mesh: &mesh_core::DeviceMesh) -> bool {
    match annotation {
        ShardingAnnotation::Leaf(s) => s.is_fully_replicated(mesh),
        ShardingAnnotation::Tuple(elements) => {
            elements.iter().all(|e| all_replicated(e, mesh))
        }
    }
}

/// Inserts explicit resharding copies for operand layout mismatches.
/// Returns the number of inserted nodes.
pub fn repair_reshards(
    graph: &mut OpGraph<Validated>,
    arena: &GroupArena,
    env: &ClusterEnv<'_>,
    leaf_chosen: &[usize],
) -> Result<usize, PlannerError> {
    let num_nodes = arena
        .iter()
        .map(|(_, g)| g.node_index() + 1)
        .max()
        .unwrap_or(0);
    let mut inserted = 0;

    for user in 0..num_nodes {
        let StrategyGroup::Leaf(leaf) = arena.get(arena.node_group(user)) else {
            continue;
        };
        let strategy = &leaf.strategies[leaf_chosen[leaf.leaf_id]];
        if strategy.input_shardings.len() != graph.nodes()[user].operands.len() {
            // Mirror groups (projections, conditionals) price a single
            // source; their operands need no repair of their own.
            continue;
        }
        for slot in 0..strategy.input_shardings.len() {
            let Some(expected) = strategy.input_shardings[slot].clone() else {
                continue;
            };
            // Re-read: an earlier slot's insertion may have rewired us.
            let operand = graph.nodes()[user].operands[slot];
            let operand_node = &graph.nodes()[operand];
            if !matches!(operand_node.output, NodeOutput::Array { .. }) {
                continue;
            }
            let actual = match &operand_node.sharding {
                Some(ShardingAnnotation::Leaf(s)) => s.clone(),
                _ => continue,
            };
            if actual.equivalent(&expected, env.mesh()) {
                continue;
            }
            if matches!(operand_node.kind, OpKind::Reshard)
                && operand_node
                    .sharding
                    .as_ref()
                    .and_then(|a| a.as_leaf())
                    .is_some_and(|s| s.equivalent(&expected, env.mesh()))
            {
                continue;
            }
            if let Some((shape, _)) = graph.nodes()[operand].output.as_array() {
                expected.validate(shape, env.mesh())?;
            }
            graph.insert_reshard(user, operand, expected);
            inserted += 1;
        }
    }
    if inserted > 0 {
        tracing::info!(inserted, "inserted resharding copies");
    }
    Ok(inserted)
}
