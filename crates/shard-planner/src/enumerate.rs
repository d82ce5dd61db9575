// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Strategy enumeration: one group per node, in topological order.
//!
//! Nodes are visited def-before-use, so every rule can price its
//! resharding vectors against fully built operand groups. Pre-annotated
//! nodes are trimmed immediately after their group is built (before any
//! user prices against them), keeping candidate indices consistent; the
//! trimmed-away sets are stashed so a caller can restore them for a
//! later re-solve.
//!
//! On a trivial mesh (no axis larger than one) every tiling collapses
//! to replication, so enumeration short-circuits to single-candidate
//! replicated groups.

use mesh_core::{ClusterEnv, DeviceMesh, Sharding};
use op_graph::{graph::Validated, NodeOutput, OpGraph, ShardingAnnotation};

use crate::config::{AutoShardingConfig, DivisibilityPolicy};
use crate::error::PlannerError;
use crate::rules::{self, RuleContext};
use crate::strategy::{
    GroupArena, GroupId, ShardingStrategy, StashedStrategies, StrategyGroup,
};

/// Builds the strategy groups for every node of the graph.
pub fn enumerate_strategies(
    graph: &OpGraph<Validated>,
    mesh: &DeviceMesh,
    config: &AutoShardingConfig,
) -> Result<(GroupArena, StashedStrategies), PlannerError> {
    let ctx = RuleContext {
        graph,
        env: ClusterEnv::new(mesh),
        config,
    };
    let mut arena = GroupArena::new();
    let mut stash = StashedStrategies::new();
    let trivial = mesh.is_trivial();
    if trivial {
        tracing::info!("mesh is trivial, all nodes replicated");
    }

    for node_index in 0..graph.num_nodes() {
        let gid = if trivial {
            replicated_group(&ctx, &mut arena, node_index, &graph.nodes()[node_index].output)
        } else {
            rules::build_node_group(&ctx, &mut arena, node_index)?
        };
        arena.bind_node(node_index, gid);

        if !trivial && config.preserve_existing {
            if let Some(ShardingAnnotation::Leaf(annotated)) =
                &graph.nodes()[node_index].sharding
            {
                trim_to_annotation(&ctx, &mut arena, &mut stash, node_index, gid, annotated)?;
            }
        }

        ensure_nonempty(&ctx, &arena, node_index, gid)?;
    }

    validate_vectors(graph, &arena)?;
    tracing::debug!(
        groups = arena.len(),
        leaves = arena.num_leaves(),
        stashed = stash.len(),
        "strategy enumeration complete"
    );
    Ok((arena, stash))
}

/// Single replicated candidate per leaf, mirroring the output structure.
fn replicated_group(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
    output: &NodeOutput,
) -> GroupId {
    match output {
        NodeOutput::Array { shape, dtype } => {
            let mut strategy = ShardingStrategy::new("R", Sharding::Replicated);
            strategy.memory_cost =
                Sharding::Replicated.shard_bytes(shape, *dtype, ctx.env.mesh()) as f64;
            arena.push_leaf(node_index, vec![strategy], vec![], None, false)
        }
        NodeOutput::Tuple { elements } => {
            let children = elements
                .iter()
                .map(|e| replicated_group(ctx, arena, node_index, e))
                .collect();
            arena.push_tuple(node_index, children)
        }
    }
}

/// Trims a pre-annotated node's candidate set down to the annotation,
/// stashing the full set for possible restoration.
fn trim_to_annotation(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    stash: &mut StashedStrategies,
    node_index: usize,
    gid: GroupId,
    annotated: &Sharding,
) -> Result<(), PlannerError> {
    let node = ctx.node(node_index);
    let StrategyGroup::Leaf(_) = arena.get(gid) else {
        return Ok(());
    };

    if ctx.config.divisibility == DivisibilityPolicy::RequireEven {
        if let (Sharding::Tiled { dim_to_mesh }, Some((shape, _))) =
            (annotated, node.output.as_array())
        {
            for (dim, axis) in dim_to_mesh.iter().enumerate() {
                let Some(axis) = axis else { continue };
                let tiles = ctx.env.mesh().dim(*axis);
                if tiles > 1 && shape.dim(dim) % tiles != 0 {
                    return Err(PlannerError::IndivisibleSharding {
                        node: node.name.clone(),
                        dim,
                        size: shape.dim(dim),
                        shards: tiles,
                    });
                }
            }
        }
    }

    let leaf = arena.leaf_mut(gid);
    let mut kept: Vec<ShardingStrategy> = leaf
        .strategies
        .iter()
        .filter(|s| s.output_sharding.equivalent(annotated, ctx.env.mesh()))
        .cloned()
        .collect();
    if kept.is_empty() {
        // The annotation names a layout enumeration did not produce;
        // honor it anyway with an unpriced candidate.
        let mut s = ShardingStrategy::new(annotated.to_string(), annotated.clone());
        s.input_shardings = vec![None; leaf.operands.len()];
        kept.push(s);
    }
    kept.truncate(1);

    let full = std::mem::replace(&mut leaf.strategies, kept);
    // A one-candidate group cannot mirror a larger one.
    leaf.follow = None;
    stash.save(node_index, full);
    tracing::debug!(node = %node.name, sharding = %annotated, "trimmed to annotation");

    // Re-price the surviving candidate if it was synthesized above.
    let (shape, dtype) = match node.output.as_array() {
        Some((s, d)) => (s.clone(), d),
        None => return Ok(()),
    };
    let operand_gids = arena.leaf(gid).operands.clone();
    let operand_values = rules::operand_values(ctx, node_index);
    let mut strategies = std::mem::take(&mut arena.leaf_mut(gid).strategies);
    rules::finalize(
        ctx,
        arena,
        (&shape, dtype),
        &mut strategies,
        &operand_gids,
        &operand_values,
    );
    arena.leaf_mut(gid).strategies = strategies;
    Ok(())
}

fn ensure_nonempty(
    ctx: &RuleContext<'_>,
    arena: &GroupArena,
    node_index: usize,
    gid: GroupId,
) -> Result<(), PlannerError> {
    let empty = match arena.get(gid) {
        StrategyGroup::Leaf(leaf) => leaf.strategies.is_empty(),
        StrategyGroup::Tuple { children, .. } => children
            .iter()
            .any(|&c| matches!(arena.get(c), StrategyGroup::Leaf(l) if l.strategies.is_empty())),
    };
    if empty {
        let node = ctx.node(node_index);
        return Err(PlannerError::NoStrategies {
            node: node.name.clone(),
            op: node.kind.as_str().to_string(),
        });
    }
    Ok(())
}

/// Checks that every resharding vector lines up with its operand
/// group's candidate count.
fn validate_vectors(
    graph: &OpGraph<Validated>,
    arena: &GroupArena,
) -> Result<(), PlannerError> {
    for leaf in arena.leaves() {
        for strategy in &leaf.strategies {
            for (slot, &operand_gid) in leaf.operands.iter().enumerate() {
                let expected = arena.leaf(operand_gid).strategies.len();
                let actual = strategy
                    .communication_resharding_costs
                    .get(slot)
                    .map(|v| v.len())
                    .unwrap_or(0);
                if actual != expected {
                    return Err(PlannerError::CostVectorMismatch {
                        node: graph.nodes()[leaf.node_index].name.clone(),
                        operand: slot,
                        expected,
                        actual,
                    });
                }
            }
        }
    }
    Ok(())
}
