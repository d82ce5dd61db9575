// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Rules for sources, opaque ops, and ops with dimension restrictions.

use mesh_core::Sharding;

use super::{basic_tilings, finalize, operand_leaf, operand_values, RuleContext};
use crate::error::PlannerError;
use crate::strategy::{GroupArena, GroupId, ShardingStrategy};

/// Parameters and constants: free choice of layout, no operands.
pub(crate) fn source(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
) -> Result<GroupId, PlannerError> {
    let (shape, dtype) = expect_array(ctx, node_index)?;
    let mut strategies = basic_tilings(ctx, shape, &[]);
    finalize(ctx, arena, (shape, dtype), &mut strategies, &[], &[]);
    Ok(arena.push_leaf(node_index, strategies, vec![], None, false))
}

/// Opaque ops (custom calls, outfeeds): replicated only, and all
/// operands gathered to full replication.
pub(crate) fn replicated_only(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
) -> Result<GroupId, PlannerError> {
    let node = ctx.node(node_index);
    let (shape, dtype) = expect_array(ctx, node_index)?;
    let operand_gids: Vec<GroupId> = (0..node.operands.len())
        .map(|slot| operand_leaf(arena, ctx, node_index, slot))
        .collect();
    let mut strategy = ShardingStrategy::new("R", Sharding::Replicated);
    strategy.input_shardings = vec![Some(Sharding::Replicated); operand_gids.len()];
    let mut strategies = vec![strategy];
    finalize(
        ctx,
        arena,
        (shape, dtype),
        &mut strategies,
        &operand_gids,
        &operand_values(ctx, node_index),
    );
    Ok(arena.push_leaf(node_index, strategies, operand_gids, None, false))
}

/// Broadcast: the output may be tiled freely; the (smaller) input is
/// read whole, so it is required replicated.
pub(crate) fn broadcast(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
) -> Result<GroupId, PlannerError> {
    let (shape, dtype) = expect_array(ctx, node_index)?;
    let operand_gids = vec![operand_leaf(arena, ctx, node_index, 0)];
    let mut strategies = basic_tilings(ctx, shape, &[]);
    for strategy in &mut strategies {
        strategy.input_shardings = vec![Some(Sharding::Replicated)];
    }
    finalize(
        ctx,
        arena,
        (shape, dtype),
        &mut strategies,
        &operand_gids,
        &operand_values(ctx, node_index),
    );
    Ok(arena.push_leaf(node_index, strategies, operand_gids, None, false))
}

/// Gather and scatter: dimensions addressed by the indices cannot be
/// tiled. Non-collapsed dimensions pass through to the data operand;
/// index and update operands are required replicated.
pub(crate) fn gather_scatter(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
    collapsed_dims: &[usize],
) -> Result<GroupId, PlannerError> {
    let node = ctx.node(node_index);
    let (shape, dtype) = expect_array(ctx, node_index)?;
    let data_rank = ctx.graph.nodes()[node.operands[0]]
        .output
        .as_array()
        .map(|(s, _)| s.rank())
        .unwrap_or(0);
    let operand_gids: Vec<GroupId> = (0..node.operands.len())
        .map(|slot| operand_leaf(arena, ctx, node_index, slot))
        .collect();

    let mut strategies = basic_tilings(ctx, shape, collapsed_dims);
    for strategy in &mut strategies {
        let data_required = match &strategy.output_sharding {
            // Pass the tiling through when it only touches dims the
            // data operand also has; offset dims force a gathered read.
            Sharding::Tiled { dim_to_mesh }
                if dim_to_mesh
                    .iter()
                    .enumerate()
                    .all(|(d, a)| a.is_none() || d < data_rank) =>
            {
                let mut data_assignment = dim_to_mesh.clone();
                data_assignment.resize(data_rank, None);
                Sharding::Tiled {
                    dim_to_mesh: data_assignment,
                }
            }
            _ => Sharding::Replicated,
        };
        let mut required = vec![Some(Sharding::Replicated); operand_gids.len()];
        required[0] = Some(data_required);
        strategy.input_shardings = required;
    }
    finalize(
        ctx,
        arena,
        (shape, dtype),
        &mut strategies,
        &operand_gids,
        &operand_values(ctx, node_index),
    );
    Ok(arena.push_leaf(node_index, strategies, operand_gids, None, false))
}

/// Sort: the sorted dimension cannot be tiled; operands must share the
/// output layout.
pub(crate) fn sort(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
    dim: usize,
) -> Result<GroupId, PlannerError> {
    let node = ctx.node(node_index);
    let (shape, dtype) = expect_array(ctx, node_index)?;
    let operand_gids: Vec<GroupId> = (0..node.operands.len())
        .map(|slot| operand_leaf(arena, ctx, node_index, slot))
        .collect();
    let mut strategies = basic_tilings(ctx, shape, &[dim]);
    for strategy in &mut strategies {
        strategy.input_shardings =
            vec![Some(strategy.output_sharding.clone()); operand_gids.len()];
    }
    finalize(
        ctx,
        arena,
        (shape, dtype),
        &mut strategies,
        &operand_gids,
        &operand_values(ctx, node_index),
    );
    Ok(arena.push_leaf(node_index, strategies, operand_gids, None, false))
}

/// Fetches a node's array output or reports the node as unsupported
/// (tuple-output nodes are handled by the tuple rules).
pub(crate) fn expect_array<'a>(
    ctx: &RuleContext<'a>,
    node_index: usize,
) -> Result<(&'a mesh_core::Shape, mesh_core::DType), PlannerError> {
    let node = ctx.node(node_index);
    node.output.as_array().ok_or_else(|| PlannerError::UnsupportedOp {
        node: node.name.clone(),
        op: format!("{} with tuple output", node.kind.as_str()),
    })
}
