// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reduce rule: follow the operand, pricing implied all-reduces.
//!
//! A reduction inherits its operand's layout on the surviving
//! dimensions. When the operand tiles a *reduced* dimension, each
//! device ends up with a partial sum and the candidate carries an
//! implied all-reduce over that mesh axis, priced into its
//! communication cost and recorded in `all_reduce_axes` for the
//! reduce-scatter rewriter.

use mesh_core::Sharding;

use super::{finalize, operand_leaf, operand_values, RuleContext};
use crate::error::PlannerError;
use crate::strategy::{GroupArena, GroupId, ShardingStrategy};

pub(crate) fn reduce(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
    reduced_dims: &[usize],
) -> Result<GroupId, PlannerError> {
    let node = ctx.node(node_index);
    let (out_shape, out_dtype) = super::basic::expect_array(ctx, node_index)?;
    let operand_gid = operand_leaf(arena, ctx, node_index, 0);
    let input_rank = ctx.graph.nodes()[node.operands[0]]
        .output
        .as_array()
        .map(|(s, _)| s.rank())
        .unwrap_or(0);

    // Surviving input dims map to output dims in order.
    let mut dim_map = vec![None; input_rank];
    let mut next_out = 0;
    for (dim, slot) in dim_map.iter_mut().enumerate() {
        if !reduced_dims.contains(&dim) {
            *slot = Some(next_out);
            next_out += 1;
        }
    }

    let mut strategies: Vec<ShardingStrategy> = arena
        .leaf(operand_gid)
        .strategies
        .iter()
        .map(|src| {
            let (output_sharding, all_reduce_axes) =
                map_reduce_sharding(&src.output_sharding, &dim_map, out_shape.rank());
            let mut s =
                ShardingStrategy::new(output_sharding.to_string(), output_sharding);
            for &axis in &all_reduce_axes {
                let partial_bytes = s
                    .output_sharding
                    .shard_bytes(out_shape, out_dtype, ctx.env.mesh())
                    as f64;
                s.communication_cost += ctx.env.all_reduce_cost(partial_bytes, axis);
            }
            s.all_reduce_axes = all_reduce_axes;
            s.input_shardings = vec![Some(src.output_sharding.clone())];
            s
        })
        .collect();

    finalize(
        ctx,
        arena,
        (out_shape, out_dtype),
        &mut strategies,
        &[operand_gid],
        &operand_values(ctx, node_index),
    );
    Ok(arena.push_leaf(node_index, strategies, vec![operand_gid], Some(operand_gid), false))
}

/// Maps an operand sharding across a reduction. Returns the output
/// sharding plus the mesh axes left holding partial sums.
fn map_reduce_sharding(
    src: &Sharding,
    dim_map: &[Option<usize>],
    out_rank: usize,
) -> (Sharding, Vec<usize>) {
    match src {
        Sharding::Replicated => (Sharding::Replicated, vec![]),
        Sharding::Maximal { device } => (Sharding::Maximal { device: *device }, vec![]),
        Sharding::Tiled { dim_to_mesh } => {
            let mut out_assignment = vec![None; out_rank];
            let mut all_reduce_axes = Vec::new();
            for (dim, axis) in dim_to_mesh.iter().enumerate() {
                let Some(axis) = axis else { continue };
                match dim_map.get(dim).copied().flatten() {
                    Some(out_dim) => out_assignment[out_dim] = Some(*axis),
                    None => all_reduce_axes.push(*axis),
                }
            }
            if out_assignment.iter().all(|a| a.is_none()) {
                (Sharding::Replicated, all_reduce_axes)
            } else {
                (
                    Sharding::Tiled {
                        dim_to_mesh: out_assignment,
                    },
                    all_reduce_axes,
                )
            }
        }
    }
}
