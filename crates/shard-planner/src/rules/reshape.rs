// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reshape rule: carry tilings through dimension-preserving reshapes.
//!
//! A reshape preserves element order, so a tiled input dimension can
//! keep its mesh axis whenever it survives the reshape intact: an input
//! dim maps to an output dim when both have the same size and the same
//! element offset (equal prefix products). Tilings on dimensions the
//! reshape splits or merges cannot be carried and fall back to a
//! replicated candidate; the resharding vector prices the gather.

use mesh_core::{Shape, Sharding};

use super::{finalize, operand_leaf, operand_values, RuleContext};
use crate::error::PlannerError;
use crate::strategy::{GroupArena, GroupId, ShardingStrategy};

pub(crate) fn reshape(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
) -> Result<GroupId, PlannerError> {
    let node = ctx.node(node_index);
    let (out_shape, out_dtype) = super::basic::expect_array(ctx, node_index)?;
    let operand_gid = operand_leaf(arena, ctx, node_index, 0);
    let in_shape = ctx.graph.nodes()[node.operands[0]]
        .output
        .as_array()
        .map(|(s, _)| s.clone())
        .unwrap_or_else(Shape::scalar);

    let dim_map = reshape_dim_map(&in_shape, out_shape);

    let mut strategies: Vec<ShardingStrategy> = arena
        .leaf(operand_gid)
        .strategies
        .iter()
        .map(|src| {
            let output_sharding =
                map_through(&src.output_sharding, &dim_map, out_shape.rank())
                    .unwrap_or(Sharding::Replicated);
            let mut s =
                ShardingStrategy::new(output_sharding.to_string(), output_sharding);
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

/// For each input dim, the output dim it survives into, if any.
fn reshape_dim_map(src: &Shape, dst: &Shape) -> Vec<Option<usize>> {
    let mut map = vec![None; src.rank()];
    let mut src_prefix: u128 = 1;
    for i in 0..src.rank() {
        let mut dst_prefix: u128 = 1;
        for j in 0..dst.rank() {
            if src_prefix == dst_prefix && src.dim(i) == dst.dim(j) {
                map[i] = Some(j);
                break;
            }
            dst_prefix *= dst.dim(j) as u128;
        }
        src_prefix *= src.dim(i) as u128;
    }
    map
}

/// Carries a sharding through the dim map; `None` when any tiled dim
/// does not survive.
fn map_through(src: &Sharding, dim_map: &[Option<usize>], out_rank: usize) -> Option<Sharding> {
    match src {
        Sharding::Replicated => Some(Sharding::Replicated),
        Sharding::Maximal { device } => Some(Sharding::Maximal { device: *device }),
        Sharding::Tiled { dim_to_mesh } => {
            let mut out_assignment = vec![None; out_rank];
            for (dim, axis) in dim_to_mesh.iter().enumerate() {
                let Some(axis) = axis else { continue };
                let out_dim = dim_map.get(dim).copied().flatten()?;
                out_assignment[out_dim] = Some(*axis);
            }
            Some(Sharding::Tiled {
                dim_to_mesh: out_assignment,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_dim_survives_trailing_merge() {
        // [8, 4, 4] -> [8, 16]: dim 0 survives, dims 1/2 merge.
        let map = reshape_dim_map(&Shape::new(vec![8, 4, 4]), &Shape::new(vec![8, 16]));
        assert_eq!(map, vec![Some(0), None, None]);
    }

    #[test]
    fn identity_reshape_maps_all() {
        let map = reshape_dim_map(&Shape::matrix(8, 16), &Shape::matrix(8, 16));
        assert_eq!(map, vec![Some(0), Some(1)]);
    }

    #[test]
    fn tiling_on_merged_dim_is_dropped() {
        let map = reshape_dim_map(&Shape::new(vec![8, 4, 4]), &Shape::new(vec![8, 16]));
        let kept = map_through(&Sharding::split(3, 0, 0), &map, 2);
        assert_eq!(kept, Some(Sharding::split(2, 0, 0)));
        let dropped = map_through(&Sharding::split(3, 1, 0), &map, 2);
        assert!(dropped.is_none());
    }
}
