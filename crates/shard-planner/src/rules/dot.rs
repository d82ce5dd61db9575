// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Contraction rules: dot products and convolutions.
//!
//! Contractions get explicit candidates rather than follow links,
//! because the profitable layouts depend on which side of the
//! contraction is split:
//!
//! - splitting a free ("space") dimension of one side tiles the output
//!   and needs no communication, but replicates the other side;
//! - splitting both sides' space dimensions on different mesh axes
//!   tiles the output in 2-D;
//! - splitting the contracted dimension tiles *both* inputs and leaves
//!   each device with a partial sum, discharged by an all-reduce that
//!   is priced into the candidate and recorded for the reduce-scatter
//!   rewriter;
//! - full replication is always available as a fallback.

use mesh_core::Sharding;

use super::{finalize, operand_leaf, operand_values, splittable, RuleContext};
use crate::error::PlannerError;
use crate::strategy::{GroupArena, GroupId, ShardingStrategy};

/// How one output dimension lines up with the operand dimensions.
struct SpaceDim {
    out_dim: usize,
    lhs_dim: Option<usize>,
    rhs_dim: Option<usize>,
}

pub(crate) fn dot(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
    lhs_contracting: usize,
    rhs_contracting: usize,
) -> Result<GroupId, PlannerError> {
    let node = ctx.node(node_index);
    let lhs_rank = operand_rank(ctx, node.operands[0]);
    let rhs_rank = operand_rank(ctx, node.operands[1]);

    // Output layout: lhs space dims first, then rhs space dims.
    let mut mappings = Vec::new();
    let mut out_dim = 0;
    for lhs_dim in 0..lhs_rank {
        if lhs_dim != lhs_contracting {
            mappings.push(SpaceDim {
                out_dim,
                lhs_dim: Some(lhs_dim),
                rhs_dim: None,
            });
            out_dim += 1;
        }
    }
    for rhs_dim in 0..rhs_rank {
        if rhs_dim != rhs_contracting {
            mappings.push(SpaceDim {
                out_dim,
                lhs_dim: None,
                rhs_dim: Some(rhs_dim),
            });
            out_dim += 1;
        }
    }

    contraction(ctx, arena, node_index, &mappings, lhs_contracting, rhs_contracting)
}

/// Convolution in batch-last-feature layout: the batch dimension maps
/// to output dim 0, the kernel's output-feature dimension to the last
/// output dim, and the feature dimensions contract.
pub(crate) fn convolution(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
) -> Result<GroupId, PlannerError> {
    let node = ctx.node(node_index);
    let (out_shape, _) = super::basic::expect_array(ctx, node_index)?;
    let lhs_rank = operand_rank(ctx, node.operands[0]);
    let rhs_rank = operand_rank(ctx, node.operands[1]);

    let mappings = vec![
        SpaceDim {
            out_dim: 0,
            lhs_dim: Some(0),
            rhs_dim: None,
        },
        SpaceDim {
            out_dim: out_shape.rank() - 1,
            lhs_dim: None,
            rhs_dim: Some(rhs_rank - 1),
        },
    ];
    let lhs_contracting = lhs_rank - 1;
    let rhs_contracting = rhs_rank.saturating_sub(2);
    contraction(ctx, arena, node_index, &mappings, lhs_contracting, rhs_contracting)
}

fn contraction(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
    mappings: &[SpaceDim],
    lhs_contracting: usize,
    rhs_contracting: usize,
) -> Result<GroupId, PlannerError> {
    let (out_shape, out_dtype) = super::basic::expect_array(ctx, node_index)?;
    let operand_gids = vec![
        operand_leaf(arena, ctx, node_index, 0),
        operand_leaf(arena, ctx, node_index, 1),
    ];
    let values = operand_values(ctx, node_index);
    let (lhs_shape, rhs_shape) = (&values[0].0, &values[1].0);
    let axes = ctx.env.mesh().non_trivial_dims();
    let out_rank = out_shape.rank();
    let lhs_rank = lhs_shape.rank();
    let rhs_rank = rhs_shape.rank();

    let mut strategies = Vec::new();

    // One space dimension split across one mesh axis.
    for m in mappings {
        for &axis in &axes {
            if !space_splittable(ctx, m, lhs_shape, rhs_shape, axis) {
                continue;
            }
            let output = Sharding::split(out_rank, m.out_dim, axis);
            let lhs = m
                .lhs_dim
                .map(|d| Sharding::split(lhs_rank, d, axis))
                .unwrap_or(Sharding::Replicated);
            let rhs = m
                .rhs_dim
                .map(|d| Sharding::split(rhs_rank, d, axis))
                .unwrap_or(Sharding::Replicated);
            strategies.push(candidate(output, lhs, rhs));
        }
    }

    // Two space dimensions, one from each side, on distinct axes.
    if axes.len() >= 2 {
        for ml in mappings {
            let Some(lhs_dim) = ml.lhs_dim else { continue };
            for mr in mappings {
                let Some(rhs_dim) = mr.rhs_dim else { continue };
                for &a0 in &axes {
                    for &a1 in &axes {
                        if a0 == a1
                            || !splittable(ctx, lhs_shape, lhs_dim, a0)
                            || !splittable(ctx, rhs_shape, rhs_dim, a1)
                        {
                            continue;
                        }
                        let mut out_assignment = vec![None; out_rank];
                        out_assignment[ml.out_dim] = Some(a0);
                        out_assignment[mr.out_dim] = Some(a1);
                        let output = Sharding::Tiled {
                            dim_to_mesh: out_assignment,
                        };
                        let lhs = Sharding::split(lhs_rank, lhs_dim, a0);
                        let rhs = Sharding::split(rhs_rank, rhs_dim, a1);
                        strategies.push(candidate(output, lhs, rhs));
                    }
                }
            }
        }
    }

    // Contracted dimension split: both inputs tiled, output is a
    // partial sum discharged by an all-reduce on the axis.
    for &axis in &axes {
        if !splittable(ctx, lhs_shape, lhs_contracting, axis)
            || !splittable(ctx, rhs_shape, rhs_contracting, axis)
        {
            continue;
        }
        let lhs = Sharding::split(lhs_rank, lhs_contracting, axis);
        let rhs = Sharding::split(rhs_rank, rhs_contracting, axis);
        let mut s = ShardingStrategy::new(format!("partial@{axis}"), Sharding::Replicated);
        let out_bytes = out_shape.size_bytes(out_dtype) as f64;
        s.communication_cost = ctx.env.all_reduce_cost(out_bytes, axis);
        s.all_reduce_axes = vec![axis];
        s.input_shardings = vec![Some(lhs), Some(rhs)];
        strategies.push(s);
    }

    strategies.push(candidate(
        Sharding::Replicated,
        Sharding::Replicated,
        Sharding::Replicated,
    ));

    finalize(
        ctx,
        arena,
        (out_shape, out_dtype),
        &mut strategies,
        &operand_gids,
        &values,
    );
    Ok(arena.push_leaf(node_index, strategies, operand_gids, None, false))
}

/// A candidate with the given output layout and required inputs.
fn candidate(output: Sharding, lhs: Sharding, rhs: Sharding) -> ShardingStrategy {
    let mut s = ShardingStrategy::new(output.to_string(), output);
    s.input_shardings = vec![Some(lhs), Some(rhs)];
    s
}

fn space_splittable(
    ctx: &RuleContext<'_>,
    m: &SpaceDim,
    lhs_shape: &mesh_core::Shape,
    rhs_shape: &mesh_core::Shape,
    axis: usize,
) -> bool {
    match (m.lhs_dim, m.rhs_dim) {
        (Some(d), _) => splittable(ctx, lhs_shape, d, axis),
        (_, Some(d)) => splittable(ctx, rhs_shape, d, axis),
        (None, None) => false,
    }
}

fn operand_rank(ctx: &RuleContext<'_>, operand: usize) -> usize {
    ctx.graph.nodes()[operand]
        .output
        .as_array()
        .map(|(s, _)| s.rank())
        .unwrap_or(0)
}
