// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-opcode strategy enumeration rules.
//!
//! [`build_node_group`] dispatches on [`OpKind`] to a rule that builds
//! the node's strategy group. The opcode set is closed, so dispatch is a
//! plain `match` and every variant has exactly one rule.
//!
//! Shared machinery lives here: candidate tiling generation
//! ([`basic_tilings`]) and cost finalization ([`finalize`]), which fills
//! in memory costs and the per-operand resharding vectors every rule
//! needs.

pub(crate) mod basic;
pub(crate) mod dot;
pub(crate) mod elementwise;
pub(crate) mod reduce;
pub(crate) mod reshape;
pub(crate) mod tuple;

use mesh_core::{ClusterEnv, DType, Shape, Sharding};
use op_graph::{graph::Validated, NodeDef, OpGraph, OpKind};

use crate::config::AutoShardingConfig;
use crate::error::PlannerError;
use crate::reshard::{communication_resharding_costs, memory_resharding_costs};
use crate::strategy::{GroupArena, GroupId, ShardingStrategy};

/// Read-only inputs shared by all enumeration rules.
pub(crate) struct RuleContext<'a> {
    pub graph: &'a OpGraph<Validated>,
    pub env: ClusterEnv<'a>,
    pub config: &'a AutoShardingConfig,
}

impl<'a> RuleContext<'a> {
    pub fn node(&self, index: usize) -> &'a NodeDef {
        &self.graph.nodes()[index]
    }

    /// Array shape and dtype of a node output. `None` for tuples.
    pub fn array_output(&self, index: usize) -> Option<(&'a Shape, DType)> {
        self.graph.nodes()[index].output.as_array()
    }
}

/// Builds the strategy group for one node and returns its arena id.
/// The caller binds the id to the node afterwards.
pub(crate) fn build_node_group(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
) -> Result<GroupId, PlannerError> {
    let node = ctx.node(node_index);
    match &node.kind {
        OpKind::Parameter | OpKind::Constant => basic::source(ctx, arena, node_index),
        OpKind::Elementwise => elementwise::elementwise(ctx, arena, node_index),
        OpKind::Broadcast => basic::broadcast(ctx, arena, node_index),
        OpKind::Reduce { dims } => reduce::reduce(ctx, arena, node_index, dims),
        OpKind::Reshape => reshape::reshape(ctx, arena, node_index),
        OpKind::Dot {
            lhs_contracting,
            rhs_contracting,
        } => dot::dot(ctx, arena, node_index, *lhs_contracting, *rhs_contracting),
        OpKind::Convolution => dot::convolution(ctx, arena, node_index),
        OpKind::Gather { collapsed_dims } | OpKind::Scatter { collapsed_dims } => {
            basic::gather_scatter(ctx, arena, node_index, collapsed_dims)
        }
        OpKind::Sort { dim } => basic::sort(ctx, arena, node_index, *dim),
        OpKind::CustomCall { .. } | OpKind::Outfeed => {
            basic::replicated_only(ctx, arena, node_index)
        }
        OpKind::Tuple => tuple::tuple(ctx, arena, node_index),
        OpKind::GetTupleElement { index } => {
            tuple::get_tuple_element(ctx, arena, node_index, *index)
        }
        OpKind::Conditional => tuple::conditional(ctx, arena, node_index),
        OpKind::Reshard | OpKind::AllGather { .. } => {
            Err(PlannerError::UnsupportedOp {
                node: node.name.clone(),
                op: node.kind.as_str().to_string(),
            })
        }
    }
}

/// The leaf group priced for operand slot `slot` of a node.
pub(crate) fn operand_leaf(
    arena: &GroupArena,
    ctx: &RuleContext<'_>,
    node_index: usize,
    slot: usize,
) -> GroupId {
    let operand = ctx.node(node_index).operands[slot];
    arena.node_group(operand)
}

/// Generates the standard candidate set for an array shape: every 1-D
/// tiling of a splittable dimension across a non-trivial mesh axis,
/// 2-D tilings when the mesh has at least two non-trivial axes, and
/// full replication last.
///
/// Dimensions listed in `exclude` are never tiled. Under
/// [`DivisibilityPolicy::RequireEven`] candidates that would split a
/// dimension unevenly are dropped.
///
/// [`DivisibilityPolicy::RequireEven`]: crate::config::DivisibilityPolicy
pub(crate) fn basic_tilings(
    ctx: &RuleContext<'_>,
    shape: &Shape,
    exclude: &[usize],
) -> Vec<ShardingStrategy> {
    let mesh = ctx.env.mesh();
    let axes = mesh.non_trivial_dims();
    let mut out = Vec::new();

    for dim in 0..shape.rank() {
        if exclude.contains(&dim) || shape.dim(dim) <= 1 {
            continue;
        }
        for &axis in &axes {
            if splittable(ctx, shape, dim, axis) {
                let sharding = Sharding::split(shape.rank(), dim, axis);
                out.push(ShardingStrategy::new(sharding.to_string(), sharding));
            }
        }
    }

    if axes.len() >= 2 {
        for d0 in 0..shape.rank() {
            for d1 in (d0 + 1)..shape.rank() {
                if exclude.contains(&d0) || exclude.contains(&d1) {
                    continue;
                }
                if shape.dim(d0) <= 1 || shape.dim(d1) <= 1 {
                    continue;
                }
                for &a0 in &axes {
                    for &a1 in &axes {
                        if a0 == a1
                            || !splittable(ctx, shape, d0, a0)
                            || !splittable(ctx, shape, d1, a1)
                        {
                            continue;
                        }
                        let mut dim_to_mesh = vec![None; shape.rank()];
                        dim_to_mesh[d0] = Some(a0);
                        dim_to_mesh[d1] = Some(a1);
                        let sharding = Sharding::Tiled { dim_to_mesh };
                        out.push(ShardingStrategy::new(sharding.to_string(), sharding));
                    }
                }
            }
        }
    }

    out.push(ShardingStrategy::new("R", Sharding::Replicated));
    out
}

/// Whether tiling `dim` of `shape` across `axis` is admissible under
/// the configured divisibility policy.
pub(crate) fn splittable(
    ctx: &RuleContext<'_>,
    shape: &Shape,
    dim: usize,
    axis: usize,
) -> bool {
    let mesh = ctx.env.mesh();
    if dim >= shape.rank() {
        return false;
    }
    let size = shape.dim(dim);
    if size < mesh.dim(axis) {
        return false;
    }
    match ctx.config.divisibility {
        crate::config::DivisibilityPolicy::AllowUneven => true,
        crate::config::DivisibilityPolicy::RequireEven => size % mesh.dim(axis) == 0,
    }
}

/// Fills in the derived cost fields of a candidate set.
///
/// For every strategy this computes the per-device output bytes
/// (`memory_cost`) and, per operand slot, the communication and memory
/// resharding vectors against the operand group's candidates. A slot
/// whose expected input sharding is `None` accepts any layout and gets
/// zero vectors.
pub(crate) fn finalize(
    ctx: &RuleContext<'_>,
    arena: &GroupArena,
    output: (&Shape, DType),
    strategies: &mut [ShardingStrategy],
    operand_gids: &[GroupId],
    operand_values: &[(Shape, DType)],
) {
    let (out_shape, out_dtype) = output;
    for strategy in strategies.iter_mut() {
        strategy.memory_cost =
            strategy
                .output_sharding
                .shard_bytes(out_shape, out_dtype, ctx.env.mesh()) as f64;
        if strategy.input_shardings.is_empty() {
            strategy.input_shardings = vec![None; operand_gids.len()];
        }
        strategy.communication_resharding_costs.clear();
        strategy.memory_resharding_costs.clear();
        for (slot, &gid) in operand_gids.iter().enumerate() {
            let candidates = &arena.leaf(gid).strategies;
            let (shape, dtype) = &operand_values[slot];
            match &strategy.input_shardings[slot] {
                None => {
                    strategy
                        .communication_resharding_costs
                        .push(vec![0.0; candidates.len()]);
                    strategy
                        .memory_resharding_costs
                        .push(vec![0.0; candidates.len()]);
                }
                Some(required) => {
                    strategy.communication_resharding_costs.push(
                        communication_resharding_costs(
                            candidates, shape, *dtype, required, &ctx.env,
                        ),
                    );
                    strategy.memory_resharding_costs.push(memory_resharding_costs(
                        candidates, shape, *dtype, required, &ctx.env,
                    ));
                }
            }
        }
    }
}

/// Shape and dtype of each costed operand slot, cloned out of the graph.
pub(crate) fn operand_values(
    ctx: &RuleContext<'_>,
    node_index: usize,
) -> Vec<(Shape, DType)> {
    ctx.node(node_index)
        .operands
        .iter()
        .map(|&op| {
            let (shape, dtype) = ctx.graph.nodes()[op]
                .output
                .as_array()
                .map(|(s, d)| (s.clone(), d))
                .unwrap_or((Shape::scalar(), DType::F32));
            (shape, dtype)
        })
        .collect()
}
