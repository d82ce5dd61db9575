// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tuple rules: tuple construction, element projection, conditionals.
//!
//! Tuple-shaped values get a tuple group whose children mirror the
//! element groups one-for-one, each child following its source. A
//! `get_tuple_element` projects the addressed child; a conditional
//! mirrors its first branch result (the branches share a result
//! structure by construction).

use mesh_core::{DType, Shape};
use op_graph::{GraphError, NodeOutput};

use super::{finalize, RuleContext};
use crate::error::PlannerError;
use crate::strategy::{GroupArena, GroupId, ShardingStrategy, StrategyGroup};

pub(crate) fn tuple(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
) -> Result<GroupId, PlannerError> {
    let node = ctx.node(node_index);
    let elements = node.output.as_tuple().ok_or_else(|| structure_error(ctx, node_index))?;
    if elements.len() != node.operands.len() {
        return Err(structure_error(ctx, node_index));
    }
    let mut children = Vec::with_capacity(node.operands.len());
    for (slot, element) in elements.iter().enumerate() {
        let src_gid = arena.node_group(node.operands[slot]);
        children.push(mirror(ctx, arena, node_index, src_gid, element)?);
    }
    Ok(arena.push_tuple(node_index, children))
}

pub(crate) fn get_tuple_element(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
    index: usize,
) -> Result<GroupId, PlannerError> {
    let node = ctx.node(node_index);
    let operand_gid = arena.node_group(node.operands[0]);
    let StrategyGroup::Tuple { children, .. } = arena.get(operand_gid) else {
        return Err(structure_error(ctx, node_index));
    };
    let child = *children.get(index).ok_or_else(|| structure_error(ctx, node_index))?;
    mirror(ctx, arena, node_index, child, &node.output)
}

pub(crate) fn conditional(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
) -> Result<GroupId, PlannerError> {
    let node = ctx.node(node_index);
    // Operands are [predicate, branch results...]; the output layout
    // follows the first branch.
    let branch = node.operands.get(1).ok_or_else(|| structure_error(ctx, node_index))?;
    let branch_gid = arena.node_group(*branch);
    mirror(ctx, arena, node_index, branch_gid, &node.output)
}

/// Builds a group for `node_index` mirroring `src_gid`, structured like
/// `output`. Leaf mirrors copy the source candidates and follow the
/// source, so the cost graph collapses the duplicated decision.
fn mirror(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
    src_gid: GroupId,
    output: &NodeOutput,
) -> Result<GroupId, PlannerError> {
    match (arena.get(src_gid), output) {
        (StrategyGroup::Leaf(_), NodeOutput::Array { shape, dtype }) => {
            let (shape, dtype) = (shape.clone(), *dtype);
            Ok(mirror_leaf(ctx, arena, node_index, src_gid, &shape, dtype))
        }
        (StrategyGroup::Tuple { children, .. }, NodeOutput::Tuple { elements })
            if children.len() == elements.len() =>
        {
            let pairs: Vec<(GroupId, NodeOutput)> = children
                .iter()
                .copied()
                .zip(elements.iter().cloned())
                .collect();
            let mut mirrored = Vec::with_capacity(pairs.len());
            for (child, element) in pairs {
                mirrored.push(mirror(ctx, arena, node_index, child, &element)?);
            }
            Ok(arena.push_tuple(node_index, mirrored))
        }
        _ => Err(structure_error(ctx, node_index)),
    }
}

fn mirror_leaf(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
    src_gid: GroupId,
    shape: &Shape,
    dtype: DType,
) -> GroupId {
    let mut strategies: Vec<ShardingStrategy> = arena
        .leaf(src_gid)
        .strategies
        .iter()
        .map(|src| {
            let mut s = ShardingStrategy::new(
                src.output_sharding.to_string(),
                src.output_sharding.clone(),
            );
            s.input_shardings = vec![Some(src.output_sharding.clone())];
            s
        })
        .collect();
    finalize(
        ctx,
        arena,
        (shape, dtype),
        &mut strategies,
        &[src_gid],
        &[(shape.clone(), dtype)],
    );
    arena.push_leaf(node_index, strategies, vec![src_gid], Some(src_gid), false)
}

fn structure_error(ctx: &RuleContext<'_>, node_index: usize) -> PlannerError {
    let node = ctx.node(node_index);
    PlannerError::Graph(GraphError::InvalidNode {
        node: node.name.clone(),
        detail: format!("{} output/operand structure mismatch", node.kind.as_str()),
    })
}
