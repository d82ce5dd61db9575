// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Elementwise rule: follow the most-sharded operand.
//!
//! An elementwise op shares a layout with its operands, so instead of
//! re-enumerating candidates the node normally *follows* one operand:
//! it mirrors that operand's candidate set one-for-one, and the follow
//! link lets the cost graph merge the two decisions into one.
//!
//! The operand to follow is chosen by priority: the operand's maximum
//! shard count among its candidates, plus a depth bonus that prefers
//! values produced deeper in the graph (their layouts are the hardest
//! to change after the fact). When the top two priorities land within
//! the configured tie tolerance the follow is ambiguous; the node then
//! keeps a full candidate set and the solver decides.

use super::{basic_tilings, finalize, operand_leaf, operand_values, RuleContext};
use crate::error::PlannerError;
use crate::strategy::{GroupArena, GroupId, ShardingStrategy};

pub(crate) fn elementwise(
    ctx: &RuleContext<'_>,
    arena: &mut GroupArena,
    node_index: usize,
) -> Result<GroupId, PlannerError> {
    let node = ctx.node(node_index);
    let (shape, dtype) = super::basic::expect_array(ctx, node_index)?;
    let operand_gids: Vec<GroupId> = (0..node.operands.len())
        .map(|slot| operand_leaf(arena, ctx, node_index, slot))
        .collect();

    if operand_gids.is_empty() {
        return Err(PlannerError::UnsupportedOp {
            node: node.name.clone(),
            op: "elementwise without operands".to_string(),
        });
    }

    let priorities: Vec<f64> = operand_gids
        .iter()
        .zip(&node.operands)
        .map(|(&gid, &op)| follow_priority(ctx, arena, gid, op))
        .collect();
    let (best_slot, tied) = pick_follow(&priorities, ctx.config.follow_tie_tolerance);

    let mut strategies;
    let follow;
    if tied {
        // Ambiguous follow: keep the full set and let the solver pick.
        strategies = basic_tilings(ctx, shape, &[]);
        for strategy in &mut strategies {
            strategy.input_shardings =
                vec![Some(strategy.output_sharding.clone()); operand_gids.len()];
        }
        follow = None;
        tracing::debug!(
            node = %node.name,
            candidates = strategies.len(),
            "follow tie, keeping full strategy set"
        );
    } else {
        let followed = arena.leaf(operand_gids[best_slot]);
        strategies = followed
            .strategies
            .iter()
            .map(|src| {
                let mut s = ShardingStrategy::new(
                    src.output_sharding.to_string(),
                    src.output_sharding.clone(),
                );
                s.input_shardings =
                    vec![Some(src.output_sharding.clone()); operand_gids.len()];
                s
            })
            .collect();
        follow = Some(operand_gids[best_slot]);
        tracing::trace!(
            node = %node.name,
            followed = %ctx.graph.nodes()[node.operands[best_slot]].name,
            "following operand {best_slot}"
        );
    }

    finalize(
        ctx,
        arena,
        (shape, dtype),
        &mut strategies,
        &operand_gids,
        &operand_values(ctx, node_index),
    );
    Ok(arena.push_leaf(node_index, strategies, operand_gids, follow, tied))
}

/// Priority of one operand as a follow target.
fn follow_priority(
    ctx: &RuleContext<'_>,
    arena: &GroupArena,
    gid: GroupId,
    operand_node: usize,
) -> f64 {
    let max_shards = arena
        .leaf(gid)
        .strategies
        .iter()
        .map(|s| s.output_sharding.num_shards(ctx.env.mesh()))
        .max()
        .unwrap_or(1) as f64;
    let depth = ctx.graph.nodes()[operand_node].depth as f64;
    max_shards + depth * ctx.config.follow_depth_weight
}

/// Index of the highest-priority operand, and whether the runner-up is
/// within the tie tolerance of it.
fn pick_follow(priorities: &[f64], tolerance: f64) -> (usize, bool) {
    let mut best = 0;
    for (i, &p) in priorities.iter().enumerate() {
        if p > priorities[best] {
            best = i;
        }
    }
    let tied = priorities
        .iter()
        .enumerate()
        .any(|(i, &p)| i != best && p * tolerance >= priorities[best]);
    (best, tied && priorities.len() > 1)
}

#[cfg(test)]
mod tests {
    use super::pick_follow;

    #[test]
    fn clear_winner_is_followed() {
        let (best, tied) = pick_follow(&[4.0, 1.0], 1.05);
        assert_eq!(best, 0);
        assert!(!tied);
    }

    #[test]
    fn close_priorities_tie() {
        let (_, tied) = pick_follow(&[4.0, 3.9], 1.05);
        assert!(tied);
    }

    #[test]
    fn single_operand_never_ties() {
        let (best, tied) = pick_follow(&[2.0], 1.05);
        assert_eq!(best, 0);
        assert!(!tied);
    }
}
