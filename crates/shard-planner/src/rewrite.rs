// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reduce-scatter rewrite.
//!
//! A candidate with implied all-reduce axes materializes a replicated
//! result on every device. When that result only flows through a run of
//! elementwise users that keep the same layout, the all-reduce can be
//! weakened to a reduce-scatter: the whole region computes on scattered
//! shards, and a single all-gather at the region's boundary restores
//! the original layout. Over a ring both collectives move the same
//! bytes, so the region's elementwise work gets divided across devices
//! for free.
//!
//! The region starts at the node carrying the implied all-reduce and
//! grows in both directions: downstream through same-shape elementwise
//! users, and upstream through same-shape elementwise operands of the
//! members, so side chains feeding the region get their work divided
//! too.
//!
//! The rewrite fires only when the region has at least
//! `reduce_scatter_min_set` members and at most one boundary user, and
//! it re-annotates the members in place; the origin's annotation no
//! longer matching its chosen candidate is what makes a second run a
//! no-op.

use std::collections::BTreeSet;

use mesh_core::{ClusterEnv, Sharding};
use op_graph::{graph::Validated, OpGraph, OpKind, ShardingAnnotation};

use crate::config::AutoShardingConfig;
use crate::error::PlannerError;
use crate::strategy::{GroupArena, StrategyGroup};

/// Upper bound on the region size explored per origin.
const MAX_REGION: usize = 64;

/// Rewrites eligible all-reduce regions. Returns the number of regions
/// rewritten.
pub fn rewrite_reduce_scatter(
    graph: &mut OpGraph<Validated>,
    arena: &GroupArena,
    env: &ClusterEnv<'_>,
    leaf_chosen: &[usize],
    config: &AutoShardingConfig,
) -> Result<usize, PlannerError> {
    if !config.enable_reduce_scatter {
        return Ok(0);
    }
    let mut rewritten = 0;
    let planned: BTreeSet<usize> = arena
        .iter()
        .filter_map(|(_, g)| g.as_leaf().map(|l| l.node_index))
        .collect();

    for &origin in &planned {
        let StrategyGroup::Leaf(leaf) = arena.get(arena.node_group(origin)) else {
            continue;
        };
        let strategy = &leaf.strategies[leaf_chosen[leaf.leaf_id]];
        if strategy.all_reduce_axes.is_empty() {
            continue;
        }
        let Some(current) = leaf_sharding(graph, origin) else { continue };
        // Already rewritten (or overridden elsewhere).
        if !current.equivalent(&strategy.output_sharding, env.mesh()) {
            continue;
        }
        let Some((shape, _)) = graph.nodes()[origin].output.as_array() else {
            continue;
        };
        let Some(scattered) =
            scatter_sharding(shape, &current, &strategy.all_reduce_axes, env)
        else {
            continue;
        };

        let Some((members, boundary)) = collect_region(graph, arena, env, origin, &current)
        else {
            continue;
        };
        if members.len() < config.reduce_scatter_min_set || boundary.len() > 1 {
            continue;
        }

        for &member in &members {
            graph.set_sharding(member, ShardingAnnotation::Leaf(scattered.clone()));
        }
        if let Some(&(member, user)) = boundary.iter().next() {
            graph.insert_all_gather(
                user,
                member,
                strategy.all_reduce_axes.clone(),
                current.clone(),
            );
        }
        tracing::info!(
            origin = %graph.nodes()[origin].name,
            members = members.len(),
            sharding = %scattered,
            "rewrote all-reduce region to reduce-scatter"
        );
        rewritten += 1;
    }
    Ok(rewritten)
}

/// The scattered layout: each all-reduce axis tiles the first free
/// output dimension that can hold it. `None` when the axes do not fit.
fn scatter_sharding(
    shape: &mesh_core::Shape,
    current: &Sharding,
    axes: &[usize],
    env: &ClusterEnv<'_>,
) -> Option<Sharding> {
    let mut assignment = match current {
        Sharding::Tiled { dim_to_mesh } => dim_to_mesh.clone(),
        Sharding::Replicated => vec![None; shape.rank()],
        Sharding::Maximal { .. } => return None,
    };
    for &axis in axes {
        let slot = assignment
            .iter()
            .enumerate()
            .position(|(dim, a)| a.is_none() && shape.dim(dim) >= env.mesh().dim(axis))?;
        assignment[slot] = Some(axis);
    }
    Some(Sharding::Tiled {
        dim_to_mesh: assignment,
    })
}

/// Bounded DFS over elementwise nodes sharing the origin's layout,
/// walking both users and operands of every member. Returns the member
/// set and the (member, user) boundary crossings; `None` when the
/// region exceeds the exploration bound.
///
/// A non-joining user needs the gathered value and becomes a boundary
/// crossing. A non-joining operand stays a region input: members read
/// only their local slice of it, so no crossing is recorded.
fn collect_region(
    graph: &OpGraph<Validated>,
    arena: &GroupArena,
    env: &ClusterEnv<'_>,
    origin: usize,
    layout: &Sharding,
) -> Option<(BTreeSet<usize>, BTreeSet<(usize, usize)>)> {
    let origin_shape = graph.nodes()[origin].output.as_array()?.0;
    let mut members = BTreeSet::new();
    let mut boundary = BTreeSet::new();
    let mut stack = vec![origin];
    members.insert(origin);

    let joins = |candidate: usize| {
        arena.try_node_group(candidate).is_some()
            && matches!(graph.nodes()[candidate].kind, OpKind::Elementwise)
            && graph.nodes()[candidate]
                .output
                .as_array()
                .is_some_and(|(s, _)| s == origin_shape)
            && leaf_sharding(graph, candidate)
                .is_some_and(|s| s.equivalent(layout, env.mesh()))
    };

    while let Some(node) = stack.pop() {
        for &user in graph.users(node) {
            if members.contains(&user) {
                continue;
            }
            if joins(user) {
                if members.len() >= MAX_REGION {
                    return None;
                }
                members.insert(user);
                stack.push(user);
            } else {
                boundary.insert((node, user));
            }
        }
        for &operand in &graph.nodes()[node].operands {
            if members.contains(&operand) || !joins(operand) {
                continue;
            }
            if members.len() >= MAX_REGION {
                return None;
            }
            members.insert(operand);
            stack.push(operand);
        }
    }
    Some((members, boundary))
}

fn leaf_sharding(graph: &OpGraph<Validated>, node: usize) -> Option<Sharding> {
    graph.nodes()[node]
        .sharding
        .as_ref()
        .and_then(|a| a.as_leaf())
        .cloned()
}
