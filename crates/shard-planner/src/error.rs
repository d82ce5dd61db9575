// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the sharding planner.
//!
//! Three tiers are distinguished by recovery strategy:
//!
//! - **Fatal modeling failures** abort the pass: a node for which no
//!   sharding strategy can be produced ([`PlannerError::NoStrategies`])
//!   means the cost model cannot price the graph at all.
//! - **Recoverable configuration failures** ([`PlannerError::Config`],
//!   [`PlannerError::IndivisibleSharding`]) let the caller retry with
//!   different settings.
//! - Solver timeouts and infeasibility are *not* errors: they travel as
//!   [`shard_solver::SolverResponse`] statuses and leave the graph
//!   untouched.

use thiserror::Error;

/// Errors raised by strategy enumeration, cost-graph construction and
/// sharding application.
#[derive(Error, Debug)]
pub enum PlannerError {
    /// Enumeration produced an empty candidate set for a node. This is
    /// fatal: every node must at least admit full replication.
    #[error("no sharding strategies for node '{node}' ({op})")]
    NoStrategies { node: String, op: String },

    /// An operation kind that only exists as a post-solve insertion was
    /// found in the input graph.
    #[error("node '{node}' has op '{op}' which cannot appear before planning")]
    UnsupportedOp { node: String, op: String },

    /// A user-preserved sharding tiles a dimension that the mesh cannot
    /// divide evenly under the configured divisibility policy.
    #[error(
        "preserved sharding on node '{node}' splits dim {dim} of size {size} \
         across {shards} shards, which is not an even division"
    )]
    IndivisibleSharding {
        node: String,
        dim: usize,
        size: usize,
        shards: usize,
    },

    /// A resharding cost vector does not line up with the operand's
    /// candidate count. Indicates an internal bookkeeping bug.
    #[error(
        "resharding vector for node '{node}' operand {operand} has \
         {actual} entries, operand group has {expected} candidates"
    )]
    CostVectorMismatch {
        node: String,
        operand: usize,
        expected: usize,
        actual: usize,
    },

    /// Invalid planner configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("solver error: {0}")]
    Solver(#[from] shard_solver::SolverError),

    #[error("graph error: {0}")]
    Graph(#[from] op_graph::GraphError),

    #[error("mesh error: {0}")]
    Mesh(#[from] mesh_core::MeshError),
}
