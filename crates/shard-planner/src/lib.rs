// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # shard-planner
//!
//! Automatic operator-sharding assignment for tensor dataflow graphs:
//! enumerates candidate shardings per node, condenses them into a cost
//! graph, hands the assignment problem to a solver, and writes the
//! solution back onto the graph.
//!
//! # Pipeline
//!
//! | Stage | Module | Output |
//! |---|---|---|
//! | Strategy enumeration | [`enumerate`] | [`GroupArena`] of candidates |
//! | Cost condensation | [`cost_graph`] | [`CostGraph`] decisions |
//! | Solver hand-off | [`solver_request`] | [`shard_solver::SolverRequest`] |
//! | Back-annotation | [`setter`] | annotated graph + reshard copies |
//! | Reduce-scatter rewrite | [`rewrite`] | scattered regions + all-gathers |
//!
//! [`AutoShardingPass`] wires the stages together; each stage is also a
//! public function for callers that need finer control (e.g. inspecting
//! the cost graph, or re-solving with restored candidate sets).
//!
//! # Example
//! ```no_run
//! use mesh_core::DeviceMesh;
//! use op_graph::GraphLoader;
//! use shard_planner::{AutoShardingConfig, AutoShardingPass};
//! use shard_solver::ExhaustiveSolver;
//! use std::path::Path;
//!
//! let (mut graph, aliases) =
//!     GraphLoader::load_with_aliases(Path::new("model.json")).unwrap();
//! let mesh = DeviceMesh::new((0..4).collect(), vec![4]).unwrap();
//! let solver = ExhaustiveSolver::new();
//! let pass = AutoShardingPass::new(AutoShardingConfig::default(), &solver);
//! let outcome = pass.run(&mut graph, &mesh, &aliases, None).unwrap();
//! println!("{outcome:?}");
//! ```

pub mod config;
pub mod cost_graph;
pub mod enumerate;
mod error;
pub mod pass;
pub(crate) mod reshard;
pub mod rewrite;
pub(crate) mod rules;
pub mod setter;
pub mod solver_request;
pub mod strategy;

pub use config::{AutoShardingConfig, DivisibilityPolicy};
pub use cost_graph::CostGraph;
pub use enumerate::enumerate_strategies;
pub use error::PlannerError;
pub use pass::{AutoShardingPass, PassOutcome, UnchangedReason};
pub use rewrite::rewrite_reduce_scatter;
pub use setter::{repair_reshards, set_shardings};
pub use solver_request::build_request;
pub use strategy::{
    GroupArena, GroupId, LeafGroup, ShardingStrategy, StashedStrategies, StrategyGroup,
};
