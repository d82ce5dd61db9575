// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # shard-solver
//!
//! The request/response boundary between the auto-sharding planner and
//! the integer-program solver, plus the memory-budget type and the
//! interval-reduction utility that bounds memory-term counts.
//!
//! The production solver lives outside this workspace and is reached only
//! through the [`ShardingSolver`] trait: one synchronous `solve` call per
//! request, no streaming, no partial results. [`ExhaustiveSolver`] is the
//! in-tree reference implementation — a deterministic depth-first search
//! with cost and budget pruning — suitable for tests and small graphs.
//! It refuses requests whose search space exceeds its cap rather than
//! running forever.

mod budget;
mod error;
mod exhaustive;
mod intervals;
mod request;

pub use budget::MemoryBudget;
pub use error::SolverError;
pub use exhaustive::ExhaustiveSolver;
pub use intervals::reduce_intervals;
pub use request::{EdgeCosts, NodeCosts, ShardingSolver, SolverRequest, SolverResponse};
