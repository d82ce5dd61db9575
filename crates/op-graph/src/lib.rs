// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # op-graph
//!
//! A lightweight intermediate representation (IR) for tensor operation
//! graphs, as consumed by the auto-sharding planner.
//!
//! Rather than depending on a full compiler framework, this crate defines
//! the minimal IR the planner needs:
//!
//! - [`OpKind`] — the category of computation each node performs.
//! - [`NodeDef`] — a single node's metadata, shape, and operand indices.
//! - [`OpGraph`] — the full dataflow graph, with a **type-state pattern**
//!   (`Loaded` → `Validated`).
//! - [`AliasSet`] — node pairs whose final sharding must match (buffer
//!   donation / user aliasing).
//! - [`LivenessSchedule`] — per-node buffer liveness intervals, consumed
//!   as a precomputed oracle.
//! - [`GraphLoader`] — loads graphs from a JSON file.
//!
//! The planner reads the graph as-is; the only mutation it ever performs
//! is through the append-only annotation API on a validated graph
//! ([`OpGraph::set_sharding`], [`OpGraph::insert_reshard`],
//! [`OpGraph::insert_all_gather`]), which keeps existing node indices
//! stable.
//!
//! # Example
//! ```no_run
//! use op_graph::GraphLoader;
//! use std::path::Path;
//!
//! let graph = GraphLoader::load(Path::new("./graphs/mlp.json")).unwrap();
//! println!("{}", graph.summary());
//! ```

mod alias;
mod error;
pub mod graph;
mod liveness;
mod loader;
mod node;

pub use alias::AliasSet;
pub use error::GraphError;
pub use graph::OpGraph;
pub use liveness::LivenessSchedule;
pub use loader::{GraphFile, GraphLoader};
pub use node::{NodeDef, NodeOutput, OpKind, ShardingAnnotation};
