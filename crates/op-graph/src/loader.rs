// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph loading from JSON files.
//!
//! A graph file is a single JSON document describing the node list in
//! topological order, plus optional alias pairs:
//!
//! ```json
//! {
//!   "name": "mlp-2layer",
//!   "nodes": [
//!     { "name": "x",   "op": "parameter", "output": { "shape": [64, 128], "dtype": "f32" }, "operands": [] },
//!     { "name": "w",   "op": "parameter", "output": { "shape": [128, 256], "dtype": "f32" }, "operands": [] },
//!     { "name": "dot", "op": "dot", "lhs_contracting": 1, "rhs_contracting": 0,
//!       "output": { "shape": [64, 256], "dtype": "f32" }, "operands": [0, 1] }
//!   ],
//!   "aliases": [[0, 2]]
//! }
//! ```
//!
//! Tensor data never appears in graph files — the planner only needs
//! geometry.

use crate::{graph, AliasSet, GraphError, NodeDef, OpGraph};
use std::path::Path;

/// On-disk representation of an operation graph.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphFile {
    /// Human-readable graph name.
    pub name: String,
    /// Nodes in topological order.
    pub nodes: Vec<NodeDef>,
    /// Optional alias pairs.
    #[serde(default)]
    pub aliases: Vec<(usize, usize)>,
}

/// Loads an operation graph from a JSON file into a validated
/// [`OpGraph`].
pub struct GraphLoader;

impl GraphLoader {
    /// Loads and validates a graph from the given file.
    pub fn load(path: &Path) -> Result<OpGraph<graph::Validated>, GraphError> {
        let content = std::fs::read_to_string(path)?;
        let (graph, _aliases) = Self::from_json(&content)?;
        Ok(graph)
    }

    /// Loads a graph together with its alias set.
    pub fn load_with_aliases(
        path: &Path,
    ) -> Result<(OpGraph<graph::Validated>, AliasSet), GraphError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses and validates a graph from a JSON string.
    pub fn from_json(json: &str) -> Result<(OpGraph<graph::Validated>, AliasSet), GraphError> {
        let file: GraphFile = serde_json::from_str(json)?;
        tracing::debug!("parsed graph '{}' with {} nodes", file.name, file.nodes.len());
        let graph = OpGraph::new(file.name, file.nodes).validate()?;
        let aliases = AliasSet::from_pairs(file.aliases);
        aliases.validate(&graph)?;
        Ok((graph, aliases))
    }
}
