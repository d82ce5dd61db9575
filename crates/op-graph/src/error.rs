// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the operation-graph IR.

/// Errors that can occur while loading or validating an operation graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The graph contains no nodes.
    #[error("operation graph contains no nodes")]
    EmptyGraph,

    /// A node failed a structural check.
    #[error("invalid node '{node}': {detail}")]
    InvalidNode { node: String, detail: String },

    /// An operand index refers to a node at or after its user, breaking
    /// def-before-use order.
    #[error("node '{node}' (index {index}) uses operand {operand} out of order")]
    OperandOutOfOrder {
        node: String,
        index: usize,
        operand: usize,
    },

    /// An alias pair refers to a nonexistent node.
    #[error("alias pair ({a}, {b}) out of range for graph of {nodes} nodes")]
    AliasOutOfRange { a: usize, b: usize, nodes: usize },

    /// Failed to read a graph file from disk.
    #[error("cannot read graph file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a graph file.
    #[error("graph parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
