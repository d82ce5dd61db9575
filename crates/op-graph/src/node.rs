// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Node definitions for the operation-graph IR.
//!
//! Each [`NodeDef`] describes a single tensor operation: its category,
//! output shape(s), operand indices, and any pre-existing sharding
//! annotation. Tensor data is never stored here — the planner works on
//! geometry and costs only.

use mesh_core::{DType, Shape, Sharding};

/// The category of computation a node performs.
///
/// This is a closed set: strategy enumeration dispatches on it, and every
/// variant has a dedicated enumeration rule. Nodes the planner inserts
/// itself ([`OpKind::Reshard`], [`OpKind::AllGather`]) are part of the
/// same enum so the annotated graph stays self-describing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OpKind {
    /// Graph input.
    Parameter,
    /// Compile-time constant.
    Constant,
    /// Elementwise op (add, mul, tanh, compare, select, ...). Operands
    /// and output share a sharding.
    Elementwise,
    /// Broadcast of an operand into a larger shape.
    Broadcast,
    /// Reduction over the given tensor dimensions.
    Reduce { dims: Vec<usize> },
    /// Shape change, element order preserved.
    Reshape,
    /// Matrix/tensor contraction. `lhs_contracting`/`rhs_contracting`
    /// name the contracted dimension on each side.
    Dot {
        lhs_contracting: usize,
        rhs_contracting: usize,
    },
    /// Convolution; treated like a contraction over the feature dimension.
    Convolution,
    /// Gather; `collapsed_dims` are operand dimensions addressed by the
    /// indices (and therefore unsafe to tile).
    Gather { collapsed_dims: Vec<usize> },
    /// Scatter; same dimension constraint as gather.
    Scatter { collapsed_dims: Vec<usize> },
    /// Sort along one dimension; that dimension cannot be tiled.
    Sort { dim: usize },
    /// Opaque call; the planner only replicates these.
    CustomCall { target: String },
    /// Host transfer; replicated only.
    Outfeed,
    /// Tuple construction; one strategy group per element.
    Tuple,
    /// Tuple element projection.
    GetTupleElement { index: usize },
    /// Conditional; output follows the branch results element-wise.
    Conditional,
    /// Explicit resharding copy inserted by post-processing.
    Reshard,
    /// All-gather inserted by the reduce-scatter rewriter.
    AllGather { mesh_axes: Vec<usize> },
}

impl OpKind {
    /// Returns a short label for display and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Parameter => "parameter",
            OpKind::Constant => "constant",
            OpKind::Elementwise => "elementwise",
            OpKind::Broadcast => "broadcast",
            OpKind::Reduce { .. } => "reduce",
            OpKind::Reshape => "reshape",
            OpKind::Dot { .. } => "dot",
            OpKind::Convolution => "convolution",
            OpKind::Gather { .. } => "gather",
            OpKind::Scatter { .. } => "scatter",
            OpKind::Sort { .. } => "sort",
            OpKind::CustomCall { .. } => "custom_call",
            OpKind::Outfeed => "outfeed",
            OpKind::Tuple => "tuple",
            OpKind::GetTupleElement { .. } => "get_tuple_element",
            OpKind::Conditional => "conditional",
            OpKind::Reshard => "reshard",
            OpKind::AllGather { .. } => "all_gather",
        }
    }

    /// Returns `true` for ops whose output is a tuple of arrays.
    pub fn produces_tuple(&self) -> bool {
        matches!(self, OpKind::Tuple | OpKind::Conditional)
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The output value shape of a node: a single array or a tuple tree.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum NodeOutput {
    /// A single array-shaped value.
    Array { shape: Shape, dtype: DType },
    /// A tuple of values; elements may themselves be tuples.
    Tuple { elements: Vec<NodeOutput> },
}

impl NodeOutput {
    /// Creates an array output.
    pub fn array(shape: Shape, dtype: DType) -> Self {
        NodeOutput::Array { shape, dtype }
    }

    /// Returns the array shape and dtype, or `None` for tuples.
    pub fn as_array(&self) -> Option<(&Shape, DType)> {
        match self {
            NodeOutput::Array { shape, dtype } => Some((shape, *dtype)),
            NodeOutput::Tuple { .. } => None,
        }
    }

    /// Returns the tuple elements, or `None` for arrays.
    pub fn as_tuple(&self) -> Option<&[NodeOutput]> {
        match self {
            NodeOutput::Tuple { elements } => Some(elements),
            NodeOutput::Array { .. } => None,
        }
    }

    /// Total byte footprint of the value (sum over tuple leaves).
    pub fn total_bytes(&self) -> usize {
        match self {
            NodeOutput::Array { shape, dtype } => shape.size_bytes(*dtype),
            NodeOutput::Tuple { elements } => elements.iter().map(|e| e.total_bytes()).sum(),
        }
    }

    /// Returns `true` if any array leaf has zero elements.
    pub fn has_zero_elements(&self) -> bool {
        match self {
            NodeOutput::Array { shape, .. } => shape.num_elements() == 0,
            NodeOutput::Tuple { elements } => elements.iter().any(|e| e.has_zero_elements()),
        }
    }
}

/// A sharding annotation mirroring the node's output structure.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ShardingAnnotation {
    /// Sharding for an array-shaped value.
    Leaf(Sharding),
    /// Per-element shardings for a tuple value.
    Tuple(Vec<ShardingAnnotation>),
}

impl ShardingAnnotation {
    /// Returns the leaf sharding, or `None` for tuples.
    pub fn as_leaf(&self) -> Option<&Sharding> {
        match self {
            ShardingAnnotation::Leaf(s) => Some(s),
            ShardingAnnotation::Tuple(_) => None,
        }
    }

    /// Returns `true` if this annotation covers the given output
    /// structure completely (same tuple shape, a sharding at every leaf).
    pub fn covers(&self, output: &NodeOutput) -> bool {
        match (self, output) {
            (ShardingAnnotation::Leaf(_), NodeOutput::Array { .. }) => true,
            (ShardingAnnotation::Tuple(anns), NodeOutput::Tuple { elements }) => {
                anns.len() == elements.len()
                    && anns.iter().zip(elements).all(|(a, e)| a.covers(e))
            }
            _ => false,
        }
    }
}

/// Metadata describing a single node in the operation graph.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeDef {
    /// Unique identifier (e.g., `"dot.12"`).
    pub name: String,
    /// The category of computation.
    #[serde(flatten)]
    pub kind: OpKind,
    /// Output shape(s).
    pub output: NodeOutput,
    /// Indices of operand nodes, in operand order.
    pub operands: Vec<usize>,
    /// Pre-existing (possibly user-specified) sharding, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharding: Option<ShardingAnnotation>,
    /// Longest path from a parameter, filled during validation.
    #[serde(default)]
    pub depth: usize,
}

impl NodeDef {
    /// Creates an array-output node.
    pub fn new(
        name: impl Into<String>,
        kind: OpKind,
        shape: Shape,
        dtype: DType,
        operands: Vec<usize>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            output: NodeOutput::array(shape, dtype),
            operands,
            sharding: None,
            depth: 0,
        }
    }

    /// Returns a concise summary string for display.
    pub fn summary(&self) -> String {
        let bytes_kb = self.output.total_bytes() as f64 / 1024.0;
        format!(
            "{} ({}): {:.1} KB output, {} operand(s)",
            self.name,
            self.kind,
            bytes_kb,
            self.operands.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array_node() -> NodeDef {
        NodeDef::new(
            "add.0",
            OpKind::Elementwise,
            Shape::matrix(8, 8),
            DType::F32,
            vec![0, 1],
        )
    }

    #[test]
    fn test_node_output_bytes() {
        let n = array_node();
        assert_eq!(n.output.total_bytes(), 8 * 8 * 4);
    }

    #[test]
    fn test_tuple_output_bytes() {
        let out = NodeOutput::Tuple {
            elements: vec![
                NodeOutput::array(Shape::vector(16), DType::F32),
                NodeOutput::array(Shape::vector(4), DType::I32),
            ],
        };
        assert_eq!(out.total_bytes(), 64 + 16);
        assert!(out.as_array().is_none());
        assert_eq!(out.as_tuple().unwrap().len(), 2);
    }

    #[test]
    fn test_annotation_covers() {
        let out = NodeOutput::Tuple {
            elements: vec![
                NodeOutput::array(Shape::vector(16), DType::F32),
                NodeOutput::array(Shape::vector(4), DType::I32),
            ],
        };
        let full = ShardingAnnotation::Tuple(vec![
            ShardingAnnotation::Leaf(Sharding::Replicated),
            ShardingAnnotation::Leaf(Sharding::Replicated),
        ]);
        let partial = ShardingAnnotation::Tuple(vec![ShardingAnnotation::Leaf(
            Sharding::Replicated,
        )]);
        assert!(full.covers(&out));
        assert!(!partial.covers(&out));
        assert!(!ShardingAnnotation::Leaf(Sharding::Replicated).covers(&out));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(OpKind::Elementwise.as_str(), "elementwise");
        assert_eq!(OpKind::Reduce { dims: vec![0] }.as_str(), "reduce");
        assert!(OpKind::Tuple.produces_tuple());
        assert!(!OpKind::Reshape.produces_tuple());
    }

    #[test]
    fn test_serde_roundtrip() {
        let n = array_node();
        let json = serde_json::to_string(&n).unwrap();
        let back: NodeDef = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, n.name);
        assert_eq!(back.kind, n.kind);
        assert_eq!(back.operands, n.operands);
    }
}
