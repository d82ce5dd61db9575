// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operation graph: the dataflow program as a DAG of nodes.
//!
//! # Type-State Pattern
//!
//! The graph transitions through states enforced at compile time:
//!
//! ```text
//! OpGraph<Loaded>     — nodes parsed, not yet checked.
//!       │  .validate()
//!       ▼
//! OpGraph<Validated>  — def-before-use order and shapes verified,
//!                       ready for strategy enumeration.
//! ```
//!
//! This prevents the planner from ever receiving a malformed graph. The
//! transition consumes the old state and returns the new one; the marker
//! types are `PhantomData` (ZST).
//!
//! A validated graph is read-only except for the append-only annotation
//! API ([`OpGraph::set_sharding`], [`OpGraph::insert_reshard`],
//! [`OpGraph::insert_all_gather`]). Inserted nodes are appended, so the
//! positional indices the planner recorded during enumeration stay valid.

use crate::{GraphError, NodeDef, OpKind, ShardingAnnotation};
use mesh_core::Sharding;
use std::fmt;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph has been loaded but not validated.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: graph has been validated and is ready for planning.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Loaded {}
impl GraphState for Validated {}

// ── OpGraph ────────────────────────────────────────────────────────

/// The dataflow program as an ordered list of nodes.
///
/// Node indices are positional: node `i` lives at `nodes[i]`, and every
/// operand index of node `i` is `< i` (def-before-use). The generic
/// parameter `S` encodes the validation state at compile time.
#[derive(Debug, Clone)]
pub struct OpGraph<S: GraphState = Loaded> {
    /// Human-readable graph name (e.g., `"mlp-2layer"`).
    pub name: String,
    /// Nodes in topological (def-before-use) order.
    nodes: Vec<NodeDef>,
    /// Per-node user lists, filled during validation.
    users: Vec<Vec<usize>>,
    /// State marker (zero-sized, compile-time only).
    _state: std::marker::PhantomData<S>,
}

// ── Loaded state ───────────────────────────────────────────────────

impl OpGraph<Loaded> {
    /// Creates a new graph in the `Loaded` state.
    pub fn new(name: String, nodes: Vec<NodeDef>) -> Self {
        Self {
            name,
            nodes,
            users: Vec::new(),
            _state: std::marker::PhantomData,
        }
    }

    /// Validates the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - The graph is non-empty.
    /// - Every operand index precedes its user (def-before-use order).
    /// - No array output has zero elements.
    /// - `GetTupleElement` operands produce tuples and the index is in
    ///   bounds.
    /// - Pre-existing sharding annotations match the output structure.
    ///
    /// Also fills in per-node depth (longest path from a parameter) and
    /// the user lists.
    pub fn validate(mut self) -> Result<OpGraph<Validated>, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::EmptyGraph);
        }

        let mut users: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for i in 0..self.nodes.len() {
            let node = &self.nodes[i];

            for &op in &node.operands {
                if op >= i {
                    return Err(GraphError::OperandOutOfOrder {
                        node: node.name.clone(),
                        index: i,
                        operand: op,
                    });
                }
                users[op].push(i);
            }

            if node.output.has_zero_elements() {
                return Err(GraphError::InvalidNode {
                    node: node.name.clone(),
                    detail: "output shape has zero elements".into(),
                });
            }

            if let OpKind::GetTupleElement { index } = &node.kind {
                let operand = node.operands.first().copied().ok_or_else(|| {
                    GraphError::InvalidNode {
                        node: node.name.clone(),
                        detail: "get_tuple_element has no operand".into(),
                    }
                })?;
                let elements = self.nodes[operand].output.as_tuple().ok_or_else(|| {
                    GraphError::InvalidNode {
                        node: node.name.clone(),
                        detail: format!(
                            "operand '{}' does not produce a tuple",
                            self.nodes[operand].name
                        ),
                    }
                })?;
                if *index >= elements.len() {
                    return Err(GraphError::InvalidNode {
                        node: node.name.clone(),
                        detail: format!(
                            "tuple index {index} out of bounds for {} elements",
                            elements.len()
                        ),
                    });
                }
            }

            if let Some(ann) = &node.sharding {
                if !ann.covers(&node.output) {
                    return Err(GraphError::InvalidNode {
                        node: node.name.clone(),
                        detail: "sharding annotation does not match output structure".into(),
                    });
                }
            }

            // Depth: longest path from a parameter/constant.
            let depth = node
                .operands
                .iter()
                .map(|&op| self.nodes[op].depth + 1)
                .max()
                .unwrap_or(0);
            self.nodes[i].depth = depth;
        }

        Ok(OpGraph {
            name: self.name,
            nodes: self.nodes,
            users,
            _state: std::marker::PhantomData,
        })
    }
}

// ── Validated state ────────────────────────────────────────────────

impl OpGraph<Validated> {
    /// Returns the total number of nodes, including appended ones.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns a reference to a node by index.
    pub fn node(&self, index: usize) -> Option<&NodeDef> {
        self.nodes.get(index)
    }

    /// Returns an iterator over nodes in topological order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &NodeDef> {
        self.nodes.iter()
    }

    /// Returns the indices of nodes that consume node `index`.
    pub fn users(&self, index: usize) -> &[usize] {
        &self.users[index]
    }

    /// Total byte footprint of all node outputs (unsharded).
    pub fn total_output_bytes(&self) -> usize {
        self.nodes.iter().map(|n| n.output.total_bytes()).sum()
    }

    /// Writes a sharding annotation onto a node.
    pub fn set_sharding(&mut self, index: usize, annotation: ShardingAnnotation) {
        self.nodes[index].sharding = Some(annotation);
    }

    /// Returns `true` if every node carries a sharding annotation.
    pub fn fully_annotated(&self) -> bool {
        self.nodes.iter().all(|n| n.sharding.is_some())
    }

    /// Inserts an explicit resharding copy between `operand` and `user`.
    ///
    /// The new node is appended at the end of the node list (existing
    /// indices stay stable), takes `operand` as its only operand, carries
    /// `sharding`, and replaces every use of `operand` inside `user`'s
    /// operand list. Returns the new node's index.
    pub fn insert_reshard(&mut self, user: usize, operand: usize, sharding: Sharding) -> usize {
        self.insert_between(user, operand, OpKind::Reshard, sharding)
    }

    /// Inserts an all-gather node between `operand` and `user`, restoring
    /// a replicated layout along the given mesh axes.
    pub fn insert_all_gather(
        &mut self,
        user: usize,
        operand: usize,
        mesh_axes: Vec<usize>,
        sharding: Sharding,
    ) -> usize {
        self.insert_between(user, operand, OpKind::AllGather { mesh_axes }, sharding)
    }

    fn insert_between(
        &mut self,
        user: usize,
        operand: usize,
        kind: OpKind,
        sharding: Sharding,
    ) -> usize {
        let new_index = self.nodes.len();
        let source = &self.nodes[operand];
        // Tuples never get reshard copies; repair happens per element.
        debug_assert!(source.output.as_array().is_some());
        let node = NodeDef {
            name: format!("{}.{}", kind.as_str(), new_index),
            kind,
            output: source.output.clone(),
            operands: vec![operand],
            sharding: Some(ShardingAnnotation::Leaf(sharding)),
            depth: source.depth + 1,
        };
        self.nodes.push(node);
        self.users.push(vec![user]);

        for op in &mut self.nodes[user].operands {
            if *op == operand {
                *op = new_index;
            }
        }
        self.users[operand].retain(|&u| u != user);
        self.users[operand].push(new_index);

        tracing::debug!(
            "inserted {} node {} between '{}' and '{}'",
            self.nodes[new_index].kind,
            new_index,
            self.nodes[operand].name,
            self.nodes[user].name,
        );
        new_index
    }

    /// Returns a summary string describing the graph.
    pub fn summary(&self) -> String {
        let total_mb = self.total_output_bytes() as f64 / (1024.0 * 1024.0);
        let annotated = self.nodes.iter().filter(|n| n.sharding.is_some()).count();
        format!(
            "Graph '{}': {} nodes, {:.2} MB of outputs, {annotated} annotated",
            self.name,
            self.num_nodes(),
            total_mb,
        )
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: GraphState> OpGraph<S> {
    /// Returns the nodes as a slice, regardless of state.
    pub fn nodes(&self) -> &[NodeDef] {
        &self.nodes
    }
}

impl<S: GraphState> fmt::Display for OpGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OpGraph '{}' ({} nodes):", self.name, self.nodes.len())?;
        for (i, node) in self.nodes.iter().enumerate() {
            writeln!(f, "  [{i}] {}", node.summary())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_core::{DType, Shape};

    fn add_chain(n: usize) -> Vec<NodeDef> {
        let mut nodes = vec![
            NodeDef::new("p0", OpKind::Parameter, Shape::vector(16), DType::F32, vec![]),
            NodeDef::new("p1", OpKind::Parameter, Shape::vector(16), DType::F32, vec![]),
        ];
        for i in 0..n {
            let lhs = nodes.len() - 2;
            let rhs = nodes.len() - 1;
            nodes.push(NodeDef::new(
                format!("add.{i}"),
                OpKind::Elementwise,
                Shape::vector(16),
                DType::F32,
                vec![lhs, rhs],
            ));
        }
        nodes
    }

    #[test]
    fn test_validate_ok() {
        let graph = OpGraph::new("chain".into(), add_chain(3)).validate().unwrap();
        assert_eq!(graph.num_nodes(), 5);
        // p1 is used by add.0 and add.1.
        assert_eq!(graph.users(1), &[2, 3]);
    }

    #[test]
    fn test_validate_empty() {
        let graph = OpGraph::new("empty".into(), vec![]);
        assert!(matches!(graph.validate(), Err(GraphError::EmptyGraph)));
    }

    #[test]
    fn test_validate_out_of_order() {
        let mut nodes = add_chain(1);
        nodes[2].operands = vec![0, 2]; // self-reference
        let graph = OpGraph::new("bad".into(), nodes);
        assert!(matches!(
            graph.validate(),
            Err(GraphError::OperandOutOfOrder { .. })
        ));
    }

    #[test]
    fn test_validate_zero_shape() {
        let mut nodes = add_chain(1);
        nodes[0].output = crate::NodeOutput::array(Shape::new(vec![0, 4]), DType::F32);
        let graph = OpGraph::new("zero".into(), nodes);
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_validate_gte_bounds() {
        let nodes = vec![
            NodeDef::new("p0", OpKind::Parameter, Shape::vector(4), DType::F32, vec![]),
            NodeDef {
                name: "t".into(),
                kind: OpKind::Tuple,
                output: crate::NodeOutput::Tuple {
                    elements: vec![crate::NodeOutput::array(Shape::vector(4), DType::F32)],
                },
                operands: vec![0],
                sharding: None,
                depth: 0,
            },
            NodeDef::new(
                "gte",
                OpKind::GetTupleElement { index: 3 },
                Shape::vector(4),
                DType::F32,
                vec![1],
            ),
        ];
        let graph = OpGraph::new("gte".into(), nodes);
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_depth_computed() {
        let graph = OpGraph::new("chain".into(), add_chain(2)).validate().unwrap();
        assert_eq!(graph.node(0).unwrap().depth, 0);
        assert_eq!(graph.node(2).unwrap().depth, 1);
        assert_eq!(graph.node(3).unwrap().depth, 2);
    }

    #[test]
    fn test_insert_reshard_rewires() {
        let mut graph = OpGraph::new("chain".into(), add_chain(1)).validate().unwrap();
        let new_idx = graph.insert_reshard(2, 0, Sharding::Replicated);
        assert_eq!(new_idx, 3);
        assert_eq!(graph.node(2).unwrap().operands, vec![3, 1]);
        assert_eq!(graph.node(3).unwrap().operands, vec![0]);
        assert_eq!(graph.users(0), &[3]);
        assert_eq!(graph.users(3), &[2]);
    }

    #[test]
    fn test_set_sharding() {
        let mut graph = OpGraph::new("chain".into(), add_chain(1)).validate().unwrap();
        graph.set_sharding(2, ShardingAnnotation::Leaf(Sharding::Replicated));
        assert!(graph.node(2).unwrap().sharding.is_some());
        assert!(!graph.fully_annotated());
    }

    #[test]
    fn test_summary_and_display() {
        let graph = OpGraph::new("chain".into(), add_chain(1)).validate().unwrap();
        assert!(graph.summary().contains("chain"));
        assert!(format!("{graph}").contains("add.0"));
    }
}
