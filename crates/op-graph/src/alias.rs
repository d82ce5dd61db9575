// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Alias sets: node pairs whose final sharding must match exactly.
//!
//! Aliases arise from buffer donation (a parameter's buffer is reused for
//! an output) and user-specified aliasing. The planner treats them as a
//! read-only solver input: either as hard equality constraints, or, when
//! cost-matrix analysis allows, as follow relations.

use crate::{GraphError, OpGraph};

/// Pairs of node indices whose final sharding must be identical.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AliasSet {
    pairs: Vec<(usize, usize)>,
}

impl AliasSet {
    /// Creates an empty alias set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an alias set from explicit pairs.
    pub fn from_pairs(pairs: Vec<(usize, usize)>) -> Self {
        Self { pairs }
    }

    /// Adds one alias pair.
    pub fn add(&mut self, a: usize, b: usize) {
        self.pairs.push((a, b));
    }

    /// Returns the pairs.
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// Returns `true` if there are no aliases.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Checks every pair against the graph's node count.
    pub fn validate(&self, graph: &OpGraph<crate::graph::Validated>) -> Result<(), GraphError> {
        let n = graph.num_nodes();
        for &(a, b) in &self.pairs {
            if a >= n || b >= n {
                return Err(GraphError::AliasOutOfRange { a, b, nodes: n });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeDef, OpKind};
    use mesh_core::{DType, Shape};

    fn two_node_graph() -> OpGraph<crate::graph::Validated> {
        OpGraph::new(
            "g".into(),
            vec![
                NodeDef::new("p", OpKind::Parameter, Shape::vector(4), DType::F32, vec![]),
                NodeDef::new("o", OpKind::Elementwise, Shape::vector(4), DType::F32, vec![0]),
            ],
        )
        .validate()
        .unwrap()
    }

    #[test]
    fn test_validate_ok() {
        let graph = two_node_graph();
        let aliases = AliasSet::from_pairs(vec![(0, 1)]);
        aliases.validate(&graph).unwrap();
    }

    #[test]
    fn test_validate_out_of_range() {
        let graph = two_node_graph();
        let aliases = AliasSet::from_pairs(vec![(0, 7)]);
        assert!(matches!(
            aliases.validate(&graph),
            Err(GraphError::AliasOutOfRange { .. })
        ));
    }

    #[test]
    fn test_add() {
        let mut aliases = AliasSet::new();
        assert!(aliases.is_empty());
        aliases.add(0, 1);
        assert_eq!(aliases.pairs(), &[(0, 1)]);
    }
}
