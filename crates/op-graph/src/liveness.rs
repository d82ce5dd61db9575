// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Buffer liveness as a precomputed time-ordering oracle.
//!
//! The planner does not run its own scheduling analysis. A
//! [`LivenessSchedule`] is supplied by the caller — typically from a real
//! liveness pass — and summarised into per-node `(start, end)` intervals
//! for the solver's memory-budget terms. For callers without a scheduler,
//! [`LivenessSchedule::from_def_use`] derives the trivial schedule where a
//! buffer is live from its defining node to its last use.

use crate::graph::Validated;
use crate::OpGraph;

/// Per-node buffer liveness intervals, indexed by node.
///
/// `intervals[i] == (start, end)` means node `i`'s output buffer is live
/// over the half-open time range `[start, end]` in the fixed execution
/// order. Intervals are inclusive of the defining step.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LivenessSchedule {
    intervals: Vec<(usize, usize)>,
}

impl LivenessSchedule {
    /// Wraps externally computed intervals.
    pub fn from_intervals(intervals: Vec<(usize, usize)>) -> Self {
        Self { intervals }
    }

    /// Derives the def-to-last-use schedule from the graph's own node
    /// order: node `i`'s buffer is live from step `i` until the largest
    /// user index (or `i` itself when unused).
    pub fn from_def_use(graph: &OpGraph<Validated>) -> Self {
        let intervals = (0..graph.num_nodes())
            .map(|i| {
                let last_use = graph.users(i).iter().copied().max().unwrap_or(i);
                (i, last_use)
            })
            .collect();
        Self { intervals }
    }

    /// Returns the interval for one node.
    pub fn interval(&self, node: usize) -> (usize, usize) {
        self.intervals[node]
    }

    /// Returns all intervals, indexed by node.
    pub fn intervals(&self) -> &[(usize, usize)] {
        &self.intervals
    }

    /// Returns the number of scheduled nodes.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Returns `true` if the schedule is empty.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeDef, OpKind};
    use mesh_core::{DType, Shape};

    #[test]
    fn test_from_def_use() {
        // p0 used by add.0 and add.1; add.0 used by add.1.
        let graph = OpGraph::new(
            "g".into(),
            vec![
                NodeDef::new("p0", OpKind::Parameter, Shape::vector(4), DType::F32, vec![]),
                NodeDef::new("p1", OpKind::Parameter, Shape::vector(4), DType::F32, vec![]),
                NodeDef::new("add.0", OpKind::Elementwise, Shape::vector(4), DType::F32, vec![0, 1]),
                NodeDef::new("add.1", OpKind::Elementwise, Shape::vector(4), DType::F32, vec![0, 2]),
            ],
        )
        .validate()
        .unwrap();

        let live = LivenessSchedule::from_def_use(&graph);
        assert_eq!(live.len(), 4);
        assert_eq!(live.interval(0), (0, 3));
        assert_eq!(live.interval(1), (1, 2));
        assert_eq!(live.interval(2), (2, 3));
        // Root output: live only at its own step.
        assert_eq!(live.interval(3), (3, 3));
    }
}
