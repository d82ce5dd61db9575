// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The solver request/response contract.
//!
//! A [`SolverRequest`] is the complete, self-contained description of one
//! strategy-selection problem: one decision variable per node (its
//! candidate index), per-node candidate costs, pairwise edge cost
//! matrices, alias equality pairs, liveness groups, and a per-device
//! memory budget. Followed nodes are folded out *before* the request is
//! built — the solver never sees them.
//!
//! The request is the contract between the planner and the external
//! integer-program solver; [`ShardingSolver`] is its only entry point.

use crate::SolverError;
use std::time::Duration;

/// Candidate costs for one decision node.
///
/// All three vectors have one entry per candidate strategy.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeCosts {
    /// Computation cost per candidate.
    pub compute: Vec<f64>,
    /// Communication cost per candidate (collectives implied by the
    /// candidate itself, not resharding).
    pub communication: Vec<f64>,
    /// Per-device memory in bytes per candidate.
    pub memory: Vec<f64>,
}

impl NodeCosts {
    /// Returns the number of candidates.
    pub fn num_candidates(&self) -> usize {
        self.compute.len()
    }

    /// Combined objective contribution of one candidate.
    pub fn total(&self, candidate: usize) -> f64 {
        self.compute[candidate] + self.communication[candidate]
    }
}

/// The resharding cost matrix for one dependency edge.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EdgeCosts {
    /// Decision-node index of the producer.
    pub src: usize,
    /// Decision-node index of the consumer.
    pub dst: usize,
    /// `costs[i][j]` = cost when the producer picks `i` and the consumer
    /// picks `j`.
    pub costs: Vec<Vec<f64>>,
}

/// A complete strategy-selection problem.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SolverRequest {
    /// Per-node candidate costs; the vector length is the node count.
    pub nodes: Vec<NodeCosts>,
    /// Pairwise resharding costs along dependency edges.
    pub edges: Vec<EdgeCosts>,
    /// Pairs of nodes whose chosen index must be equal.
    pub aliases: Vec<(usize, usize)>,
    /// Groups of nodes that are live simultaneously; the memory budget is
    /// enforced per group. Produced by [`crate::reduce_intervals`].
    pub liveness_groups: Vec<Vec<usize>>,
    /// Per-device memory budget in bytes, if any.
    pub memory_budget: Option<usize>,
    /// Ask the solver for a reproducible search order.
    pub deterministic: bool,
    /// Optional previous solution used as a warm start.
    pub warm_start: Option<Vec<usize>>,
    /// Wall-clock budget for the solve.
    pub timeout: Duration,
}

impl SolverRequest {
    /// Checks structural consistency of the request.
    pub fn validate(&self) -> Result<(), SolverError> {
        for (i, node) in self.nodes.iter().enumerate() {
            let n = node.num_candidates();
            if n == 0 {
                return Err(SolverError::MalformedRequest(format!(
                    "node {i} has zero candidates"
                )));
            }
            if node.communication.len() != n || node.memory.len() != n {
                return Err(SolverError::MalformedRequest(format!(
                    "node {i} has inconsistent cost vector lengths"
                )));
            }
        }
        for edge in &self.edges {
            let (Some(src), Some(dst)) = (self.nodes.get(edge.src), self.nodes.get(edge.dst))
            else {
                return Err(SolverError::MalformedRequest(format!(
                    "edge ({}, {}) out of range",
                    edge.src, edge.dst
                )));
            };
            if edge.costs.len() != src.num_candidates()
                || edge.costs.iter().any(|row| row.len() != dst.num_candidates())
            {
                return Err(SolverError::MalformedRequest(format!(
                    "edge ({}, {}) cost matrix does not match candidate counts",
                    edge.src, edge.dst
                )));
            }
        }
        for &(a, b) in &self.aliases {
            if a >= self.nodes.len() || b >= self.nodes.len() {
                return Err(SolverError::MalformedRequest(format!(
                    "alias pair ({a}, {b}) out of range"
                )));
            }
            if self.nodes[a].num_candidates() != self.nodes[b].num_candidates() {
                return Err(SolverError::MalformedRequest(format!(
                    "alias pair ({a}, {b}) has mismatched candidate counts"
                )));
            }
        }
        for group in &self.liveness_groups {
            if group.iter().any(|&n| n >= self.nodes.len()) {
                return Err(SolverError::MalformedRequest(
                    "liveness group references missing node".into(),
                ));
            }
        }
        if let Some(ws) = &self.warm_start {
            if ws.len() != self.nodes.len() {
                return Err(SolverError::MalformedRequest(
                    "warm start length does not match node count".into(),
                ));
            }
        }
        Ok(())
    }

    /// Objective value of a full assignment (node + edge terms).
    pub fn objective(&self, chosen: &[usize]) -> f64 {
        let node_cost: f64 = self
            .nodes
            .iter()
            .zip(chosen)
            .map(|(n, &c)| n.total(c))
            .sum();
        let edge_cost: f64 = self
            .edges
            .iter()
            .map(|e| e.costs[chosen[e.src]][chosen[e.dst]])
            .sum();
        node_cost + edge_cost
    }

    /// Peak per-group memory of a full assignment, or 0 when no groups.
    pub fn peak_memory(&self, chosen: &[usize]) -> f64 {
        self.liveness_groups
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|&n| self.nodes[n].memory[chosen[n]])
                    .sum::<f64>()
            })
            .fold(0.0, f64::max)
    }
}

/// The solver's answer to one request.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SolverResponse {
    /// A complete assignment and its objective value.
    Solution { chosen: Vec<usize>, objective: f64 },
    /// The solver exhausted its wall-clock budget.
    Timeout,
    /// No assignment satisfies the constraints.
    Infeasible,
}

/// The planner's only view of the integer-program solver: one synchronous
/// request/response exchange.
///
/// Implementations are purely algorithmic — no graph access, no mutable
/// shared state — making them trivially unit-testable.
pub trait ShardingSolver: Send + Sync {
    /// Human-readable name of this solver.
    fn name(&self) -> &str;

    /// Solves one request. Timeouts and infeasibility are response
    /// statuses, not errors.
    fn solve(&self, request: &SolverRequest) -> Result<SolverResponse, SolverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn tiny_request() -> SolverRequest {
        SolverRequest {
            nodes: vec![
                NodeCosts {
                    compute: vec![1.0, 2.0],
                    communication: vec![0.0, 0.0],
                    memory: vec![100.0, 50.0],
                },
                NodeCosts {
                    compute: vec![0.0, 0.0],
                    communication: vec![3.0, 1.0],
                    memory: vec![100.0, 50.0],
                },
            ],
            edges: vec![EdgeCosts {
                src: 0,
                dst: 1,
                costs: vec![vec![0.0, 5.0], vec![5.0, 0.0]],
            }],
            aliases: vec![],
            liveness_groups: vec![vec![0, 1]],
            memory_budget: Some(200),
            deterministic: true,
            warm_start: None,
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_validate_ok() {
        tiny_request().validate().unwrap();
    }

    #[test]
    fn test_validate_bad_edge_matrix() {
        let mut req = tiny_request();
        req.edges[0].costs = vec![vec![0.0]];
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_alias_count_mismatch() {
        let mut req = tiny_request();
        req.nodes[1].compute.push(1.0);
        req.nodes[1].communication.push(1.0);
        req.nodes[1].memory.push(1.0);
        req.aliases.push((0, 1));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_objective() {
        let req = tiny_request();
        // node0 picks 0 (1.0), node1 picks 0 (3.0), edge (0,0) = 0.0.
        assert_eq!(req.objective(&[0, 0]), 4.0);
        // node0 picks 0 (1.0), node1 picks 1 (1.0), edge (0,1) = 5.0.
        assert_eq!(req.objective(&[0, 1]), 7.0);
    }

    #[test]
    fn test_peak_memory() {
        let req = tiny_request();
        assert_eq!(req.peak_memory(&[0, 0]), 200.0);
        assert_eq!(req.peak_memory(&[1, 1]), 100.0);
    }
}
