// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reference solver: deterministic depth-first search with pruning.
//!
//! Explores candidate assignments node by node, keeping a running lower
//! bound on the objective and abandoning branches that cannot beat the
//! best complete assignment found so far. Alias equalities are enforced
//! as soon as both endpoints are assigned; the memory budget is checked
//! incrementally per liveness group.
//!
//! This is not a replacement for the production integer-program solver —
//! it exists so tests and small graphs can exercise the full planner
//! pipeline without an external dependency. Requests whose raw search
//! space exceeds [`ExhaustiveSolver::max_states`] are refused with
//! [`SolverError::TooLarge`].

use crate::{ShardingSolver, SolverError, SolverRequest, SolverResponse};
use std::time::Instant;

/// Deterministic depth-first reference solver.
#[derive(Debug, Clone)]
pub struct ExhaustiveSolver {
    /// Upper bound on the raw search-space size this solver accepts.
    max_states: u128,
}

impl ExhaustiveSolver {
    /// Default search-space cap.
    const DEFAULT_MAX_STATES: u128 = 10_000_000;

    /// Creates a solver with the default search-space cap.
    pub fn new() -> Self {
        Self {
            max_states: Self::DEFAULT_MAX_STATES,
        }
    }

    /// Creates a solver with an explicit search-space cap.
    pub fn with_max_states(max_states: u128) -> Self {
        Self { max_states }
    }

    /// Returns the configured cap.
    pub fn max_states(&self) -> u128 {
        self.max_states
    }
}

impl Default for ExhaustiveSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardingSolver for ExhaustiveSolver {
    fn name(&self) -> &str {
        "exhaustive"
    }

    fn solve(&self, request: &SolverRequest) -> Result<SolverResponse, SolverError> {
        request.validate()?;

        let states: u128 = request
            .nodes
            .iter()
            .map(|n| n.num_candidates() as u128)
            .product();
        if states > self.max_states {
            return Err(SolverError::TooLarge {
                states,
                cap: self.max_states,
            });
        }

        let mut search = Search {
            request,
            started: Instant::now(),
            best: request
                .warm_start
                .as_deref()
                .filter(|ws| feasible(request, ws))
                .map(|ws| (ws.to_vec(), request.objective(ws))),
            assignment: vec![0; request.nodes.len()],
            timed_out: false,
        };
        search.descend(0, 0.0);

        if search.timed_out && search.best.is_none() {
            return Ok(SolverResponse::Timeout);
        }
        match search.best {
            Some((chosen, objective)) => {
                tracing::debug!(
                    "exhaustive solver: objective {objective:.3} over {} node(s)",
                    request.nodes.len(),
                );
                Ok(SolverResponse::Solution { chosen, objective })
            }
            None => Ok(SolverResponse::Infeasible),
        }
    }
}

struct Search<'a> {
    request: &'a SolverRequest,
    started: Instant,
    best: Option<(Vec<usize>, f64)>,
    assignment: Vec<usize>,
    timed_out: bool,
}

impl Search<'_> {
    fn descend(&mut self, node: usize, partial_cost: f64) {
        if self.timed_out {
            return;
        }
        if self.started.elapsed() >= self.request.timeout {
            self.timed_out = true;
            return;
        }
        if node == self.request.nodes.len() {
            if self.request.peak_memory(&self.assignment)
                > self.request.memory_budget.unwrap_or(usize::MAX) as f64
            {
                return;
            }
            let objective = self.request.objective(&self.assignment);
            if self.best.as_ref().is_none_or(|(_, b)| objective < *b) {
                self.best = Some((self.assignment.clone(), objective));
            }
            return;
        }

        for candidate in 0..self.request.nodes[node].num_candidates() {
            self.assignment[node] = candidate;

            if !self.alias_consistent(node) {
                continue;
            }

            // Node cost plus every edge whose endpoints are both fixed.
            let mut cost = partial_cost + self.request.nodes[node].total(candidate);
            for edge in &self.request.edges {
                if edge.src.max(edge.dst) == node {
                    cost += edge.costs[self.assignment[edge.src]][self.assignment[edge.dst]];
                }
            }
            if let Some((_, best)) = &self.best {
                if cost >= *best {
                    continue;
                }
            }
            self.descend(node + 1, cost);
        }
    }

    /// Alias pairs whose endpoints are both ≤ `node` must agree.
    fn alias_consistent(&self, node: usize) -> bool {
        self.request
            .aliases
            .iter()
            .filter(|&&(a, b)| a.max(b) == node)
            .all(|&(a, b)| self.assignment[a] == self.assignment[b])
    }
}

fn feasible(request: &SolverRequest, chosen: &[usize]) -> bool {
    chosen
        .iter()
        .zip(&request.nodes)
        .all(|(&c, n)| c < n.num_candidates())
        && request
            .aliases
            .iter()
            .all(|&(a, b)| chosen[a] == chosen[b])
        && request.peak_memory(chosen) <= request.memory_budget.unwrap_or(usize::MAX) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EdgeCosts, NodeCosts};
    use std::time::Duration;

    fn request(nodes: Vec<NodeCosts>, edges: Vec<EdgeCosts>) -> SolverRequest {
        SolverRequest {
            nodes,
            edges,
            aliases: vec![],
            liveness_groups: vec![],
            memory_budget: None,
            deterministic: true,
            warm_start: None,
            timeout: Duration::from_secs(10),
        }
    }

    fn uniform_node(costs: Vec<f64>) -> NodeCosts {
        let n = costs.len();
        NodeCosts {
            compute: costs,
            communication: vec![0.0; n],
            memory: vec![0.0; n],
        }
    }

    #[test]
    fn test_picks_cheapest_node_costs() {
        let req = request(
            vec![uniform_node(vec![5.0, 1.0]), uniform_node(vec![2.0, 9.0])],
            vec![],
        );
        let resp = ExhaustiveSolver::new().solve(&req).unwrap();
        assert_eq!(
            resp,
            SolverResponse::Solution {
                chosen: vec![1, 0],
                objective: 3.0
            }
        );
    }

    #[test]
    fn test_edge_costs_couple_choices() {
        // Node costs prefer (1, 0) but the edge then charges 100.
        let req = request(
            vec![uniform_node(vec![5.0, 1.0]), uniform_node(vec![2.0, 3.0])],
            vec![EdgeCosts {
                src: 0,
                dst: 1,
                costs: vec![vec![0.0, 0.0], vec![100.0, 0.0]],
            }],
        );
        let resp = ExhaustiveSolver::new().solve(&req).unwrap();
        let SolverResponse::Solution { chosen, objective } = resp else {
            panic!("expected a solution");
        };
        assert_eq!(chosen, vec![1, 1]);
        assert_eq!(objective, 4.0);
    }

    #[test]
    fn test_alias_equality_enforced() {
        // Unconstrained optimum is (0, 1); the alias forces agreement.
        let mut req = request(
            vec![uniform_node(vec![1.0, 2.0]), uniform_node(vec![2.0, 1.0])],
            vec![],
        );
        req.aliases.push((0, 1));
        let resp = ExhaustiveSolver::new().solve(&req).unwrap();
        let SolverResponse::Solution { chosen, .. } = resp else {
            panic!("expected a solution");
        };
        assert_eq!(chosen[0], chosen[1]);
    }

    #[test]
    fn test_memory_budget_infeasible() {
        let mut req = request(
            vec![NodeCosts {
                compute: vec![1.0],
                communication: vec![0.0],
                memory: vec![1000.0],
            }],
            vec![],
        );
        req.liveness_groups = vec![vec![0]];
        req.memory_budget = Some(10);
        let resp = ExhaustiveSolver::new().solve(&req).unwrap();
        assert_eq!(resp, SolverResponse::Infeasible);
    }

    #[test]
    fn test_memory_budget_selects_smaller() {
        let mut req = request(
            vec![uniform_node(vec![1.0, 5.0])],
            vec![],
        );
        req.nodes[0].memory = vec![1000.0, 10.0];
        req.liveness_groups = vec![vec![0]];
        req.memory_budget = Some(100);
        let resp = ExhaustiveSolver::new().solve(&req).unwrap();
        assert_eq!(
            resp,
            SolverResponse::Solution {
                chosen: vec![1],
                objective: 5.0
            }
        );
    }

    #[test]
    fn test_too_large_rejected() {
        let nodes = (0..40).map(|_| uniform_node(vec![0.0, 0.0])).collect();
        let req = request(nodes, vec![]);
        let solver = ExhaustiveSolver::with_max_states(1 << 20);
        assert!(matches!(
            solver.solve(&req),
            Err(SolverError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_timeout_status() {
        let nodes = (0..20).map(|_| uniform_node(vec![0.0, 1.0])).collect();
        let mut req = request(nodes, vec![]);
        req.timeout = Duration::ZERO;
        let resp = ExhaustiveSolver::new().solve(&req).unwrap();
        assert_eq!(resp, SolverResponse::Timeout);
    }

    #[test]
    fn test_warm_start_returned_when_optimal() {
        let req = SolverRequest {
            warm_start: Some(vec![1, 0]),
            ..request(
                vec![uniform_node(vec![5.0, 1.0]), uniform_node(vec![2.0, 9.0])],
                vec![],
            )
        };
        let resp = ExhaustiveSolver::new().solve(&req).unwrap();
        let SolverResponse::Solution { chosen, .. } = resp else {
            panic!("expected a solution");
        };
        assert_eq!(chosen, vec![1, 0]);
    }
}
