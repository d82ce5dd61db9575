// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The auto-sharding pass: enumeration to annotated graph, end to end.
//!
//! ```text
//! OpGraph<Validated> ──▶ enumerate ──▶ CostGraph ──▶ SolverRequest
//!                                                        │ solve
//!        annotated graph ◀── rewrite ◀── repair ◀── set ◀┘
//! ```
//!
//! The pass runs single-threaded and calls the solver synchronously.
//! The graph is mutated only after the solver returns a solution; a
//! timeout or an infeasible budget leaves it untouched and is reported
//! as an [`PassOutcome::Unchanged`], not an error.

use mesh_core::{ClusterEnv, DeviceMesh};
use op_graph::{graph::Validated, AliasSet, LivenessSchedule, OpGraph};
use shard_solver::{ShardingSolver, SolverResponse};

use crate::config::AutoShardingConfig;
use crate::cost_graph::CostGraph;
use crate::enumerate::enumerate_strategies;
use crate::error::PlannerError;
use crate::rewrite::rewrite_reduce_scatter;
use crate::setter::{repair_reshards, set_shardings};
use crate::solver_request::build_request;

/// Why an unchanged graph came back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnchangedReason {
    /// The solver hit its wall-clock limit.
    Timeout,
    /// No assignment satisfies the memory budget.
    Infeasible,
}

/// Result of a pass run.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// The graph is fully annotated.
    Sharded {
        /// Objective value of the chosen assignment.
        objective: f64,
        /// Resharding copies inserted by the repair step.
        reshards: usize,
        /// All-reduce regions rewritten to reduce-scatter form.
        reduce_scatter_regions: usize,
    },
    /// The graph was left exactly as it came in.
    Unchanged(UnchangedReason),
}

/// The end-to-end automatic sharding pass.
pub struct AutoShardingPass<'a> {
    config: AutoShardingConfig,
    solver: &'a dyn ShardingSolver,
}

impl<'a> AutoShardingPass<'a> {
    pub fn new(config: AutoShardingConfig, solver: &'a dyn ShardingSolver) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &AutoShardingConfig {
        &self.config
    }

    /// Runs the pass over a validated graph.
    ///
    /// `liveness` overrides the def-use schedule derived from node
    /// order; pass `None` for the default.
    pub fn run(
        &self,
        graph: &mut OpGraph<Validated>,
        mesh: &DeviceMesh,
        aliases: &AliasSet,
        liveness: Option<&LivenessSchedule>,
    ) -> Result<PassOutcome, PlannerError> {
        self.config.validate()?;
        aliases.validate(graph)?;
        tracing::info!(
            graph = %graph.name,
            nodes = graph.num_nodes(),
            devices = mesh.num_devices(),
            solver = self.solver.name(),
            "auto-sharding pass started"
        );

        let (arena, stash) = enumerate_strategies(graph, mesh, &self.config)?;
        if !stash.is_empty() {
            tracing::debug!(stashed = stash.len(), "pre-annotated nodes trimmed");
        }

        // A mesh with every axis trivial admits exactly one candidate
        // per value; annotate directly instead of solving.
        if mesh.non_trivial_dims().is_empty() {
            let leaf_chosen = vec![0; arena.num_leaves()];
            let objective: f64 = arena.leaves().map(|l| l.strategies[0].base_cost()).sum();
            set_shardings(graph, &arena, mesh, &leaf_chosen, false);
            set_shardings(graph, &arena, mesh, &leaf_chosen, true);
            tracing::info!(objective, "trivial mesh, solver skipped");
            return Ok(PassOutcome::Sharded {
                objective,
                reshards: 0,
                reduce_scatter_regions: 0,
            });
        }

        let cost_graph = CostGraph::build(graph, &arena, aliases, mesh);

        let derived;
        let liveness = match liveness {
            Some(l) => l,
            None => {
                derived = LivenessSchedule::from_def_use(graph);
                &derived
            }
        };
        let request = build_request(graph, &arena, &cost_graph, liveness, &self.config)?;
        let response = self.solver.solve(&request)?;

        let (chosen, objective) = match response {
            SolverResponse::Solution { chosen, objective } => (chosen, objective),
            SolverResponse::Timeout => {
                tracing::warn!("solver timed out, graph left unchanged");
                return Ok(PassOutcome::Unchanged(UnchangedReason::Timeout));
            }
            SolverResponse::Infeasible => {
                tracing::warn!("memory budget infeasible, graph left unchanged");
                return Ok(PassOutcome::Unchanged(UnchangedReason::Infeasible));
            }
        };

        let leaf_chosen = cost_graph.expand_solution(&chosen);
        let env = ClusterEnv::new(mesh);
        set_shardings(graph, &arena, mesh, &leaf_chosen, false);
        set_shardings(graph, &arena, mesh, &leaf_chosen, true);
        let reshards = repair_reshards(graph, &arena, &env, &leaf_chosen)?;
        let reduce_scatter_regions =
            rewrite_reduce_scatter(graph, &arena, &env, &leaf_chosen, &self.config)?;

        tracing::info!(
            objective,
            reshards,
            reduce_scatter_regions,
            "auto-sharding pass finished"
        );
        Ok(PassOutcome::Sharded {
            objective,
            reshards,
            reduce_scatter_regions,
        })
    }
}
