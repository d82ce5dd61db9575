// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `autoshard plan` command: run the sharding pass and report the result.
//!
//! Loads a graph file, runs the full pipeline against the given device
//! mesh, and prints the chosen per-node shardings. With `--output` the
//! annotated graph (including any inserted resharding nodes) is written
//! back as JSON.

use std::path::{Path, PathBuf};

use op_graph::{GraphFile, GraphLoader};
use shard_planner::{AutoShardingPass, PassOutcome, UnchangedReason};
use shard_solver::ExhaustiveSolver;

use super::{annotation_label, load_config, parse_mesh, peak_device_bytes, truncate};

pub fn execute(
    config_path: Option<&Path>,
    graph_path: PathBuf,
    mesh_spec: &str,
    memory_budget: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║             autoshard · Sharding Planner             ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let mut config = load_config(config_path)?;
    if memory_budget.is_some() {
        config.memory_budget = memory_budget;
    }
    let mesh = parse_mesh(mesh_spec)?;

    let (mut graph, aliases) = GraphLoader::load_with_aliases(&graph_path).map_err(|e| {
        anyhow::anyhow!("failed to load graph from '{}': {e}", graph_path.display())
    })?;

    // ── Input Summary ──────────────────────────────────────────
    println!("  Graph: {}", graph.summary());
    println!("  Mesh:  {mesh}");
    if let Some(budget) = &config.memory_budget {
        println!("  Memory budget: {budget} per device");
    }
    println!();

    let solver = ExhaustiveSolver::new();
    let pass = AutoShardingPass::new(config, &solver);
    let outcome = pass.run(&mut graph, &mesh, &aliases, None)?;

    match outcome {
        PassOutcome::Sharded {
            objective,
            reshards,
            reduce_scatter_regions,
        } => {
            // ── Result ─────────────────────────────────────────
            println!("  Objective:              {objective:.1}");
            println!("  Reshards inserted:      {reshards}");
            println!("  Reduce-scatter regions: {reduce_scatter_regions}");
            println!(
                "  Peak per-device memory: {:.2} MB",
                peak_device_bytes(&graph, &mesh) as f64 / (1024.0 * 1024.0),
            );
            println!();

            // ── Per-Node Shardings ─────────────────────────────
            println!(
                "  {:<4} {:<28} {:<14} {}",
                "Idx", "Name", "Kind", "Sharding",
            );
            println!("  {}", "-".repeat(72));
            for (idx, node) in graph.nodes().iter().enumerate() {
                println!(
                    "  {:<4} {:<28} {:<14} {}",
                    idx,
                    truncate(&node.name, 28),
                    node.kind.as_str(),
                    annotation_label(node.sharding.as_ref()),
                );
            }
            println!();
        }
        PassOutcome::Unchanged(reason) => {
            match reason {
                UnchangedReason::Timeout => {
                    println!("  Solver timed out; the graph was left unchanged.");
                    println!("  Raise solver_timeout_ms or reduce the graph size.");
                }
                UnchangedReason::Infeasible => {
                    println!("  No assignment fits the memory budget; the graph was");
                    println!("  left unchanged. Raise the budget or enlarge the mesh.");
                }
            }
            println!();
        }
    }

    if let Some(out_path) = output {
        let file = GraphFile {
            name: graph.name.clone(),
            nodes: graph.nodes().to_vec(),
            aliases: aliases.pairs().to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&out_path, json).map_err(|e| {
            anyhow::anyhow!("failed to write '{}': {e}", out_path.display())
        })?;
        println!("  Annotated graph written to {}", out_path.display());
        println!();
    }

    Ok(())
}
