// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `autoshard sweep` command: run the pass across several memory budgets.
//!
//! Loads the graph fresh for every budget, runs the full pipeline, and
//! prints a comparison table showing how tighter ceilings trade
//! communication cost against peak per-device memory.

use std::path::{Path, PathBuf};

use op_graph::GraphLoader;
use shard_planner::{AutoShardingPass, PassOutcome, UnchangedReason};
use shard_solver::{ExhaustiveSolver, MemoryBudget};

use super::{load_config, parse_mesh, peak_device_bytes};

pub fn execute(
    config_path: Option<&Path>,
    graph_path: PathBuf,
    mesh_spec: &str,
    sweep_memory: &str,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              autoshard · Budget Sweep                ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    // Parse comma-separated memory budgets.
    let budgets: Vec<MemoryBudget> = sweep_memory
        .split(',')
        .map(|s| {
            MemoryBudget::parse(s.trim())
                .map_err(|e| anyhow::anyhow!("invalid budget '{}': {e}", s.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let base_config = load_config(config_path)?;
    let mesh = parse_mesh(mesh_spec)?;
    let solver = ExhaustiveSolver::new();

    println!(
        "  Budgets: {:?}",
        budgets.iter().map(|b| format!("{b}")).collect::<Vec<_>>(),
    );
    println!("  Mesh:    {mesh}");
    println!();

    // ── Results Table ──────────────────────────────────────────
    println!(
        "  {:<10} {:<12} {:>12} {:>10} {:>10} {:>10}",
        "Budget", "Status", "Objective", "Reshards", "Regions", "Peak MB",
    );
    println!("  {}", "-".repeat(70));

    let mut results: Vec<SweepResult> = Vec::new();

    for &budget in &budgets {
        // Each run starts from a pristine graph; the pass mutates it.
        let (mut graph, aliases) =
            GraphLoader::load_with_aliases(&graph_path).map_err(|e| {
                anyhow::anyhow!("failed to load graph from '{}': {e}", graph_path.display())
            })?;

        let mut config = base_config.clone();
        config.memory_budget = Some(format!("{}", budget.as_bytes()));
        let pass = AutoShardingPass::new(config, &solver);

        match pass.run(&mut graph, &mesh, &aliases, None)? {
            PassOutcome::Sharded {
                objective,
                reshards,
                reduce_scatter_regions,
            } => {
                let peak_mb = peak_device_bytes(&graph, &mesh) as f64 / (1024.0 * 1024.0);
                println!(
                    "  {:<10} {:<12} {:>12.1} {:>10} {:>10} {:>10.2}",
                    format!("{budget}"),
                    "sharded",
                    objective,
                    reshards,
                    reduce_scatter_regions,
                    peak_mb,
                );
                results.push(SweepResult {
                    budget,
                    objective,
                    peak_mb,
                });
            }
            PassOutcome::Unchanged(reason) => {
                let status = match reason {
                    UnchangedReason::Timeout => "timeout",
                    UnchangedReason::Infeasible => "infeasible",
                };
                println!(
                    "  {:<10} {:<12} {:>12} {:>10} {:>10} {:>10}",
                    format!("{budget}"),
                    status,
                    "-",
                    "-",
                    "-",
                    "-",
                );
            }
        }
    }

    println!();

    // ── Summary ────────────────────────────────────────────────
    if results.is_empty() {
        println!("  No budget produced a sharded graph.");
        return Ok(());
    }

    let cheapest = results
        .iter()
        .min_by(|a, b| a.objective.total_cmp(&b.objective))
        .unwrap();
    let most_efficient = results
        .iter()
        .min_by(|a, b| a.peak_mb.total_cmp(&b.peak_mb))
        .unwrap();

    println!("  Summary:");
    println!(
        "   Cheapest:         {} ({:.1} objective)",
        cheapest.budget, cheapest.objective,
    );
    println!(
        "   Most efficient:   {} ({:.2} MB peak)",
        most_efficient.budget, most_efficient.peak_mb,
    );
    println!();

    Ok(())
}

#[derive(Debug)]
struct SweepResult {
    budget: MemoryBudget,
    objective: f64,
    peak_mb: f64,
}
