// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `autoshard inspect` command: display graph structure and the size of
//! the search space.
//!
//! Loads a graph file and prints a per-node breakdown of shapes, byte
//! footprints, and pre-existing annotations, followed by a preview of
//! the candidate space the enumerator would produce for the given mesh.

use std::collections::BTreeMap;
use std::path::PathBuf;

use op_graph::{GraphLoader, NodeOutput};
use shard_planner::{enumerate_strategies, AutoShardingConfig, CostGraph};

use super::{annotation_label, parse_mesh, truncate};

pub fn execute(graph_path: PathBuf, mesh_spec: &str) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║             autoshard · Graph Inspector              ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let mesh = parse_mesh(mesh_spec)?;
    let (graph, aliases) = GraphLoader::load_with_aliases(&graph_path).map_err(|e| {
        anyhow::anyhow!("failed to load graph from '{}': {e}", graph_path.display())
    })?;

    // ── Summary ────────────────────────────────────────────────
    let total_bytes: usize = graph.nodes().iter().map(|n| n.output.total_bytes()).sum();
    let annotated = graph
        .nodes()
        .iter()
        .filter(|n| n.sharding.is_some())
        .count();

    println!("  Graph: {}", graph.name);
    println!("  Nodes: {}", graph.num_nodes());
    println!(
        "  Total output size: {:.2} MB",
        total_bytes as f64 / (1024.0 * 1024.0),
    );
    println!("  Pre-annotated nodes: {annotated}");
    println!("  Mesh: {mesh}");
    println!();

    // Candidate counts per node; skipped if the graph holds ops the
    // enumerator does not support.
    let candidate_counts = match enumerate_strategies(&graph, &mesh, &AutoShardingConfig::default())
    {
        Ok((arena, _stash)) => {
            let counts: BTreeMap<usize, usize> = arena
                .leaves()
                .map(|leaf| (leaf.node_index, leaf.strategies.len()))
                .fold(BTreeMap::new(), |mut acc, (idx, n)| {
                    *acc.entry(idx).or_insert(0) += n;
                    acc
                });
            let cost_graph = CostGraph::build(&graph, &arena, &aliases, &mesh);
            println!(
                "  Search space: {} leaf values, {} decisions after condensation",
                arena.num_leaves(),
                cost_graph.num_decisions(),
            );
            println!();
            Some(counts)
        }
        Err(e) => {
            println!("  Candidate preview unavailable: {e}");
            println!();
            None
        }
    };

    // ── Per-Node Detail ────────────────────────────────────────
    println!(
        "  {:<4} {:<26} {:<14} {:<20} {:>10} {:>5} {:>6}  {}",
        "Idx", "Name", "Kind", "Output", "KB", "#Ops", "#Cand", "Sharding",
    );
    println!("  {}", "-".repeat(100));

    for (idx, node) in graph.nodes().iter().enumerate() {
        let kb = node.output.total_bytes() as f64 / 1024.0;
        let cands = candidate_counts
            .as_ref()
            .and_then(|c| c.get(&idx))
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<4} {:<26} {:<14} {:<20} {:>10.1} {:>5} {:>6}  {}",
            idx,
            truncate(&node.name, 26),
            node.kind.as_str(),
            output_label(&node.output),
            kb,
            node.operands.len(),
            cands,
            annotation_label(node.sharding.as_ref()),
        );
    }
    println!();

    // ── Aliases ────────────────────────────────────────────────
    if !aliases.pairs().is_empty() {
        println!("  Aliased pairs (input, output):");
        for &(input, output) in aliases.pairs() {
            println!("   ({input}, {output})");
        }
        println!();
    }

    Ok(())
}

/// Compact shape/dtype label, e.g. `f32[64, 128]` or `tuple(3)`.
fn output_label(output: &NodeOutput) -> String {
    match output {
        NodeOutput::Array { shape, dtype } => format!("{dtype}{shape}"),
        NodeOutput::Tuple { elements } => format!("tuple({})", elements.len()),
    }
}
