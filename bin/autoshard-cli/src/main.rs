// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # autoshard
//!
//! Command-line interface for the automatic sharding planner.
//!
//! ## Usage
//! ```bash
//! # Shard a graph across a 2x4 device mesh
//! autoshard plan --graph ./models/mlp.json --mesh 2x4 --memory-budget 512M
//!
//! # Sweep the plan across memory budgets
//! autoshard sweep --graph ./models/mlp.json --mesh 2x4 --sweep-memory 256M,512M,1G
//!
//! # Inspect graph structure and the candidate space
//! autoshard inspect --graph ./models/mlp.json --mesh 2x4
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "autoshard",
    about = "Automatic operator-sharding assignment for tensor dataflow graphs",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file with planner settings.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the auto-sharding pass and print the chosen plan.
    Plan {
        /// Path to the graph JSON file.
        #[arg(short, long)]
        graph: std::path::PathBuf,

        /// Device mesh shape, axis sizes joined by 'x' (e.g., "4", "2x4").
        #[arg(short, long, default_value = "4")]
        mesh: String,

        /// Per-device memory budget (e.g., "512M", "1G"); overrides the
        /// config file.
        #[arg(short = 'b', long)]
        memory_budget: Option<String>,

        /// Write the annotated graph JSON to this path.
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },

    /// Plan across multiple memory budgets and compare the outcomes.
    Sweep {
        /// Path to the graph JSON file.
        #[arg(short, long)]
        graph: std::path::PathBuf,

        /// Device mesh shape, axis sizes joined by 'x' (e.g., "4", "2x4").
        #[arg(short, long, default_value = "4")]
        mesh: String,

        /// Comma-separated memory budgets to sweep (e.g., "256M,512M,1G").
        #[arg(long)]
        sweep_memory: String,
    },

    /// Inspect a graph: nodes, shapes, annotations, candidate space.
    Inspect {
        /// Path to the graph JSON file.
        #[arg(short, long)]
        graph: std::path::PathBuf,

        /// Device mesh shape used for the candidate-space preview.
        #[arg(short, long, default_value = "4")]
        mesh: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Plan {
            graph,
            mesh,
            memory_budget,
            output,
        } => commands::plan::execute(cli.config.as_deref(), graph, &mesh, memory_budget, output),
        Commands::Sweep {
            graph,
            mesh,
            sweep_memory,
        } => commands::sweep::execute(cli.config.as_deref(), graph, &mesh, &sweep_memory),
        Commands::Inspect { graph, mesh } => commands::inspect::execute(graph, &mesh),
    }
}
