// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CLI command implementations and shared helpers.

pub mod inspect;
pub mod plan;
pub mod sweep;

use std::path::Path;

use mesh_core::DeviceMesh;
use op_graph::ShardingAnnotation;
use shard_planner::AutoShardingConfig;

/// Initializes tracing output based on the `-v` count.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads the planner configuration, falling back to defaults when no
/// file is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AutoShardingConfig> {
    match path {
        Some(p) => AutoShardingConfig::from_file(p)
            .map_err(|e| anyhow::anyhow!("failed to load config '{}': {e}", p.display())),
        None => Ok(AutoShardingConfig::default()),
    }
}

/// Parses a mesh shape string ("4", "2x4", ...) into a device mesh with
/// contiguous device ids.
pub fn parse_mesh(spec: &str) -> anyhow::Result<DeviceMesh> {
    let shape: Vec<usize> = spec
        .split('x')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("invalid mesh shape '{spec}'"))
        })
        .collect::<Result<_, _>>()?;
    let num_devices: usize = shape.iter().product();
    let devices = (0..num_devices as u32).collect();
    DeviceMesh::new(devices, shape).map_err(|e| anyhow::anyhow!("invalid mesh '{spec}': {e}"))
}

/// Compact display form of a node's sharding annotation.
pub fn annotation_label(annotation: Option<&ShardingAnnotation>) -> String {
    match annotation {
        None => "-".to_string(),
        Some(ShardingAnnotation::Leaf(s)) => s.to_string(),
        Some(ShardingAnnotation::Tuple(elements)) => {
            let parts: Vec<String> = elements
                .iter()
                .map(|e| annotation_label(Some(e)))
                .collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// Per-device byte footprint of one node under its annotation; the
/// full size when unannotated.
pub fn annotated_bytes(
    output: &op_graph::NodeOutput,
    annotation: Option<&ShardingAnnotation>,
    mesh: &DeviceMesh,
) -> usize {
    match (output, annotation) {
        (op_graph::NodeOutput::Array { shape, dtype }, Some(ShardingAnnotation::Leaf(s))) => {
            s.shard_bytes(shape, *dtype, mesh)
        }
        (op_graph::NodeOutput::Array { shape, dtype }, _) => shape.size_bytes(*dtype),
        (op_graph::NodeOutput::Tuple { elements }, Some(ShardingAnnotation::Tuple(anns)))
            if anns.len() == elements.len() =>
        {
            elements
                .iter()
                .zip(anns)
                .map(|(e, a)| annotated_bytes(e, Some(a), mesh))
                .sum()
        }
        (op_graph::NodeOutput::Tuple { elements }, _) => elements
            .iter()
            .map(|e| annotated_bytes(e, None, mesh))
            .sum(),
    }
}

/// Peak simultaneous per-device bytes over the def-to-last-use
/// schedule.
pub fn peak_device_bytes(
    graph: &op_graph::OpGraph<op_graph::graph::Validated>,
    mesh: &DeviceMesh,
) -> usize {
    let live = op_graph::LivenessSchedule::from_def_use(graph);
    let bytes: Vec<usize> = graph
        .nodes()
        .iter()
        .map(|n| annotated_bytes(&n.output, n.sharding.as_ref(), mesh))
        .collect();
    let horizon = live.intervals().iter().map(|&(_, e)| e).max().unwrap_or(0);
    (0..=horizon)
        .map(|t| {
            live.intervals()
                .iter()
                .enumerate()
                .filter(|(_, &(s, e))| s <= t && t <= e)
                .map(|(i, _)| bytes[i])
                .sum()
        })
        .max()
        .unwrap_or(0)
}

/// Truncates a string to at most `max_len` characters with an ellipsis,
/// cutting on a char boundary.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let keep: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{keep}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_and_long() {
        assert_eq!(truncate("dot.12", 10), "dot.12");
        assert_eq!(truncate("a_very_long_node_name", 10), "a_very_...");
    }

    #[test]
    fn test_truncate_multibyte_names() {
        // Char-counted, so multi-byte names never split mid-codepoint.
        assert_eq!(truncate("gemm_层_归一化_写回_0", 8), "gemm_...");
        assert_eq!(truncate("Σx", 10), "Σx");
    }

    #[test]
    fn test_parse_mesh_shapes() {
        assert_eq!(parse_mesh("4").unwrap().shape(), &[4]);
        assert_eq!(parse_mesh("2x4").unwrap().shape(), &[2, 4]);
        assert!(parse_mesh("2xq").is_err());
    }
}
