// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Resharding cost vectors.
//!
//! For a node that requires one of its operands in layout `required`,
//! these functions price every candidate of the operand's group: entry
//! `j` is the cost of converting the operand's candidate `j` into
//! `required`. Communication costs come from the cluster model in
//! [`mesh_core::ClusterEnv`]; memory costs estimate the transient
//! per-device bytes the conversion holds live.

use mesh_core::{ClusterEnv, DType, Shape, Sharding};

use crate::strategy::ShardingStrategy;

/// Communication cost of moving each candidate of `candidates` into
/// `required`. Zero for candidates already equivalent to `required`.
pub fn communication_resharding_costs(
    candidates: &[ShardingStrategy],
    shape: &Shape,
    dtype: DType,
    required: &Sharding,
    env: &ClusterEnv<'_>,
) -> Vec<f64> {
    candidates
        .iter()
        .map(|c| env.resharding_cost(shape, dtype, &c.output_sharding, required))
        .collect()
}

/// Transient memory cost of the same conversions, in bytes per device.
///
/// When source and destination tile the same number of tensor dims the
/// conversion streams shard-by-shard and the transient is the shard
/// size delta. Otherwise both layouts are materialized at once and the
/// transient is the larger of the two shard sizes.
pub fn memory_resharding_costs(
    candidates: &[ShardingStrategy],
    shape: &Shape,
    dtype: DType,
    required: &Sharding,
    env: &ClusterEnv<'_>,
) -> Vec<f64> {
    let mesh = env.mesh();
    let dst_bytes = required.shard_bytes(shape, dtype, mesh) as f64;
    let dst_rank = tiled_rank(required);
    candidates
        .iter()
        .map(|c| {
            if c.output_sharding.equivalent(required, mesh) {
                return 0.0;
            }
            let src_bytes = c.output_sharding.shard_bytes(shape, dtype, mesh) as f64;
            if tiled_rank(&c.output_sharding) == dst_rank {
                (src_bytes - dst_bytes).abs()
            } else {
                src_bytes.max(dst_bytes)
            }
        })
        .collect()
}

/// Number of tensor dims a sharding actually tiles.
fn tiled_rank(sharding: &Sharding) -> usize {
    match sharding {
        Sharding::Replicated | Sharding::Maximal { .. } => 0,
        Sharding::Tiled { dim_to_mesh } => {
            dim_to_mesh.iter().filter(|d| d.is_some()).count()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_core::DeviceMesh;

    fn mesh4() -> DeviceMesh {
        DeviceMesh::new(vec![0, 1, 2, 3], vec![4]).unwrap()
    }

    fn candidates() -> Vec<ShardingStrategy> {
        vec![
            ShardingStrategy::new("R", Sharding::Replicated),
            ShardingStrategy::new("S[0@0]", Sharding::split(1, 0, 0)),
        ]
    }

    #[test]
    fn matching_layout_is_free() {
        let mesh = mesh4();
        let env = ClusterEnv::new(&mesh);
        let shape = Shape::vector(1024);
        let costs = communication_resharding_costs(
            &candidates(),
            &shape,
            DType::F32,
            &Sharding::split(1, 0, 0),
            &env,
        );
        // Replicated -> tiled is a local slice; tiled -> tiled matches.
        assert_eq!(costs, vec![0.0, 0.0]);
    }

    #[test]
    fn gather_is_priced() {
        let mesh = mesh4();
        let env = ClusterEnv::new(&mesh);
        let shape = Shape::vector(1024);
        let costs = communication_resharding_costs(
            &candidates(),
            &shape,
            DType::F32,
            &Sharding::Replicated,
            &env,
        );
        assert_eq!(costs[0], 0.0);
        // Tiled -> replicated needs an all-gather.
        assert!(costs[1] > 0.0);
    }

    #[test]
    fn memory_transient_same_rank_is_delta() {
        let mesh = mesh4();
        let env = ClusterEnv::new(&mesh);
        let shape = Shape::vector(1024);
        // 1024 f32 = 4096 bytes total, 1024 bytes per tile shard.
        let costs = memory_resharding_costs(
            &candidates(),
            &shape,
            DType::F32,
            &Sharding::Replicated,
            &env,
        );
        assert_eq!(costs[0], 0.0);
        // Ranks differ (1 tiled dim vs 0): max(1024, 4096) = 4096.
        assert_eq!(costs[1], 4096.0);
    }
}
