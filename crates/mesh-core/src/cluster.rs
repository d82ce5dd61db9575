// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Cluster environment: pure collective cost functions over a device mesh.
//!
//! All costs follow the standard ring-algorithm estimates: a collective on
//! a mesh axis of size `n` moving `b` bytes costs
//! `alpha + beta * f(n) * b`, where `f` depends on the collective. Costs
//! are in abstract time units; only their relative magnitudes matter to
//! the solver.
//!
//! These functions are called many thousands of times per solve. They are
//! pure, deterministic, and never traverse the operation graph.

use crate::{DType, DeviceMesh, Shape, Sharding};

/// Pure cost oracle over one device mesh.
///
/// Borrows the mesh for the duration of a solve; holds no other state.
#[derive(Debug, Clone, Copy)]
pub struct ClusterEnv<'a> {
    mesh: &'a DeviceMesh,
}

impl<'a> ClusterEnv<'a> {
    /// Creates a cost environment over the given mesh.
    pub fn new(mesh: &'a DeviceMesh) -> Self {
        Self { mesh }
    }

    /// Returns the underlying mesh.
    pub fn mesh(&self) -> &DeviceMesh {
        self.mesh
    }

    /// Cost of an all-reduce of `bytes` along one mesh axis.
    ///
    /// Ring all-reduce moves `2(n-1)/n` of the buffer over the wire.
    pub fn all_reduce_cost(&self, bytes: f64, axis: usize) -> f64 {
        let n = self.mesh.dim(axis) as f64;
        if n <= 1.0 {
            return 0.0;
        }
        self.mesh.alpha(axis) + self.mesh.beta(axis) * 2.0 * (n - 1.0) / n * bytes
    }

    /// Cost of an all-gather producing `bytes` (the gathered size) along
    /// one mesh axis.
    pub fn all_gather_cost(&self, bytes: f64, axis: usize) -> f64 {
        let n = self.mesh.dim(axis) as f64;
        if n <= 1.0 {
            return 0.0;
        }
        self.mesh.alpha(axis) + self.mesh.beta(axis) * (n - 1.0) / n * bytes
    }

    /// Cost of a reduce-scatter of `bytes` (the pre-scatter size) along
    /// one mesh axis. Same wire traffic as an all-gather.
    pub fn reduce_scatter_cost(&self, bytes: f64, axis: usize) -> f64 {
        self.all_gather_cost(bytes, axis)
    }

    /// Cost of an all-to-all of `bytes` (the local shard size) along one
    /// mesh axis.
    pub fn all_to_all_cost(&self, bytes: f64, axis: usize) -> f64 {
        let n = self.mesh.dim(axis) as f64;
        if n <= 1.0 {
            return 0.0;
        }
        self.mesh.alpha(axis) + self.mesh.beta(axis) * (n - 1.0) / n * bytes
    }

    /// Data-movement cost of converting a tensor from sharding `src` to
    /// sharding `dst`.
    ///
    /// Zero when the shardings are equivalent up to replication, or when
    /// the conversion needs only local slicing (replicated → tiled).
    /// Otherwise prices, per mesh axis:
    /// - axes tiled in `src` and in `dst` on the same tensor dimension:
    ///   free (layout already agrees);
    /// - axes tiled in both but on different tensor dimensions: one
    ///   all-to-all on the local shard;
    /// - axes tiled only in `src`: one all-gather of the gathered size.
    ///
    /// Maximal shardings are priced as a full redistribute of the tensor
    /// across every non-trivial axis.
    pub fn resharding_cost(
        &self,
        shape: &Shape,
        dtype: DType,
        src: &Sharding,
        dst: &Sharding,
    ) -> f64 {
        if src.equivalent(dst, self.mesh) {
            return 0.0;
        }
        if matches!(src, Sharding::Maximal { .. }) || matches!(dst, Sharding::Maximal { .. }) {
            let full = shape.size_bytes(dtype) as f64;
            return self
                .mesh
                .non_trivial_dims()
                .iter()
                .map(|&a| self.all_gather_cost(full, a))
                .sum();
        }

        let src_map = axis_to_dim(src);
        let dst_map = axis_to_dim(dst);

        let mut local_bytes = src.shard_bytes(shape, dtype, self.mesh) as f64;
        let mut cost = 0.0;
        for &(axis, src_dim) in &src_map {
            match dst_map.iter().find(|(a, _)| *a == axis) {
                Some((_, dst_dim)) if *dst_dim == src_dim => {
                    // Axis already agrees; no traffic.
                }
                Some(_) => {
                    // Same axis, different tensor dimension: all-to-all
                    // re-tiles without changing the local footprint.
                    cost += self.all_to_all_cost(local_bytes, axis);
                }
                None => {
                    // Gathered away entirely.
                    local_bytes *= self.mesh.dim(axis) as f64;
                    cost += self.all_gather_cost(local_bytes, axis);
                }
            }
        }
        // Axes tiled only in `dst` are produced by local slicing: free.
        cost
    }
}

/// (mesh axis, tensor dim) pairs for a sharding, non-trivial axes only.
fn axis_to_dim(sharding: &Sharding) -> Vec<(usize, usize)> {
    match sharding {
        Sharding::Tiled { dim_to_mesh } => dim_to_mesh
            .iter()
            .enumerate()
            .filter_map(|(dim, axis)| axis.map(|a| (a, dim)))
            .collect(),
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_1x4() -> DeviceMesh {
        DeviceMesh::new((0..4).collect(), vec![4]).unwrap()
    }

    fn mesh_2x4() -> DeviceMesh {
        DeviceMesh::new((0..8).collect(), vec![2, 4]).unwrap()
    }

    #[test]
    fn test_all_reduce_cost() {
        let mesh = mesh_1x4();
        let env = ClusterEnv::new(&mesh);
        // alpha=1, beta=1, n=4: 1 + 2*(3/4)*1000 = 1501.
        assert_eq!(env.all_reduce_cost(1000.0, 0), 1501.0);
    }

    #[test]
    fn test_all_gather_cost() {
        let mesh = mesh_1x4();
        let env = ClusterEnv::new(&mesh);
        // 1 + (3/4)*1000 = 751.
        assert_eq!(env.all_gather_cost(1000.0, 0), 751.0);
        assert_eq!(env.reduce_scatter_cost(1000.0, 0), 751.0);
    }

    #[test]
    fn test_trivial_axis_is_free() {
        let mesh = DeviceMesh::new(vec![0], vec![1]).unwrap();
        let env = ClusterEnv::new(&mesh);
        assert_eq!(env.all_reduce_cost(1000.0, 0), 0.0);
        assert_eq!(env.all_gather_cost(1000.0, 0), 0.0);
        assert_eq!(env.all_to_all_cost(1000.0, 0), 0.0);
    }

    #[test]
    fn test_resharding_identity_is_zero() {
        let mesh = mesh_2x4();
        let env = ClusterEnv::new(&mesh);
        let shape = Shape::matrix(64, 64);
        for s in [
            Sharding::Replicated,
            Sharding::split(2, 0, 0),
            Sharding::split(2, 1, 1),
        ] {
            assert_eq!(env.resharding_cost(&shape, DType::F32, &s, &s), 0.0);
        }
    }

    #[test]
    fn test_resharding_slice_is_free() {
        let mesh = mesh_2x4();
        let env = ClusterEnv::new(&mesh);
        let shape = Shape::matrix(64, 64);
        let tiled = Sharding::split(2, 0, 1);
        assert_eq!(
            env.resharding_cost(&shape, DType::F32, &Sharding::Replicated, &tiled),
            0.0
        );
    }

    #[test]
    fn test_resharding_gather_costs() {
        let mesh = mesh_1x4();
        let env = ClusterEnv::new(&mesh);
        let shape = Shape::vector(1024);
        let tiled = Sharding::split(1, 0, 0);
        let cost = env.resharding_cost(&shape, DType::F32, &tiled, &Sharding::Replicated);
        // Gathered size is the full 4096 bytes: 1 + (3/4)*4096.
        assert_eq!(cost, env.all_gather_cost(4096.0, 0));
        assert!(cost > 0.0);
    }

    #[test]
    fn test_resharding_all_to_all() {
        let mesh = mesh_1x4();
        let env = ClusterEnv::new(&mesh);
        let shape = Shape::matrix(64, 64);
        let rows = Sharding::split(2, 0, 0);
        let cols = Sharding::split(2, 1, 0);
        let a2a = env.resharding_cost(&shape, DType::F32, &rows, &cols);
        let gather = env.resharding_cost(&shape, DType::F32, &rows, &Sharding::Replicated);
        assert!(a2a > 0.0);
        // All-to-all keeps the shard local footprint, so it is cheaper
        // than gathering the whole tensor.
        assert!(a2a < gather);
    }

    #[test]
    fn test_resharding_maximal() {
        let mesh = mesh_1x4();
        let env = ClusterEnv::new(&mesh);
        let shape = Shape::vector(256);
        let cost = env.resharding_cost(
            &shape,
            DType::F32,
            &Sharding::Maximal { device: 0 },
            &Sharding::Replicated,
        );
        assert!(cost > 0.0);
    }
}
