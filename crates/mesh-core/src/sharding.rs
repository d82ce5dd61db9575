// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Sharding descriptors: how a tensor is laid out across a device mesh.
//!
//! A tensor is either fully replicated, pinned whole onto a single device
//! (maximal), or tiled: each tensor dimension may be split across one mesh
//! axis. Mesh axes not used by any tensor dimension form a replicated
//! remainder — the tensor is duplicated across those axes.

use crate::{DType, DeviceMesh, MeshError, Shape};
use std::fmt;

/// Description of how a tensor's data is partitioned across devices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sharding {
    /// Every device holds a full copy of the tensor.
    Replicated,
    /// The whole tensor lives on exactly one device.
    Maximal { device: u32 },
    /// Each tensor dimension is optionally split along one mesh axis.
    ///
    /// `dim_to_mesh[i] == Some(j)` tiles tensor dimension `i` across mesh
    /// axis `j`. `None` leaves the dimension whole. A mesh axis may be
    /// used by at most one tensor dimension.
    Tiled { dim_to_mesh: Vec<Option<usize>> },
}

impl Sharding {
    /// Convenience constructor: tile a single tensor dimension along a
    /// single mesh axis, leaving the other `rank - 1` dimensions whole.
    pub fn split(rank: usize, dim: usize, mesh_axis: usize) -> Self {
        let mut dim_to_mesh = vec![None; rank];
        dim_to_mesh[dim] = Some(mesh_axis);
        Sharding::Tiled { dim_to_mesh }
    }

    /// Checks structural consistency against a shape and mesh.
    ///
    /// Verifies dimension counts, axis bounds, and that no mesh axis is
    /// claimed by two tensor dimensions. Shape-compatibility of tile
    /// counts (axis size vs. dimension size) is an enumeration-policy
    /// question and is checked there, not here.
    pub fn validate(&self, shape: &Shape, mesh: &DeviceMesh) -> Result<(), MeshError> {
        let Sharding::Tiled { dim_to_mesh } = self else {
            return Ok(());
        };
        if dim_to_mesh.len() != shape.rank() {
            return Err(MeshError::DimOutOfRange {
                dim: dim_to_mesh.len(),
                rank: shape.rank(),
            });
        }
        let mut used = vec![false; mesh.rank()];
        for axis in dim_to_mesh.iter().flatten() {
            if *axis >= mesh.rank() {
                return Err(MeshError::AxisOutOfRange {
                    axis: *axis,
                    rank: mesh.rank(),
                });
            }
            if used[*axis] {
                return Err(MeshError::InvalidMeshShape {
                    shape: mesh.shape().to_vec(),
                    detail: format!("mesh axis {axis} used by two tensor dimensions"),
                });
            }
            used[*axis] = true;
        }
        Ok(())
    }

    /// Returns the mesh axes this sharding actually tiles along, excluding
    /// size-1 axes (tiling across one device is replication).
    pub fn tiled_mesh_dims(&self, mesh: &DeviceMesh) -> Vec<usize> {
        match self {
            Sharding::Replicated | Sharding::Maximal { .. } => vec![],
            Sharding::Tiled { dim_to_mesh } => {
                let mut axes: Vec<usize> = dim_to_mesh
                    .iter()
                    .flatten()
                    .copied()
                    .filter(|&a| mesh.dim(a) > 1)
                    .collect();
                axes.sort_unstable();
                axes
            }
        }
    }

    /// Returns the number of shards the tensor is split into.
    pub fn num_shards(&self, mesh: &DeviceMesh) -> usize {
        self.tiled_mesh_dims(mesh)
            .iter()
            .map(|&a| mesh.dim(a))
            .product()
    }

    /// Returns `true` if this sharding leaves the tensor whole on every
    /// participating device.
    pub fn is_fully_replicated(&self, mesh: &DeviceMesh) -> bool {
        match self {
            Sharding::Replicated => true,
            Sharding::Maximal { .. } => false,
            Sharding::Tiled { .. } => self.tiled_mesh_dims(mesh).is_empty(),
        }
    }

    /// Returns the shape of one shard under this sharding.
    ///
    /// Tiled dimensions are ceil-divided by the mesh axis size, so uneven
    /// tilings are priced by their largest shard.
    pub fn shard_shape(&self, shape: &Shape, mesh: &DeviceMesh) -> Shape {
        match self {
            Sharding::Replicated | Sharding::Maximal { .. } => shape.clone(),
            Sharding::Tiled { dim_to_mesh } => {
                let dims = shape
                    .dims()
                    .iter()
                    .zip(dim_to_mesh.iter())
                    .map(|(&d, axis)| match axis {
                        Some(a) if mesh.dim(*a) > 1 => d.div_ceil(mesh.dim(*a)),
                        _ => d,
                    })
                    .collect();
                Shape::new(dims)
            }
        }
    }

    /// Returns the per-device byte footprint of one shard.
    pub fn shard_bytes(&self, shape: &Shape, dtype: DType, mesh: &DeviceMesh) -> usize {
        self.shard_shape(shape, mesh).size_bytes(dtype)
    }

    /// Returns `true` if two shardings describe the same data placement,
    /// treating tilings over only size-1 axes as replication.
    pub fn equivalent(&self, other: &Sharding, mesh: &DeviceMesh) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Sharding::Maximal { device: a }, Sharding::Maximal { device: b }) => a == b,
            (Sharding::Maximal { .. }, _) | (_, Sharding::Maximal { .. }) => false,
            _ => {
                self.is_fully_replicated(mesh) && other.is_fully_replicated(mesh)
                    || (self.effective_assignment(mesh) == other.effective_assignment(mesh))
            }
        }
    }

    /// Per-dimension assignment with size-1 axes dropped, for equivalence
    /// comparison. Replicated maps to all-`None`.
    fn effective_assignment(&self, mesh: &DeviceMesh) -> Vec<Option<usize>> {
        match self {
            Sharding::Tiled { dim_to_mesh } => dim_to_mesh
                .iter()
                .map(|axis| axis.filter(|&a| mesh.dim(a) > 1))
                .collect(),
            _ => vec![],
        }
    }
}

impl fmt::Display for Sharding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sharding::Replicated => write!(f, "R"),
            Sharding::Maximal { device } => write!(f, "max({device})"),
            Sharding::Tiled { dim_to_mesh } => {
                write!(f, "S[")?;
                let mut first = true;
                for (dim, axis) in dim_to_mesh.iter().enumerate() {
                    if let Some(a) = axis {
                        if !first {
                            write!(f, ",")?;
                        }
                        write!(f, "{dim}@{a}")?;
                        first = false;
                    }
                }
                if first {
                    write!(f, "R")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_2x4() -> DeviceMesh {
        DeviceMesh::new((0..8).collect(), vec![2, 4]).unwrap()
    }

    #[test]
    fn test_split_constructor() {
        let s = Sharding::split(3, 1, 0);
        assert_eq!(
            s,
            Sharding::Tiled {
                dim_to_mesh: vec![None, Some(0), None]
            }
        );
    }

    #[test]
    fn test_num_shards() {
        let mesh = mesh_2x4();
        assert_eq!(Sharding::Replicated.num_shards(&mesh), 1);
        assert_eq!(Sharding::split(2, 0, 0).num_shards(&mesh), 2);
        assert_eq!(Sharding::split(2, 0, 1).num_shards(&mesh), 4);

        let both = Sharding::Tiled {
            dim_to_mesh: vec![Some(0), Some(1)],
        };
        assert_eq!(both.num_shards(&mesh), 8);
    }

    #[test]
    fn test_shard_shape_even() {
        let mesh = mesh_2x4();
        let shape = Shape::matrix(8, 12);
        let s = Sharding::split(2, 1, 1); // split cols over 4 devices
        assert_eq!(s.shard_shape(&shape, &mesh), Shape::matrix(8, 3));
    }

    #[test]
    fn test_shard_shape_uneven_ceil() {
        let mesh = mesh_2x4();
        let shape = Shape::matrix(10, 7);
        let s = Sharding::split(2, 1, 1); // 7 over 4 → ceil = 2
        assert_eq!(s.shard_shape(&shape, &mesh), Shape::matrix(10, 2));
    }

    #[test]
    fn test_shard_bytes() {
        let mesh = mesh_2x4();
        let shape = Shape::vector(1024);
        // 1024 f32 over 4 devices → 256 elements → 1024 bytes per shard.
        let s = Sharding::split(1, 0, 1);
        assert_eq!(s.shard_bytes(&shape, DType::F32, &mesh), 1024);
        assert_eq!(
            Sharding::Replicated.shard_bytes(&shape, DType::F32, &mesh),
            4096
        );
    }

    #[test]
    fn test_trivial_axis_is_replication() {
        let mesh = DeviceMesh::new((0..4).collect(), vec![1, 4]).unwrap();
        let s = Sharding::split(2, 0, 0); // axis 0 has size 1
        assert!(s.is_fully_replicated(&mesh));
        assert!(s.equivalent(&Sharding::Replicated, &mesh));
        assert_eq!(s.num_shards(&mesh), 1);
    }

    #[test]
    fn test_equivalence() {
        let mesh = mesh_2x4();
        let a = Sharding::split(2, 0, 1);
        let b = Sharding::split(2, 0, 1);
        let c = Sharding::split(2, 1, 1);
        assert!(a.equivalent(&b, &mesh));
        assert!(!a.equivalent(&c, &mesh));
        assert!(!a.equivalent(&Sharding::Replicated, &mesh));
    }

    #[test]
    fn test_validate_rejects_duplicate_axis() {
        let mesh = mesh_2x4();
        let s = Sharding::Tiled {
            dim_to_mesh: vec![Some(1), Some(1)],
        };
        assert!(s.validate(&Shape::matrix(4, 4), &mesh).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_axis() {
        let mesh = mesh_2x4();
        let s = Sharding::split(2, 0, 5);
        assert!(s.validate(&Shape::matrix(4, 4), &mesh).is_err());
    }

    #[test]
    fn test_validate_rank_mismatch() {
        let mesh = mesh_2x4();
        let s = Sharding::Tiled {
            dim_to_mesh: vec![Some(0)],
        };
        assert!(s.validate(&Shape::matrix(4, 4), &mesh).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Sharding::Replicated), "R");
        assert_eq!(format!("{}", Sharding::split(2, 0, 1)), "S[0@1]");
        let both = Sharding::Tiled {
            dim_to_mesh: vec![Some(0), Some(1)],
        };
        assert_eq!(format!("{both}"), "S[0@0,1@1]");
    }

    #[test]
    fn test_serde_roundtrip() {
        let s = Sharding::split(3, 2, 0);
        let json = serde_json::to_string(&s).unwrap();
        let back: Sharding = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
