// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for mesh and sharding descriptors.

/// Errors that can occur while constructing meshes or shardings.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    /// The device count does not match the product of the mesh dimensions.
    #[error("device count mismatch: {devices} devices for mesh shape {shape:?}")]
    DeviceCountMismatch { devices: usize, shape: Vec<usize> },

    /// A mesh was constructed with no dimensions or a zero-sized axis.
    #[error("invalid mesh shape {shape:?}: {detail}")]
    InvalidMeshShape { shape: Vec<usize>, detail: String },

    /// A sharding referenced a mesh axis that does not exist.
    #[error("mesh axis {axis} out of range for a {rank}-dimensional mesh")]
    AxisOutOfRange { axis: usize, rank: usize },

    /// A sharding referenced a tensor dimension that does not exist.
    #[error("tensor dimension {dim} out of range for shape of rank {rank}")]
    DimOutOfRange { dim: usize, rank: usize },

    /// Per-axis cost coefficient vectors do not match the mesh rank.
    #[error("expected {expected} per-axis coefficients, got {actual}")]
    CoefficientMismatch { expected: usize, actual: usize },
}
