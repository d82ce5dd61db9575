// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Logical device mesh: an n-dimensional arrangement of a cluster's devices.
//!
//! A mesh defines the axes along which tensors can be tiled. Each axis
//! carries latency (`alpha`) and inverse-bandwidth (`beta`) coefficients
//! used by [`crate::ClusterEnv`] to price collectives on that axis.
//!
//! The mesh is immutable for the lifetime of one solve. Trying several
//! mesh shapes is the job of an outer driver, which builds one mesh per
//! trial.

use crate::MeshError;
use ndarray::{ArrayD, IxDyn};
use std::fmt;

/// A logical n-dimensional arrangement of devices.
///
/// # Invariants
/// - The product of the mesh dimensions equals the device count.
/// - Every axis has size ≥ 1.
/// - `alpha` and `beta` have one entry per mesh axis.
///
/// # Examples
/// ```
/// use mesh_core::DeviceMesh;
/// // 2×4 mesh over devices 0..8, uniform link coefficients.
/// let mesh = DeviceMesh::new((0..8).collect(), vec![2, 4]).unwrap();
/// assert_eq!(mesh.num_devices(), 8);
/// assert_eq!(mesh.dim(1), 4);
/// ```
#[derive(Debug, Clone)]
pub struct DeviceMesh {
    /// Device ids arranged in the logical mesh shape.
    devices: ArrayD<u32>,
    /// Per-axis latency coefficients (seconds per collective).
    alpha: Vec<f64>,
    /// Per-axis inverse-bandwidth coefficients (seconds per byte).
    beta: Vec<f64>,
}

impl DeviceMesh {
    /// Default latency coefficient for a mesh axis.
    const DEFAULT_ALPHA: f64 = 1.0;
    /// Default inverse-bandwidth coefficient for a mesh axis.
    const DEFAULT_BETA: f64 = 1.0;

    /// Creates a mesh with uniform default cost coefficients.
    pub fn new(devices: Vec<u32>, shape: Vec<usize>) -> Result<Self, MeshError> {
        let rank = shape.len();
        Self::with_coefficients(
            devices,
            shape,
            vec![Self::DEFAULT_ALPHA; rank],
            vec![Self::DEFAULT_BETA; rank],
        )
    }

    /// Creates a mesh with explicit per-axis cost coefficients.
    pub fn with_coefficients(
        devices: Vec<u32>,
        shape: Vec<usize>,
        alpha: Vec<f64>,
        beta: Vec<f64>,
    ) -> Result<Self, MeshError> {
        if shape.is_empty() {
            return Err(MeshError::InvalidMeshShape {
                shape,
                detail: "mesh must have at least one axis".into(),
            });
        }
        if shape.iter().any(|&d| d == 0) {
            return Err(MeshError::InvalidMeshShape {
                shape,
                detail: "mesh axes must be non-empty".into(),
            });
        }
        let expected: usize = shape.iter().product();
        if devices.len() != expected {
            return Err(MeshError::DeviceCountMismatch {
                devices: devices.len(),
                shape,
            });
        }
        if alpha.len() != shape.len() {
            return Err(MeshError::CoefficientMismatch {
                expected: shape.len(),
                actual: alpha.len(),
            });
        }
        if beta.len() != shape.len() {
            return Err(MeshError::CoefficientMismatch {
                expected: shape.len(),
                actual: beta.len(),
            });
        }

        let devices = ArrayD::from_shape_vec(IxDyn(&shape), devices)
            .expect("shape product checked above");
        Ok(Self { devices, alpha, beta })
    }

    /// Returns the total number of devices in the mesh.
    pub fn num_devices(&self) -> usize {
        self.devices.len()
    }

    /// Returns the mesh rank (number of axes).
    pub fn rank(&self) -> usize {
        self.devices.ndim()
    }

    /// Returns the mesh shape.
    pub fn shape(&self) -> &[usize] {
        self.devices.shape()
    }

    /// Returns the size of one mesh axis.
    ///
    /// # Panics
    /// Panics if `axis` is out of range; callers validate axes when
    /// constructing shardings.
    pub fn dim(&self, axis: usize) -> usize {
        self.devices.shape()[axis]
    }

    /// Returns the device id at the given mesh coordinates.
    pub fn device_at(&self, coords: &[usize]) -> Option<u32> {
        self.devices.get(IxDyn(coords)).copied()
    }

    /// Returns the device ids in row-major order.
    pub fn device_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.devices.iter().copied()
    }

    /// Returns the latency coefficient for a mesh axis.
    pub fn alpha(&self, axis: usize) -> f64 {
        self.alpha[axis]
    }

    /// Returns the inverse-bandwidth coefficient for a mesh axis.
    pub fn beta(&self, axis: usize) -> f64 {
        self.beta[axis]
    }

    /// Returns the axes with size > 1, in order.
    ///
    /// Tiling along a size-1 axis is indistinguishable from replication,
    /// so the enumerator only considers these.
    pub fn non_trivial_dims(&self) -> Vec<usize> {
        self.shape()
            .iter()
            .enumerate()
            .filter(|(_, &d)| d > 1)
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns `true` if every axis has size 1 (a single-device mesh).
    pub fn is_trivial(&self) -> bool {
        self.non_trivial_dims().is_empty()
    }
}

impl fmt::Display for DeviceMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeviceMesh {:?} ({} devices)",
            self.shape(),
            self.num_devices(),
        )
    }
}
