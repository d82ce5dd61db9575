// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # mesh-core
//!
//! Shapes, device meshes, sharding descriptors, and cluster cost models
//! for the auto-sharding planner.
//!
//! This crate provides:
//! - [`Shape`] — immutable tensor shape descriptors.
//! - [`DType`] — supported element data types (f32, f16, bf16, i8, i32).
//! - [`DeviceMesh`] — an n-dimensional logical arrangement of devices with
//!   per-axis latency/bandwidth coefficients.
//! - [`Sharding`] — how a tensor's data is partitioned or replicated
//!   across a mesh.
//! - [`ClusterEnv`] — pure cost functions for collectives (all-reduce,
//!   all-gather, all-to-all) and for converting between shardings.
//!
//! # Design Goals
//! - Everything here is a value type: no graph references, no I/O.
//! - Cost functions are pure and deterministic — they are called many
//!   thousands of times per solve.
//! - Clean error types via `thiserror`.

mod cluster;
mod dtype;
mod error;
mod mesh;
mod shape;
mod sharding;

pub use cluster::ClusterEnv;
pub use dtype::DType;
pub use error::MeshError;
pub use mesh::DeviceMesh;
pub use shape::Shape;
pub use sharding::Sharding;
