// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the solver boundary.

/// Errors that can occur while building or solving a request.
///
/// Note that solver timeouts and infeasibility are *not* errors — they
/// are normal response statuses carried by
/// [`crate::SolverResponse`]; the caller decides how to fall back.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// The request is structurally inconsistent (mismatched candidate
    /// counts, out-of-range edge endpoints, ...).
    #[error("malformed solver request: {0}")]
    MalformedRequest(String),

    /// The reference solver's search space cap was exceeded; use the
    /// production solver for requests of this size.
    #[error("search space of {states} states exceeds the reference solver cap of {cap}")]
    TooLarge { states: u128, cap: u128 },

    /// An invalid memory-budget string was supplied.
    #[error("invalid memory budget: {0}")]
    InvalidBudget(String),
}
