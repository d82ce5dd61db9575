// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Planner configuration, loadable from TOML.
//!
//! All knobs have defaults tuned for small ring-interconnect clusters;
//! a config file only needs to list the fields it overrides:
//!
//! ```toml
//! memory_budget = "2GB"
//! solver_timeout_secs = 30
//! divisibility = "require_even"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shard_solver::MemoryBudget;

use crate::error::PlannerError;

/// How tilings that do not divide a dimension evenly are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivisibilityPolicy {
    /// Keep uneven tilings; the last shard along a dimension is padded.
    #[default]
    AllowUneven,
    /// Drop candidates whose tiled dimensions are not evenly divisible
    /// by the mesh axis they map to.
    RequireEven,
}

/// Tunable parameters of the auto-sharding pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoShardingConfig {
    /// Per-device memory budget, e.g. `"4GB"`. `None` disables the
    /// memory constraint.
    pub memory_budget: Option<String>,

    /// Wall-clock limit handed to the solver.
    pub solver_timeout_secs: u64,

    /// Follow-candidate priorities within this ratio of the best are
    /// considered tied, and the node keeps its full strategy set.
    pub follow_tie_tolerance: f64,

    /// Weight of an operand's graph depth in its follow priority.
    pub follow_depth_weight: f64,

    /// Whether uneven tilings are admitted as candidates.
    pub divisibility: DivisibilityPolicy,

    /// Honor shardings already present on input nodes by trimming their
    /// candidate sets down to the annotated choice.
    pub preserve_existing: bool,

    /// Enable the post-solve reduce-scatter rewrite.
    pub enable_reduce_scatter: bool,

    /// Minimum number of nodes sharing a replicated all-reduce result
    /// before the reduce-scatter rewrite fires.
    pub reduce_scatter_min_set: usize,

    /// Request a reproducible solve (fixed tie-breaking).
    pub deterministic: bool,

    /// Upper bound on the number of liveness groups handed to the
    /// solver; adjacent intervals are merged down to this count.
    pub max_liveness_groups: usize,
}

impl Default for AutoShardingConfig {
    fn default() -> Self {
        Self {
            memory_budget: None,
            solver_timeout_secs: 60,
            follow_tie_tolerance: 1.05,
            follow_depth_weight: 0.1,
            divisibility: DivisibilityPolicy::default(),
            preserve_existing: true,
            enable_reduce_scatter: true,
            reduce_scatter_min_set: 3,
            deterministic: true,
            max_liveness_groups: 32,
        }
    }
}

impl AutoShardingConfig {
    /// Parses a configuration from a TOML string.
    pub fn from_toml(text: &str) -> Result<Self, PlannerError> {
        let config: Self =
            toml::from_str(text).map_err(|e| PlannerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PlannerError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| PlannerError::Config(e.to_string()))?;
        Self::from_toml(&text)
    }

    /// Checks field ranges and the budget string.
    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.follow_tie_tolerance < 1.0 {
            return Err(PlannerError::Config(format!(
                "follow_tie_tolerance must be >= 1.0, got {}",
                self.follow_tie_tolerance
            )));
        }
        if self.follow_depth_weight < 0.0 {
            return Err(PlannerError::Config(
                "follow_depth_weight must be non-negative".to_string(),
            ));
        }
        if self.reduce_scatter_min_set == 0 {
            return Err(PlannerError::Config(
                "reduce_scatter_min_set must be at least 1".to_string(),
            ));
        }
        if self.max_liveness_groups == 0 {
            return Err(PlannerError::Config(
                "max_liveness_groups must be at least 1".to_string(),
            ));
        }
        self.budget_bytes()?;
        Ok(())
    }

    /// The memory budget in bytes, if one is configured.
    pub fn budget_bytes(&self) -> Result<Option<usize>, PlannerError> {
        match &self.memory_budget {
            None => Ok(None),
            Some(text) => {
                let budget = MemoryBudget::parse(text)
                    .map_err(|e| PlannerError::Config(e.to_string()))?;
                Ok(Some(budget.as_bytes()))
            }
        }
    }

    /// Solver timeout as a [`Duration`].
    pub fn solver_timeout(&self) -> Duration {
        Duration::from_secs(self.solver_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AutoShardingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.follow_tie_tolerance, 1.05);
        assert_eq!(config.reduce_scatter_min_set, 3);
        assert!(config.budget_bytes().unwrap().is_none());
    }

    #[test]
    fn partial_toml_overrides() {
        let config = AutoShardingConfig::from_toml(
            r#"
            memory_budget = "2GB"
            divisibility = "require_even"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.budget_bytes().unwrap(),
            Some(2 * 1024 * 1024 * 1024)
        );
        assert_eq!(config.divisibility, DivisibilityPolicy::RequireEven);
        // Untouched fields keep their defaults.
        assert_eq!(config.solver_timeout_secs, 60);
    }

    #[test]
    fn rejects_bad_tolerance() {
        let toml = "follow_tie_tolerance = 0.9";
        assert!(AutoShardingConfig::from_toml(toml).is_err());
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(AutoShardingConfig::from_toml("no_such_knob = 1").is_err());
    }

    #[test]
    fn rejects_malformed_budget() {
        let toml = r#"memory_budget = "lots""#;
        assert!(AutoShardingConfig::from_toml(toml).is_err());
    }
}
