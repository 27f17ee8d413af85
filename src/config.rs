//! Tree configuration and tuning constants.

use crate::error::{GnatError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default target branching factor of the root.
pub const DEFAULT_DEGREE: usize = 8;

/// Default lower bound on the child count of an internal node.
pub const DEFAULT_MIN_DEGREE: usize = 4;

/// Default upper bound on the child count of an internal node.
pub const DEFAULT_MAX_DEGREE: usize = 12;

/// Default leaf capacity before a split.
pub const DEFAULT_MAX_NUM_PTS_PER_LEAF: usize = 50;

/// Default number of tombstones tolerated before a compaction.
pub const DEFAULT_REMOVED_CACHE_SIZE: usize = 500;

/// Default seed for pivot sampling.
pub const DEFAULT_SEED: u64 = 0;

/// A leaf is compacted once at least this fraction of its bucket is
/// tombstoned (rebalancing only).
pub const LEAF_TOMBSTONE_RATIO: f64 = 0.5;

/// An internal node collapses into a leaf once its live points, own pivot
/// excluded, drop to this fraction of the leaf capacity (rebalancing only).
pub const COLLAPSE_FRACTION: f64 = 0.5;

/// Relative slack applied to pruning comparisons so that rounding in the
/// triangle inequality never discards a point lying exactly on the bound.
pub const PRUNE_EPSILON: f64 = 1e-9;

/// Configuration of a [`Gnat`](crate::Gnat).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GnatConfig {
    /// Branching factor of the root and the basis of child degrees.
    pub degree: usize,
    /// Minimum child count of any internal node.
    pub min_degree: usize,
    /// Maximum child count of any internal node.
    pub max_degree: usize,
    /// Leaf capacity before a split.
    pub max_num_pts_per_leaf: usize,
    /// Tombstones tolerated before a compaction pass.
    pub removed_cache_size: usize,
    /// Enables size-doubling rebuilds and collapse of underpopulated subtrees.
    pub rebalancing: bool,
    /// Seed for the pivot sampling RNG.
    pub seed: u64,
}

impl Default for GnatConfig {
    fn default() -> Self {
        Self {
            degree: DEFAULT_DEGREE,
            min_degree: DEFAULT_MIN_DEGREE,
            max_degree: DEFAULT_MAX_DEGREE,
            max_num_pts_per_leaf: DEFAULT_MAX_NUM_PTS_PER_LEAF,
            removed_cache_size: DEFAULT_REMOVED_CACHE_SIZE,
            rebalancing: false,
            seed: DEFAULT_SEED,
        }
    }
}

impl GnatConfig {
    pub fn new(
        degree: usize,
        min_degree: usize,
        max_degree: usize,
        max_num_pts_per_leaf: usize,
        removed_cache_size: usize,
        rebalancing: bool,
    ) -> Self {
        Self {
            degree,
            min_degree,
            max_degree,
            max_num_pts_per_leaf,
            removed_cache_size,
            rebalancing,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_rebalancing(mut self, rebalancing: bool) -> Self {
        self.rebalancing = rebalancing;
        self
    }

    /// Check the degree bounds and leaf capacity.
    pub fn validate(&self) -> Result<()> {
        if self.min_degree < 2 {
            return Err(GnatError::InvalidConfig(format!(
                "min_degree must be at least 2, got {}",
                self.min_degree
            )));
        }
        if self.min_degree > self.degree || self.degree > self.max_degree {
            return Err(GnatError::InvalidConfig(format!(
                "degree bounds must satisfy min_degree <= degree <= max_degree, got {} <= {} <= {}",
                self.min_degree, self.degree, self.max_degree
            )));
        }
        if self.max_num_pts_per_leaf == 0 {
            return Err(GnatError::InvalidConfig(
                "max_num_pts_per_leaf must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Live count at which the first size-doubling rebuild happens.
    pub(crate) fn initial_rebuild_size(&self) -> usize {
        if self.rebalancing {
            self.max_num_pts_per_leaf.saturating_mul(self.degree)
        } else {
            usize::MAX
        }
    }

    /// Largest number of live points an internal node may hold before it is
    /// collapsed back into a leaf.
    pub(crate) fn collapse_threshold(&self) -> usize {
        (self.max_num_pts_per_leaf as f64 * COLLAPSE_FRACTION).floor() as usize
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: GnatConfig =
            serde_json::from_str(json).map_err(|e| GnatError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
