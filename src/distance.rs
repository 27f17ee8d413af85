//! Distance functions and the metric contract.
//!
//! The tree only relies on non-negativity, symmetry and the triangle
//! inequality of whatever function is installed. Every evaluation goes through
//! [`Metric::distance`], which rejects negative and NaN results.

use crate::error::{GnatError, Result};
use crate::point::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Signature of a user-supplied distance function.
pub type DistanceFn = dyn Fn(&Point, &Point) -> f64 + Send + Sync;

/// Built-in metrics over coordinate points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance
    Euclidean,
    /// Manhattan (L1) distance
    Manhattan,
    /// Chebyshev (L-infinity) distance
    Chebyshev,
}

impl DistanceMetric {
    /// Compute the distance between two points using this metric
    pub fn distance(&self, p1: &Point, p2: &Point) -> f64 {
        match self {
            DistanceMetric::Euclidean => euclidean_distance(p1, p2),
            DistanceMetric::Manhattan => manhattan_distance(p1, p2),
            DistanceMetric::Chebyshev => chebyshev_distance(p1, p2),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
            DistanceMetric::Chebyshev => "chebyshev",
        }
    }
}

/// Compute Euclidean (L2) distance between two points
pub fn euclidean_distance(p1: &Point, p2: &Point) -> f64 {
    p1.as_slice()
        .iter()
        .zip(p2.as_slice().iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Compute Manhattan (L1) distance between two points
pub fn manhattan_distance(p1: &Point, p2: &Point) -> f64 {
    p1.as_slice()
        .iter()
        .zip(p2.as_slice().iter())
        .map(|(a, b)| (a - b).abs())
        .sum()
}

/// Compute Chebyshev (L-infinity) distance between two points
pub fn chebyshev_distance(p1: &Point, p2: &Point) -> f64 {
    p1.as_slice()
        .iter()
        .zip(p2.as_slice().iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

/// An installed distance function.
///
/// Cloning is cheap; clones share the same function.
#[derive(Clone)]
pub struct Metric {
    name: String,
    func: Arc<DistanceFn>,
}

impl Metric {
    /// Wrap a user-supplied distance function.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Point, &Point) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the distance, rejecting results that break the contract.
    pub fn distance(&self, a: &Point, b: &Point) -> Result<f64> {
        let d = (self.func)(a, b);
        if d.is_nan() || d < 0.0 {
            return Err(GnatError::invalid_input(format!(
                "distance function '{}' returned {}",
                self.name, d
            )));
        }
        Ok(d)
    }
}

impl From<DistanceMetric> for Metric {
    fn from(metric: DistanceMetric) -> Self {
        Metric::new(metric.name(), move |a, b| metric.distance(a, b))
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric").field("name", &self.name).finish()
    }
}
