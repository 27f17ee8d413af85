//! Point type and validation

use crate::error::{GnatError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A point: an immutable, ordered sequence of coordinates.
///
/// Points carry no identity of their own. Two equal points inserted twice are
/// two distinct entries, each with its own [`PointId`](crate::PointId).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    coords: Vec<f64>,
}

impl Point {
    /// Create a new point from a Vec<f64>
    pub fn new(coords: Vec<f64>) -> Self {
        Self { coords }
    }

    /// Number of coordinates
    pub fn dimension(&self) -> usize {
        self.coords.len()
    }

    /// Get the coordinates as a slice
    pub fn as_slice(&self) -> &[f64] {
        &self.coords
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.coords
    }

    /// Check that the point is usable as a key: at least one coordinate and
    /// every coordinate finite.
    pub fn validate(&self) -> Result<()> {
        if self.coords.is_empty() {
            return Err(GnatError::invalid_input("point has no coordinates"));
        }
        if let Some(pos) = self.coords.iter().position(|c| !c.is_finite()) {
            return Err(GnatError::invalid_input(format!(
                "coordinate {} is not finite ({})",
                pos, self.coords[pos]
            )));
        }
        Ok(())
    }
}

impl From<Vec<f64>> for Point {
    fn from(coords: Vec<f64>) -> Self {
        Point::new(coords)
    }
}

impl From<&[f64]> for Point {
    fn from(coords: &[f64]) -> Self {
        Point::new(coords.to_vec())
    }
}

/// Parses comma- and/or whitespace-separated coordinates, e.g. `"1.0,2.0"` or
/// `"1.0 2.0"`.
impl FromStr for Point {
    type Err = GnatError;

    fn from_str(s: &str) -> Result<Self> {
        let coords = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| {
                token
                    .parse::<f64>()
                    .map_err(|_| GnatError::invalid_input(format!("Invalid float: {}", token)))
            })
            .collect::<Result<Vec<f64>>>()?;
        let point = Point::new(coords);
        point.validate()?;
        Ok(point)
    }
}

/// Space-separated coordinates, the same layout the text format uses.
impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.coords.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}
