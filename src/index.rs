//! Nearest-neighbor trait shared by the GNAT and the brute-force baseline

use crate::error::{GnatError, Result};
use crate::point::Point;
use crate::store::PointId;

/// One query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: PointId,
    pub point: Point,
    pub distance: f64,
}

/// A dynamic nearest-neighbor structure over points under some metric.
///
/// Ids are handed out in insertion order and double as insertion indices.
/// Results are ordered by distance, ties broken by insertion index.
pub trait NearestNeighbors {
    /// Insert a point and return its id.
    fn add(&mut self, point: Point) -> Result<PointId>;

    /// Insert many points, in order.
    fn add_list(&mut self, points: Vec<Point>) -> Result<Vec<PointId>> {
        points.into_iter().map(|p| self.add(p)).collect()
    }

    /// Remove a point. Returns `Ok(false)` if the id is not live.
    fn remove(&mut self, id: PointId) -> Result<bool>;

    /// The closest point to `query`.
    fn nearest(&self, query: &Point) -> Result<SearchResult> {
        self.nearest_k(query, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| GnatError::NotFound("the index holds no live points".to_string()))
    }

    /// The `k` closest points, closest first.
    fn nearest_k(&self, query: &Point, k: usize) -> Result<Vec<SearchResult>>;

    /// Every point within `radius` of `query`, closest first.
    fn nearest_r(&self, query: &Point, radius: f64) -> Result<Vec<SearchResult>>;

    /// Every live point, in insertion order.
    fn list(&self) -> Vec<Point>;

    /// Number of live points.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every point.
    fn clear(&mut self);
}
