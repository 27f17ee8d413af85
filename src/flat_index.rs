//! Brute-force linear index: O(n) queries

use crate::distance::{DistanceMetric, Metric};
use crate::error::{GnatError, Result};
use crate::index::{NearestNeighbors, SearchResult};
use crate::point::Point;
use crate::store::{PointId, PointStore};

/// A linear scan over every stored point. Same id numbering and result
/// ordering as [`Gnat`](crate::Gnat), which makes it a reference to check
/// the tree against.
#[derive(Debug)]
pub struct LinearIndex {
    store: PointStore,
    metric: Metric,
    dimension: Option<usize>,
}

impl LinearIndex {
    /// Create a new empty index with the given metric.
    pub fn new(metric: impl Into<Metric>) -> Self {
        Self {
            store: PointStore::new(),
            metric: metric.into(),
            dimension: None,
        }
    }

    pub fn get(&self, id: PointId) -> Option<&Point> {
        self.store.get(id)
    }

    /// Iterate over all live (id, point) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (PointId, &Point)> {
        self.store.iter_live()
    }

    fn check_point(&self, point: &Point) -> Result<()> {
        point.validate()?;
        match self.dimension {
            Some(expected) if expected != point.dimension() => {
                Err(GnatError::invalid_input(format!(
                    "dimension mismatch: expected {}, got {}",
                    expected,
                    point.dimension()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Every live point with its distance to `query`, sorted.
    fn scan(&self, query: &Point) -> Result<Vec<SearchResult>> {
        self.check_point(query)?;
        let mut results = self
            .store
            .iter_live()
            .map(|(id, point)| {
                let distance = self.metric.distance(query, point)?;
                Ok(SearchResult {
                    id,
                    point: point.clone(),
                    distance,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        Ok(results)
    }
}

impl Default for LinearIndex {
    fn default() -> Self {
        Self::new(DistanceMetric::Euclidean)
    }
}

impl NearestNeighbors for LinearIndex {
    fn add(&mut self, point: Point) -> Result<PointId> {
        self.check_point(&point)?;
        self.dimension = Some(point.dimension());
        Ok(self.store.insert(point))
    }

    fn remove(&mut self, id: PointId) -> Result<bool> {
        if !self.store.tombstone(id) {
            return Ok(false);
        }
        self.store.purge(id);
        Ok(true)
    }

    fn nearest_k(&self, query: &Point, k: usize) -> Result<Vec<SearchResult>> {
        let mut results = self.scan(query)?;
        results.truncate(k);
        Ok(results)
    }

    fn nearest_r(&self, query: &Point, radius: f64) -> Result<Vec<SearchResult>> {
        if radius.is_nan() || radius < 0.0 {
            return Err(GnatError::invalid_input(format!(
                "radius must be non-negative, got {}",
                radius
            )));
        }
        let mut results = self.scan(query)?;
        results.retain(|r| r.distance <= radius);
        Ok(results)
    }

    fn list(&self) -> Vec<Point> {
        self.store.iter_live().map(|(_, p)| p.clone()).collect()
    }

    fn len(&self) -> usize {
        self.store.len()
    }

    fn clear(&mut self) {
        self.store.clear();
        self.dimension = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_index_basic() {
        let mut index = LinearIndex::new(DistanceMetric::Euclidean);
        index.add(Point::new(vec![1.0, 0.0, 0.0])).unwrap();
        index.add(Point::new(vec![0.0, 1.0, 0.0])).unwrap();
        index.add(Point::new(vec![1.0, 1.0, 0.0])).unwrap();

        let query = Point::new(vec![1.0, 0.0, 0.0]);
        let results = index.nearest_k(&query, 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id.index(), 0); // exact match
        assert!(results[0].distance < 1e-12);
    }

    #[test]
    fn test_linear_index_get() {
        let mut index = LinearIndex::default();
        let p = Point::new(vec![1.0, 2.0, 3.0]);
        let id = index.add(p.clone()).unwrap();

        assert_eq!(index.get(id), Some(&p));
        assert_eq!(index.get(PointId::new(99)), None);
    }

    #[test]
    fn test_linear_index_remove() {
        let mut index = LinearIndex::default();
        let a = index.add(Point::new(vec![1.0, 0.0])).unwrap();
        index.add(Point::new(vec![0.0, 1.0])).unwrap();
        assert_eq!(index.len(), 2);

        assert!(index.remove(a).unwrap());
        assert!(!index.remove(a).unwrap());
        assert_eq!(index.len(), 1);
        assert_eq!(index.list(), vec![Point::new(vec![0.0, 1.0])]);
    }

    #[test]
    fn test_linear_index_radius_and_errors() {
        let mut index = LinearIndex::new(DistanceMetric::Manhattan);
        index
            .add_list(vec![Point::new(vec![0.0, 0.0]), Point::new(vec![2.0, 2.0])])
            .unwrap();
        let q = Point::new(vec![0.0, 0.0]);
        assert_eq!(index.nearest_r(&q, 4.0).unwrap().len(), 2);
        assert_eq!(index.nearest_r(&q, 3.9).unwrap().len(), 1);
        assert!(index.nearest_r(&q, -0.5).is_err());
        assert!(index.add(Point::new(vec![1.0])).is_err());

        index.clear();
        assert!(matches!(index.nearest(&q), Err(GnatError::NotFound(_))));
    }
}
