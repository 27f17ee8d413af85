//! Insertion: nearest-pivot descent, bound maintenance and leaf splits.

use crate::distance::Metric;
use crate::error::{GnatError, Result};
use crate::point::Point;
use crate::store::PointId;

use super::builder::{nearest_pivot, TreeBuilder};
use super::node::{Node, NodeId};
use super::Gnat;

/// One internal node crossed on the way down, with the distances from the
/// new point to each of its children's pivots.
struct RouteStep {
    node: NodeId,
    distances: Vec<f64>,
    chosen: usize,
}

impl Gnat {
    /// Insert a point and return its handle.
    ///
    /// Nothing changes if the point is invalid or the distance function fails,
    /// and the index is not consumed.
    pub fn add(&mut self, point: Point) -> Result<PointId> {
        self.check_point(&point)?;
        self.require_metric()?;
        let dimension = point.dimension();

        let id = self.store.insert(point);
        if let Err(e) = self.insert_stored(id) {
            self.store.discard_from(id);
            return Err(e);
        }
        self.dimension = Some(dimension);
        Ok(id)
    }

    /// Insert many points. Every point is validated before anything is
    /// inserted. An empty tree is bulk-loaded in one build; otherwise points
    /// are added one at a time and the first failure stops the batch.
    pub fn add_list(&mut self, points: Vec<Point>) -> Result<Vec<PointId>> {
        let Some(first) = points.first() else {
            return Ok(Vec::new());
        };
        self.require_metric()?;
        let dimension = self.dimension.unwrap_or_else(|| first.dimension());
        for (i, point) in points.iter().enumerate() {
            point.validate()?;
            if point.dimension() != dimension {
                return Err(GnatError::invalid_input(format!(
                    "point {} of the batch has dimension {}, expected {}",
                    i,
                    point.dimension(),
                    dimension
                )));
            }
        }

        if self.root.is_some() {
            return points.into_iter().map(|p| self.add(p)).collect();
        }

        let first_id = self.store.next_id();
        let ids: Vec<PointId> = points.into_iter().map(|p| self.store.insert(p)).collect();
        let body = match self.plan_root(ids.clone()) {
            Ok(body) => body,
            Err(e) => {
                self.store.discard_from(first_id);
                return Err(e);
            }
        };
        self.install_root(body);
        self.dimension = Some(dimension);
        while self.rebuild_size <= self.store.len() {
            self.rebuild_size = self.rebuild_size.saturating_mul(2);
        }
        tracing::debug!("bulk-loaded {} points", ids.len());
        Ok(ids)
    }

    /// Place an already stored point in the tree.
    fn insert_stored(&mut self, id: PointId) -> Result<()> {
        let Some(root) = self.root else {
            let mut node = Node::root(self.config.degree);
            node.bucket.push(id);
            node.live = 1;
            self.root = Some(self.nodes.alloc(node));
            return Ok(());
        };

        let (steps, leaf) = self.route(root, self.require_metric()?, self.store.point(id)?)?;
        let leaf_node = &self.nodes[leaf];
        let degree = leaf_node.degree;
        if !TreeBuilder::needs_split(&self.config, leaf_node.bucket.len() + 1, degree) {
            self.commit_route(&steps, leaf);
            self.nodes[leaf].bucket.push(id);
            return Ok(());
        }

        if self.config.rebalancing && self.store.len() >= self.rebuild_size {
            let body = self.plan_root(self.store.live_ids())?;
            self.install_root(body);
            self.rebuild_size = self.rebuild_size.saturating_mul(2);
            tracing::debug!(
                "rebalanced tree at {} points, next rebuild at {}",
                self.store.len(),
                self.rebuild_size
            );
            return Ok(());
        }

        // Tombstones in the overflowing bucket are dropped by the split.
        let (mut members, dead): (Vec<PointId>, Vec<PointId>) = self.nodes[leaf]
            .bucket
            .iter()
            .partition(|&&b| self.store.is_live(b));
        members.push(id);
        let body = self.plan_body(degree, members)?;

        self.commit_route(&steps, leaf);
        for d in dead {
            self.store.purge(d);
        }
        self.nodes.install(leaf, degree, body);
        Ok(())
    }

    /// Follow the nearest pivot from `root` down to a leaf. Read-only.
    fn route(&self, root: NodeId, metric: &Metric, point: &Point) -> Result<(Vec<RouteStep>, NodeId)> {
        let mut steps = Vec::new();
        let mut current = root;
        loop {
            let node = &self.nodes[current];
            if node.is_leaf() {
                return Ok((steps, current));
            }
            let distances = self.pivot_distances(metric, point, current)?;
            let chosen = nearest_pivot(&distances);
            let next = node.children[chosen];
            steps.push(RouteStep {
                node: current,
                distances,
                chosen,
            });
            current = next;
        }
    }

    /// Account for one more point below every step of the route.
    fn commit_route(&mut self, steps: &[RouteStep], leaf: NodeId) {
        for step in steps {
            self.nodes[step.node].live += 1;
            for (i, &d) in step.distances.iter().enumerate() {
                let child = self.nodes[step.node].children[i];
                self.nodes[child].update_range(step.chosen, d);
            }
            let chosen = self.nodes[step.node].children[step.chosen];
            self.nodes[chosen].update_radius(step.distances[step.chosen]);
        }
        self.nodes[leaf].live += 1;
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GnatConfig;
    use crate::distance::DistanceMetric;
    use crate::error::GnatError;
    use crate::gnat::Gnat;
    use crate::point::Point;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config() -> GnatConfig {
        GnatConfig::new(3, 2, 4, 4, 50, false).with_seed(9)
    }

    fn grid(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| Point::new(vec![(i % 7) as f64, (i / 7) as f64, ((i * 31) % 5) as f64]))
            .collect()
    }

    #[test]
    fn test_add_assigns_increasing_ids() {
        let mut gnat = Gnat::with_metric(config(), DistanceMetric::Euclidean).unwrap();
        for (i, p) in grid(30).into_iter().enumerate() {
            assert_eq!(gnat.add(p).unwrap().index(), i);
        }
        assert_eq!(gnat.len(), 30);
        gnat.assert_consistent();
    }

    #[test]
    fn test_incremental_splits_stay_consistent() {
        let mut gnat = Gnat::with_metric(config(), DistanceMetric::Manhattan).unwrap();
        for (i, p) in grid(120).into_iter().enumerate() {
            gnat.add(p).unwrap();
            if i % 20 == 0 {
                gnat.assert_consistent();
            }
        }
        let stats = gnat.stats();
        assert!(stats.internal_nodes > 1);
        gnat.assert_consistent();
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut gnat = Gnat::with_metric(config(), DistanceMetric::Euclidean).unwrap();
        gnat.add(Point::new(vec![1.0, 2.0])).unwrap();
        let result = gnat.add(Point::new(vec![1.0, 2.0, 3.0]));
        assert!(matches!(result, Err(GnatError::InvalidInput { .. })));
        assert_eq!(gnat.len(), 1);
    }

    #[test]
    fn test_invalid_points_rejected() {
        let mut gnat = Gnat::with_metric(config(), DistanceMetric::Euclidean).unwrap();
        assert!(gnat.add(Point::new(vec![])).is_err());
        assert!(gnat.add(Point::new(vec![f64::NAN, 1.0])).is_err());
        assert!(gnat.is_empty());
        assert_eq!(gnat.dimension(), None);
    }

    #[test]
    fn test_failing_metric_leaves_tree_untouched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let budget = calls.clone();
        let mut gnat = Gnat::new(config()).unwrap();
        gnat.set_distance_function(move |a, b| {
            if budget.fetch_add(1, Ordering::SeqCst) >= 40 {
                -1.0
            } else {
                crate::distance::euclidean_distance(a, b)
            }
        })
        .unwrap();

        let mut added = 0;
        let mut failed = false;
        for p in grid(50) {
            match gnat.add(p) {
                Ok(_) => added += 1,
                Err(GnatError::InvalidInput { .. }) => {
                    failed = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert!(failed);
        assert_eq!(gnat.len(), added);
        assert_eq!(gnat.stats().live, added);
    }

    #[test]
    fn test_add_list_bulk_load() {
        let mut gnat = Gnat::with_metric(config(), DistanceMetric::Euclidean).unwrap();
        let ids = gnat.add_list(grid(60)).unwrap();
        assert_eq!(ids.len(), 60);
        assert_eq!(ids[59].index(), 59);
        gnat.assert_consistent();

        // a second batch goes through incremental insertion
        let more = gnat.add_list(grid(10)).unwrap();
        assert_eq!(more[0].index(), 60);
        assert_eq!(gnat.len(), 70);
        gnat.assert_consistent();
    }

    #[test]
    fn test_add_list_validates_before_inserting() {
        let mut gnat = Gnat::with_metric(config(), DistanceMetric::Euclidean).unwrap();
        let mut points = grid(5);
        points.push(Point::new(vec![1.0]));
        assert!(gnat.add_list(points).is_err());
        assert!(gnat.is_empty());
        assert!(gnat.add_list(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_rebalancing_rebuilds_on_growth() {
        let config = GnatConfig::new(2, 2, 3, 3, 50, true).with_seed(1);
        let mut gnat = Gnat::with_metric(config, DistanceMetric::Euclidean).unwrap();
        for p in grid(100) {
            gnat.add(p).unwrap();
        }
        assert!(gnat.rebuild_size > 100);
        gnat.assert_consistent();
    }

    #[test]
    fn test_same_seed_same_shape() {
        let build = || {
            let mut gnat = Gnat::with_metric(config(), DistanceMetric::Euclidean).unwrap();
            for p in grid(80) {
                gnat.add(p).unwrap();
            }
            gnat.stats()
        };
        assert_eq!(build(), build());
    }
}
