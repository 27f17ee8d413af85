//! GNAT (Geometric Near-neighbor Access Tree) index.
//!
//! Each internal node partitions its points among a handful of pivots (a new
//! point goes to its nearest pivot) and remembers, for every pair of children,
//! the range of distances from one child's pivot to the other child's points.
//! Queries use those ranges with the triangle inequality to skip whole
//! subtrees.
//!
//! Based on: "Near Neighbor Search in Large Metric Spaces" (Brin, 1995).

mod builder;
mod insert;
mod neighbor_queue;
mod node;
mod removal;
mod search;

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config::GnatConfig;
use crate::distance::{DistanceMetric, Metric};
use crate::error::{GnatError, Result};
use crate::index::{NearestNeighbors, SearchResult};
use crate::persistence;
use crate::point::Point;
use crate::store::{PointId, PointStore};

use builder::{Body, TreeBuilder};
use node::{Node, NodeArena, NodeId};

/// Shape summary of a tree, as returned by [`Gnat::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub live: usize,
    pub tombstones: usize,
    pub nodes: usize,
    pub leaves: usize,
    pub internal_nodes: usize,
    /// Number of edges on the longest root-to-leaf path.
    pub depth: usize,
    /// Smallest child count over internal nodes (0 when there are none).
    pub min_children: usize,
    /// Largest child count over internal nodes.
    pub max_children: usize,
    /// Largest bucket, tombstones included.
    pub max_bucket: usize,
}

/// A dynamic nearest-neighbor index over an arbitrary metric space.
///
/// Mutation needs `&mut self` and queries need `&self`, so a query can never
/// observe a half-finished restructuring.
#[derive(Debug)]
pub struct Gnat {
    config: GnatConfig,
    metric: Option<Metric>,
    store: PointStore,
    nodes: NodeArena,
    root: Option<NodeId>,
    dimension: Option<usize>,
    rng: StdRng,
    /// Live count that triggers the next full rebuild (rebalancing only).
    rebuild_size: usize,
}

impl Gnat {
    /// Create an empty tree. A distance function must be installed before the
    /// first insertion.
    pub fn new(config: GnatConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            rebuild_size: config.initial_rebuild_size(),
            config,
            metric: None,
            store: PointStore::new(),
            nodes: NodeArena::new(),
            root: None,
            dimension: None,
        })
    }

    /// Create an empty tree with the given metric installed.
    pub fn with_metric(config: GnatConfig, metric: impl Into<Metric>) -> Result<Self> {
        let mut gnat = Self::new(config)?;
        gnat.metric = Some(metric.into());
        Ok(gnat)
    }

    pub fn config(&self) -> &GnatConfig {
        &self.config
    }

    /// Reseed pivot sampling. Later splits and rebuilds draw from the new
    /// seed; the current tree is left as it is.
    pub fn set_seed(&mut self, seed: u64) {
        self.config.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// The installed metric, if any.
    pub fn metric(&self) -> Option<&Metric> {
        self.metric.as_ref()
    }

    /// Install a distance function.
    ///
    /// Cached bounds depend on the metric, so swapping it is refused once any
    /// point is stored (tombstones included). Call [`Gnat::clear`] first.
    pub fn set_distance_function<F>(&mut self, func: F) -> Result<()>
    where
        F: Fn(&Point, &Point) -> f64 + Send + Sync + 'static,
    {
        self.set_metric(Metric::new("custom", func))
    }

    /// Install a metric. Same restrictions as [`Gnat::set_distance_function`].
    pub fn set_metric(&mut self, metric: impl Into<Metric>) -> Result<()> {
        if !self.store.is_vacant() {
            return Err(GnatError::InvalidState(
                "cannot change the distance function of a non-empty tree".to_string(),
            ));
        }
        self.metric = Some(metric.into());
        Ok(())
    }

    fn require_metric(&self) -> Result<&Metric> {
        self.metric
            .as_ref()
            .ok_or_else(|| GnatError::InvalidState("no distance function installed".to_string()))
    }

    /// Number of live points.
    pub fn size(&self) -> usize {
        self.store.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Removed points still waiting for a compaction.
    pub fn tombstones(&self) -> usize {
        self.store.tombstones()
    }

    /// Dimension fixed by the first stored point.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// A live point by id.
    pub fn get(&self, id: PointId) -> Option<&Point> {
        self.store.get(id)
    }

    pub fn contains(&self, id: PointId) -> bool {
        self.store.is_live(id)
    }

    /// All live points, in insertion order.
    pub fn list(&self) -> Vec<Point> {
        self.store.iter_live().map(|(_, p)| p.clone()).collect()
    }

    /// Live points with their ids, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (PointId, &Point)> {
        self.store.iter_live()
    }

    /// Drop every point and node. Index numbering restarts at zero and the
    /// sampling RNG is reseeded; the metric stays installed.
    pub fn clear(&mut self) {
        self.store.clear();
        self.nodes.clear();
        self.root = None;
        self.dimension = None;
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.rebuild_size = self.config.initial_rebuild_size();
    }

    /// Rebuild the whole tree from its live points. Ids are preserved and all
    /// tombstones are purged.
    pub fn rebuild(&mut self) -> Result<()> {
        let members = self.store.live_ids();
        let body = self.plan_root(members)?;
        self.install_root(body);
        tracing::debug!("rebuilt tree over {} points", self.store.len());
        Ok(())
    }

    /// Plan the contents of a node of the given degree without touching the
    /// tree.
    fn plan_body(&mut self, degree: usize, members: Vec<PointId>) -> Result<Body> {
        let metric = self
            .metric
            .as_ref()
            .ok_or_else(|| GnatError::InvalidState("no distance function installed".to_string()))?;
        TreeBuilder::new(&self.store, metric, &self.config, &mut self.rng).build(degree, members)
    }

    fn plan_root(&mut self, members: Vec<PointId>) -> Result<Option<Body>> {
        if members.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.plan_body(self.config.degree, members)?))
    }

    fn pivot_of(&self, node: NodeId) -> Result<PointId> {
        self.nodes[node]
            .pivot
            .ok_or_else(|| GnatError::InvalidState("child node without a pivot".to_string()))
    }

    /// Distance from `point` to the pivot of every child of `node`.
    fn pivot_distances(&self, metric: &Metric, point: &Point, node: NodeId) -> Result<Vec<f64>> {
        self.nodes[node]
            .children
            .iter()
            .map(|&child| {
                let pivot = self.store.point(self.pivot_of(child)?)?;
                metric.distance(point, pivot)
            })
            .collect()
    }

    /// Live points below `node`, its own pivot excluded.
    fn own_points(&self, node: NodeId) -> usize {
        let node = &self.nodes[node];
        node.live - usize::from(node.pivot.is_some())
    }

    /// Replace the whole tree with a planned root. Every tombstone is purged.
    fn install_root(&mut self, body: Option<Body>) {
        self.store.purge_all();
        self.nodes.clear();
        self.root = None;
        if let Some(body) = body {
            let root = self.nodes.alloc(Node::root(self.config.degree));
            self.nodes.install(root, self.config.degree, body);
            self.nodes[root].live = self.store.len();
            self.root = Some(root);
        }
    }

    /// Check a point against the point contract and the stored dimension.
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

    /// Shape summary of the current tree.
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            live: self.store.len(),
            tombstones: self.store.tombstones(),
            nodes: self.nodes.len(),
            ..TreeStats::default()
        };
        let Some(root) = self.root else {
            return stats;
        };
        let mut stack = vec![(root, 0)];
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id];
            stats.depth = stats.depth.max(depth);
            if node.is_leaf() {
                stats.leaves += 1;
                stats.max_bucket = stats.max_bucket.max(node.bucket.len());
            } else {
                let count = node.children.len();
                stats.min_children = if stats.internal_nodes == 0 {
                    count
                } else {
                    stats.min_children.min(count)
                };
                stats.internal_nodes += 1;
                stats.max_children = stats.max_children.max(count);
                stack.extend(node.children.iter().map(|&c| (c, depth + 1)));
            }
        }
        stats
    }

    /// Run [`Gnat::nearest_k`] for every query in parallel. Results follow the
    /// order of `queries`.
    pub fn nearest_k_batch(&self, queries: &[Point], k: usize) -> Result<Vec<Vec<SearchResult>>> {
        queries
            .par_iter()
            .map(|query| self.nearest_k(query, k))
            .collect()
    }

    /// Write every live point to `path`, one per line. Returns the number of
    /// points written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<usize> {
        persistence::save_points(path, self.store.iter_live().map(|(_, p)| p))
    }

    /// Replace the contents with the points stored at `path`, rebuilding the
    /// tree with the current configuration and metric. The tree is untouched
    /// if reading or building fails.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let points = persistence::load_points(path)?;
        let metric = self.require_metric()?.clone();
        let mut fresh = Gnat::with_metric(self.config.clone(), metric)?;
        fresh.add_list(points)?;
        let count = fresh.len();
        *self = fresh;
        Ok(count)
    }
}

impl Default for Gnat {
    /// Default configuration with the Euclidean metric.
    fn default() -> Self {
        Self {
            rng: StdRng::seed_from_u64(GnatConfig::default().seed),
            rebuild_size: GnatConfig::default().initial_rebuild_size(),
            config: GnatConfig::default(),
            metric: Some(Metric::from(DistanceMetric::Euclidean)),
            store: PointStore::new(),
            nodes: NodeArena::new(),
            root: None,
            dimension: None,
        }
    }
}

impl NearestNeighbors for Gnat {
    fn add(&mut self, point: Point) -> Result<PointId> {
        Gnat::add(self, point)
    }

    fn add_list(&mut self, points: Vec<Point>) -> Result<Vec<PointId>> {
        Gnat::add_list(self, points)
    }

    fn remove(&mut self, id: PointId) -> Result<bool> {
        Gnat::remove(self, id)
    }

    fn nearest(&self, query: &Point) -> Result<SearchResult> {
        Gnat::nearest(self, query)
    }

    fn nearest_k(&self, query: &Point, k: usize) -> Result<Vec<SearchResult>> {
        Gnat::nearest_k(self, query, k)
    }

    fn nearest_r(&self, query: &Point, radius: f64) -> Result<Vec<SearchResult>> {
        Gnat::nearest_r(self, query, radius)
    }

    fn list(&self) -> Vec<Point> {
        Gnat::list(self)
    }

    fn len(&self) -> usize {
        Gnat::len(self)
    }

    fn clear(&mut self) {
        Gnat::clear(self)
    }
}

#[cfg(test)]
impl Gnat {
    /// Walk the whole tree and check every structural invariant.
    pub(crate) fn assert_consistent(&self) {
        use std::collections::HashSet;

        let metric = self.metric.as_ref().expect("metric installed");
        let Some(root) = self.root else {
            assert_eq!(self.store.len(), 0, "live points without a root");
            return;
        };
        assert!(self.nodes[root].pivot.is_none(), "root carries a pivot");

        let mut seen = HashSet::new();
        let mut tombstones = 0;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            let subtree = self.collect_points(id);
            assert_eq!(node.live, subtree.len(), "stale live count");

            if node.is_leaf() {
                let dead = node.bucket.iter().filter(|&&b| !self.store.is_live(b)).count();
                assert_eq!(dead, node.tombstones, "stale tombstone count");
                tombstones += dead;
                for &b in &node.bucket {
                    assert!(seen.insert(b), "point {} stored twice", b);
                }
                continue;
            }

            let count = node.children.len();
            assert!(count >= self.config.min_degree && count <= self.config.max_degree);
            for (i, &child) in node.children.iter().enumerate() {
                let c = &self.nodes[child];
                let pivot = c.pivot.expect("child without pivot");
                assert!(self.store.is_live(pivot), "pivot {} is not live", pivot);
                assert!(seen.insert(pivot), "point {} stored twice", pivot);
                let pivot_point = self.store.point(pivot).unwrap();

                for id in self.collect_points(child) {
                    if id == pivot {
                        continue;
                    }
                    let d = metric.distance(self.store.point(id).unwrap(), pivot_point).unwrap();
                    assert!(d >= c.min_radius && d <= c.max_radius, "radius violated");
                }
                for (j, &sibling) in node.children.iter().enumerate() {
                    for id in self.collect_points(sibling) {
                        let d = metric.distance(self.store.point(id).unwrap(), pivot_point).unwrap();
                        assert!(
                            d >= c.min_range[j] && d <= c.max_range[j],
                            "range {}->{} violated",
                            i,
                            j
                        );
                    }
                }
                stack.push(child);
            }
        }
        assert_eq!(tombstones, self.store.tombstones(), "tombstones outside buckets");
        let live_seen = seen.iter().filter(|&&id| self.store.is_live(id)).count();
        assert_eq!(live_seen, self.store.len(), "live points missing from tree");
    }

    /// Live points of a subtree, pivot included.
    fn collect_points(&self, id: NodeId) -> Vec<PointId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let node = &self.nodes[n];
            out.extend(node.pivot.filter(|&p| self.store.is_live(p)));
            out.extend(node.bucket.iter().copied().filter(|&b| self.store.is_live(b)));
            stack.extend(node.children.iter().copied());
        }
        out
    }
}
