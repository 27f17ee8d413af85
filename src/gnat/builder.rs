//! Subtree construction: pivot selection and partitioning.
//!
//! Building is split in two phases. [`TreeBuilder`] computes a [`Body`]
//! without touching the tree, so every metric failure surfaces before any
//! mutation. [`NodeArena::install`](super::node::NodeArena::install) then
//! writes the plan into the arena and cannot fail.

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::GnatConfig;
use crate::distance::Metric;
use crate::error::Result;
use crate::point::Point;
use crate::store::{PointId, PointStore};

/// Contents of a node: a bucket, or one subtree per pivot.
#[derive(Debug)]
pub(crate) enum Body {
    Leaf(Vec<PointId>),
    Internal(Vec<Subtree>),
}

/// A planned child node, described relative to its parent.
#[derive(Debug)]
pub(crate) struct Subtree {
    pub pivot: PointId,
    pub degree: usize,
    pub min_radius: f64,
    pub max_radius: f64,
    pub min_range: Vec<f64>,
    pub max_range: Vec<f64>,
    /// Points in the subtree, pivot included.
    pub live: usize,
    pub body: Body,
}

/// Position of the smallest distance; ties go to the lowest position.
pub(crate) fn nearest_pivot(distances: &[f64]) -> usize {
    let mut best = 0;
    for (i, &d) in distances.iter().enumerate().skip(1) {
        if d < distances[best] {
            best = i;
        }
    }
    best
}

/// Distances from each selected center to every member:
/// `rows[c][j] = d(member_j, center_c)`.
struct CenterDistances {
    centers: Vec<usize>,
    rows: Vec<Vec<f64>>,
}

pub(crate) struct TreeBuilder<'a> {
    store: &'a PointStore,
    metric: &'a Metric,
    config: &'a GnatConfig,
    rng: &'a mut StdRng,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        store: &'a PointStore,
        metric: &'a Metric,
        config: &'a GnatConfig,
        rng: &'a mut StdRng,
    ) -> Self {
        Self {
            store,
            metric,
            config,
            rng,
        }
    }

    /// Whether a node of the given degree holding `len` points must split.
    pub fn needs_split(config: &GnatConfig, len: usize, degree: usize) -> bool {
        len > config.max_num_pts_per_leaf && len > degree
    }

    /// Plan the contents of a node holding `members` (its own pivot excluded).
    pub fn build(&mut self, degree: usize, members: Vec<PointId>) -> Result<Body> {
        if !Self::needs_split(self.config, members.len(), degree) {
            return Ok(Body::Leaf(members));
        }
        Ok(Body::Internal(self.split(degree, members)?))
    }

    fn split(&mut self, degree: usize, members: Vec<PointId>) -> Result<Vec<Subtree>> {
        let points = members
            .iter()
            .map(|&id| self.store.point(id))
            .collect::<Result<Vec<&Point>>>()?;
        let n = points.len();
        let CenterDistances { centers, rows } = self.select_centers(&points, degree)?;
        let k = centers.len();

        let mut center_of = vec![None; n];
        for (c, &j) in centers.iter().enumerate() {
            center_of[j] = Some(c);
        }

        let mut partitions: Vec<Vec<PointId>> = vec![Vec::new(); k];
        let mut min_radius = vec![f64::INFINITY; k];
        let mut max_radius = vec![0.0_f64; k];
        let mut min_range = vec![vec![f64::INFINITY; k]; k];
        let mut max_range = vec![vec![f64::NEG_INFINITY; k]; k];

        let mut column = vec![0.0; k];
        for j in 0..n {
            for c in 0..k {
                column[c] = rows[c][j];
            }
            // A center always stays in its own partition, even when another
            // center sits at the same location.
            let owner = center_of[j].unwrap_or_else(|| nearest_pivot(&column));
            if center_of[j].is_none() {
                partitions[owner].push(members[j]);
                min_radius[owner] = min_radius[owner].min(column[owner]);
                max_radius[owner] = max_radius[owner].max(column[owner]);
            }
            for c in 0..k {
                min_range[c][owner] = min_range[c][owner].min(column[c]);
                max_range[c][owner] = max_range[c][owner].max(column[c]);
            }
        }

        let mut subtrees = Vec::with_capacity(k);
        let ranges = min_range.into_iter().zip(max_range);
        for (c, ((bucket, (lo_range, hi_range)), center)) in partitions
            .into_iter()
            .zip(ranges)
            .zip(centers.iter().copied())
            .enumerate()
        {
            let child_degree = (degree * bucket.len() / n)
                .clamp(self.config.min_degree, self.config.max_degree);
            let (lo_radius, hi_radius) = if bucket.is_empty() {
                (0.0, 0.0)
            } else {
                (min_radius[c], max_radius[c])
            };
            let live = bucket.len() + 1;
            let body = self.build(child_degree, bucket)?;
            subtrees.push(Subtree {
                pivot: members[center],
                degree: child_degree,
                min_radius: lo_radius,
                max_radius: hi_radius,
                min_range: lo_range,
                max_range: hi_range,
                live,
                body,
            });
        }

        tracing::trace!("split {} points across {} pivots", n, k);
        Ok(subtrees)
    }

    /// Greedy k-centers: a random first center, then repeatedly the member
    /// farthest from every center chosen so far.
    fn select_centers(&mut self, points: &[&Point], k: usize) -> Result<CenterDistances> {
        let n = points.len();
        let k = k.min(n);
        let mut centers = Vec::with_capacity(k);
        let mut rows = Vec::with_capacity(k);
        let mut min_dist = vec![f64::INFINITY; n];

        let mut next = self.rng.gen_range(0..n);
        while centers.len() < k {
            let center = points[next];
            let row = points
                .iter()
                .map(|p| self.metric.distance(p, center))
                .collect::<Result<Vec<f64>>>()?;
            for (m, &d) in min_dist.iter_mut().zip(&row) {
                if d < *m {
                    *m = d;
                }
            }
            centers.push(next);
            rows.push(row);
            for &c in &centers {
                min_dist[c] = f64::NEG_INFINITY;
            }

            let mut farthest = None;
            for (j, &d) in min_dist.iter().enumerate() {
                if d == f64::NEG_INFINITY {
                    continue;
                }
                match farthest {
                    Some(best) if min_dist[best] >= d => {}
                    _ => farthest = Some(j),
                }
            }
            match farthest {
                Some(j) => next = j,
                None => break,
            }
        }

        Ok(CenterDistances { centers, rows })
    }
}
