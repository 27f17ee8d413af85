//! Branch-and-bound queries.
//!
//! Nodes are visited best-first by a lower bound on the distance from the
//! query to anything below them. Inside a node, every pivot distance that is
//! computed shrinks the candidate set of siblings through their distance
//! ranges, so most of the children are never looked at.

use crate::config::PRUNE_EPSILON;
use crate::error::{GnatError, Result};
use crate::index::SearchResult;
use crate::point::Point;

use super::neighbor_queue::{Candidate, Collector, KNearest, NodeQueue, WithinRadius};
use super::Gnat;

/// `a > b`, with a little slack so that rounding in the stored bounds never
/// prunes a point sitting exactly on the search radius.
pub(super) fn exceeds(a: f64, b: f64) -> bool {
    a > b + PRUNE_EPSILON * b.abs().max(1.0)
}

impl Gnat {
    /// The closest live point to `query`.
    pub fn nearest(&self, query: &Point) -> Result<SearchResult> {
        self.nearest_k(query, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| GnatError::NotFound("the index holds no live points".to_string()))
    }

    /// The `k` closest live points, closest first. Equal distances are ordered
    /// by insertion index.
    pub fn nearest_k(&self, query: &Point, k: usize) -> Result<Vec<SearchResult>> {
        self.check_point(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let mut best = KNearest::new(k.min(self.len()));
        self.search(query, &mut best)?;
        self.to_results(best.into_sorted_vec())
    }

    /// Every live point within `radius` of `query` (inclusive), closest first.
    pub fn nearest_r(&self, query: &Point, radius: f64) -> Result<Vec<SearchResult>> {
        self.check_point(query)?;
        if radius.is_nan() || radius < 0.0 {
            return Err(GnatError::invalid_input(format!(
                "radius must be non-negative, got {}",
                radius
            )));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let mut found = WithinRadius::new(radius);
        self.search(query, &mut found)?;
        self.to_results(found.into_sorted_vec())
    }

    fn to_results(&self, candidates: Vec<Candidate>) -> Result<Vec<SearchResult>> {
        candidates
            .into_iter()
            .map(|c| {
                Ok(SearchResult {
                    id: c.id,
                    point: self.store.point(c.id)?.clone(),
                    distance: c.distance,
                })
            })
            .collect()
    }

    fn search<C: Collector>(&self, query: &Point, collector: &mut C) -> Result<()> {
        let Some(root) = self.root else {
            return Ok(());
        };
        let metric = self.require_metric()?;

        let mut queue = NodeQueue::new();
        queue.push(root, 0.0);
        let mut pivot_dist = Vec::new();
        let mut pruned = Vec::new();
        let mut visited = 0usize;

        while let Some(pending) = queue.pop() {
            if exceeds(pending.lower_bound, collector.bound()) {
                break;
            }
            visited += 1;
            let node = &self.nodes[pending.node];

            for &id in &node.bucket {
                if !self.store.is_live(id) {
                    continue;
                }
                let d = metric.distance(query, self.store.point(id)?)?;
                collector.offer(Candidate::new(id, d));
            }
            if node.is_leaf() {
                continue;
            }

            let n = node.children.len();
            pivot_dist.clear();
            pivot_dist.resize(n, f64::NAN);
            pruned.clear();
            pruned.resize(n, false);

            for i in 0..n {
                if pruned[i] {
                    continue;
                }
                let child_id = node.children[i];
                let pivot = self.pivot_of(child_id)?;
                let d = metric.distance(query, self.store.point(pivot)?)?;
                pivot_dist[i] = d;
                collector.offer(Candidate::new(pivot, d));

                let r = collector.bound();
                if r.is_infinite() {
                    continue;
                }
                let child = &self.nodes[child_id];
                for j in 0..n {
                    if j == i || pruned[j] {
                        continue;
                    }
                    if exceeds(d - r, child.max_range[j]) || exceeds(child.min_range[j], d + r) {
                        pruned[j] = true;
                    }
                }
            }

            for i in 0..n {
                if pruned[i] {
                    continue;
                }
                let child_id = node.children[i];
                let child = &self.nodes[child_id];
                // Only the pivot is left, and it has been offered already.
                if child.is_leaf() && child.live <= 1 {
                    continue;
                }
                let d = pivot_dist[i];
                let lower = (d - child.max_radius).max(child.min_radius - d).max(0.0);
                if !exceeds(lower, collector.bound()) {
                    queue.push(child_id, lower);
                }
            }
        }

        tracing::trace!("search visited {} nodes", visited);
        Ok(())
    }
}
