//! Lazy removal, tombstone compaction and underpopulated-node collapse.
//!
//! Removing a bucket point only marks it. Tombstones are skipped by queries
//! and physically dropped once their number reaches `removed_cache_size`.
//! A removed pivot is replaced by the closest surviving point of its own
//! subtree, and the node's bounds are widened by the distance between the two
//! pivots. A subtree with nothing left to promote is dropped from its parent,
//! or, when that would leave the parent short of children, the parent is
//! rebuilt.

use std::collections::HashMap;

use crate::config::LEAF_TOMBSTONE_RATIO;
use crate::distance::Metric;
use crate::error::{GnatError, Result};
use crate::point::Point;
use crate::store::PointId;

use super::builder::Body;
use super::node::NodeId;
use super::search::exceeds;
use super::Gnat;

/// Where a live point sits in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    /// In the bucket of a leaf.
    Bucket(NodeId),
    /// Pivot of the `position`-th child of `parent`.
    Pivot { parent: NodeId, position: usize },
}

/// The point of a subtree closest to a pivot being replaced.
struct Member {
    id: PointId,
    distance: f64,
    /// Nodes below the searched one, down to the node whose bucket or child
    /// list holds the point.
    route: Vec<NodeId>,
    holder: Location,
}

/// `pivot` takes over `node`, `shift` away from the pivot it replaces.
struct Promotion {
    node: NodeId,
    pivot: PointId,
    shift: f64,
}

/// What happens to the slot left by the last promoted point.
enum Vacancy {
    /// The point leaves this leaf bucket.
    Bucket { leaf: NodeId, id: PointId },
    /// The child has nothing left and is dropped.
    Drop { parent: NodeId, position: usize },
    /// Dropping the child would leave `parent` short of children.
    Rebuild { parent: NodeId, body: Body },
}

/// Everything a pivot removal changes, computed before anything changes.
struct PivotPlan {
    promotions: Vec<Promotion>,
    vacancy: Vacancy,
    /// Nodes losing one live point.
    shrunk: Vec<NodeId>,
    /// Tombstones released along with a dropped or rebuilt subtree.
    dead: Vec<PointId>,
}

impl Gnat {
    /// Remove a point by id. Returns `Ok(false)` when the id is unknown or
    /// already removed.
    pub fn remove(&mut self, id: PointId) -> Result<bool> {
        if !self.store.is_live(id) {
            return Ok(false);
        }
        let root = self
            .root
            .ok_or_else(|| GnatError::InvalidState(format!("point {} is live but the tree is empty", id)))?;
        let (path, location) = self.locate(root, id)?;

        match location {
            Location::Bucket(leaf) => {
                self.store.tombstone(id);
                for &n in &path {
                    self.nodes[n].live -= 1;
                }
                self.nodes[leaf].tombstones += 1;

                if self.store.tombstones() >= self.config.removed_cache_size {
                    self.compact();
                    return Ok(true);
                }
                if self.config.rebalancing {
                    let node = &self.nodes[leaf];
                    if node.tombstones as f64 >= node.bucket.len() as f64 * LEAF_TOMBSTONE_RATIO {
                        self.purge_leaf(leaf);
                    }
                }
            }
            Location::Pivot { parent, position } => {
                let plan = self.plan_pivot_removal(path.clone(), parent, position)?;
                self.apply_pivot_removal(id, plan);
            }
        }

        self.collapse_along(&path);
        Ok(true)
    }

    /// Physically drop every tombstone. With rebalancing enabled,
    /// underpopulated subtrees are folded back into leaves on the way.
    pub fn compact(&mut self) {
        let Some(root) = self.root else {
            return;
        };
        let purged = self.store.tombstones();
        if self.store.len() == 0 {
            self.install_root(None);
            tracing::debug!("compaction released an empty tree ({} tombstones)", purged);
            return;
        }

        let threshold = self.config.collapse_threshold();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.is_leaf() {
                if node.tombstones > 0 {
                    self.purge_leaf(id);
                }
            } else if self.config.rebalancing && self.own_points(id) <= threshold {
                self.collapse(id);
            } else {
                stack.extend(node.children.iter().copied());
            }
        }
        tracing::debug!(
            "compacted tree: purged {} tombstones, {} live points remain ({} stored)",
            purged,
            self.store.len(),
            self.store.stored()
        );
    }

    /// Find `id` through the cached bounds: a child is entered only when its
    /// radius and every sibling range admit the point. The path runs from the
    /// root to the leaf holding it, or to the parent of the node it is the
    /// pivot of.
    fn locate(&self, root: NodeId, id: PointId) -> Result<(Vec<NodeId>, Location)> {
        let metric = self.require_metric()?;
        let point = self.store.point(id)?;
        let mut path = Vec::new();
        match self.find(metric, point, id, root, &mut path)? {
            Some(location) => Ok((path, location)),
            None => Err(GnatError::InvalidState(format!(
                "point {} lies outside the bounds of every subtree; the distance function is not deterministic",
                id
            ))),
        }
    }

    fn find(
        &self,
        metric: &Metric,
        point: &Point,
        id: PointId,
        node: NodeId,
        path: &mut Vec<NodeId>,
    ) -> Result<Option<Location>> {
        path.push(node);
        let current = &self.nodes[node];
        if current.bucket.contains(&id) {
            return Ok(Some(Location::Bucket(node)));
        }
        if let Some(position) = current.children.iter().position(|&c| self.nodes[c].pivot == Some(id)) {
            return Ok(Some(Location::Pivot { parent: node, position }));
        }
        if !current.is_leaf() {
            let distances = self.pivot_distances(metric, point, node)?;
            let mut order: Vec<usize> = (0..distances.len()).collect();
            order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]).then(a.cmp(&b)));
            for j in order {
                let child = current.children[j];
                let c = &self.nodes[child];
                if exceeds(c.min_radius, distances[j]) || exceeds(distances[j], c.max_radius) {
                    continue;
                }
                let outside = current.children.iter().enumerate().any(|(i, &sibling)| {
                    let s = &self.nodes[sibling];
                    exceeds(s.min_range[j], distances[i]) || exceeds(distances[i], s.max_range[j])
                });
                if outside {
                    continue;
                }
                if let Some(location) = self.find(metric, point, id, child, path)? {
                    return Ok(Some(location));
                }
            }
        }
        path.pop();
        Ok(None)
    }

    /// Plan the removal of the pivot of the `position`-th child of `parent`.
    /// `shrunk` holds the path from the root to `parent`.
    ///
    /// The closest point below the child replaces its pivot. When that point
    /// is itself the pivot of a deeper node, the same step repeats there.
    fn plan_pivot_removal(
        &mut self,
        mut shrunk: Vec<NodeId>,
        mut parent: NodeId,
        mut position: usize,
    ) -> Result<PivotPlan> {
        let metric = self.require_metric()?.clone();
        let mut promotions = Vec::new();
        loop {
            let node = self.nodes[parent].children[position];
            let old = self.pivot_of(node)?;
            let Some(member) = self.closest_member(&metric, node, old)? else {
                if self.nodes[parent].children.len() > self.config.min_degree {
                    let (_, dead) = self.gather(node);
                    return Ok(PivotPlan {
                        promotions,
                        vacancy: Vacancy::Drop { parent, position },
                        shrunk,
                        dead,
                    });
                }
                let (mut members, dead) = self.gather(parent);
                members.retain(|&m| m != old);
                let degree = self.nodes[parent].degree;
                let body = self.plan_body(degree, members)?;
                return Ok(PivotPlan {
                    promotions,
                    vacancy: Vacancy::Rebuild { parent, body },
                    shrunk,
                    dead,
                });
            };

            shrunk.push(node);
            shrunk.extend(member.route.iter().copied());
            promotions.push(Promotion {
                node,
                pivot: member.id,
                shift: member.distance,
            });
            match member.holder {
                Location::Bucket(leaf) => {
                    return Ok(PivotPlan {
                        promotions,
                        vacancy: Vacancy::Bucket { leaf, id: member.id },
                        shrunk,
                        dead: Vec::new(),
                    });
                }
                Location::Pivot { parent: holder, position: slot } => {
                    parent = holder;
                    position = slot;
                }
            }
        }
    }

    /// The live point below `node` closest to its pivot `old`, ties to the
    /// lowest id. `None` when the pivot is all that is left.
    fn closest_member(&self, metric: &Metric, node: NodeId, old: PointId) -> Result<Option<Member>> {
        let origin = self.store.point(old)?;
        let mut parents = HashMap::new();
        let mut best: Option<(f64, PointId, Location)> = None;
        let mut consider = |distance: f64, id: PointId, holder: Location| {
            let closer = match best {
                Some((d, b, _)) => distance.total_cmp(&d).then(id.cmp(&b)).is_lt(),
                None => true,
            };
            if closer {
                best = Some((distance, id, holder));
            }
        };

        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            let current = &self.nodes[n];
            for &b in &current.bucket {
                if self.store.is_live(b) {
                    consider(metric.distance(self.store.point(b)?, origin)?, b, Location::Bucket(n));
                }
            }
            for (position, &child) in current.children.iter().enumerate() {
                let pivot = self.pivot_of(child)?;
                consider(
                    metric.distance(self.store.point(pivot)?, origin)?,
                    pivot,
                    Location::Pivot { parent: n, position },
                );
                parents.insert(child, n);
                stack.push(child);
            }
        }

        let Some((distance, id, holder)) = best else {
            return Ok(None);
        };
        let mut at = match holder {
            Location::Bucket(leaf) => leaf,
            Location::Pivot { parent, .. } => parent,
        };
        let mut route = Vec::new();
        while at != node {
            route.push(at);
            at = *parents
                .get(&at)
                .ok_or_else(|| GnatError::InvalidState("subtree walk lost a parent link".to_string()))?;
        }
        route.reverse();
        Ok(Some(Member {
            id,
            distance,
            route,
            holder,
        }))
    }

    fn apply_pivot_removal(&mut self, id: PointId, plan: PivotPlan) {
        self.store.tombstone(id);
        self.store.purge(id);
        for d in plan.dead {
            self.store.purge(d);
        }
        for &n in &plan.shrunk {
            self.nodes[n].live -= 1;
        }
        let promoted = plan.promotions.len();
        for Promotion { node, pivot, shift } in plan.promotions {
            let node = &mut self.nodes[node];
            node.pivot = Some(pivot);
            node.widen(shift);
        }

        match plan.vacancy {
            Vacancy::Bucket { leaf, id: moved } => {
                self.nodes[leaf].bucket.retain(|&b| b != moved);
            }
            Vacancy::Drop { parent, position } => {
                let dropped = self.nodes[parent].children.remove(position);
                for sibling in self.nodes[parent].children.clone() {
                    let s = &mut self.nodes[sibling];
                    s.min_range.remove(position);
                    s.max_range.remove(position);
                }
                self.nodes.release(dropped);
            }
            Vacancy::Rebuild { parent, body } => {
                let degree = self.nodes[parent].degree;
                self.nodes.install(parent, degree, body);
                tracing::debug!(
                    "rebuilt a subtree of {} points after removing pivot {}",
                    self.own_points(parent),
                    id
                );
            }
        }
        tracing::trace!("removed pivot {} with {} promotions", id, promoted);
    }

    /// Fold the topmost underpopulated internal node on `path` into a leaf.
    fn collapse_along(&mut self, path: &[NodeId]) {
        if !self.config.rebalancing {
            return;
        }
        let threshold = self.config.collapse_threshold();
        let target = path
            .iter()
            .copied()
            .find(|&n| !self.nodes[n].is_leaf() && self.own_points(n) <= threshold);
        if let Some(node) = target {
            self.collapse(node);
        }
    }

    /// Turn `node` into a leaf holding every live point below it. Tombstones
    /// in the subtree are purged. Bounds stay valid since the point set does
    /// not change.
    fn collapse(&mut self, node: NodeId) {
        let (live, dead) = self.gather(node);
        for d in dead {
            self.store.purge(d);
        }
        let degree = self.nodes[node].degree;
        tracing::trace!("collapsing a subtree of {} points into a leaf", live.len());
        self.nodes.install(node, degree, Body::Leaf(live));
    }

    fn purge_leaf(&mut self, leaf: NodeId) {
        let bucket = std::mem::take(&mut self.nodes[leaf].bucket);
        let (live, dead): (Vec<PointId>, Vec<PointId>) =
            bucket.into_iter().partition(|&b| self.store.is_live(b));
        for d in dead {
            self.store.purge(d);
        }
        let node = &mut self.nodes[leaf];
        node.bucket = live;
        node.tombstones = 0;
    }

    /// Live and tombstoned points below `node`, its own pivot excluded.
    fn gather(&self, node: NodeId) -> (Vec<PointId>, Vec<PointId>) {
        let mut live = Vec::new();
        let mut dead = Vec::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            let current = &self.nodes[n];
            if n != node {
                live.extend(current.pivot);
            }
            for &b in &current.bucket {
                if self.store.is_live(b) {
                    live.push(b);
                } else {
                    dead.push(b);
                }
            }
            stack.extend(current.children.iter().copied());
        }
        live.sort();
        (live, dead)
    }
}
