//! Point storage addressed by stable ids.
//!
//! The store owns every point payload. Ids are handed out in insertion order
//! and never reused until [`PointStore::clear`]. A removed point stays
//! physically present as a tombstone until it is purged by a compaction.

use crate::error::{GnatError, Result};
use crate::point::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable handle of an inserted point; doubles as its insertion index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId(usize);

impl PointId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// The insertion index of this point.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointState {
    Live,
    Removed,
}

#[derive(Debug, Clone)]
struct StoredPoint {
    point: Point,
    state: PointState,
}

/// Points keyed by id. Purged tombstones leave the map, so its size follows
/// live points plus pending tombstones, not the number of insertions.
#[derive(Debug, Default)]
pub(crate) struct PointStore {
    points: BTreeMap<PointId, StoredPoint>,
    next: usize,
    live: usize,
    tombstones: usize,
}

impl PointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a point and assign it the next id.
    pub fn insert(&mut self, point: Point) -> PointId {
        let id = PointId(self.next);
        self.next += 1;
        self.points.insert(
            id,
            StoredPoint {
                point,
                state: PointState::Live,
            },
        );
        self.live += 1;
        id
    }

    /// Drop every point inserted at or after `first`, handing their ids back.
    /// Only used to undo an insertion that never reached the tree.
    pub fn discard_from(&mut self, first: PointId) {
        for stored in self.points.split_off(&first).into_values() {
            match stored.state {
                PointState::Live => self.live -= 1,
                PointState::Removed => self.tombstones -= 1,
            }
        }
        self.next = self.next.min(first.0);
    }

    /// The id the next insertion will receive.
    pub fn next_id(&self) -> PointId {
        PointId(self.next)
    }

    /// A live point, or `None` if unknown, removed or purged.
    pub fn get(&self, id: PointId) -> Option<&Point> {
        match self.points.get(&id) {
            Some(stored) if stored.state == PointState::Live => Some(&stored.point),
            _ => None,
        }
    }

    /// A physically present point, live or tombstoned.
    pub fn point(&self, id: PointId) -> Result<&Point> {
        self.points
            .get(&id)
            .map(|stored| &stored.point)
            .ok_or_else(|| GnatError::InvalidState(format!("point {} is not stored", id)))
    }

    pub fn is_live(&self, id: PointId) -> bool {
        self.get(id).is_some()
    }

    /// Turn a live point into a tombstone. Returns false if it was not live.
    pub fn tombstone(&mut self, id: PointId) -> bool {
        match self.points.get_mut(&id) {
            Some(stored) if stored.state == PointState::Live => {
                stored.state = PointState::Removed;
                self.live -= 1;
                self.tombstones += 1;
                true
            }
            _ => false,
        }
    }

    /// Physically drop a tombstone. Live points are left untouched.
    pub fn purge(&mut self, id: PointId) {
        if matches!(self.points.get(&id), Some(stored) if stored.state == PointState::Removed) {
            self.points.remove(&id);
            self.tombstones -= 1;
        }
    }

    /// Physically drop every tombstone.
    pub fn purge_all(&mut self) {
        self.points.retain(|_, stored| stored.state == PointState::Live);
        self.tombstones = 0;
    }

    /// Iterate over live points in insertion order.
    pub fn iter_live(&self) -> impl Iterator<Item = (PointId, &Point)> {
        self.points
            .iter()
            .filter(|(_, stored)| stored.state == PointState::Live)
            .map(|(&id, stored)| (id, &stored.point))
    }

    pub fn live_ids(&self) -> Vec<PointId> {
        self.iter_live().map(|(id, _)| id).collect()
    }

    /// Number of live points.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// Points physically held, tombstones included.
    pub fn stored(&self) -> usize {
        self.points.len()
    }

    /// True when nothing is stored, not even a tombstone.
    pub fn is_vacant(&self) -> bool {
        self.points.is_empty()
    }

    /// Drop everything and restart numbering at zero.
    pub fn clear(&mut self) {
        self.points.clear();
        self.next = 0;
        self.live = 0;
        self.tombstones = 0;
    }
}
