//! # GNAT
//!
//! A dynamic nearest-neighbor index over arbitrary metric spaces, built on a
//! Geometric Near-neighbor Access Tree.
//!
//! This library provides:
//! - Incremental insertion with sampled pivots and degree-bounded nodes
//! - Lazy removal with a bounded tombstone cache
//! - Nearest, k-nearest and radius queries pruned by the triangle inequality
//! - A brute-force reference index sharing the same trait
//! - Plain-text save/load of the point set
//!
//! ## Example
//!
//! ```rust
//! use gnat::{DistanceMetric, Gnat, GnatConfig, Point};
//!
//! let mut index = Gnat::with_metric(GnatConfig::default(), DistanceMetric::Euclidean).unwrap();
//! index.add(Point::new(vec![0.0, 0.0])).unwrap();
//! index.add(Point::new(vec![10.0, 0.0])).unwrap();
//!
//! let hit = index.nearest(&Point::new(vec![1.0, 1.0])).unwrap();
//! assert_eq!(hit.point, Point::new(vec![0.0, 0.0]));
//! ```

pub mod config;
pub mod distance;
pub mod error;
pub mod flat_index;
pub mod gnat;
pub mod index;
pub mod persistence;
pub mod point;
mod store;

pub use config::GnatConfig;
pub use distance::{DistanceMetric, Metric};
pub use error::{GnatError, Result};
pub use flat_index::LinearIndex;
pub use gnat::{Gnat, TreeStats};
pub use index::{NearestNeighbors, SearchResult};
pub use point::Point;
pub use store::PointId;
