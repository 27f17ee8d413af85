//! Persistence layer: the plain-text point format.

pub mod text;

pub use text::{load_points, read_points, save_points, write_points};
