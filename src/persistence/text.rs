//! Text point files: one point per line, coordinates separated by single
//! spaces.
//!
//! Coordinates are written with the shortest representation that parses back
//! to the same `f64`, so a save/load cycle is lossless. Blank lines are
//! ignored on read. Only the live point set is stored, not the tree shape.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{GnatError, Result};
use crate::point::Point;

/// Write points to `writer`, one per line. Returns the number written.
pub fn write_points<'a, W, I>(writer: &mut W, points: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Point>,
{
    let mut count = 0;
    for point in points {
        writeln!(writer, "{}", point)?;
        count += 1;
    }
    Ok(count)
}

/// Parse every point from `reader`. Each non-blank line must hold the same
/// number of finite coordinates as the first one.
pub fn read_points<R: BufRead>(reader: R) -> Result<Vec<Point>> {
    let mut points = Vec::new();
    let mut dimension = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }

        let coords = line
            .split_whitespace()
            .map(|token| parse_coordinate(token, line_no))
            .collect::<Result<Vec<f64>>>()?;

        match dimension {
            None => dimension = Some(coords.len()),
            Some(expected) if expected != coords.len() => {
                return Err(GnatError::Parse {
                    line: line_no,
                    reason: format!("expected {} coordinates, found {}", expected, coords.len()),
                });
            }
            Some(_) => {}
        }
        points.push(Point::new(coords));
    }

    Ok(points)
}

fn parse_coordinate(token: &str, line: usize) -> Result<f64> {
    let value = token.parse::<f64>().map_err(|_| GnatError::Parse {
        line,
        reason: format!("invalid number '{}'", token),
    })?;
    if !value.is_finite() {
        return Err(GnatError::Parse {
            line,
            reason: format!("coordinate '{}' is not finite", token),
        });
    }
    Ok(value)
}

/// Save points to a file, replacing it. Returns the number written.
pub fn save_points<'a, I>(path: impl AsRef<Path>, points: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Point>,
{
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    let count = write_points(&mut writer, points)?;
    writer.flush()?;
    tracing::info!("saved {} points to {}", count, path.display());
    Ok(count)
}

/// Load every point stored in a file.
pub fn load_points(path: impl AsRef<Path>) -> Result<Vec<Point>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let points = read_points(reader)?;
    tracing::info!("loaded {} points from {}", points.len(), path.display());
    Ok(points)
}
