//! Plain-text point files.
//!
//! One point per line as `"<x> <y> <z>\n"`, space separated, no header.
//! Values are written in their shortest round-trip decimal form, so reading
//! a written file gives back the exact same points.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use topscan_types::{Point, ScanError};
use tracing::info;

/// Write `points` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`ScanError::Io`] if the file cannot be created or written.
pub fn write_points(path: impl AsRef<Path>, points: &[Point]) -> Result<(), ScanError> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_to(&mut writer, points)?;
    writer.flush()?;
    info!(path = %path.display(), count = points.len(), "point file written");
    Ok(())
}

/// Serialise `points` into any writer.
pub fn write_to<W: Write>(writer: &mut W, points: &[Point]) -> Result<(), ScanError> {
    for p in points {
        writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
    }
    Ok(())
}

/// Read every point from `path`.
///
/// # Errors
///
/// Returns [`ScanError::Io`] if the file cannot be read and
/// [`ScanError::Parse`] for a line that is not exactly three numbers.
pub fn read_points(path: impl AsRef<Path>) -> Result<Vec<Point>, ScanError> {
    parse_points(BufReader::new(File::open(path)?))
}

/// Parse points from any buffered reader.  Blank lines are skipped.
pub fn parse_points<R: BufRead>(reader: R) -> Result<Vec<Point>, ScanError> {
    let mut points = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        points.push(parse_line(&line).ok_or_else(|| ScanError::Parse {
            line: index + 1,
            content: line.clone(),
        })?);
    }
    Ok(points)
}

fn parse_line(line: &str) -> Option<Point> {
    let mut fields = line.split_whitespace().map(str::parse::<f32>);
    let x = fields.next()?.ok()?;
    let y = fields.next()?.ok()?;
    let z = fields.next()?.ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(Point::new(x, y, z))
}
