//! Calibration origin file.
//!
//! Three lines of decimal text: origin x, origin y, origin z.  Blank lines
//! are ignored and anything after the third value is not read.

use std::fs;
use std::path::Path;

use topscan_types::{Origin, ScanError};

/// Load an origin from `path`.
///
/// # Errors
///
/// Returns [`ScanError::Io`] when the file cannot be read,
/// [`ScanError::Parse`] for a non-numeric line, and
/// [`ScanError::Calibration`] when fewer than three values are present.
pub fn read_origin(path: impl AsRef<Path>) -> Result<Origin, ScanError> {
    parse_origin(&fs::read_to_string(path)?)
}

/// Parse an origin from the file's text.
pub fn parse_origin(text: &str) -> Result<Origin, ScanError> {
    let mut values = [0.0f32; 3];
    let mut found = 0;
    for (index, line) in text.lines().enumerate() {
        if found == values.len() {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        values[found] = trimmed.parse().map_err(|_| ScanError::Parse {
            line: index + 1,
            content: line.to_string(),
        })?;
        found += 1;
    }
    if found < values.len() {
        return Err(ScanError::Calibration(format!(
            "expected 3 coordinates, found {found}"
        )));
    }
    Ok(Origin::new(values[0], values[1], values[2]))
}

/// Write `origin` to `path` in the three-line format.
///
/// # Errors
///
/// Returns [`ScanError::Io`] if the file cannot be written.
pub fn write_origin(path: impl AsRef<Path>, origin: Origin) -> Result<(), ScanError> {
    let p = origin.point();
    fs::write(path, format!("{}\n{}\n{}\n", p.x, p.y, p.z))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_lines() {
        let origin = parse_origin("10\n-2.5\n100.25\n").unwrap();
        assert_eq!(origin, Origin::new(10.0, -2.5, 100.25));
    }

    #[test]
    fn tolerates_blank_lines_and_trailing_text() {
        let origin = parse_origin("\n 1 \n\n2\n3\nignored\n").unwrap();
        assert_eq!(origin, Origin::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn too_few_values_is_calibration_error() {
        let err = parse_origin("1\n2\n").unwrap_err();
        assert!(matches!(err, ScanError::Calibration(_)));
    }

    #[test]
    fn non_numeric_line_is_parse_error() {
        let err = parse_origin("1\nabc\n3\n").unwrap_err();
        assert!(matches!(err, ScanError::Parse { line: 2, .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let err = read_origin(dir.path().join("coordinates.txt")).unwrap_err();
        assert!(matches!(err, ScanError::Io(_)));
    }

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("coordinates.txt");
        write_origin(&path, Origin::new(0.5, -7.0, 250.0)).unwrap();
        assert_eq!(read_origin(&path).unwrap(), Origin::new(0.5, -7.0, 250.0));
    }
}
