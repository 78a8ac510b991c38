//! `topscan-types` – shared data model for the TopScan workspace.
//!
//! Every other crate speaks in these types: sensor and machine-space
//! [`Point`]s, the calibration [`Origin`], raw [`DepthFrame`]s handed over by
//! the acquisition layer, and the [`StatusResponse`] returned by position
//! polls.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A 3-D coordinate.
///
/// Machine-space unless the producing API says otherwise.  In sensor space a
/// `z` of zero means "no return" and never describes a real surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point {
    /// Create a new point.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The point at (0, 0, 0).
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Component-wise sum.
    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    /// True when this sensor-space sample carries no depth return.
    pub fn is_no_return(&self) -> bool {
        self.z == 0.0
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}; {}; {})", self.x, self.y, self.z)
    }
}

/// Machine-space offset of the sensor's reference frame.
///
/// Starts at (0, 0, 0) and is replaced wholesale on every calibration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Origin(Point);

impl Origin {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Point::new(x, y, z))
    }

    /// The offset as a plain point.
    pub fn point(&self) -> Point {
        self.0
    }
}

impl From<Point> for Origin {
    fn from(p: Point) -> Self {
        Self(p)
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Depth frames
// ────────────────────────────────────────────────────────────────────────────

/// Pixel encoding reported by a depth device for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Depth in millimetres.
    Depth1Mm,
    /// Depth in units of 100 µm.
    Depth100Um,
    /// Packed disparity shift values.
    Shift9_2,
    Shift9_3,
    /// Non-depth formats some devices can be switched into.
    Gray16,
    Rgb888,
}

impl PixelFormat {
    /// True for the formats the geometry pipeline can consume.
    pub fn is_depth(&self) -> bool {
        matches!(self, PixelFormat::Depth1Mm | PixelFormat::Depth100Um)
    }
}

/// One rectangular grid of unsigned depth samples in sensor-native units,
/// stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    width: u32,
    height: u32,
    format: PixelFormat,
    samples: Vec<u16>,
}

impl DepthFrame {
    /// Wrap `samples` as a `width × height` frame.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::FrameSize`] when the sample count does not match
    /// the declared dimensions.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        samples: Vec<u16>,
    ) -> Result<Self, ScanError> {
        let expected = width as usize * height as usize;
        if samples.len() != expected {
            return Err(ScanError::FrameSize {
                width,
                height,
                len: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Depth sample at pixel (`x`, `y`), or `None` outside the frame.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Iterate `(x, y, depth)` over every pixel, row by row.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32, u16)> + '_ {
        let width = self.width.max(1);
        self.samples
            .iter()
            .enumerate()
            .map(move |(i, &d)| ((i as u32) % width, (i as u32) / width, d))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Machine telemetry
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of one position poll.
///
/// A failed read always carries zero coordinates; see
/// [`StatusResponse::failed`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl StatusResponse {
    /// The canonical failed read: `success == false` at (0, 0, 0).
    pub fn failed() -> Self {
        Self::default()
    }

    /// A successful read at (`x`, `y`, `z`).
    pub fn ok(x: f32, y: f32, z: f32) -> Self {
        Self {
            success: true,
            x,
            y,
            z,
        }
    }

    /// Reported position, only for successful reads.
    pub fn position(&self) -> Option<Point> {
        self.success.then(|| Point::new(self.x, self.y, self.z))
    }
}

/// Errors shared by the perception and persistence layers.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error on line {line}: {content:?}")]
    Parse { line: usize, content: String },

    #[error("Calibration source invalid: {0}")]
    Calibration(String),

    #[error("Frame of {width}x{height} cannot hold {len} samples")]
    FrameSize { width: u32, height: u32, len: usize },
}
