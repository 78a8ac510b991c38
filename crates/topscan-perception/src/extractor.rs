//! Frame-to-point extraction.
//!
//! A depth frame becomes a machine-space point set in two steps: every
//! pixel with a depth return is projected into sensor space by a
//! [`DepthConverter`], then translated by the calibration [`Origin`].
//!
//! Two translations exist because sensor z is a distance from the sensor
//! while machine z is a height:
//!
//! | [`Translation`] | machine point |
//! |---|---|
//! | `Additive` | (ox + sx, oy + sy, oz + sz) |
//! | `Height`   | (ox + sx, oy + sy, oz − sz) |
//!
//! # Example
//!
//! ```rust
//! use topscan_perception::extractor::{to_machine_point, Translation};
//! use topscan_types::{Origin, Point};
//!
//! let origin = Origin::new(10.0, 10.0, 100.0);
//! let p = to_machine_point(Point::new(1.0, 2.0, 30.0), origin).unwrap();
//! assert_eq!(p, Point::new(11.0, 12.0, 70.0));
//! ```

use serde::{Deserialize, Serialize};
use topscan_types::{DepthFrame, Origin, PixelFormat, Point};
use tracing::debug;

/// Projects one depth sample into sensor space.
pub trait DepthConverter {
    /// Sensor-space point for pixel (`x`, `y`) holding `depth`.
    fn depth_to_world(&self, x: u32, y: u32, depth: u16) -> Point;
}

/// Angular field of view of a depth sensor, in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFov {
    pub horizontal: f32,
    pub vertical: f32,
}

impl Default for SensorFov {
    /// Field of view of the common structured-light depth sensors.
    fn default() -> Self {
        Self {
            horizontal: 1.022_6,
            vertical: 0.796_615_7,
        }
    }
}

/// Pinhole projection driven only by resolution and field of view.
///
/// Pixel coordinates are normalised to [-0.5, 0.5] around the image centre
/// (y pointing up) and scaled by depth times the tangent of the half-angle.
/// Output units are millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FovConverter {
    width: f32,
    height: f32,
    xz_factor: f32,
    yz_factor: f32,
    unit_mm: f32,
}

impl FovConverter {
    /// Converter for a `width × height` millimetre-depth stream.
    pub fn new(width: u32, height: u32, fov: SensorFov) -> Self {
        Self {
            width: width.max(1) as f32,
            height: height.max(1) as f32,
            xz_factor: (fov.horizontal / 2.0).tan() * 2.0,
            yz_factor: (fov.vertical / 2.0).tan() * 2.0,
            unit_mm: 1.0,
        }
    }

    /// Converter matched to the resolution and depth unit of `frame`.
    pub fn for_frame(frame: &DepthFrame, fov: SensorFov) -> Self {
        let unit_mm = match frame.format() {
            PixelFormat::Depth100Um => 0.1,
            _ => 1.0,
        };
        Self {
            unit_mm,
            ..Self::new(frame.width(), frame.height(), fov)
        }
    }
}

impl DepthConverter for FovConverter {
    fn depth_to_world(&self, x: u32, y: u32, depth: u16) -> Point {
        let z = f32::from(depth) * self.unit_mm;
        let nx = x as f32 / self.width - 0.5;
        let ny = 0.5 - y as f32 / self.height;
        Point::new(nx * z * self.xz_factor, ny * z * self.yz_factor, z)
    }
}

/// How a sensor-space point is moved into machine space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Translation {
    /// Plain component-wise offset; keeps z as a depth.
    Additive,
    /// Offset with z flipped into a height above the machine origin.
    #[default]
    Height,
}

impl Translation {
    /// Translate `sensor` by `origin`.  Returns `None` for no-return samples.
    pub fn apply(self, sensor: Point, origin: Origin) -> Option<Point> {
        if sensor.is_no_return() {
            return None;
        }
        let o = origin.point();
        Some(match self {
            Translation::Additive => o.add(sensor),
            Translation::Height => Point::new(o.x + sensor.x, o.y + sensor.y, o.z - sensor.z),
        })
    }
}

impl Translation {
    /// Re-express `machine`, produced by this translation from `origin`, as
    /// the point [`Translation::Height`] would have produced.
    pub fn to_height(self, machine: Point, origin: Origin) -> Point {
        match self {
            Translation::Height => machine,
            Translation::Additive => {
                let oz = origin.point().z;
                Point::new(machine.x, machine.y, oz - (machine.z - oz))
            }
        }
    }
}

/// Height translation of a single sensor point.
pub fn to_machine_point(sensor: Point, origin: Origin) -> Option<Point> {
    Translation::Height.apply(sensor, origin)
}

/// Height translation of a sensor point set, dropping no-return samples.
pub fn to_machine_points(sensor: &[Point], origin: Origin) -> Vec<Point> {
    sensor
        .iter()
        .filter_map(|&p| to_machine_point(p, origin))
        .collect()
}

/// Extract every depth return of `frame` as a machine-space point.
///
/// Pixels with a zero depth sample are skipped; they never become points.
pub fn extract_points(
    frame: &DepthFrame,
    converter: &dyn DepthConverter,
    origin: Origin,
    translation: Translation,
) -> Vec<Point> {
    let mut points = Vec::new();
    append_points(frame, converter, origin, translation, &mut points);
    points
}

/// Like [`extract_points`] but appends to an existing set.  Returns the
/// number of points added.  No sorting or deduplication is performed.
pub fn append_points(
    frame: &DepthFrame,
    converter: &dyn DepthConverter,
    origin: Origin,
    translation: Translation,
    out: &mut Vec<Point>,
) -> usize {
    let before = out.len();
    out.extend(
        frame
            .pixels()
            .filter(|&(_, _, depth)| depth != 0)
            .filter_map(|(x, y, depth)| {
                translation.apply(converter.depth_to_world(x, y, depth), origin)
            }),
    );
    let added = out.len() - before;
    debug!(
        width = frame.width(),
        height = frame.height(),
        added,
        ?translation,
        "extracted points from frame"
    );
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Maps pixel (x, y, d) straight to (x, y, d).
    struct Identity;

    impl DepthConverter for Identity {
        fn depth_to_world(&self, x: u32, y: u32, depth: u16) -> Point {
            Point::new(x as f32, y as f32, f32::from(depth))
        }
    }

    fn frame(width: u32, height: u32, samples: Vec<u16>) -> DepthFrame {
        DepthFrame::new(width, height, PixelFormat::Depth1Mm, samples).unwrap()
    }

    #[test]
    fn height_translation_flips_z() {
        let origin = Origin::new(10.0, 10.0, 100.0);
        let p = to_machine_point(Point::new(1.0, 2.0, 30.0), origin).unwrap();
        assert_eq!(p, Point::new(11.0, 12.0, 70.0));
    }

    #[test]
    fn additive_translation_adds_all_axes() {
        let origin = Origin::new(10.0, 10.0, 100.0);
        let p = Translation::Additive
            .apply(Point::new(1.0, 2.0, 30.0), origin)
            .unwrap();
        assert_eq!(p, Point::new(11.0, 12.0, 130.0));
    }

    #[test]
    fn additive_points_convert_to_heights() {
        let origin = Origin::new(10.0, 10.0, 100.0);
        let sensor = Point::new(1.0, 2.0, 30.0);
        let additive = Translation::Additive.apply(sensor, origin).unwrap();
        assert_eq!(
            Translation::Additive.to_height(additive, origin),
            Translation::Height.apply(sensor, origin).unwrap()
        );
        let height = Point::new(11.0, 12.0, 70.0);
        assert_eq!(Translation::Height.to_height(height, origin), height);
    }

    #[test]
    fn no_return_points_never_translate() {
        let origin = Origin::new(1.0, 1.0, 1.0);
        for t in [Translation::Additive, Translation::Height] {
            assert!(t.apply(Point::new(3.0, 4.0, 0.0), origin).is_none());
        }
        let out = to_machine_points(
            &[Point::new(1.0, 1.0, 0.0), Point::new(1.0, 1.0, 5.0)],
            origin,
        );
        assert_eq!(out, vec![Point::new(2.0, 2.0, -4.0)]);
    }

    #[test]
    fn all_zero_frame_yields_nothing() {
        let f = frame(4, 3, vec![0; 12]);
        for t in [Translation::Additive, Translation::Height] {
            assert!(extract_points(&f, &Identity, Origin::default(), t).is_empty());
        }
    }

    #[test]
    fn zero_samples_are_skipped_not_zeroed() {
        let f = frame(3, 1, vec![0, 50, 0]);
        let pts = extract_points(&f, &Identity, Origin::new(0.0, 0.0, 100.0), Translation::Height);
        assert_eq!(pts, vec![Point::new(1.0, 0.0, 50.0)]);
        assert!(!pts.contains(&Point::zero()));
    }

    #[test]
    fn append_keeps_existing_points() {
        let f = frame(2, 1, vec![10, 20]);
        let mut set = vec![Point::new(-1.0, -1.0, -1.0)];
        let added = append_points(&f, &Identity, Origin::default(), Translation::Additive, &mut set);
        assert_eq!(added, 2);
        assert_eq!(set.len(), 3);
        assert_eq!(set[2], Point::new(1.0, 0.0, 20.0));
    }

    #[test]
    fn fov_converter_centre_pixel_lies_on_axis() {
        let conv = FovConverter::new(640, 480, SensorFov::default());
        let p = conv.depth_to_world(320, 240, 1000);
        assert!(p.x.abs() < 1e-4);
        assert!(p.y.abs() < 1e-4);
        assert!((p.z - 1000.0).abs() < 1e-4);
    }

    #[test]
    fn fov_converter_scales_with_depth_and_flips_y() {
        let fov = SensorFov {
            horizontal: std::f32::consts::FRAC_PI_2,
            vertical: std::f32::consts::FRAC_PI_2,
        };
        // tan(45°) * 2 = 2, so the left edge sits at -depth horizontally.
        let conv = FovConverter::new(100, 100, fov);
        let p = conv.depth_to_world(0, 0, 500);
        assert!((p.x + 500.0).abs() < 1e-2, "x={}", p.x);
        assert!((p.y - 500.0).abs() < 1e-2, "y={}", p.y);
    }

    #[test]
    fn fov_converter_honours_100um_units() {
        let f = DepthFrame::new(2, 2, PixelFormat::Depth100Um, vec![0; 4]).unwrap();
        let conv = FovConverter::for_frame(&f, SensorFov::default());
        let p = conv.depth_to_world(1, 1, 12_000);
        assert!((p.z - 1200.0).abs() < 1e-3);
    }
}
