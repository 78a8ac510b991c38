//! [`ScanSession`] – calibration origin plus the point sets of one scan.
//!
//! A scan goes through three named sets:
//!
//! | [`SetKind`] | Contents | File |
//! |---|---|---|
//! | `Reference` | the bare surface | `reference.xyz` |
//! | `Object` | the surface with the object on it | `topologyRef.xyz` |
//! | `Topology` | derived object shape | `topology.xyz` |
//!
//! Captures accumulate: each one appends the returns of a single frame.
//! Sorting and deduplication happen only when a set is saved or the
//! topology is built.

use std::path::PathBuf;

use topscan_perception::calibration::read_origin;
use topscan_perception::extractor::{DepthConverter, FovConverter, SensorFov, Translation, append_points};
use topscan_perception::point_ops::{Tolerance, sort_and_dedup};
use topscan_perception::pointfile::write_points;
use topscan_perception::topology::{MatchPolicy, Topology, TopologyEngine};
use topscan_types::{DepthFrame, Origin, Point, ScanError, StatusResponse};
use tracing::{info, warn};

/// Identity of one of the session's point sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetKind {
    Reference,
    Object,
    Topology,
}

impl SetKind {
    /// File name used when the set is saved.
    pub fn file_name(&self) -> &'static str {
        match self {
            SetKind::Reference => "reference.xyz",
            SetKind::Object => "topologyRef.xyz",
            SetKind::Topology => "topology.xyz",
        }
    }
}

impl std::fmt::Display for SetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetKind::Reference => write!(f, "reference"),
            SetKind::Object => write!(f, "topology-reference"),
            SetKind::Topology => write!(f, "topology"),
        }
    }
}

/// Which set a frame capture feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTarget {
    Reference,
    Object,
}

impl From<CaptureTarget> for SetKind {
    fn from(t: CaptureTarget) -> Self {
        match t {
            CaptureTarget::Reference => SetKind::Reference,
            CaptureTarget::Object => SetKind::Object,
        }
    }
}

/// Tunables of a [`ScanSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Three-line origin file read by [`ScanSession::calibrate`].
    pub calibration_path: PathBuf,
    /// Directory receiving saved point files.
    pub output_dir: PathBuf,
    pub tolerance: Tolerance,
    pub match_policy: MatchPolicy,
    /// Translation applied to captured frames.
    pub capture_translation: Translation,
    pub fov: SensorFov,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            calibration_path: PathBuf::from("coordinates.txt"),
            output_dir: PathBuf::from("."),
            tolerance: Tolerance::exact(),
            match_policy: MatchPolicy::Exact,
            capture_translation: Translation::Height,
            fov: SensorFov::default(),
        }
    }
}

/// Origin and point sets of one scanning session.
///
/// All mutation goes through `&mut self`, so the origin can never change
/// while an extraction is reading it.
#[derive(Debug, Default)]
pub struct ScanSession {
    config: SessionConfig,
    origin: Origin,
    reference: Vec<Point>,
    object: Vec<Point>,
    topology: Vec<Point>,
    /// Origin in effect at the latest capture into each set.
    reference_origin: Option<Origin>,
    object_origin: Option<Origin>,
}

impl ScanSession {
    /// New session with the origin at (0, 0, 0) and empty sets.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Origin) {
        info!(%origin, "origin set");
        self.origin = origin;
    }

    /// Reload the origin from the calibration file.
    ///
    /// Returns `false` and keeps the previous origin when the file is
    /// missing or malformed.
    pub fn calibrate(&mut self) -> bool {
        let path = self.config.calibration_path.clone();
        match read_origin(&path) {
            Ok(origin) => {
                self.set_origin(origin);
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "calibration failed; origin unchanged");
                false
            }
        }
    }

    /// Adopt the machine-reported position as the new origin.
    ///
    /// Failed reads leave the origin untouched and return `false`.
    pub fn calibrate_from_status(&mut self, status: &StatusResponse) -> bool {
        match status.position() {
            Some(p) => {
                self.set_origin(Origin::from(p));
                true
            }
            None => {
                warn!("machine position unavailable; origin unchanged");
                false
            }
        }
    }

    /// Append the returns of `frame` to `target`, projecting with a
    /// field-of-view converter matched to the frame.
    pub fn capture(&mut self, target: CaptureTarget, frame: &DepthFrame) -> usize {
        let converter = FovConverter::for_frame(frame, self.config.fov);
        self.capture_with(target, frame, &converter)
    }

    /// Append the returns of `frame` to `target` using `converter`.
    /// Returns the number of points added.
    pub fn capture_with(
        &mut self,
        target: CaptureTarget,
        frame: &DepthFrame,
        converter: &dyn DepthConverter,
    ) -> usize {
        let origin = self.origin;
        let translation = self.config.capture_translation;
        let (set, set_origin) = match target {
            CaptureTarget::Reference => (&mut self.reference, &mut self.reference_origin),
            CaptureTarget::Object => (&mut self.object, &mut self.object_origin),
        };
        *set_origin = Some(origin);
        let added = append_points(frame, converter, origin, translation, set);
        info!(set = %SetKind::from(target), added, total = set.len(), "sample saved");
        added
    }

    pub fn points(&self, kind: SetKind) -> &[Point] {
        match kind {
            SetKind::Reference => &self.reference,
            SetKind::Object => &self.object,
            SetKind::Topology => &self.topology,
        }
    }

    fn points_mut(&mut self, kind: SetKind) -> &mut Vec<Point> {
        match kind {
            SetKind::Reference => &mut self.reference,
            SetKind::Object => &mut self.object,
            SetKind::Topology => &mut self.topology,
        }
    }

    pub fn clear(&mut self, kind: SetKind) {
        self.points_mut(kind).clear();
        match kind {
            SetKind::Reference => self.reference_origin = None,
            SetKind::Object => self.object_origin = None,
            SetKind::Topology => {}
        }
    }

    /// Sort and deduplicate one set in place.  Returns the new length.
    pub fn sort_and_dedup(&mut self, kind: SetKind) -> usize {
        let tolerance = self.config.tolerance;
        let set = self.points_mut(kind);
        sort_and_dedup(set, tolerance);
        set.len()
    }

    /// Sort, deduplicate and write one set to its file in the output
    /// directory.  Returns the written path.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Io`] if the file cannot be written.
    pub fn save(&mut self, kind: SetKind) -> Result<PathBuf, ScanError> {
        self.sort_and_dedup(kind);
        let path = self.output_path(kind);
        write_points(&path, self.points(kind))?;
        Ok(path)
    }

    /// Derive the topology from the reference and object sets and store it
    /// as the [`SetKind::Topology`] set.
    ///
    /// Sets captured with [`Translation::Additive`] are first converted to
    /// heights using the origin of their latest capture, so both translations
    /// give the same topology.
    pub fn build_topology(&mut self) -> TopologySummary {
        let reference = self.height_points(&self.reference, self.reference_origin);
        let object = self.height_points(&self.object, self.object_origin);
        let engine = TopologyEngine::new(self.config.tolerance, self.config.match_policy);
        let Topology {
            points,
            matched,
            unmatched,
        } = engine.build(&reference, &object);
        self.topology = points;
        TopologySummary {
            points: self.topology.len(),
            matched,
            unmatched,
        }
    }

    fn height_points(&self, set: &[Point], captured_at: Option<Origin>) -> Vec<Point> {
        let translation = self.config.capture_translation;
        let origin = captured_at.unwrap_or(self.origin);
        set.iter().map(|&p| translation.to_height(p, origin)).collect()
    }

    pub fn output_path(&self, kind: SetKind) -> PathBuf {
        self.config.output_dir.join(kind.file_name())
    }
}

/// Counts reported by [`ScanSession::build_topology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologySummary {
    pub points: usize,
    pub matched: usize,
    pub unmatched: usize,
}
