//! `topscan-perception` – turns depth frames into machine-space geometry.
//!
//! # Modules
//!
//! - [`point_ops`] – total order over points, tolerance-aware equality and
//!   [`sort_and_dedup`][point_ops::sort_and_dedup].
//! - [`extractor`] – [`extract_points`][extractor::extract_points]: frame to
//!   point set through a [`DepthConverter`][extractor::DepthConverter] and the
//!   calibration origin.
//! - [`topology`] – [`TopologyEngine`][topology::TopologyEngine]: object shape
//!   relative to a reference surface.
//! - [`pointfile`] – plain-text `x y z` point files.
//! - [`calibration`] – origin coordinates file.

pub mod calibration;
pub mod extractor;
pub mod point_ops;
pub mod pointfile;
pub mod topology;

pub use extractor::{DepthConverter, FovConverter, SensorFov, Translation, extract_points};
pub use point_ops::{Tolerance, sort_and_dedup};
pub use topology::{MatchPolicy, Topology, TopologyEngine};
