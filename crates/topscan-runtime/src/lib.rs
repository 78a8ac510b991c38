//! `topscan-runtime` – scan session state and the acquisition loop.
//!
//! # Modules
//!
//! - [`session`] – [`ScanSession`]: the reference, object and topology point
//!   sets together with the calibration origin, plus save and topology
//!   building.
//! - [`control_loop`] – [`ControlLoop`]: waits for one depth frame per step,
//!   dispatches operator [`Action`]s against the session and the machine
//!   client, and paints the frame into an optional preview sink.
//! - [`telemetry`] – [`init_tracing`]: the global `tracing` subscriber with
//!   optional OTLP span export.

pub mod control_loop;
pub mod session;
pub mod telemetry;

pub use control_loop::{Action, ControlLoop, DEFAULT_FRAME_TIMEOUT, Report};
pub use session::{CaptureTarget, ScanSession, SessionConfig, SetKind, TopologySummary};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
