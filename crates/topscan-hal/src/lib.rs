//! `topscan-hal` – hardware edge of the TopScan stack.
//!
//! Everything that touches a device or the network lives here, behind small
//! traits so the geometry pipeline and the control loop never depend on a
//! concrete driver.
//!
//! # Modules
//!
//! - [`depth`] – [`DepthSource`][depth::DepthSource]: blocking frame
//!   acquisition with a bounded wait, plus [`AcquireError`][depth::AcquireError].
//! - [`display`] – [`FrameSink`][display::FrameSink]: grayscale preview sink
//!   and the depth-to-gray mapping.
//! - [`machine`] – [`MachineClient`][machine::MachineClient]: G-code move
//!   commands and status polling over a single reused
//!   [`Transport`][machine::Transport].
//! - [`sim`] – simulated depth sensor and positioning machine for headless
//!   runs and tests.

pub mod depth;
pub mod display;
pub mod machine;
pub mod sim;

pub use depth::{AcquireError, DepthSource};
pub use display::{FrameSink, render_depth};
pub use machine::{HttpTransport, MachineClient, MachineError, Transport, TransportError};
