//! [`ControlLoop`] – one acquisition iteration per call, plus action dispatch.
//!
//! Each [`ControlLoop::step`] waits (bounded) for a depth frame, applies the
//! requested [`Action`]s in order, and finally paints the frame into the
//! preview sink if one is attached.  A frame that times out or arrives in a
//! non-depth format is logged and skipped; actions that need a frame report
//! [`Report::CaptureSkipped`], every other action still runs.
//!
//! Everything happens on the caller's thread.  Machine requests block until
//! the controller answers or the transport gives up.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use topscan_hal::depth::{DepthSource, acquire_depth};
use topscan_hal::display::{FrameSink, render_depth};
use topscan_hal::machine::{MachineClient, Transport};
use topscan_types::{DepthFrame, Origin, Point, StatusResponse};
use tracing::{info, warn};

use crate::session::{CaptureTarget, ScanSession, SetKind, TopologySummary};

/// Default bound on a single frame wait.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_millis(2000);

/// A request from the operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Append the current frame to a point set.
    Capture(CaptureTarget),
    /// Build the topology and save it to `topology.xyz`.
    BuildTopology,
    /// Return a copy of a point set for display.
    Print(SetKind),
    /// Sort, deduplicate and save a point set.
    Save(SetKind),
    Clear(SetKind),
    /// Reload the origin from the calibration file.
    Calibrate,
    /// Poll the machine and adopt its position as the origin.
    CalibrateFromMachine,
    MoveTo { x: f32, y: f32, z: f32 },
    SendGcode(String),
    QueryPosition,
}

/// What happened for one [`Action`].
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Captured {
        target: CaptureTarget,
        added: usize,
        total: usize,
    },
    CaptureSkipped {
        target: CaptureTarget,
        reason: String,
    },
    TopologyBuilt {
        summary: TopologySummary,
        saved: Result<PathBuf, String>,
        elapsed: Duration,
    },
    Points {
        kind: SetKind,
        points: Vec<Point>,
    },
    Saved {
        kind: SetKind,
        result: Result<(PathBuf, usize), String>,
    },
    Cleared(SetKind),
    Calibrated {
        success: bool,
        origin: Origin,
    },
    MachineCommand {
        command: String,
        result: Result<(), String>,
    },
    Position(StatusResponse),
}

/// Owns the session and every device handle for the lifetime of a scan.
pub struct ControlLoop<T: Transport> {
    session: ScanSession,
    source: Box<dyn DepthSource>,
    machine: MachineClient<T>,
    sink: Option<Box<dyn FrameSink>>,
    frame_timeout: Duration,
    skipped_frames: u64,
}

impl<T: Transport> ControlLoop<T> {
    pub fn new(session: ScanSession, source: Box<dyn DepthSource>, machine: MachineClient<T>) -> Self {
        Self {
            session,
            source,
            machine,
            sink: None,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            skipped_frames: 0,
        }
    }

    /// Attach a preview sink that receives every acquired frame.
    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ScanSession {
        &mut self.session
    }

    pub fn machine(&self) -> &MachineClient<T> {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut MachineClient<T> {
        &mut self.machine
    }

    /// Swap the depth source, e.g. after the scene or sensor changed.
    pub fn replace_source(&mut self, source: Box<dyn DepthSource>) {
        self.source = source;
    }

    /// Iterations whose frame was lost to a timeout or bad format.
    pub fn skipped_frames(&self) -> u64 {
        self.skipped_frames
    }

    /// Run one iteration: acquire, apply `actions`, render.
    pub fn step(&mut self, actions: &[Action]) -> Vec<Report> {
        let frame = match acquire_depth(self.source.as_mut(), self.frame_timeout) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                self.skipped_frames += 1;
                warn!(source = self.source.id(), error = %e, "frame skipped");
                Err(e.to_string())
            }
        };

        let reports = actions
            .iter()
            .map(|action| self.apply(action, frame.as_ref()))
            .collect();

        if let (Ok(frame), Some(sink)) = (&frame, self.sink.as_mut()) {
            render_depth(frame, sink.as_mut());
        }
        reports
    }

    fn apply(&mut self, action: &Action, frame: Result<&DepthFrame, &String>) -> Report {
        match action {
            Action::Capture(target) => match frame {
                Ok(frame) => {
                    let added = self.session.capture(*target, frame);
                    Report::Captured {
                        target: *target,
                        added,
                        total: self.session.points((*target).into()).len(),
                    }
                }
                Err(reason) => Report::CaptureSkipped {
                    target: *target,
                    reason: reason.clone(),
                },
            },

            Action::BuildTopology => {
                let started = Instant::now();
                let summary = self.session.build_topology();
                let saved = self
                    .session
                    .save(SetKind::Topology)
                    .map_err(|e| e.to_string());
                let elapsed = started.elapsed();
                info!(elapsed_ms = elapsed.as_millis() as u64, "topology done");
                Report::TopologyBuilt {
                    summary,
                    saved,
                    elapsed,
                }
            }

            Action::Print(kind) => Report::Points {
                kind: *kind,
                points: self.session.points(*kind).to_vec(),
            },

            Action::Save(kind) => Report::Saved {
                kind: *kind,
                result: self
                    .session
                    .save(*kind)
                    .map(|path| (path, self.session.points(*kind).len()))
                    .map_err(|e| e.to_string()),
            },

            Action::Clear(kind) => {
                self.session.clear(*kind);
                Report::Cleared(*kind)
            }

            Action::Calibrate => Report::Calibrated {
                success: self.session.calibrate(),
                origin: self.session.origin(),
            },

            Action::CalibrateFromMachine => {
                let status = self.machine.query_position();
                Report::Calibrated {
                    success: self.session.calibrate_from_status(&status),
                    origin: self.session.origin(),
                }
            }

            Action::MoveTo { x, y, z } => Report::MachineCommand {
                command: format!("move {x} {y} {z}"),
                result: self.machine.send_move(*x, *y, *z).map_err(|e| e.to_string()),
            },

            Action::SendGcode(command) => Report::MachineCommand {
                command: command.clone(),
                result: self
                    .machine
                    .send_raw_command(command)
                    .map_err(|e| e.to_string()),
            },

            Action::QueryPosition => Report::Position(self.machine.query_position()),
        }
    }
}
