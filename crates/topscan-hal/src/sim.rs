//! In-process simulation for headless runs and CI without hardware.
//!
//! [`SimDepthSource`] renders a flat table seen from above, optionally with a
//! raised box standing on it.  [`SimMachine`] is a [`Transport`] that accepts
//! `G0` moves and reports the last commanded position on `/status`.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use topscan_hal::depth::DepthSource;
//! use topscan_hal::sim::{SimBox, SimDepthSource};
//!
//! let mut sensor = SimDepthSource::new(8, 6, 1200)
//!     .with_box(SimBox { x0: 2, y0: 2, x1: 5, y1: 4, height: 150 });
//!
//! let frame = sensor.wait_frame(Duration::from_millis(100)).unwrap();
//! assert_eq!(frame.depth_at(0, 0), Some(1200));
//! assert_eq!(frame.depth_at(3, 3), Some(1050));
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use serde_json::json;
use topscan_types::{DepthFrame, PixelFormat, Point};

use crate::depth::{AcquireError, DepthSource};
use crate::machine::{CODE_PATH, STATUS_PATH, Transport, TransportError};

// ────────────────────────────────────────────────────────────────────────────
// Simulated depth sensor
// ────────────────────────────────────────────────────────────────────────────

/// Axis-aligned box standing on the simulated table, in pixel coordinates
/// (`x1`/`y1` exclusive) with its height in sensor units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
    pub height: u16,
}

/// A simulated depth camera looking straight down at a table.
pub struct SimDepthSource {
    id: String,
    width: u32,
    height: u32,
    table_depth: u16,
    object: Option<SimBox>,
    format: PixelFormat,
    dropout_column: bool,
    scripted: VecDeque<AcquireError>,
}

impl SimDepthSource {
    /// A `width × height` sensor whose table sits `table_depth` units away.
    pub fn new(width: u32, height: u32, table_depth: u16) -> Self {
        Self {
            id: "sim_depth".to_string(),
            width,
            height,
            table_depth,
            object: None,
            format: PixelFormat::Depth1Mm,
            dropout_column: false,
            scripted: VecDeque::new(),
        }
    }

    /// Place a box on the table.
    pub fn with_box(mut self, object: SimBox) -> Self {
        self.object = Some(object);
        self
    }

    /// Report frames in `format` instead of millimetre depth.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Make the left-most column return no depth, as happens at the edge of
    /// a structured-light projector.
    pub fn with_dropout_column(mut self) -> Self {
        self.dropout_column = true;
        self
    }

    /// Remove or replace the box between captures.
    pub fn set_box(&mut self, object: Option<SimBox>) {
        self.object = object;
    }

    /// Queue an error to be returned by the next `wait_frame` call instead
    /// of a frame.
    pub fn push_failure(&mut self, error: AcquireError) {
        self.scripted.push_back(error);
    }

    fn depth(&self, x: u32, y: u32) -> u16 {
        if self.dropout_column && x == 0 {
            return 0;
        }
        match self.object {
            Some(b) if (b.x0..b.x1).contains(&x) && (b.y0..b.y1).contains(&y) => {
                self.table_depth.saturating_sub(b.height)
            }
            _ => self.table_depth,
        }
    }
}

impl DepthSource for SimDepthSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn wait_frame(&mut self, _timeout: Duration) -> Result<DepthFrame, AcquireError> {
        if let Some(err) = self.scripted.pop_front() {
            return Err(err);
        }
        let mut samples = Vec::with_capacity(self.width as usize * self.height as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                samples.push(self.depth(x, y));
            }
        }
        DepthFrame::new(self.width, self.height, self.format, samples)
            .map_err(|e| AcquireError::Device(e.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated positioning machine
// ────────────────────────────────────────────────────────────────────────────

/// A simulated machine controller.
///
/// Every accepted `G0`/`G1` command jumps the stage straight to its target;
/// axes missing from a command keep their previous value.  Other commands
/// are recorded but do not move the stage.
#[derive(Debug, Default)]
pub struct SimMachine {
    position: Point,
    commands: Vec<String>,
    offline: bool,
}

impl SimMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a dropped network link.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Every command received so far, oldest first.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    fn apply(&mut self, command: &str) {
        let upper = command.trim().to_ascii_uppercase();
        if !(upper.starts_with("G0") || upper.starts_with("G1")) {
            return;
        }
        if let Some(x) = axis_value(&upper, 'X') {
            self.position.x = x;
        }
        if let Some(y) = axis_value(&upper, 'Y') {
            self.position.y = y;
        }
        if let Some(z) = axis_value(&upper, 'Z') {
            self.position.z = z;
        }
    }
}

/// Extract the numeric word following `axis` in a G-code line.
fn axis_value(command: &str, axis: char) -> Option<f32> {
    let start = command.find(axis)? + 1;
    let rest = &command[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

impl Transport for SimMachine {
    fn post(&mut self, url: &str, body: &str) -> Result<(), TransportError> {
        if self.offline {
            return Err(TransportError::Unreachable(url.to_string()));
        }
        if !url.ends_with(CODE_PATH) {
            return Err(TransportError::Unreachable(format!("no route for POST {url}")));
        }
        let command = body
            .split('&')
            .find_map(|kv| kv.strip_prefix("cmd="))
            .unwrap_or_default()
            .to_string();
        self.apply(&command);
        self.commands.push(command);
        Ok(())
    }

    fn get(&mut self, url: &str) -> Result<String, TransportError> {
        if self.offline {
            return Err(TransportError::Unreachable(url.to_string()));
        }
        if !url.ends_with(STATUS_PATH) {
            return Err(TransportError::Unreachable(format!("no route for GET {url}")));
        }
        let body = json!({
            "data": {
                "status": {
                    "posx": self.position.x,
                    "posy": self.position.y,
                    "posz": self.position.z,
                }
            }
        });
        Ok(body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineClient;
    use topscan_types::StatusResponse;

    #[test]
    fn sim_frame_has_table_and_box() {
        let mut sensor = SimDepthSource::new(4, 3, 1000).with_box(SimBox {
            x0: 1,
            y0: 1,
            x1: 3,
            y1: 2,
            height: 200,
        });
        let frame = sensor.wait_frame(Duration::from_millis(1)).unwrap();
        assert_eq!(frame.depth_at(0, 0), Some(1000));
        assert_eq!(frame.depth_at(1, 1), Some(800));
        assert_eq!(frame.depth_at(2, 1), Some(800));
        assert_eq!(frame.depth_at(3, 1), Some(1000));
        assert_eq!(frame.depth_at(1, 2), Some(1000));
    }

    #[test]
    fn dropout_column_reads_zero() {
        let mut sensor = SimDepthSource::new(3, 2, 900).with_dropout_column();
        let frame = sensor.wait_frame(Duration::from_millis(1)).unwrap();
        assert_eq!(frame.depth_at(0, 1), Some(0));
        assert_eq!(frame.depth_at(1, 1), Some(900));
    }

    #[test]
    fn scripted_failures_come_first() {
        let mut sensor = SimDepthSource::new(2, 2, 500);
        sensor.push_failure(AcquireError::Timeout { timeout_ms: 2000 });
        assert!(matches!(
            sensor.wait_frame(Duration::from_millis(1)),
            Err(AcquireError::Timeout { .. })
        ));
        assert!(sensor.wait_frame(Duration::from_millis(1)).is_ok());
    }

    #[test]
    fn axis_value_parses_signed_words() {
        assert_eq!(axis_value("G0X1.5Y-2.000000Z3", 'X'), Some(1.5));
        assert_eq!(axis_value("G0X1.5Y-2.000000Z3", 'Y'), Some(-2.0));
        assert_eq!(axis_value("G0X1.5Y-2.000000Z3", 'Z'), Some(3.0));
        assert_eq!(axis_value("G0X1.5", 'Z'), None);
    }

    #[test]
    fn sim_machine_tracks_commanded_position() {
        let mut client = MachineClient::with_transport("http://sim", SimMachine::new());
        client.send_move(10.0, -4.5, 2.25).unwrap();
        client.send_raw_command("G0Z7").unwrap();
        client.send_raw_command("M3").unwrap();

        assert_eq!(client.query_position(), StatusResponse::ok(10.0, -4.5, 7.0));
        assert_eq!(client.transport().commands().len(), 3);
    }

    #[test]
    fn offline_sim_machine_fails_both_endpoints() {
        let mut machine = SimMachine::new();
        machine.set_offline(true);
        let mut client = MachineClient::with_transport("http://sim", machine);
        assert!(client.send_move(1.0, 1.0, 1.0).is_err());
        assert_eq!(client.query_position(), StatusResponse::failed());
    }
}
