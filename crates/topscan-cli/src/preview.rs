//! ASCII depth preview printed to the terminal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use topscan_hal::display::FrameSink;

const RAMP: &[u8] = b" .:-=+*#%@";

/// Columns printed per row; wider frames are down-sampled.
const MAX_COLUMNS: u32 = 64;

/// A [`FrameSink`] that prints each frame as ASCII art while `enabled` is set.
pub struct TerminalSink {
    enabled: Arc<AtomicBool>,
    width: u32,
    height: u32,
    gray: Vec<u8>,
}

impl TerminalSink {
    pub fn new(enabled: Arc<AtomicBool>) -> Self {
        Self {
            enabled,
            width: 0,
            height: 0,
            gray: Vec::new(),
        }
    }

    /// The frame as text rows, down-sampled to at most [`MAX_COLUMNS`] wide.
    /// Rows use twice the column step to keep the terminal aspect ratio.
    pub fn render_rows(&self) -> Vec<String> {
        if self.width == 0 || self.height == 0 {
            return Vec::new();
        }
        let step = self.width.div_ceil(MAX_COLUMNS).max(1);
        (0..self.height)
            .step_by((step * 2) as usize)
            .map(|y| {
                (0..self.width)
                    .step_by(step as usize)
                    .map(|x| {
                        let g = self.gray[(y * self.width + x) as usize];
                        RAMP[g as usize * (RAMP.len() - 1) / 255] as char
                    })
                    .collect()
            })
            .collect()
    }
}

impl FrameSink for TerminalSink {
    fn begin(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.gray.clear();
        self.gray.resize(width as usize * height as usize, 0);
    }

    fn set_gray(&mut self, x: u32, y: u32, value: u8) {
        if x < self.width && y < self.height {
            self.gray[(y * self.width + x) as usize] = value;
        }
    }

    fn refresh(&mut self) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        for row in self.render_rows() {
            println!("  {row}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_follow_gray_ramp() {
        let mut sink = TerminalSink::new(Arc::new(AtomicBool::new(false)));
        sink.begin(3, 1);
        sink.set_gray(0, 0, 0);
        sink.set_gray(1, 0, 128);
        sink.set_gray(2, 0, 255);
        assert_eq!(sink.render_rows(), vec![" =@".to_string()]);
    }

    #[test]
    fn wide_frames_are_downsampled() {
        let mut sink = TerminalSink::new(Arc::new(AtomicBool::new(false)));
        sink.begin(640, 480);
        let rows = sink.render_rows();
        assert_eq!(rows[0].len(), 64);
        assert_eq!(rows.len(), 24);
    }

    #[test]
    fn out_of_range_pixels_are_ignored() {
        let mut sink = TerminalSink::new(Arc::new(AtomicBool::new(false)));
        sink.begin(1, 1);
        sink.set_gray(5, 5, 200);
        assert_eq!(sink.render_rows(), vec![" ".to_string()]);
    }

    #[test]
    fn empty_sink_renders_nothing() {
        let sink = TerminalSink::new(Arc::new(AtomicBool::new(true)));
        assert!(sink.render_rows().is_empty());
    }
}
