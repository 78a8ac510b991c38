//! Grayscale preview of depth frames.

use topscan_types::DepthFrame;

/// Depth values wrap every `GRAY_PERIOD` sensor units so nearby surfaces
/// stay distinguishable in the preview.
pub const GRAY_PERIOD: u16 = 1000;

/// A preview surface that accepts one gray level per pixel.
pub trait FrameSink {
    /// Prepare the sink for a `width × height` frame.
    fn begin(&mut self, width: u32, height: u32);

    fn set_gray(&mut self, x: u32, y: u32, value: u8);

    /// Present everything written since [`begin`][Self::begin].
    fn refresh(&mut self);
}

/// Map a raw depth sample to a gray level.
pub fn gray_level(depth: u16) -> u8 {
    let value = f32::from(depth % GRAY_PERIOD) / f32::from(GRAY_PERIOD) * 255.0;
    value as u8
}

/// Paint every pixel of `frame` into `sink` and refresh it.
pub fn render_depth(frame: &DepthFrame, sink: &mut dyn FrameSink) {
    sink.begin(frame.width(), frame.height());
    for (x, y, depth) in frame.pixels() {
        sink.set_gray(x, y, gray_level(depth));
    }
    sink.refresh();
}

#[cfg(test)]
mod tests {
    use super::*;
    use topscan_types::PixelFormat;

    #[derive(Default)]
    struct RecordingSink {
        size: (u32, u32),
        pixels: Vec<(u32, u32, u8)>,
        refreshes: usize,
    }

    impl FrameSink for RecordingSink {
        fn begin(&mut self, width: u32, height: u32) {
            self.size = (width, height);
            self.pixels.clear();
        }
        fn set_gray(&mut self, x: u32, y: u32, value: u8) {
            self.pixels.push((x, y, value));
        }
        fn refresh(&mut self) {
            self.refreshes += 1;
        }
    }

    #[test]
    fn gray_level_wraps_every_period() {
        assert_eq!(gray_level(0), 0);
        assert_eq!(gray_level(500), 127);
        assert_eq!(gray_level(1000), 0);
        assert_eq!(gray_level(1999), 254);
    }

    #[test]
    fn render_paints_every_pixel_once() {
        let frame = DepthFrame::new(2, 2, PixelFormat::Depth1Mm, vec![0, 250, 500, 750]).unwrap();
        let mut sink = RecordingSink::default();
        render_depth(&frame, &mut sink);
        assert_eq!(sink.size, (2, 2));
        assert_eq!(sink.pixels.len(), 4);
        assert_eq!(sink.pixels[1], (1, 0, 63));
        assert_eq!(sink.refreshes, 1);
    }
}
