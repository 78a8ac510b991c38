//! Generic `DepthSource` trait for depth-camera hardware.

use std::time::Duration;

use thiserror::Error;
use topscan_types::{DepthFrame, PixelFormat};

/// Reasons a single acquisition attempt produced no usable frame.
///
/// All variants are recoverable: the caller skips the iteration and tries
/// again on the next one.
#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("Wait failed (timeout is {timeout_ms} ms)")]
    Timeout { timeout_ms: u64 },

    #[error("Unexpected frame format: {0:?}")]
    UnsupportedFormat(PixelFormat),

    #[error("Depth device fault: {0}")]
    Device(String),
}

/// A depth camera that hands out one frame per call.
///
/// Drivers own the device; callers only ever see immutable
/// [`DepthFrame`]s.
pub trait DepthSource: Send {
    /// Stable identifier for this sensor, e.g. `"depth0"`.
    fn id(&self) -> &str;

    /// Block until the next frame arrives or `timeout` expires.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::Timeout`] when no frame arrived in time and
    /// [`AcquireError::Device`] when the device reported a read failure.
    fn wait_frame(&mut self, timeout: Duration) -> Result<DepthFrame, AcquireError>;
}

/// Wait for a frame and reject anything not encoded as depth.
///
/// # Errors
///
/// Propagates the source's error, or returns
/// [`AcquireError::UnsupportedFormat`] for non-depth pixel formats.
pub fn acquire_depth(
    source: &mut dyn DepthSource,
    timeout: Duration,
) -> Result<DepthFrame, AcquireError> {
    let frame = source.wait_frame(timeout)?;
    if !frame.format().is_depth() {
        return Err(AcquireError::UnsupportedFormat(frame.format()));
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockSource {
        format: PixelFormat,
        fail: bool,
    }

    impl DepthSource for MockSource {
        fn id(&self) -> &str {
            "mock"
        }

        fn wait_frame(&mut self, timeout: Duration) -> Result<DepthFrame, AcquireError> {
            if self.fail {
                return Err(AcquireError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            Ok(DepthFrame::new(2, 1, self.format, vec![100, 0]).unwrap())
        }
    }

    #[test]
    fn acquire_accepts_depth_formats() {
        let mut src = MockSource {
            format: PixelFormat::Depth100Um,
            fail: false,
        };
        let frame = acquire_depth(&mut src, Duration::from_millis(10)).unwrap();
        assert_eq!(frame.width(), 2);
    }

    #[test]
    fn acquire_rejects_non_depth_format() {
        let mut src = MockSource {
            format: PixelFormat::Rgb888,
            fail: false,
        };
        let err = acquire_depth(&mut src, Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, AcquireError::UnsupportedFormat(PixelFormat::Rgb888)));
    }

    #[test]
    fn timeout_reports_configured_wait() {
        let mut src = MockSource {
            format: PixelFormat::Depth1Mm,
            fail: true,
        };
        let err = acquire_depth(&mut src, Duration::from_millis(2000)).unwrap_err();
        assert!(err.to_string().contains("2000 ms"));
    }
}
