//! Frame sanity checks.
//!
//! These checks never stop acquisition on their own. The loop uses them to
//! decide whether a frame is worth showing and to notice dropped frames.

use tracing::warn;

use crate::traits::{CameraError, Frame, Result};

/// Validates that a frame's buffer can hold its declared geometry.
///
/// Compressed formats only need a non-empty buffer.
///
/// # Errors
///
/// Returns `StreamError` if:
/// - Width or height is zero
/// - The buffer is empty
/// - The buffer is shorter than `width * height * bytes_per_pixel`
pub fn validate_frame(frame: &Frame) -> Result<()> {
    if frame.width == 0 || frame.height == 0 {
        return Err(CameraError::StreamError(format!(
            "Degenerate frame {}: {}x{}",
            frame.metadata.sequence, frame.width, frame.height
        )));
    }
    if frame.data.is_empty() {
        return Err(CameraError::StreamError(format!(
            "Frame {} has an empty buffer",
            frame.metadata.sequence
        )));
    }

    if let Some(bpp) = frame.fourcc.bytes_per_pixel() {
        let expected = frame.width as usize * frame.height as usize * bpp as usize;
        if frame.data.len() < expected {
            return Err(CameraError::StreamError(format!(
                "Frame {} too small for {}x{} {}: {} < {expected}",
                frame.metadata.sequence,
                frame.width,
                frame.height,
                frame.fourcc,
                frame.data.len()
            )));
        }
    }

    Ok(())
}

/// Validates that a sequence of frames has incrementing sequence numbers.
///
/// This function checks that frame sequence numbers increment by 1 with no gaps.
///
/// # Errors
///
/// Returns `StreamError` if:
/// - The frames slice is empty
/// - Any sequence number doesn't increment by exactly 1 from the previous
pub fn validate_frame_sequence(frames: &[Frame]) -> Result<()> {
    if frames.is_empty() {
        return Err(CameraError::StreamError(
            "Cannot validate empty frame sequence".to_owned(),
        ));
    }

    for (i, pair) in frames.windows(2).enumerate() {
        let [prev, curr] = pair else { continue };
        let expected = prev.metadata.sequence + 1;
        if curr.metadata.sequence != expected {
            return Err(CameraError::StreamError(format!(
                "Frame sequence gap at index {}: expected {expected}, got {}",
                i + 1,
                curr.metadata.sequence
            )));
        }
    }

    Ok(())
}

/// Running gap detector over the sequence numbers a source hands out.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last: Option<u64>,
    dropped: u64,
}

impl SequenceTracker {
    /// Record the next observed sequence number and return how many were skipped.
    pub fn observe(&mut self, sequence: u64) -> u64 {
        let gap = match self.last {
            Some(last) if sequence > last + 1 => sequence - last - 1,
            Some(last) if sequence <= last => {
                warn!(last, sequence, "frame sequence went backwards");
                0
            }
            _ => 0,
        };
        if gap > 0 {
            warn!(missing = gap, after = self.last, "dropped frames");
        }
        self.dropped += gap;
        self.last = Some(sequence);
        gap
    }

    /// Total frames missing since tracking started.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDevice;
    use crate::traits::{CameraDevice, FourCC, FrameMetadata, FrameSource};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn raw(width: u32, height: u32, fourcc: FourCC, len: usize) -> Frame {
        Frame {
            width,
            height,
            fourcc,
            data: vec![0; len],
            metadata: FrameMetadata {
                sequence: 5,
                timestamp: Duration::ZERO,
                bytes_used: 0,
                complete: true,
            },
        }
    }

    #[test]
    fn test_validate_frame_success() {
        assert!(validate_frame(&raw(4, 4, FourCC::YUYV, 32)).is_ok());
        assert!(validate_frame(&raw(4, 4, FourCC::MJPG, 3)).is_ok());
    }

    #[test]
    fn test_validate_frame_degenerate() {
        assert!(validate_frame(&raw(0, 4, FourCC::GREY, 16)).is_err());
        assert!(validate_frame(&raw(4, 4, FourCC::GREY, 0)).is_err());
        assert!(validate_frame(&raw(4, 4, FourCC::RGB3, 47)).is_err());
    }

    #[test]
    fn test_validate_frame_sequence_success() {
        let mut device = MockDevice::new();
        let mut stream = device.begin_acquisition(1).expect("begin failed");

        let frames: Vec<Frame> = (0..5)
            .map(|_| stream.capture(TIMEOUT).expect("capture failed"))
            .collect();

        let result = validate_frame_sequence(&frames);
        assert!(
            result.is_ok(),
            "Frame sequence validation should succeed: {result:?}"
        );
    }

    #[test]
    fn test_validate_frame_sequence_empty() {
        let frames: Vec<Frame> = vec![];
        let result = validate_frame_sequence(&frames);
        assert!(
            result.is_err(),
            "Frame sequence validation should fail for empty sequence"
        );
    }

    #[test]
    fn test_validate_frame_sequence_with_gap() {
        let mut device = MockDevice::new();
        let mut stream = device.begin_acquisition(1).expect("begin failed");

        let mut frames = vec![
            stream.capture(TIMEOUT).expect("capture failed"),
            stream.capture(TIMEOUT).expect("capture failed"),
        ];

        // Skip a frame to create a gap
        let skipped = stream.capture(TIMEOUT).expect("capture failed");
        stream.release(skipped);

        frames.push(stream.capture(TIMEOUT).expect("capture failed"));

        let result = validate_frame_sequence(&frames);
        assert!(
            result.is_err(),
            "Frame sequence validation should fail with gap"
        );
    }

    #[test]
    fn test_tracker_counts_gaps() {
        let mut tracker = SequenceTracker::default();
        assert_eq!(tracker.observe(0), 0);
        assert_eq!(tracker.observe(1), 0);
        assert_eq!(tracker.observe(4), 2);
        assert_eq!(tracker.observe(5), 0);
        assert_eq!(tracker.dropped(), 2);
    }

    #[test]
    fn test_tracker_ignores_restart() {
        let mut tracker = SequenceTracker::default();
        tracker.observe(10);
        assert_eq!(tracker.observe(3), 0);
        assert_eq!(tracker.observe(4), 0);
        assert_eq!(tracker.dropped(), 0);
    }
}
