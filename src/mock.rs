//! Mock collaborators for running the pipeline without hardware.
//!
//! `MockDevice` replays a script of capture outcomes and counts what the
//! caller did with them, so tests can check buffer release and session
//! teardown. It also backs the binary's `stub://` devices.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::traits::{
    CameraDevice, CameraError, CaptureError, DeviceCapabilities, DisplayError, DisplaySink, Format,
    FourCC, Frame, FrameMetadata, FrameSource, FrameWriter, Result, SaveError, StreamMode,
    WriteOutcome,
};

/// What the next capture call should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCapture {
    /// A complete frame with the current pattern.
    Frame,
    /// A frame flagged incomplete by the transport.
    Incomplete,
    /// A complete frame with zero geometry and no data.
    Empty,
    /// A transient failure (timeout).
    Transient,
    /// A fatal failure (device gone).
    Fatal,
}

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// SMPTE color bars pattern.
    ColorBars,
    /// Horizontal gradient from dark to light.
    Gradient,
    /// Solid color with specified Y, U, V values.
    Solid(u8, u8, u8),
}

/// Counters describing what happened to a mock session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStats {
    /// Capture calls made.
    pub capture_calls: u64,
    /// Frames handed out (complete, incomplete or empty).
    pub frames_delivered: u64,
    /// Frames handed back through `release`.
    pub frames_released: u64,
    /// Releases of a frame that was not outstanding.
    pub bad_releases: u64,
    /// Calls to `end_acquisition`.
    pub sessions_ended: u64,
    /// Calls to `begin_acquisition` that succeeded.
    pub sessions_begun: u64,
}

/// Mock device for testing without hardware.
pub struct MockDevice {
    capabilities: DeviceCapabilities,
    format: Format,
    offset: (u32, u32),
    resolution_writable: bool,
    offset_writable: bool,
    stream_modes: Option<Vec<StreamMode>>,
    stream_mode: Option<StreamMode>,
    fail_begin: bool,
    frame_interval: Option<Duration>,
    pattern: TestPattern,
    script: VecDeque<MockCapture>,
    frame_count: u64,
    outstanding: BTreeSet<u64>,
    stats: MockStats,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a new mock device with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: DeviceCapabilities {
                driver: "mock".to_owned(),
                card: "Mock Camera".to_owned(),
                bus_info: "mock:0".to_owned(),
                can_capture: true,
                can_stream: true,
            },
            format: Format::new(64, 48, FourCC::YUYV),
            offset: (0, 0),
            resolution_writable: true,
            offset_writable: true,
            stream_modes: None,
            stream_mode: None,
            fail_begin: false,
            frame_interval: None,
            pattern: TestPattern::ColorBars,
            script: VecDeque::new(),
            frame_count: 0,
            outstanding: BTreeSet::new(),
            stats: MockStats::default(),
        }
    }

    /// Set the format for this mock device.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Set the capabilities for this mock device.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the test pattern for frame generation.
    #[must_use]
    pub const fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Queue capture outcomes. Once the script runs out every capture yields a frame.
    #[must_use]
    pub fn with_script<S>(mut self, script: S) -> Self
    where
        S: IntoIterator<Item = MockCapture>,
    {
        self.script.extend(script);
        self
    }

    /// Make resolution writes report the setting as read-only.
    #[must_use]
    pub const fn with_readonly_resolution(mut self) -> Self {
        self.resolution_writable = false;
        self
    }

    /// Make offset writes report the setting as read-only.
    #[must_use]
    pub const fn with_readonly_offset(mut self) -> Self {
        self.offset_writable = false;
        self
    }

    /// Expose a stream mode setting offering these entries.
    #[must_use]
    pub fn with_stream_modes(mut self, modes: Vec<StreamMode>) -> Self {
        self.stream_modes = Some(modes);
        self
    }

    /// Make `begin_acquisition` fail.
    #[must_use]
    pub const fn with_failing_begin(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    /// Pace captures like a camera running at `1 / interval` frames per second.
    #[must_use]
    pub const fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    /// Counters for everything done to this device so far.
    #[must_use]
    pub const fn stats(&self) -> &MockStats {
        &self.stats
    }

    /// Frames captured but not yet released.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Stream mode selected through `set_stream_mode`, if any.
    #[must_use]
    pub const fn stream_mode(&self) -> Option<StreamMode> {
        self.stream_mode
    }

    /// Offset selected through `set_offset`.
    #[must_use]
    pub const fn offset(&self) -> (u32, u32) {
        self.offset
    }
}

impl CameraDevice for MockDevice {
    type Stream<'a> = MockStream<'a>;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> Result<Format> {
        Ok(self.format.clone())
    }

    fn set_resolution(&mut self, width: u32, height: u32) -> Result<WriteOutcome> {
        if !self.resolution_writable {
            return Ok(WriteOutcome::Unsupported);
        }
        self.format = Format::new(width, height, self.format.fourcc);
        Ok(WriteOutcome::Applied)
    }

    fn set_offset(&mut self, x: u32, y: u32) -> Result<WriteOutcome> {
        if !self.offset_writable {
            return Ok(WriteOutcome::Unsupported);
        }
        self.offset = (x, y);
        Ok(WriteOutcome::Applied)
    }

    fn set_stream_mode(&mut self, mode: StreamMode) -> Result<WriteOutcome> {
        let Some(modes) = &self.stream_modes else {
            return Ok(WriteOutcome::Unsupported);
        };
        if !modes.contains(&mode) {
            return Err(CameraError::StreamModeUnavailable(mode));
        }
        self.stream_mode = Some(mode);
        Ok(WriteOutcome::Applied)
    }

    fn begin_acquisition(&mut self, _buffer_count: u32) -> Result<Self::Stream<'_>> {
        if self.fail_begin {
            return Err(CameraError::StreamError(
                "mock acquisition refused to start".to_owned(),
            ));
        }
        self.stats.sessions_begun += 1;
        Ok(MockStream { device: self })
    }
}

/// Mock capture stream for testing.
pub struct MockStream<'a> {
    device: &'a mut MockDevice,
}

impl MockStream<'_> {
    fn deliver(&mut self, complete: bool, empty: bool) -> Frame {
        let device = &mut *self.device;
        let format = &device.format;

        let seq = device.frame_count;
        device.frame_count += 1;
        device.outstanding.insert(seq);
        device.stats.frames_delivered += 1;

        let (width, height, data) = if empty {
            (0, 0, Vec::new())
        } else {
            (
                format.width,
                format.height,
                render_pattern(format, device.pattern),
            )
        };

        #[allow(clippy::cast_possible_truncation)]
        let bytes_used = data.len() as u32;

        Frame {
            width,
            height,
            fourcc: format.fourcc,
            data,
            metadata: FrameMetadata {
                sequence: seq,
                timestamp: Duration::from_millis(seq * 33), // ~30fps
                bytes_used,
                complete,
            },
        }
    }
}

impl FrameSource for MockStream<'_> {
    fn capture(&mut self, timeout: Duration) -> std::result::Result<Frame, CaptureError> {
        self.device.stats.capture_calls += 1;
        if let Some(interval) = self.device.frame_interval {
            std::thread::sleep(interval.min(timeout));
        }
        match self.device.script.pop_front().unwrap_or(MockCapture::Frame) {
            MockCapture::Frame => Ok(self.deliver(true, false)),
            MockCapture::Incomplete => Ok(self.deliver(false, false)),
            MockCapture::Empty => Ok(self.deliver(true, true)),
            MockCapture::Transient => Err(CaptureError::Transient("mock timeout".to_owned())),
            MockCapture::Fatal => Err(CaptureError::Fatal("mock device lost".to_owned())),
        }
    }

    fn release(&mut self, frame: Frame) {
        if self.device.outstanding.remove(&frame.metadata.sequence) {
            self.device.stats.frames_released += 1;
        } else {
            self.device.stats.bad_releases += 1;
        }
    }

    fn end_acquisition(&mut self) -> Result<()> {
        self.device.stats.sessions_ended += 1;
        Ok(())
    }
}

/// Display sink that records what it was shown and can be told to break.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    /// Sequence numbers of shown frames, in order.
    pub shown: Vec<u64>,
    fail_after: Option<usize>,
}

impl RecordingDisplay {
    /// Fail every `show` call after the first `count` succeed.
    #[must_use]
    pub const fn failing_after(count: usize) -> Self {
        Self {
            shown: Vec::new(),
            fail_after: Some(count),
        }
    }
}

impl DisplaySink for RecordingDisplay {
    fn show(&mut self, frame: &Frame) -> std::result::Result<(), DisplayError> {
        if self.fail_after.is_some_and(|limit| self.shown.len() >= limit) {
            return Err(DisplayError("mock surface lost".to_owned()));
        }
        self.shown.push(frame.metadata.sequence);
        Ok(())
    }
}

/// Frame writer that keeps saves in memory.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    /// Paths written, with the geometry of the frame written there.
    pub saved: Vec<(PathBuf, u32, u32)>,
    fail: bool,
}

impl MemoryWriter {
    /// A writer whose every write fails.
    #[must_use]
    pub const fn failing() -> Self {
        Self {
            saved: Vec::new(),
            fail: true,
        }
    }
}

impl FrameWriter for MemoryWriter {
    fn write(&mut self, frame: &Frame, path: &Path) -> std::result::Result<(), SaveError> {
        if self.fail {
            return Err(SaveError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "mock disk is read-only",
            )));
        }
        self.saved
            .push((path.to_path_buf(), frame.width, frame.height));
        Ok(())
    }
}

/// SMPTE bars as (Y, U, V), left to right.
const BARS: [(u8, u8, u8); 8] = [
    (235, 128, 128),
    (210, 16, 146),
    (170, 166, 16),
    (145, 54, 34),
    (106, 202, 222),
    (81, 90, 240),
    (41, 240, 110),
    (16, 128, 128),
];

impl TestPattern {
    /// (Y, U, V) at column `x` of a `width`-wide frame.
    fn yuv_at(self, x: u32, width: u32) -> (u8, u8, u8) {
        let width = width.max(1);
        match self {
            Self::ColorBars => {
                let bar = (x.saturating_mul(8) / width).min(7) as usize;
                BARS.get(bar).copied().unwrap_or((16, 128, 128))
            }
            Self::Gradient => {
                let luma = u8::try_from(x.saturating_mul(255) / width).unwrap_or(u8::MAX);
                (luma, 128, 128)
            }
            Self::Solid(y, u, v) => (y, u, v),
        }
    }
}

/// Render one frame of `pattern` in the device's pixel format.
///
/// Patterns only vary by column, so one row is built and repeated. GREY and
/// RGB3 devices get the luma only.
fn render_pattern(format: &Format, pattern: TestPattern) -> Vec<u8> {
    let width = format.width;
    let mut row = Vec::with_capacity(format.stride as usize);

    for x in (0..width).step_by(2) {
        let (y, u, v) = pattern.yuv_at(x, width);
        let pixels = if x + 1 < width { 2 } else { 1 };
        match format.fourcc {
            FourCC::GREY => row.extend(std::iter::repeat(y).take(pixels)),
            FourCC::RGB3 => row.extend(std::iter::repeat([y, y, y]).take(pixels).flatten()),
            _ => row.extend_from_slice(&[y, u, y, v]),
        }
    }

    row.repeat(format.height as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[test]
    fn test_mock_device_creation() {
        let device = MockDevice::new();
        assert_eq!(device.capabilities().driver, "mock");
        assert!(device.capabilities().can_capture);
        assert!(device.capabilities().can_stream);
    }

    #[test]
    fn test_mock_device_settings() {
        let mut device = MockDevice::new();
        assert_eq!(
            device.set_resolution(1280, 720).expect("set_resolution failed"),
            WriteOutcome::Applied
        );
        let format = device.format().expect("format failed");
        assert_eq!((format.width, format.height), (1280, 720));

        assert_eq!(
            device.set_stream_mode(StreamMode::Socket).expect("set_stream_mode failed"),
            WriteOutcome::Unsupported
        );
    }

    #[test]
    fn test_mock_stream_mode_entries() {
        let mut device = MockDevice::new().with_stream_modes(vec![StreamMode::Socket]);
        assert!(device.set_stream_mode(StreamMode::Socket).is_ok());
        assert_eq!(device.stream_mode(), Some(StreamMode::Socket));
        assert!(matches!(
            device.set_stream_mode(StreamMode::LightWeightFilter),
            Err(CameraError::StreamModeUnavailable(StreamMode::LightWeightFilter))
        ));
    }

    #[test]
    fn test_mock_stream_capture() {
        let mut device = MockDevice::new();
        let mut stream = device.begin_acquisition(4).expect("begin failed");

        let frame1 = stream.capture(TIMEOUT).expect("capture failed");
        assert_eq!(frame1.metadata.sequence, 0);
        assert!(frame1.is_complete());
        assert!(!frame1.data.is_empty());

        let frame2 = stream.capture(TIMEOUT).expect("capture failed");
        assert_eq!(frame2.metadata.sequence, 1);

        stream.release(frame1);
        stream.release(frame2);
        assert_eq!(device.outstanding(), 0);
        assert_eq!(device.stats().frames_released, 2);
    }

    #[test]
    fn test_mock_script() {
        let mut device = MockDevice::new().with_script([
            MockCapture::Transient,
            MockCapture::Incomplete,
            MockCapture::Empty,
            MockCapture::Fatal,
        ]);
        let mut stream = device.begin_acquisition(4).expect("begin failed");

        assert!(matches!(
            stream.capture(TIMEOUT),
            Err(CaptureError::Transient(_))
        ));
        let incomplete = stream.capture(TIMEOUT).expect("capture failed");
        assert!(!incomplete.is_complete());
        let empty = stream.capture(TIMEOUT).expect("capture failed");
        assert!(empty.is_empty());
        assert!(matches!(stream.capture(TIMEOUT), Err(CaptureError::Fatal(_))));
        assert!(stream.capture(TIMEOUT).is_ok());
    }

    #[test]
    fn test_double_release_is_counted() {
        let mut device = MockDevice::new();
        let mut stream = device.begin_acquisition(4).expect("begin failed");
        let frame = stream.capture(TIMEOUT).expect("capture failed");
        stream.release(frame.clone());
        stream.release(frame);
        assert_eq!(device.stats().bad_releases, 1);
    }

    #[test]
    fn test_color_bars_run_white_to_black() {
        let format = Format::new(64, 4, FourCC::YUYV);
        let data = render_pattern(&format, TestPattern::ColorBars);

        assert_eq!(data.len(), 64 * 4 * 2);
        assert_eq!(data.first(), Some(&235));
        // Luma of the rightmost pixel pair on the first row
        assert_eq!(data.get(62 * 2), Some(&16));
    }

    #[test]
    fn test_gradient_brightens_left_to_right() {
        let format = Format::new(32, 2, FourCC::GREY);
        let data = render_pattern(&format, TestPattern::Gradient);

        let row = data.get(..32).expect("row missing");
        assert_eq!(row.first(), Some(&0));
        assert!(row.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(row.last().is_some_and(|&v| v > 200));
    }

    #[test]
    fn test_solid_yuyv_layout() {
        let format = Format::new(8, 8, FourCC::YUYV);
        let data = render_pattern(&format, TestPattern::Solid(128, 64, 192));
        assert!(data.chunks_exact(4).all(|px| px == [128, 64, 128, 192]));
    }

    #[test]
    fn test_grey_and_rgb_devices_carry_luma() {
        let grey = render_pattern(&Format::new(16, 4, FourCC::GREY), TestPattern::Solid(77, 0, 0));
        assert_eq!(grey.len(), 64);
        assert!(grey.iter().all(|&v| v == 77));

        let rgb = render_pattern(&Format::new(5, 3, FourCC::RGB3), TestPattern::Solid(90, 0, 0));
        assert_eq!(rgb.len(), 5 * 3 * 3);
        assert!(rgb.iter().all(|&v| v == 90));
    }
}
