//! Core traits and types for the tethered capture pipeline.
//!
//! The hardware transport, pixel conversion, preview rendering and file
//! encoding are all reached through the capability traits declared here, so
//! the acquisition loop can run against a real device or a scripted mock.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Pixel format representation (e.g., YUYV, MJPG, RGB3, GREY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// MJPEG pixel format (Motion JPEG).
    pub const MJPG: Self = Self::new(b"MJPG");
    /// RGB3 pixel format (24-bit RGB).
    pub const RGB3: Self = Self::new(b"RGB3");
    /// GREY pixel format (8-bit single channel). This is the canonical format.
    pub const GREY: Self = Self::new(b"GREY");

    /// Bytes per pixel for uncompressed formats, `None` for compressed ones.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> Option<u32> {
        match &self.0 {
            b"GREY" => Some(1),
            b"YUYV" => Some(2),
            b"RGB3" => Some(3),
            _ => None,
        }
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

#[cfg(feature = "v4l2")]
impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

#[cfg(feature = "v4l2")]
impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Video format specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
    /// Bytes per line (stride). Zero for compressed formats.
    pub stride: u32,
    /// Total frame size in bytes. Zero for compressed formats.
    pub size: u32,
}

impl Format {
    /// Create a new format specification.
    #[must_use]
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        let stride = match fourcc.bytes_per_pixel() {
            Some(bpp) => width * bpp,
            None => 0,
        };
        let size = stride * height;
        Self {
            width,
            height,
            fourcc,
            stride,
            size,
        }
    }
}

/// Device capability flags.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Whether the device can capture video.
    pub can_capture: bool,
    /// Whether the device supports streaming.
    pub can_stream: bool,
}

/// Transport stream mode requested from the device before acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// GigE Vision transport through the vendor filter.
    TeledyneGigeVision,
    /// Legacy light-weight filter driver.
    LightWeightFilter,
    /// Native OS network sockets.
    Socket,
}

impl StreamMode {
    /// Name of the enumeration entry the device exposes for this mode.
    #[must_use]
    pub const fn entry_name(self) -> &'static str {
        match self {
            Self::TeledyneGigeVision => "TeledyneGigeVision",
            Self::LightWeightFilter => "LWF",
            Self::Socket => "Socket",
        }
    }

    /// Mode used when the configuration does not name one.
    #[must_use]
    pub const fn platform_default() -> Self {
        if cfg!(windows) {
            Self::TeledyneGigeVision
        } else {
            Self::Socket
        }
    }
}

impl Default for StreamMode {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Result of a configuration write against the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The device accepted the value.
    Applied,
    /// The device does not expose this setting (or it is read-only).
    Unsupported,
}

/// Metadata for a captured frame.
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Monotonically increasing sequence number assigned by the source.
    pub sequence: u64,
    /// Capture timestamp.
    pub timestamp: Duration,
    /// Actual bytes used in the frame buffer.
    pub bytes_used: u32,
    /// Whether the transport delivered the whole frame.
    pub complete: bool,
}

/// A captured or converted video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format of `data`.
    pub fourcc: FourCC,
    /// Raw frame data.
    pub data: Vec<u8>,
    /// Frame metadata.
    pub metadata: FrameMetadata,
}

impl Frame {
    /// Whether the transport reported the frame as complete.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.metadata.complete
    }

    /// Whether the frame has no pixels to show or store.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }
}

/// Error type for camera setup and stream operations.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// No device answered to the given identifier.
    #[error("Device {0} not found")]
    DeviceNotFound(String),
    /// Failed to open device.
    #[error("Failed to open device: {0}")]
    DeviceOpenFailed(String),
    /// A required setting is not writable on this device.
    #[error("Setting {0} is not writable")]
    NotWritable(&'static str),
    /// The device has a stream mode setting but does not offer the requested entry.
    #[error("Stream mode {} not available", .0.entry_name())]
    StreamModeUnavailable(StreamMode),
    /// Error during streaming operation.
    #[error("Stream error: {0}")]
    StreamError(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Outcome of a single capture attempt that did not yield a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// Timeout or momentary link hiccup; the next capture may succeed.
    #[error("transient capture failure: {0}")]
    Transient(String),
    /// The stream is unusable for the rest of the session.
    #[error("fatal capture failure: {0}")]
    Fatal(String),
}

impl CaptureError {
    /// Classify an I/O error from the transport.
    #[must_use]
    pub fn from_io(err: &std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted => {
                Self::Transient(err.to_string())
            }
            _ => Self::Fatal(err.to_string()),
        }
    }
}

/// Conversion to the canonical format failed. Always fatal for the session.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The converter has no path from this pixel format.
    #[error("unsupported pixel format {0}")]
    Unsupported(FourCC),
    /// The buffer does not hold what its format claims.
    #[error("malformed {fourcc} buffer: {reason}")]
    Malformed {
        /// Source pixel format.
        fourcc: FourCC,
        /// What was wrong with it.
        reason: String,
    },
}

/// The preview surface cannot render. Terminates the acquisition loop.
#[derive(Debug, thiserror::Error)]
#[error("display failure: {0}")]
pub struct DisplayError(pub String);

/// Persisting a snapshot failed.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Encoder rejected the frame.
    #[error("encode error: {0}")]
    Encode(#[from] image::ImageError),
    /// The frame cannot be stored in the canonical format.
    #[error("frame not storable: {0}")]
    InvalidFrame(String),
}

/// Abstraction over camera device setup operations.
pub trait CameraDevice {
    /// The stream type returned by `begin_acquisition`.
    type Stream<'a>: FrameSource
    where
        Self: 'a;

    /// Get device capabilities.
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Get current format.
    fn format(&self) -> Result<Format>;

    /// Request a sensor resolution.
    fn set_resolution(&mut self, width: u32, height: u32) -> Result<WriteOutcome>;

    /// Request a region-of-interest offset.
    fn set_offset(&mut self, x: u32, y: u32) -> Result<WriteOutcome>;

    /// Select the transport stream mode.
    fn set_stream_mode(&mut self, mode: StreamMode) -> Result<WriteOutcome>;

    /// Start continuous acquisition with the specified number of buffers.
    fn begin_acquisition(&mut self, buffer_count: u32) -> Result<Self::Stream<'_>>;
}

/// Abstraction over an open acquisition session.
pub trait FrameSource {
    /// Wait up to `timeout` for the next frame.
    fn capture(&mut self, timeout: Duration) -> std::result::Result<Frame, CaptureError>;

    /// Hand a captured frame's buffer back to the source.
    fn release(&mut self, frame: Frame);

    /// Stop acquisition. Called exactly once, after the loop exits.
    fn end_acquisition(&mut self) -> Result<()>;
}

/// Pure conversion of a raw frame into the canonical single-channel format.
pub trait FrameConverter {
    /// Convert `frame` without mutating it.
    fn convert(&self, frame: &Frame) -> std::result::Result<Frame, ConvertError>;
}

/// Live preview surface.
pub trait DisplaySink {
    /// Render a preview of `frame`.
    fn show(&mut self, frame: &Frame) -> std::result::Result<(), DisplayError>;
}

/// Persists a converted frame to a path.
pub trait FrameWriter {
    /// Write `frame` to `path`.
    fn write(&mut self, frame: &Frame, path: &Path) -> std::result::Result<(), SaveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_stride_follows_pixel_format() {
        let yuyv = Format::new(640, 480, FourCC::YUYV);
        assert_eq!(yuyv.stride, 1280);
        assert_eq!(yuyv.size, 1280 * 480);

        let grey = Format::new(640, 480, FourCC::GREY);
        assert_eq!(grey.stride, 640);

        let mjpg = Format::new(640, 480, FourCC::MJPG);
        assert_eq!(mjpg.size, 0);
    }

    #[test]
    fn test_fourcc_display() {
        assert_eq!(FourCC::YUYV.to_string(), "YUYV");
    }

    #[test]
    fn test_capture_error_from_io() {
        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "select");
        assert!(matches!(
            CaptureError::from_io(&timeout),
            CaptureError::Transient(_)
        ));

        let gone = std::io::Error::new(std::io::ErrorKind::NotFound, "ENODEV");
        assert!(matches!(CaptureError::from_io(&gone), CaptureError::Fatal(_)));
    }

    #[test]
    fn test_stream_mode_entries() {
        assert_eq!(StreamMode::Socket.entry_name(), "Socket");
        assert_eq!(StreamMode::LightWeightFilter.entry_name(), "LWF");
        assert_eq!(
            StreamMode::TeledyneGigeVision.entry_name(),
            "TeledyneGigeVision"
        );
    }
}
