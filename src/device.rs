//! V4L2 device implementation using the v4l crate.

use std::time::Duration;

use tracing::{debug, warn};
use v4l::buffer::{Flags, Type};
use v4l::io::mmap::Stream;
use v4l::io::traits::{CaptureStream as V4lCaptureStream, Stream as V4lStream};
use v4l::video::Capture;
use v4l::Device;

use crate::traits::{
    CameraDevice, CameraError, CaptureError, DeviceCapabilities, Format, FourCC, Frame,
    FrameMetadata, FrameSource, Result, StreamMode, WriteOutcome,
};

/// V4L2 device implementation wrapping the v4l crate.
pub struct V4L2Device {
    device: Device,
    capabilities: DeviceCapabilities,
}

impl V4L2Device {
    /// Open a V4L2 device by index (e.g., 0 for /dev/video0).
    pub fn open(index: u32) -> Result<Self> {
        let device = Device::new(index as usize)
            .map_err(|err| CameraError::DeviceOpenFailed(err.to_string()))?;
        Self::from_device(device)
    }

    /// Open a V4L2 device by path, or by index when `path` is a bare number.
    pub fn open_path(path: &str) -> Result<Self> {
        if let Ok(index) = path.parse::<u32>() {
            return Self::open(index);
        }
        if !std::path::Path::new(path).exists() {
            return Err(CameraError::DeviceNotFound(path.to_owned()));
        }
        let device = Device::with_path(path)
            .map_err(|err| CameraError::DeviceOpenFailed(err.to_string()))?;
        Self::from_device(device)
    }

    fn from_device(device: Device) -> Result<Self> {
        let caps = device
            .query_caps()
            .map_err(|err| CameraError::DeviceOpenFailed(err.to_string()))?;

        let capabilities = DeviceCapabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            can_capture: caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE),
            can_stream: caps.capabilities.contains(v4l::capability::Flags::STREAMING),
        };

        Ok(Self {
            device,
            capabilities,
        })
    }
}

fn to_format(fmt: &v4l::Format) -> Format {
    Format {
        width: fmt.width,
        height: fmt.height,
        fourcc: FourCC::from(fmt.fourcc),
        stride: fmt.stride,
        size: fmt.size,
    }
}

impl CameraDevice for V4L2Device {
    type Stream<'a> = V4L2Stream<'a>;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> Result<Format> {
        let fmt = self
            .device
            .format()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        Ok(to_format(&fmt))
    }

    fn set_resolution(&mut self, width: u32, height: u32) -> Result<WriteOutcome> {
        let mut fmt = self
            .device
            .format()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        fmt.width = width;
        fmt.height = height;

        let fmt = match self.device.set_format(&fmt) {
            Ok(fmt) => fmt,
            Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => {
                debug!(error = %err, "driver rejected resolution");
                return Ok(WriteOutcome::Unsupported);
            }
            Err(err) => return Err(CameraError::StreamError(err.to_string())),
        };

        if fmt.width != width || fmt.height != height {
            warn!(
                requested_width = width,
                requested_height = height,
                width = fmt.width,
                height = fmt.height,
                "driver adjusted resolution"
            );
        }
        Ok(WriteOutcome::Applied)
    }

    fn set_offset(&mut self, _x: u32, _y: u32) -> Result<WriteOutcome> {
        // Cropping goes through the selection API, which the v4l crate does not wrap
        Ok(WriteOutcome::Unsupported)
    }

    fn set_stream_mode(&mut self, _mode: StreamMode) -> Result<WriteOutcome> {
        // Stream modes only exist on GigE transports
        Ok(WriteOutcome::Unsupported)
    }

    fn begin_acquisition(&mut self, buffer_count: u32) -> Result<Self::Stream<'_>> {
        let format = self.format()?;
        let stream = Stream::with_buffers(&self.device, Type::VideoCapture, buffer_count)
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        Ok(V4L2Stream {
            stream,
            format,
            pool: Vec::with_capacity(buffer_count as usize),
            pool_limit: buffer_count as usize,
            ended: false,
        })
    }
}

/// V4L2 capture stream wrapping mmap-based streaming.
///
/// Driver buffers are requeued by the v4l crate on the next dequeue; frames
/// hold a copy, and released copies are kept for reuse.
pub struct V4L2Stream<'a> {
    stream: Stream<'a>,
    format: Format,
    pool: Vec<Vec<u8>>,
    pool_limit: usize,
    ended: bool,
}

impl FrameSource for V4L2Stream<'_> {
    fn capture(&mut self, timeout: Duration) -> std::result::Result<Frame, CaptureError> {
        self.stream.set_timeout(timeout);

        let (buf, meta) = self
            .stream
            .next()
            .map_err(|err| CaptureError::from_io(&err))?;

        // Safe conversions: V4L2 timestamps are always non-negative in practice
        #[allow(clippy::cast_sign_loss)]
        let secs = meta.timestamp.sec.max(0) as u64;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let nanos = (meta.timestamp.usec.max(0) as u32).saturating_mul(1000);

        let used = (meta.bytesused as usize).min(buf.len());
        let mut data = self.pool.pop().unwrap_or_default();
        data.clear();
        data.extend_from_slice(buf.get(..used).unwrap_or(buf));

        let complete = !meta.flags.contains(Flags::ERROR) && used > 0;

        Ok(Frame {
            width: self.format.width,
            height: self.format.height,
            fourcc: self.format.fourcc,
            data,
            metadata: FrameMetadata {
                sequence: u64::from(meta.sequence),
                timestamp: Duration::new(secs, nanos),
                bytes_used: meta.bytesused,
                complete,
            },
        })
    }

    fn release(&mut self, frame: Frame) {
        if self.pool.len() < self.pool_limit {
            self.pool.push(frame.data);
        }
    }

    fn end_acquisition(&mut self) -> Result<()> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;
        self.stream
            .stop()
            .map_err(|err| CameraError::StreamError(err.to_string()))
    }
}
