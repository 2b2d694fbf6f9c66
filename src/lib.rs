//! Tether-Capture: a tethered camera capture loop with operator snapshots
//!
//! A camera is configured once, put into continuous acquisition, and then
//! driven tick by tick: grab a frame, convert it to 8-bit mono, show it, and
//! poll the operator. A save request writes the full-resolution frame under a
//! group/image naming scheme that rolls over every three images.
//!
//! Hardware sits behind [`CameraDevice`] and [`FrameSource`], so the whole loop
//! runs against [`mock::MockDevice`] in tests and for `stub://` devices.

pub mod acquisition;
pub mod config;
pub mod convert;
#[cfg(feature = "v4l2")]
pub mod device;
pub mod display;
pub mod input;
pub mod mock;
pub mod naming;
pub mod session;
pub mod storage;
pub mod traits;
pub mod validation;

pub use acquisition::{AcquisitionLoop, LoopSettings, LoopStats, LoopSummary, StopReason};
pub use config::Config;
#[cfg(feature = "v4l2")]
pub use device::V4L2Device;
pub use input::{InputKey, InputSource, LoopCommand, OperatorInputHandler};
pub use naming::{NamingSequencer, NamingState, IMAGES_PER_GROUP};
pub use session::{run_all, run_camera, RunOutcome, SessionError};
pub use traits::{
    CameraDevice, CameraError, CaptureError, DeviceCapabilities, DisplaySink, Format, FourCC,
    Frame, FrameConverter, FrameMetadata, FrameSource, FrameWriter,
};
