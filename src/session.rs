//! Per-camera setup and the scoped acquisition session.
//!
//! A run checks the output directory first, then processes every configured
//! camera in turn: log device info, apply the fixed ROI and stream mode, begin
//! continuous acquisition, run the loop, and end acquisition exactly once.

use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{debug, error, info, warn};

use crate::acquisition::{AcquisitionLoop, LoopSettings, LoopSummary};
use crate::config::{CaptureConfig, Config};
use crate::input::InputSource;
use crate::naming::NamingSequencer;
use crate::storage::verify_writable;
use crate::traits::{
    CameraDevice, CameraError, DisplaySink, FrameConverter, FrameSource, FrameWriter,
    WriteOutcome,
};

/// Errors that end a camera's unit of work or the whole run.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The output directory failed the write probe.
    #[error("output directory {} is not writable: {source}", path.display())]
    OutputNotWritable {
        /// Directory that was probed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// No devices were configured.
    #[error("no camera found")]
    NoCamera,
    /// Device setup or teardown failed.
    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Aggregate result of processing all cameras.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Cameras attempted.
    pub cameras: usize,
    /// Cameras whose setup failed or whose loop stopped abnormally.
    pub failed: usize,
}

impl RunOutcome {
    /// Whether every camera finished cleanly.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.cameras > 0 && self.failed == 0
    }

    /// Process exit status for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// Log the device information block. Missing fields are reported, not fatal.
pub fn log_device_info<D: CameraDevice>(device: &D) {
    let caps = device.capabilities();
    if caps.driver.is_empty() && caps.card.is_empty() {
        info!("device information not available");
        return;
    }
    info!(
        driver = %caps.driver,
        card = %caps.card,
        bus = %caps.bus_info,
        can_capture = caps.can_capture,
        can_stream = caps.can_stream,
        "device information"
    );
    match device.format() {
        Ok(format) => info!(
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "current format"
        ),
        Err(err) => info!(error = %err, "current format not readable"),
    }
}

/// Apply resolution, ROI offset and stream mode ahead of acquisition.
///
/// Resolution is required; offset and stream mode fall back to the device's
/// own settings when it does not expose them.
pub fn configure_device<D: CameraDevice>(
    device: &mut D,
    capture: &CaptureConfig,
) -> Result<(), CameraError> {
    match device.set_resolution(capture.width, capture.height)? {
        WriteOutcome::Applied => {
            info!(width = capture.width, height = capture.height, "resolution set");
        }
        WriteOutcome::Unsupported => {
            error!(
                width = capture.width,
                height = capture.height,
                "width or height not writable"
            );
            return Err(CameraError::NotWritable("Width/Height"));
        }
    }

    match device.set_offset(capture.offset_x, capture.offset_y)? {
        WriteOutcome::Applied => {
            info!(x = capture.offset_x, y = capture.offset_y, "offset set");
        }
        WriteOutcome::Unsupported => {
            warn!("offset not writable, ROI may not be centered");
        }
    }

    let mode = capture.stream_mode;
    match device.set_stream_mode(mode)? {
        WriteOutcome::Applied => info!(mode = mode.entry_name(), "stream mode set"),
        WriteOutcome::Unsupported => debug!("device has no stream mode setting, skipped"),
    }

    Ok(())
}

/// Set up one camera, run its acquisition loop and tear the session down.
///
/// `end_acquisition` is called exactly once whenever acquisition began,
/// however the loop ended.
pub fn run_camera<Dev, C, D, I, W>(
    device: &mut Dev,
    naming: &mut NamingSequencer,
    config: &Config,
    converter: C,
    display: D,
    input: I,
    writer: W,
) -> Result<LoopSummary, SessionError>
where
    Dev: CameraDevice,
    C: FrameConverter,
    D: DisplaySink,
    I: InputSource,
    W: FrameWriter,
{
    log_device_info(device);
    configure_device(device, &config.capture)?;

    let mut stream = device.begin_acquisition(config.capture.buffer_count)?;
    info!(
        buffers = config.capture.buffer_count,
        "continuous acquisition started"
    );

    let summary = AcquisitionLoop::new(
        &mut stream,
        naming,
        converter,
        display,
        input,
        writer,
        LoopSettings {
            capture_timeout: config.capture.timeout(),
            output_dir: config.output.directory.clone(),
        },
    )
    .run();

    if let Err(err) = stream.end_acquisition() {
        error!(error = %err, "failed to end acquisition");
        return Err(err.into());
    }
    info!("acquisition ended");

    Ok(summary)
}

/// Process every configured camera in order.
///
/// `run_one` opens the named device and runs it (normally through
/// [`run_camera`]). It is never called if the output directory is unusable.
pub fn run_all<F>(config: &Config, mut run_one: F) -> Result<RunOutcome, SessionError>
where
    F: FnMut(&str, &mut NamingSequencer) -> Result<LoopSummary, SessionError>,
{
    let dir = &config.output.directory;
    if let Err(source) = verify_writable(dir) {
        error!(dir = %dir.display(), error = %source, "output directory check failed");
        return Err(SessionError::OutputNotWritable {
            path: dir.clone(),
            source,
        });
    }

    let devices = &config.capture.devices;
    info!(count = devices.len(), "cameras configured");
    if devices.is_empty() {
        error!("not enough cameras");
        return Err(SessionError::NoCamera);
    }

    let mut naming = NamingSequencer::new(config.output.group_id);
    let mut outcome = RunOutcome::default();

    for (index, device) in devices.iter().enumerate() {
        info!(index, device = %device, "running camera");
        outcome.cameras += 1;

        match run_one(device, &mut naming) {
            Ok(summary) if summary.is_clean() => {
                info!(index, saved = summary.stats.saved, "camera complete");
            }
            Ok(summary) => {
                outcome.failed += 1;
                error!(index, reason = ?summary.reason, "camera stopped abnormally");
            }
            Err(err) => {
                outcome.failed += 1;
                error!(index, device = %device, error = %err, "camera failed");
            }
        }
    }

    info!(
        cameras = outcome.cameras,
        failed = outcome.failed,
        next = %naming.current(),
        "run complete"
    );
    Ok(outcome)
}
