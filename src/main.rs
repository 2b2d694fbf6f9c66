//! Tether-capture binary: live view with operator-driven snapshots.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tether_capture::config::Config;
use tether_capture::convert::Mono8Converter;
use tether_capture::display::HeadlessDisplay;
use tether_capture::input::ConsoleInput;
use tether_capture::mock::MockDevice;
use tether_capture::naming::NamingSequencer;
use tether_capture::storage::PngWriter;
use tether_capture::{run_all, run_camera, CameraDevice, LoopSummary, SessionError};

/// Frame period of `stub://` cameras, roughly 30 fps.
const STUB_FRAME_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(long, env = "TETHER_CAPTURE_CONFIG")]
    config: Option<PathBuf>,

    /// Group id of the first snapshot.
    #[arg(long)]
    group_id: Option<u64>,

    /// Directory snapshots are written to.
    #[arg(long, env = "TETHER_CAPTURE_OUTPUT")]
    output_dir: Option<PathBuf>,

    /// Device to run (path, index, or `stub://name`). Repeat for several cameras.
    #[arg(long = "device")]
    devices: Vec<String>,

    /// Per-frame capture timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Number of acquisition buffers.
    #[arg(long)]
    buffers: Option<u32>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Run without a preview window.
    #[arg(long)]
    no_preview: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        devices = ?config.capture.devices,
        output = %config.output.directory.display(),
        group_id = config.output.group_id,
        "starting"
    );

    let mut console = ConsoleInput::spawn().context("failed to start console input")?;
    let outcome = run_all(&config, |name, naming| {
        run_device(name, naming, &config, &mut console)
    })?;

    Ok(outcome.exit_code())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(group_id) = args.group_id {
        config.output.group_id = group_id;
    }
    if let Some(dir) = &args.output_dir {
        config.output.directory.clone_from(dir);
    }
    if !args.devices.is_empty() {
        config.capture.devices.clone_from(&args.devices);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.capture.timeout_ms = timeout_ms;
    }
    if let Some(buffers) = args.buffers {
        config.capture.buffer_count = buffers;
    }
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if args.no_preview {
        config.display.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

fn run_device(
    name: &str,
    naming: &mut NamingSequencer,
    config: &Config,
    console: &mut ConsoleInput,
) -> Result<LoopSummary, SessionError> {
    if let Some(label) = name.strip_prefix("stub://") {
        info!(label, "using synthetic camera");
        let mut device = MockDevice::new().with_frame_interval(STUB_FRAME_INTERVAL);
        return run_with_sinks(&mut device, naming, config, console);
    }
    run_hardware(name, naming, config, console)
}

#[cfg(feature = "v4l2")]
fn run_hardware(
    name: &str,
    naming: &mut NamingSequencer,
    config: &Config,
    console: &mut ConsoleInput,
) -> Result<LoopSummary, SessionError> {
    let mut device = tether_capture::V4L2Device::open_path(name)?;
    run_with_sinks(&mut device, naming, config, console)
}

#[cfg(not(feature = "v4l2"))]
fn run_hardware(
    name: &str,
    _naming: &mut NamingSequencer,
    _config: &Config,
    _console: &mut ConsoleInput,
) -> Result<LoopSummary, SessionError> {
    Err(tether_capture::CameraError::DeviceNotFound(format!(
        "{name} (built without the v4l2 feature)"
    ))
    .into())
}

fn run_with_sinks<Dev: CameraDevice>(
    device: &mut Dev,
    naming: &mut NamingSequencer,
    config: &Config,
    console: &mut ConsoleInput,
) -> Result<LoopSummary, SessionError> {
    #[cfg(feature = "preview")]
    if config.display.enabled {
        use tether_capture::display::PreviewWindow;

        match PreviewWindow::open(
            "tether-capture",
            config.capture.width,
            config.capture.height,
            config.display.scale,
        ) {
            Ok((display, keys)) => {
                return run_camera(
                    device,
                    naming,
                    config,
                    Mono8Converter,
                    display,
                    (&mut *console, keys),
                    PngWriter,
                );
            }
            Err(err) => tracing::warn!(error = %err, "preview unavailable, running headless"),
        }
    }

    run_camera(
        device,
        naming,
        config,
        Mono8Converter,
        HeadlessDisplay::default(),
        console,
        PngWriter,
    )
}
