//! Integration tests using the vivid virtual camera.
//!
//! These tests require:
//! - The `integration` feature flag: `cargo test --features integration`
//! - The vivid kernel module: `sudo modprobe vivid n_devs=1`
//! - Access to /dev/video* devices (may require video group membership)
//!
//! vivid exposes neither ROI offsets nor transport stream modes, so these
//! tests also cover the paths where the device declines those settings.

#![cfg(feature = "integration")]

use std::fs;
use std::path::Path;
use std::time::Duration;

use serial_test::serial;
use tether_capture::config::Config;
use tether_capture::convert::Mono8Converter;
use tether_capture::device::V4L2Device;
use tether_capture::input::ScriptedInput;
use tether_capture::mock::RecordingDisplay;
use tether_capture::naming::NamingSequencer;
use tether_capture::session::{configure_device, run_camera};
use tether_capture::storage::PngWriter;
use tether_capture::traits::{
    CameraDevice, FourCC, FrameConverter, FrameSource, StreamMode, WriteOutcome,
};
use tether_capture::validation::{validate_frame, validate_frame_sequence};
use tether_capture::StopReason;

const TIMEOUT: Duration = Duration::from_secs(2);

/// Find the first vivid device by checking sysfs driver names.
fn find_vivid_device() -> Option<u32> {
    let video4linux = Path::new("/sys/class/video4linux");
    (0..10).find(|index| {
        let name_path = video4linux.join(format!("video{index}")).join("name");
        fs::read_to_string(name_path)
            .is_ok_and(|name| name.to_lowercase().contains("vivid"))
            && V4L2Device::open(*index).is_ok()
    })
}

/// Fail, not skip, when vivid is missing so CI catches the misconfiguration.
macro_rules! require_vivid {
    () => {
        match find_vivid_device() {
            Some(idx) => idx,
            None => panic!(
                "vivid virtual camera not available.\n\
                 Load vivid with: sudo modprobe vivid n_devs=1\n\
                 Or run unit tests only: cargo test --lib"
            ),
        }
    };
}

fn small_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.output.directory = dir.to_path_buf();
    config.capture.width = 640;
    config.capture.height = 480;
    config.capture.timeout_ms = 2000;
    config
}

#[test]
#[serial]
fn test_vivid_device_open() {
    let index = require_vivid!();

    let device = V4L2Device::open(index).expect("Failed to open vivid device");
    let caps = device.capabilities();

    assert!(caps.driver.contains("vivid"), "Expected vivid driver");
    assert!(caps.can_capture, "vivid should support capture");
    assert!(caps.can_stream, "vivid should support streaming");
}

#[test]
#[serial]
fn test_vivid_open_by_path() {
    let index = require_vivid!();

    let device = V4L2Device::open_path(&format!("/dev/video{index}"))
        .expect("Failed to open vivid device by path");
    assert!(device.capabilities().driver.contains("vivid"));
}

#[test]
#[serial]
fn test_vivid_open_missing_path() {
    let result = V4L2Device::open_path("/dev/does-not-exist");
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_vivid_configure() {
    let index = require_vivid!();
    let dir = tempfile::tempdir().expect("tempdir failed");
    let config = small_config(dir.path());

    let mut device = V4L2Device::open(index).expect("Failed to open vivid device");
    configure_device(&mut device, &config.capture).expect("configure failed");

    let format = device.format().expect("Failed to query format");
    assert_eq!((format.width, format.height), (640, 480));
    assert_eq!(
        device.set_offset(200, 0).expect("set_offset failed"),
        WriteOutcome::Unsupported
    );
    assert_eq!(
        device
            .set_stream_mode(StreamMode::Socket)
            .expect("set_stream_mode failed"),
        WriteOutcome::Unsupported
    );
}

#[test]
#[serial]
fn test_vivid_capture_converts_to_mono() {
    let index = require_vivid!();

    let mut device = V4L2Device::open(index).expect("Failed to open vivid device");
    device.set_resolution(640, 480).expect("set_resolution failed");

    let mut stream = device.begin_acquisition(4).expect("Failed to begin acquisition");
    let frame = stream.capture(TIMEOUT).expect("Failed to capture frame");
    assert!(frame.is_complete(), "vivid frames should be complete");

    let mono = Mono8Converter.convert(&frame).expect("conversion failed");
    assert_eq!(mono.fourcc, FourCC::GREY);
    assert_eq!((mono.width, mono.height), (640, 480));
    validate_frame(&mono).expect("converted frame invalid");

    stream.release(frame);
    stream.end_acquisition().expect("Failed to end acquisition");
}

#[test]
#[serial]
fn test_vivid_capture_sequence() {
    let index = require_vivid!();

    let mut device = V4L2Device::open(index).expect("Failed to open vivid device");
    device.set_resolution(640, 480).expect("set_resolution failed");

    let mut stream = device.begin_acquisition(4).expect("Failed to begin acquisition");
    let mut frames = Vec::with_capacity(10);
    for _ in 0..10 {
        frames.push(stream.capture(TIMEOUT).expect("Failed to capture frame"));
    }

    let result = validate_frame_sequence(&frames);
    assert!(result.is_ok(), "Frame sequence validation failed: {:?}", result.err());

    for frame in frames {
        stream.release(frame);
    }
    stream.end_acquisition().expect("Failed to end acquisition");
}

#[test]
#[serial]
fn test_vivid_session_saves_snapshots() {
    let index = require_vivid!();
    let dir = tempfile::tempdir().expect("tempdir failed");
    let config = small_config(dir.path());

    let mut device = V4L2Device::open(index).expect("Failed to open vivid device");
    let mut naming = NamingSequencer::new(3);
    let summary = run_camera(
        &mut device,
        &mut naming,
        &config,
        Mono8Converter,
        RecordingDisplay::default(),
        ScriptedInput::from_script("..s.s.x"),
        PngWriter,
    )
    .expect("session failed");

    assert_eq!(summary.reason, StopReason::OperatorExit);
    assert_eq!(summary.stats.saved, 2);
    assert!(dir.path().join("3-1.png").exists());
    assert!(dir.path().join("3-2.png").exists());

    let image = image::open(dir.path().join("3-1.png")).expect("saved image unreadable");
    assert_eq!((image.width(), image.height()), (640, 480));
}
