//! Snapshot persistence.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

use image::GrayImage;
use tracing::debug;

use crate::traits::{FourCC, Frame, FrameWriter, SaveError};

const PROBE_FILE: &str = ".tether-capture-write-test";

/// Check that `dir` exists (creating it if needed) and accepts new files.
///
/// A probe file is created and removed again; nothing is left behind.
pub fn verify_writable(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;

    let probe = dir.join(PROBE_FILE);
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe)?;
    fs::remove_file(&probe)?;

    debug!(dir = %dir.display(), "output directory is writable");
    Ok(())
}

/// Writes Mono8 frames as 8-bit greyscale PNG files.
#[derive(Debug, Default)]
pub struct PngWriter;

impl FrameWriter for PngWriter {
    fn write(&mut self, frame: &Frame, path: &Path) -> Result<(), SaveError> {
        if frame.fourcc != FourCC::GREY {
            return Err(SaveError::InvalidFrame(format!(
                "expected GREY, got {}",
                frame.fourcc
            )));
        }
        let len = frame.width as usize * frame.height as usize;
        let data = frame
            .data
            .get(..len)
            .ok_or_else(|| {
                SaveError::InvalidFrame(format!(
                    "{}x{} needs {len} bytes, buffer has {}",
                    frame.width,
                    frame.height,
                    frame.data.len()
                ))
            })?
            .to_vec();

        let image = GrayImage::from_raw(frame.width, frame.height, data)
            .ok_or_else(|| SaveError::InvalidFrame("buffer size mismatch".to_owned()))?;
        image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}
