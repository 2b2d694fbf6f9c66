//! Conversion of raw frames into the canonical 8-bit single-channel format.

use crate::traits::{ConvertError, FourCC, Frame, FrameConverter};

/// Converts any supported capture format to `GREY` (Mono8).
#[derive(Debug, Clone, Copy, Default)]
pub struct Mono8Converter;

impl FrameConverter for Mono8Converter {
    fn convert(&self, frame: &Frame) -> Result<Frame, ConvertError> {
        let (width, height, data) = match frame.fourcc {
            FourCC::GREY => (frame.width, frame.height, grey_to_mono8(frame)?),
            FourCC::YUYV => (frame.width, frame.height, yuyv_to_mono8(frame)?),
            FourCC::RGB3 => (frame.width, frame.height, rgb_to_mono8(frame)?),
            FourCC::MJPG => mjpg_to_mono8(frame)?,
            other => return Err(ConvertError::Unsupported(other)),
        };

        Ok(Frame {
            width,
            height,
            fourcc: FourCC::GREY,
            data,
            metadata: frame.metadata.clone(),
        })
    }
}

fn pixel_count(frame: &Frame) -> usize {
    frame.width as usize * frame.height as usize
}

/// Borrow exactly `len` bytes from the frame, or report it as truncated.
fn payload(frame: &Frame, len: usize) -> Result<&[u8], ConvertError> {
    frame.data.get(..len).ok_or_else(|| ConvertError::Malformed {
        fourcc: frame.fourcc,
        reason: format!(
            "{}x{} needs {len} bytes, buffer has {}",
            frame.width,
            frame.height,
            frame.data.len()
        ),
    })
}

fn grey_to_mono8(frame: &Frame) -> Result<Vec<u8>, ConvertError> {
    Ok(payload(frame, pixel_count(frame))?.to_vec())
}

fn yuyv_to_mono8(frame: &Frame) -> Result<Vec<u8>, ConvertError> {
    // YUYV: [Y0 U Y1 V] per pixel pair, luma sits on the even bytes
    let data = payload(frame, pixel_count(frame) * 2)?;
    Ok(data.iter().step_by(2).copied().collect())
}

fn rgb_to_mono8(frame: &Frame) -> Result<Vec<u8>, ConvertError> {
    let data = payload(frame, pixel_count(frame) * 3)?;
    Ok(data
        .chunks_exact(3)
        .map(|px| match *px {
            [r, g, b] => luma_bt601(r, g, b),
            _ => 0,
        })
        .collect())
}

fn mjpg_to_mono8(frame: &Frame) -> Result<(u32, u32, Vec<u8>), ConvertError> {
    let decoded = image::load_from_memory_with_format(&frame.data, image::ImageFormat::Jpeg)
        .map_err(|err| ConvertError::Malformed {
            fourcc: frame.fourcc,
            reason: err.to_string(),
        })?;
    let luma = decoded.to_luma8();
    let (width, height) = luma.dimensions();
    Ok((width, height, luma.into_raw()))
}

/// ITU-R BT.601 luma in integer arithmetic.
fn luma_bt601(r: u8, g: u8, b: u8) -> u8 {
    let y = (299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b) + 500) / 1000;
    #[allow(clippy::cast_possible_truncation)]
    {
        y.min(255) as u8
    }
}
