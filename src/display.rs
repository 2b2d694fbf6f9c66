//! Preview sinks.
//!
//! A sink only ever sees a borrowed frame; any scaling happens on a private
//! copy so the frame that gets saved is untouched.

use image::imageops::{self, FilterType};
use image::GrayImage;
use tracing::debug;

use crate::traits::{DisplayError, DisplaySink, FourCC, Frame};

/// Return a copy of a Mono8 frame scaled by `scale` in both directions.
pub fn downscale(frame: &Frame, scale: f32) -> Result<Frame, DisplayError> {
    if frame.fourcc != FourCC::GREY {
        return Err(DisplayError(format!(
            "preview expects GREY frames, got {}",
            frame.fourcc
        )));
    }
    let image = GrayImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| {
            DisplayError(format!(
                "{}x{} frame with {} bytes",
                frame.width,
                frame.height,
                frame.data.len()
            ))
        })?;

    let (width, height) = scaled_dimensions(frame.width, frame.height, scale);
    let resized = imageops::resize(&image, width, height, FilterType::Triangle);

    Ok(Frame {
        width,
        height,
        fourcc: FourCC::GREY,
        data: resized.into_raw(),
        metadata: frame.metadata.clone(),
    })
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scaled_dimensions(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let scale_dim = |dim: u32| ((dim as f32 * scale).round() as u32).max(1);
    (scale_dim(width), scale_dim(height))
}

/// Sink for runs without a window: logs what would have been shown.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    shown: u64,
}

impl HeadlessDisplay {
    /// Number of frames handed to this sink.
    #[must_use]
    pub const fn shown(&self) -> u64 {
        self.shown
    }
}

impl DisplaySink for HeadlessDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        self.shown += 1;
        debug!(
            sequence = frame.metadata.sequence,
            width = frame.width,
            height = frame.height,
            "preview"
        );
        Ok(())
    }
}

#[cfg(feature = "preview")]
pub use window::{PreviewDisplay, PreviewKeys, PreviewWindow};

#[cfg(feature = "preview")]
mod window {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use minifb::{Key, KeyRepeat, Window, WindowOptions};

    use super::downscale;
    use crate::input::{InputKey, InputSource};
    use crate::traits::{DisplayError, DisplaySink, Frame};

    /// Opens a live-view window shared by a display half and a keyboard half.
    pub struct PreviewWindow;

    impl PreviewWindow {
        /// Open a window sized for `width`x`height` frames shown at `scale`.
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        pub fn open(
            title: &str,
            width: u32,
            height: u32,
            scale: f32,
        ) -> Result<(PreviewDisplay, PreviewKeys), DisplayError> {
            let (w, h) = super::scaled_dimensions(width, height, scale);
            let window = Window::new(title, w as usize, h as usize, WindowOptions::default())
                .map_err(|err| DisplayError(err.to_string()))?;
            let window = Rc::new(RefCell::new(window));

            Ok((
                PreviewDisplay {
                    window: Rc::clone(&window),
                    scale,
                    pixels: Vec::new(),
                },
                PreviewKeys {
                    window,
                    pending: VecDeque::new(),
                },
            ))
        }
    }

    /// Rendering half of the preview window.
    pub struct PreviewDisplay {
        window: Rc<RefCell<Window>>,
        scale: f32,
        pixels: Vec<u32>,
    }

    impl DisplaySink for PreviewDisplay {
        fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
            let preview = downscale(frame, self.scale)?;

            self.pixels.clear();
            self.pixels.extend(preview.data.iter().map(|&v| {
                let v = u32::from(v);
                (v << 16) | (v << 8) | v
            }));

            self.window
                .borrow_mut()
                .update_with_buffer(
                    &self.pixels,
                    preview.width as usize,
                    preview.height as usize,
                )
                .map_err(|err| DisplayError(err.to_string()))
        }
    }

    /// Keyboard half of the preview window.
    pub struct PreviewKeys {
        window: Rc<RefCell<Window>>,
        pending: VecDeque<InputKey>,
    }

    impl InputSource for PreviewKeys {
        fn poll(&mut self) -> Option<InputKey> {
            if self.pending.is_empty() {
                let window = self.window.borrow();
                if !window.is_open() {
                    return Some(InputKey::Closed);
                }
                self.pending
                    .extend(window.get_keys_pressed(KeyRepeat::No).into_iter().filter_map(
                        |key| match key {
                            Key::Escape => Some(InputKey::Escape),
                            Key::Q => Some(InputKey::Char('q')),
                            _ => None,
                        },
                    ));
            }
            self.pending.pop_front()
        }
    }
}
