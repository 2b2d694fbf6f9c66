//! The capture, convert, display, poll, save cycle.
//!
//! Each call to [`AcquisitionLoop::tick`] runs one cycle in a fixed order and
//! reports whether the loop should keep going. Per-tick failures are contained
//! here: transient capture errors, incomplete frames and empty conversions are
//! logged and skipped, while a broken source, converter or display stops the
//! loop with a [`StopReason`]. Every frame that was captured is released
//! before `tick` returns, whichever branch was taken.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::input::{InputSource, LoopCommand, OperatorInputHandler};
use crate::naming::{NamingSequencer, SaveTarget};
use crate::traits::{CaptureError, DisplaySink, Frame, FrameConverter, FrameSource, FrameWriter};
use crate::validation::{validate_frame, SequenceTracker};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The operator asked to exit.
    OperatorExit,
    /// The frame source reported a fatal error.
    SourceFailed,
    /// The converter could not produce a canonical frame.
    ConvertFailed,
    /// The preview surface broke.
    DisplayFailed,
}

impl StopReason {
    /// Whether this is a normal termination.
    #[must_use]
    pub const fn is_clean(self) -> bool {
        matches!(self, Self::OperatorExit)
    }
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    /// Run another tick.
    Running,
    /// The loop is finished.
    Stopped(StopReason),
}

/// Counters kept across the life of a loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Ticks run.
    pub ticks: u64,
    /// Frames returned by the source (complete or not).
    pub frames_captured: u64,
    /// Frames flagged incomplete.
    pub incomplete: u64,
    /// Transient capture failures.
    pub transient_errors: u64,
    /// Converted frames too degenerate to show.
    pub empty_frames: u64,
    /// Frames missing from the source's sequence numbering.
    pub dropped: u64,
    /// Snapshots written.
    pub saved: u64,
    /// Snapshots that failed to write.
    pub save_failures: u64,
}

/// Final outcome of [`AcquisitionLoop::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    /// Why the loop ended.
    pub reason: StopReason,
    /// Counters at the time it ended.
    pub stats: LoopStats,
}

impl LoopSummary {
    /// Whether the loop ended normally.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.reason.is_clean()
    }
}

/// Loop parameters that do not change during a run.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Upper bound on the wait for each frame.
    pub capture_timeout: Duration,
    /// Directory snapshots are written to.
    pub output_dir: PathBuf,
}

/// Drives one acquisition session.
///
/// The source and the naming state are borrowed: the caller opens and closes
/// the session, and naming carries on across sessions within one run.
pub struct AcquisitionLoop<'a, S, C, D, I, W> {
    source: &'a mut S,
    naming: &'a mut NamingSequencer,
    converter: C,
    display: D,
    input: OperatorInputHandler<I>,
    writer: W,
    settings: LoopSettings,
    tracker: SequenceTracker,
    stats: LoopStats,
}

impl<'a, S, C, D, I, W> AcquisitionLoop<'a, S, C, D, I, W>
where
    S: FrameSource,
    C: FrameConverter,
    D: DisplaySink,
    I: InputSource,
    W: FrameWriter,
{
    /// Assemble a loop over an already started source.
    pub fn new(
        source: &'a mut S,
        naming: &'a mut NamingSequencer,
        converter: C,
        display: D,
        input: I,
        writer: W,
        settings: LoopSettings,
    ) -> Self {
        Self {
            source,
            naming,
            converter,
            display,
            input: OperatorInputHandler::new(input),
            writer,
            settings,
            tracker: SequenceTracker::default(),
            stats: LoopStats::default(),
        }
    }

    /// Tick until the loop stops.
    pub fn run(&mut self) -> LoopSummary {
        info!(
            timeout = ?self.settings.capture_timeout,
            dir = %self.settings.output_dir.display(),
            next = %self.naming.current(),
            "acquisition started"
        );

        let reason = loop {
            if let LoopStatus::Stopped(reason) = self.tick() {
                break reason;
            }
        };

        let stats = self.stats.clone();
        if reason.is_clean() {
            info!(?reason, ?stats, "acquisition finished");
        } else {
            error!(?reason, ?stats, "acquisition aborted");
        }
        LoopSummary { reason, stats }
    }

    /// Run a single capture cycle.
    pub fn tick(&mut self) -> LoopStatus {
        self.stats.ticks += 1;

        match self.source.capture(self.settings.capture_timeout) {
            Ok(frame) => {
                let status = self.process(&frame);
                self.source.release(frame);
                status
            }
            Err(CaptureError::Transient(reason)) => {
                self.stats.transient_errors += 1;
                warn!(error = %reason, "image error, retrying next tick");
                self.poll_operator(None)
            }
            Err(CaptureError::Fatal(reason)) => {
                error!(error = %reason, "capture failed");
                LoopStatus::Stopped(StopReason::SourceFailed)
            }
        }
    }

    /// Counters so far.
    pub const fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// The display sink, e.g. to inspect a recording sink after a run.
    pub const fn display(&self) -> &D {
        &self.display
    }

    /// The frame writer.
    pub const fn writer(&self) -> &W {
        &self.writer
    }

    fn process(&mut self, frame: &Frame) -> LoopStatus {
        let sequence = frame.metadata.sequence;
        self.stats.frames_captured += 1;
        self.tracker.observe(sequence);
        self.stats.dropped = self.tracker.dropped();

        if !frame.is_complete() {
            self.stats.incomplete += 1;
            warn!(sequence, "image incomplete");
            return self.poll_operator(None);
        }

        let converted = match self.converter.convert(frame) {
            Ok(converted) => converted,
            Err(err) => {
                error!(sequence, error = %err, "conversion failed");
                return LoopStatus::Stopped(StopReason::ConvertFailed);
            }
        };

        if let Err(err) = validate_frame(&converted) {
            self.stats.empty_frames += 1;
            warn!(sequence, error = %err, "converted frame is empty, not displaying");
            return self.poll_operator(None);
        }

        if let Err(err) = self.display.show(&converted) {
            error!(sequence, error = %err, "display failed");
            return LoopStatus::Stopped(StopReason::DisplayFailed);
        }

        self.poll_operator(Some(&converted))
    }

    /// Poll the operator; `shown` is the full-resolution frame displayed this tick.
    fn poll_operator(&mut self, shown: Option<&Frame>) -> LoopStatus {
        match self.input.poll() {
            LoopCommand::None => LoopStatus::Running,
            LoopCommand::Exit => {
                info!("exit requested");
                LoopStatus::Stopped(StopReason::OperatorExit)
            }
            LoopCommand::Save => {
                match shown {
                    Some(frame) => self.save(frame),
                    None => warn!("save requested without a displayable frame, ignored"),
                }
                LoopStatus::Running
            }
        }
    }

    fn save(&mut self, frame: &Frame) {
        let state = self.naming.current();
        let target = SaveTarget::new(&self.settings.output_dir, state);

        match self.writer.write(frame, target.path()) {
            Ok(()) => {
                self.stats.saved += 1;
                info!(
                    path = %target.path().display(),
                    group_id = state.group_id,
                    image_id = state.image_id,
                    "saved"
                );
                self.naming.advance();
            }
            Err(err) => {
                self.stats.save_failures += 1;
                error!(path = %target.path().display(), error = %err, "save failed");
            }
        }
    }
}
