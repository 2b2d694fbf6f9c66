//! Operator input: raw keys in, loop commands out.

use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use tracing::{debug, warn};

/// A single unit of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKey {
    /// The escape key.
    Escape,
    /// The preview window was closed, stdin reached EOF, or Ctrl-C was pressed.
    Closed,
    /// Any printable key.
    Char(char),
}

/// What the operator asked the loop to do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopCommand {
    /// Keep going.
    #[default]
    None,
    /// Stop the loop normally.
    Exit,
    /// Save the current frame.
    Save,
}

/// Source of raw operator input. Polling never blocks.
pub trait InputSource {
    /// Return the next pending key, if any.
    fn poll(&mut self) -> Option<InputKey>;
}

impl<T: InputSource + ?Sized> InputSource for &mut T {
    fn poll(&mut self) -> Option<InputKey> {
        (**self).poll()
    }
}

/// Two sources polled in order; the first one with a key wins the tick.
impl<A: InputSource, B: InputSource> InputSource for (A, B) {
    fn poll(&mut self) -> Option<InputKey> {
        self.0.poll().or_else(|| self.1.poll())
    }
}

/// Map a raw key to a loop command.
#[must_use]
pub const fn map_key(key: InputKey) -> LoopCommand {
    match key {
        InputKey::Escape | InputKey::Closed => LoopCommand::Exit,
        InputKey::Char('q' | 'Q') => LoopCommand::Save,
        InputKey::Char(_) => LoopCommand::None,
    }
}

/// Polls an [`InputSource`] once per tick and maps the result.
pub struct OperatorInputHandler<I> {
    source: I,
}

impl<I: InputSource> OperatorInputHandler<I> {
    /// Wrap an input source.
    pub const fn new(source: I) -> Self {
        Self { source }
    }

    /// Poll one unit of input.
    pub fn poll(&mut self) -> LoopCommand {
        match self.source.poll() {
            Some(key) => {
                let command = map_key(key);
                debug!(?key, ?command, "operator input");
                command
            }
            None => LoopCommand::None,
        }
    }
}

/// Keys queued up front, then nothing. Drives the `stub://` device and tests.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    keys: VecDeque<Option<InputKey>>,
}

impl ScriptedInput {
    /// One entry per tick; `None` means no key on that tick.
    #[must_use]
    pub fn new<K>(keys: K) -> Self
    where
        K: IntoIterator<Item = Option<InputKey>>,
    {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Build a script from a compact string: `.` idle tick, `s` save, `x` exit.
    #[must_use]
    pub fn from_script(script: &str) -> Self {
        Self::new(script.chars().filter_map(|c| match c {
            '.' => Some(None),
            's' => Some(Some(InputKey::Char('q'))),
            'x' => Some(Some(InputKey::Escape)),
            _ => None,
        }))
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Option<InputKey> {
        self.keys.pop_front().flatten()
    }
}

/// Line-oriented console input read on a background thread.
///
/// Each line is one key: `esc`/`exit` map to escape, any other non-empty
/// line contributes its first character. EOF and Ctrl-C report `Closed`.
pub struct ConsoleInput {
    rx: Receiver<InputKey>,
    closed: bool,
}

impl ConsoleInput {
    /// Spawn the stdin reader and install the Ctrl-C handler.
    pub fn spawn() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();

        let ctrlc_tx = tx.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            let _ = ctrlc_tx.send(InputKey::Closed);
        }) {
            warn!(error = %err, "failed to install Ctrl-C handler");
        }

        thread::Builder::new()
            .name("console-input".to_owned())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if let Some(key) = parse_line(&line) {
                        if tx.send(key).is_err() {
                            return;
                        }
                    }
                }
                let _ = tx.send(InputKey::Closed);
            })?;

        Ok(Self { rx, closed: false })
    }
}

impl InputSource for ConsoleInput {
    fn poll(&mut self) -> Option<InputKey> {
        if self.closed {
            return Some(InputKey::Closed);
        }
        match self.rx.try_recv() {
            Ok(key) => Some(key),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                Some(InputKey::Closed)
            }
        }
    }
}

fn parse_line(line: &str) -> Option<InputKey> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("esc") || line.eq_ignore_ascii_case("exit") {
        return Some(InputKey::Escape);
    }
    line.chars().next().map(InputKey::Char)
}
