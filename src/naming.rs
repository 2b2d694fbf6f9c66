//! Group/image naming for saved snapshots.
//!
//! Every save writes `{dir}/{group}-{image}.png`. The image id cycles through
//! `1..=IMAGES_PER_GROUP`; rolling past the last image starts the next group.

use std::fmt;
use std::path::{Path, PathBuf};

/// Number of images taken per group before the group id advances.
pub const IMAGES_PER_GROUP: u32 = 3;

/// Extension of every persisted snapshot.
pub const IMAGE_EXTENSION: &str = "png";

/// Current position of the naming counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingState {
    /// Group identifier, starting at the operator-supplied value.
    pub group_id: u64,
    /// Image identifier within the group, always in `1..=IMAGES_PER_GROUP`.
    pub image_id: u32,
}

impl fmt::Display for NamingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.group_id, self.image_id)
    }
}

/// Owns the naming state and advances it once per successful save.
#[derive(Debug, Clone)]
pub struct NamingSequencer {
    state: NamingState,
}

impl NamingSequencer {
    /// Start a sequence at `group_id` with the first image of the group.
    #[must_use]
    pub const fn new(group_id: u64) -> Self {
        Self {
            state: NamingState {
                group_id,
                image_id: 1,
            },
        }
    }

    /// Current state, without advancing.
    #[must_use]
    pub const fn current(&self) -> NamingState {
        self.state
    }

    /// Move to the next image, rolling over into the next group after the last one.
    pub fn advance(&mut self) {
        self.state.image_id += 1;
        if self.state.image_id > IMAGES_PER_GROUP {
            self.state.image_id = 1;
            self.state.group_id += 1;
        }
    }
}

/// Where a snapshot for a given naming state is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTarget {
    path: PathBuf,
}

impl SaveTarget {
    /// Compose the target path for `state` inside `directory`.
    #[must_use]
    pub fn new(directory: &Path, state: NamingState) -> Self {
        Self {
            path: directory.join(format!("{state}.{IMAGE_EXTENSION}")),
        }
    }

    /// The full file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_first_image() {
        let naming = NamingSequencer::new(7);
        assert_eq!(
            naming.current(),
            NamingState {
                group_id: 7,
                image_id: 1
            }
        );
    }

    #[test]
    fn test_current_is_idempotent() {
        let mut naming = NamingSequencer::new(3);
        naming.advance();
        let first = naming.current();
        for _ in 0..10 {
            assert_eq!(naming.current(), first);
        }
    }

    #[test]
    fn test_rollover_into_next_group() {
        let mut naming = NamingSequencer::new(7);
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(naming.current().to_string());
            naming.advance();
        }
        assert_eq!(seen, ["7-1", "7-2", "7-3", "8-1"]);
    }

    #[test]
    fn test_counter_formula_holds_for_long_runs() {
        let g0 = 42;
        let mut naming = NamingSequencer::new(g0);
        for n in 1..=300u64 {
            naming.advance();
            let state = naming.current();
            assert!((1..=IMAGES_PER_GROUP).contains(&state.image_id));
            assert_eq!(state.group_id, g0 + n / 3);
            assert_eq!(u64::from(state.image_id), n % 3 + 1);
        }
    }

    #[test]
    fn test_save_target_path() {
        let state = NamingState {
            group_id: 12,
            image_id: 2,
        };
        let target = SaveTarget::new(Path::new("/data/shots"), state);
        assert_eq!(target.path(), Path::new("/data/shots/12-2.png"));
    }
}
