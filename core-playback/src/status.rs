//! # Player Status
//!
//! The controller's state set and its transition table.
//!
//! ```text
//! New ──► Loading ──► Loaded ──► StartingPlayer ──► Playing ◄──► Paused
//!   any non-terminal ──stop──► Stopped        start/load failure ──► Error
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PlaybackError, Result};

/// Status of a media element controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerStatus {
    New,
    Loading,
    Loaded,
    StartingPlayer,
    Playing,
    Paused,
    Stopped,
    Error,
}

/// Operations accepted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Load,
    Play,
    Pause,
    Resume,
    Stop,
    Replace,
    Seek,
}

/// Effect the controller must apply for an accepted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Start loading the source, or join the load already in flight.
    BeginLoad,
    /// Start the element, or join the start already in flight.
    BeginStart,
    /// `Playing → Paused`.
    Pause,
    /// Release the element and move to `Stopped`.
    Stop { pause_first: bool },
    /// Reset to `New` and load another source on the same element.
    Replace,
    /// Forward a seek to the element.
    Seek,
    /// Nothing to do in this status.
    Ignore,
}

impl PlayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::New => "new",
            PlayerStatus::Loading => "loading",
            PlayerStatus::Loaded => "loaded",
            PlayerStatus::StartingPlayer => "startingPlayer",
            PlayerStatus::Playing => "playing",
            PlayerStatus::Paused => "paused",
            PlayerStatus::Stopped => "stopped",
            PlayerStatus::Error => "error",
        }
    }

    /// `Stopped` and `Error` accept no further work.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlayerStatus::Stopped | PlayerStatus::Error)
    }

    /// Whether the element has a decoded source to seek in.
    pub fn can_seek(&self) -> bool {
        matches!(
            self,
            PlayerStatus::Loaded | PlayerStatus::Playing | PlayerStatus::Paused
        )
    }

    /// Looks up `operation` in the transition table.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidTransition`] for `play`/`load`/`replace` on a
    /// terminal controller and for `resume` outside `Paused`/`StartingPlayer`.
    /// `pause`, `stop` and `seek` never fail.
    pub fn transition(self, operation: Operation) -> Result<Transition> {
        use PlayerStatus::*;

        let transition = match (operation, self) {
            (Operation::Load, New | Loading) => Transition::BeginLoad,
            (Operation::Load, Loaded | StartingPlayer | Playing | Paused) => Transition::Ignore,

            (Operation::Play, New | Loading) => Transition::BeginLoad,
            (Operation::Play, Loaded | StartingPlayer | Paused) => Transition::BeginStart,
            (Operation::Play, Playing) => Transition::Ignore,

            (Operation::Resume, Paused | StartingPlayer) => Transition::BeginStart,

            (Operation::Pause, Playing) => Transition::Pause,
            (Operation::Pause, _) => Transition::Ignore,

            (Operation::Stop, Playing | StartingPlayer) => Transition::Stop { pause_first: true },
            (Operation::Stop, New | Loading | Loaded | Paused) => {
                Transition::Stop { pause_first: false }
            }
            (Operation::Stop, Stopped | Error) => Transition::Ignore,

            (Operation::Replace, New | Loading | Loaded | StartingPlayer | Playing | Paused) => {
                Transition::Replace
            }

            (Operation::Seek, Loaded | Playing | Paused) => Transition::Seek,
            (Operation::Seek, _) => Transition::Ignore,

            (Operation::Load | Operation::Play | Operation::Replace, Stopped | Error)
            | (Operation::Resume, _) => {
                return Err(PlaybackError::InvalidTransition {
                    operation,
                    status: self,
                })
            }
        };

        Ok(transition)
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Load => "load",
            Operation::Play => "play",
            Operation::Pause => "pause",
            Operation::Resume => "resume",
            Operation::Stop => "stop",
            Operation::Replace => "replace",
            Operation::Seek => "seek",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlayerStatus::*;

    const ALL: [PlayerStatus; 8] = [
        New,
        Loading,
        Loaded,
        StartingPlayer,
        Playing,
        Paused,
        Stopped,
        Error,
    ];

    fn rejected(status: PlayerStatus, operation: Operation) -> bool {
        matches!(
            status.transition(operation),
            Err(PlaybackError::InvalidTransition { .. })
        )
    }

    #[test]
    fn test_play_table() {
        assert_eq!(New.transition(Operation::Play).unwrap(), Transition::BeginLoad);
        assert_eq!(Loading.transition(Operation::Play).unwrap(), Transition::BeginLoad);
        assert_eq!(Loaded.transition(Operation::Play).unwrap(), Transition::BeginStart);
        assert_eq!(StartingPlayer.transition(Operation::Play).unwrap(), Transition::BeginStart);
        assert_eq!(Paused.transition(Operation::Play).unwrap(), Transition::BeginStart);
        assert_eq!(Playing.transition(Operation::Play).unwrap(), Transition::Ignore);
        assert!(rejected(Stopped, Operation::Play));
        assert!(rejected(Error, Operation::Play));
    }

    #[test]
    fn test_load_table() {
        assert_eq!(New.transition(Operation::Load).unwrap(), Transition::BeginLoad);
        assert_eq!(Loading.transition(Operation::Load).unwrap(), Transition::BeginLoad);
        for status in [Loaded, StartingPlayer, Playing, Paused] {
            assert_eq!(status.transition(Operation::Load).unwrap(), Transition::Ignore);
        }
        assert!(rejected(Stopped, Operation::Load));
        assert!(rejected(Error, Operation::Load));
    }

    #[test]
    fn test_resume_only_from_paused_or_starting() {
        for status in ALL {
            let accepted = matches!(status, Paused | StartingPlayer);
            assert_eq!(!rejected(status, Operation::Resume), accepted, "{status}");
        }
    }

    #[test]
    fn test_pause_only_acts_while_playing() {
        for status in ALL {
            let expected = if status == Playing {
                Transition::Pause
            } else {
                Transition::Ignore
            };
            assert_eq!(status.transition(Operation::Pause).unwrap(), expected);
        }
    }

    #[test]
    fn test_stop_table() {
        assert_eq!(
            Playing.transition(Operation::Stop).unwrap(),
            Transition::Stop { pause_first: true }
        );
        assert_eq!(
            StartingPlayer.transition(Operation::Stop).unwrap(),
            Transition::Stop { pause_first: true }
        );
        for status in [New, Loading, Loaded, Paused] {
            assert_eq!(
                status.transition(Operation::Stop).unwrap(),
                Transition::Stop { pause_first: false }
            );
        }
        assert_eq!(Stopped.transition(Operation::Stop).unwrap(), Transition::Ignore);
        assert_eq!(Error.transition(Operation::Stop).unwrap(), Transition::Ignore);
    }

    #[test]
    fn test_replace_and_seek_tables() {
        for status in ALL {
            if status.is_terminal() {
                assert!(rejected(status, Operation::Replace));
            } else {
                assert_eq!(status.transition(Operation::Replace).unwrap(), Transition::Replace);
            }

            let expected = if status.can_seek() {
                Transition::Seek
            } else {
                Transition::Ignore
            };
            assert_eq!(status.transition(Operation::Seek).unwrap(), expected);
        }
    }

    #[test]
    fn test_status_names() {
        assert_eq!(StartingPlayer.to_string(), "startingPlayer");
        assert_eq!(
            serde_json::to_string(&StartingPlayer).unwrap(),
            "\"startingPlayer\""
        );
    }
}
