use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),
}

impl CoreError {
    /// Returns `true` when the requested album or track does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::Library(core_library::LibraryError::NotFound { .. })
                | CoreError::Playback(core_playback::PlaybackError::TrackNotFound(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
