//! Red Book (CD-DA) Transport Engine
//!
//! Plays back audio from a compact disc image: tracks the playback position in
//! sectors, enforces Red Book track/index semantics (hidden tracks, data tracks,
//! pre-emphasis, copy flags), derives the front-panel time display and feeds
//! PCM to an audio output device through a pull-based source.
//!
//! # Components
//! - [`disc`]: disc/track/index model and the TOC provider contract
//! - [`player`]: the transport state machine ([`Player`])
//! - [`audio`]: device capability trait, pull source and de-emphasis filter
//! - [`time`]: sector to minutes:seconds:frames conversion and the digit display
//! - [`settings`]: persisted player preferences
//!
//! # Crate feature flags
//! - `streaming` (opt-in): real-time audio output via rodio and the terminal player
//!
//! # Quick start
//! ```no_run
//! # #[cfg(feature = "streaming")]
//! # {
//! use redbook_player::disc::image::RawImageProvider;
//! use redbook_player::{AudioDevice, LoadOptions, Player};
//!
//! let mut player = Player::new(AudioDevice::factory());
//! player
//!     .load(&RawImageProvider, "album.bin", LoadOptions::default())
//!     .unwrap();
//! player.subscribe(|snapshot| println!("{}", snapshot.digits));
//! player.play().unwrap();
//! # }
//! ```

#![warn(missing_docs)]

pub mod audio;
pub mod disc;
pub mod player;
pub mod settings;
pub mod time;

/// Reasons a disc image could not be turned into a playable disc
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    /// The image carries no table of contents and generating one was not allowed
    #[error("Disc image has no table of contents")]
    TocUnavailable,

    /// The image could not be opened or read
    #[error("Disc image unreadable: {0}")]
    Unreadable(String),

    /// The table of contents is inconsistent
    #[error("Invalid table of contents: {0}")]
    InvalidToc(String),

    /// Every track is a data track and data tracks are not loaded
    #[error("Disc has no playable tracks")]
    NoPlayableTracks,
}

/// Error types for transport engine operations
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    /// Disc image could not be loaded
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Audio device error
    #[error("Audio device error: {0}")]
    Device(String),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be written or encoded
    #[error("Settings error: {0}")]
    Settings(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for PlayerError {
    /// Converts a String into `PlayerError::Other`.
    ///
    /// Prefer the explicit variants (`Device`, `Load`) where the failure kind is known.
    fn from(msg: String) -> Self {
        PlayerError::Other(msg)
    }
}

impl From<&str> for PlayerError {
    fn from(msg: &str) -> Self {
        PlayerError::Other(msg.to_string())
    }
}

/// Result type for transport engine operations
pub type Result<T> = std::result::Result<T, PlayerError>;

// Public API exports
pub use audio::{AudioBackend, BackendFactory, PlayerSource};
pub use disc::{Disc, Index, SectorSource, TocProvider, Track, TrackFlags};
pub use player::{LoadOptions, ObserverId, Player, PlayerSnapshot, PlayerState};
pub use settings::Settings;
pub use time::SectorTime;

#[cfg(feature = "streaming")]
pub use audio::device::AudioDevice;
