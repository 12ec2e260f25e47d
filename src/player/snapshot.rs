//! Change notification payload
//!
//! Observers receive one aggregated snapshot after every mutating transport
//! operation rather than per-field events.

use super::PlayerState;
use crate::time::{self, SectorTime};

/// Consistent view of the transport state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    /// Transport state
    pub state: PlayerState,
    /// Absolute sector being rendered
    pub current_sector: u64,
    /// Number of the track containing the current sector (0 outside any track)
    pub current_track_number: u8,
    /// Number of the index containing the current sector
    pub current_track_index: u16,
    /// Origin of the current section (start of an index 0 pre-gap), else 0
    pub section_start_sector: u64,
    /// Current time in sectors as shown on the display
    pub display_time: u64,
    /// Stored volume (0-100), unaffected by mute
    pub volume: u8,
    /// Output muted
    pub muted: bool,
    /// De-emphasis filter enabled
    pub de_emphasis: bool,
    /// Hidden first-track pre-gap is navigable
    pub load_hidden_tracks: bool,
    /// Data tracks are navigable
    pub load_data_tracks: bool,
    /// Disc hides audio before track 1
    pub has_hidden_track: bool,
    /// DATA flag of the current track
    pub is_data_track: bool,
    /// 4CH flag of the current track
    pub quad_channel: bool,
    /// DCP flag of the current track
    pub copy_allowed: bool,
    /// PRE flag of the current track
    pub track_has_emphasis: bool,
    /// Tracks on the disc
    pub total_tracks: usize,
    /// Index entries on the disc
    pub total_indices: usize,
    /// Sectors in the image
    pub total_sectors: u64,
    /// Disc time offset in sectors
    pub time_offset: u64,
    /// Total disc time in sectors
    pub total_time: u64,
    /// Front-panel digits (20 characters)
    pub digits: String,
}

impl PlayerSnapshot {
    /// Snapshot of an engine without a disc
    pub fn no_disc() -> Self {
        PlayerSnapshot {
            state: PlayerState::NoDisc,
            current_sector: 0,
            current_track_number: 0,
            current_track_index: 0,
            section_start_sector: 0,
            display_time: 0,
            volume: 0,
            muted: false,
            de_emphasis: false,
            load_hidden_tracks: false,
            load_data_tracks: false,
            has_hidden_track: false,
            is_data_track: false,
            quad_channel: false,
            copy_allowed: false,
            track_has_emphasis: false,
            total_tracks: 0,
            total_indices: 0,
            total_sectors: 0,
            time_offset: 0,
            total_time: 0,
            digits: time::blank_digit_string(),
        }
    }

    /// Check if a disc is loaded
    pub fn is_loaded(&self) -> bool {
        self.state != PlayerState::NoDisc
    }

    /// Current time as shown on the display
    pub fn current_time(&self) -> SectorTime {
        SectorTime::from_sectors(self.display_time)
    }

    /// Total disc time
    pub fn total_disc_time(&self) -> SectorTime {
        SectorTime::from_sectors(self.total_time)
    }
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self::no_disc()
    }
}
