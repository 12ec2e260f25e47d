//! Red Book Time Display
//!
//! Converts sector positions into minutes:seconds:frames at 75 frames per
//! second and renders the fixed 20-character front-panel digit string.

use crate::disc::SECTORS_PER_SECOND;

/// Sectors per minute
const SECTORS_PER_MINUTE: u64 = SECTORS_PER_SECOND * 60;

/// Number of two-digit fields on the display
pub const DISPLAY_FIELDS: usize = 10;

/// Width of the digit string
pub const DISPLAY_WIDTH: usize = DISPLAY_FIELDS * 2;

/// A position expressed as minutes, seconds and frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectorTime {
    /// Minutes (unbounded)
    pub minutes: u64,
    /// Seconds (0-59)
    pub seconds: u64,
    /// Frames (0-74)
    pub frames: u64,
}

impl SectorTime {
    /// Split a sector count into M:S:F
    pub fn from_sectors(sectors: u64) -> Self {
        SectorTime {
            minutes: sectors / SECTORS_PER_MINUTE,
            seconds: sectors / SECTORS_PER_SECOND % 60,
            frames: sectors % SECTORS_PER_SECOND,
        }
    }

    /// Total sectors represented
    pub fn to_sectors(&self) -> u64 {
        self.minutes * SECTORS_PER_MINUTE + self.seconds * SECTORS_PER_SECOND + self.frames
    }
}

impl std::fmt::Display for SectorTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.minutes, self.seconds, self.frames
        )
    }
}

/// Sector value shown as the current time
///
/// Inside a section with its own origin the time counts from that origin;
/// otherwise tracks after the first are shifted by the disc time offset.
/// The two adjustments never combine.
pub fn display_sector_time(
    current_sector: u64,
    section_start_sector: u64,
    current_track_number: u8,
    first_track_number: u8,
    time_offset: u64,
) -> u64 {
    if section_start_sector != 0 {
        current_sector.saturating_sub(section_start_sector)
    } else if current_track_number > first_track_number {
        current_sector + time_offset
    } else {
        current_sector
    }
}

/// Inputs of the front-panel display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayFields {
    /// Current track number
    pub track_number: u8,
    /// Current index number
    pub track_index: u16,
    /// Current time in sectors, already adjusted
    pub sector_time: u64,
    /// Total tracks on the disc
    pub total_tracks: usize,
    /// Total indices on the disc
    pub total_indices: usize,
    /// Total disc time in sectors
    pub total_time: u64,
}

/// Render the ten display fields as 20 digits
///
/// Each field is zero-padded to two digits and truncated to its first two
/// characters when larger. The track number is clamped to 0-99.
pub fn digit_string(fields: &DisplayFields) -> String {
    let current = SectorTime::from_sectors(fields.sector_time);
    let total = SectorTime::from_sectors(fields.total_time);

    let numbers: [u64; DISPLAY_FIELDS] = [
        u64::from(fields.track_number.min(99)),
        u64::from(fields.track_index),
        current.minutes,
        current.seconds,
        current.frames,
        fields.total_tracks as u64,
        fields.total_indices as u64,
        total.minutes,
        total.seconds,
        total.frames,
    ];

    numbers
        .iter()
        .map(|n| {
            let mut field = format!("{n:02}");
            field.truncate(2);
            field
        })
        .collect()
}

/// Digit string shown when no disc is loaded
pub fn blank_digit_string() -> String {
    "-".repeat(DISPLAY_WIDTH)
}
