//! Disc Model
//!
//! Table-of-contents view of a loaded compact disc: tracks, their indices and
//! the Q-subchannel control flags, plus the read-only sector store backing the
//! audio data. A [`Disc`] is immutable once built and is shared between the
//! control thread and the audio render thread without locking.

pub mod image;

use crate::LoadError;
use bitflags::bitflags;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Size of a raw CD-DA sector in bytes (588 stereo 16-bit frames)
pub const SECTOR_SIZE: usize = 2352;

/// Red Book sectors (frames) per second
pub const SECTORS_PER_SECOND: u64 = 75;

/// Length of the standard track 1 pre-gap; anything longer hides audio
pub const STANDARD_PREGAP: u64 = 2 * SECTORS_PER_SECOND;

bitflags! {
    /// Q-subchannel control field of a track
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct TrackFlags: u8 {
        /// Audio was mastered with pre-emphasis (PRE)
        const PRE_EMPHASIS = 0x01;
        /// Digital copy permitted (DCP)
        const COPY_PERMITTED = 0x02;
        /// Track holds data rather than audio (DATA)
        const DATA = 0x04;
        /// Four-channel audio (4CH)
        const FOUR_CHANNEL = 0x08;
    }
}

impl TrackFlags {
    /// Create flags from the raw 4-bit control nibble
    pub fn from_control(value: u8) -> Self {
        TrackFlags::from_bits_truncate(value)
    }
}

/// Sub-track position marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index {
    /// Index number within the track (0 = pre-gap)
    pub number: u16,
    /// Absolute sector where the index begins
    pub start_sector: u64,
}

/// A single track of the disc
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Track number (1-based)
    pub number: u8,
    /// Control flags
    pub flags: TrackFlags,
    /// Absolute first sector, including any index 0 pre-gap
    pub start_sector: u64,
    /// Length in sectors
    pub length: u64,
    /// Indices ordered by number
    pub indices: Vec<Index>,
}

impl Track {
    /// Create a track with a single index 1 at its first sector
    pub fn new(number: u8, flags: TrackFlags, start_sector: u64, length: u64) -> Self {
        Track {
            number,
            flags,
            start_sector,
            length,
            indices: vec![Index {
                number: 1,
                start_sector,
            }],
        }
    }

    /// Add or replace an index
    pub fn with_index(mut self, number: u16, start_sector: u64) -> Self {
        self.indices.retain(|index| index.number != number);
        self.indices.push(Index {
            number,
            start_sector,
        });
        self.indices.sort_by_key(|index| index.number);
        self
    }

    /// First sector past the end of the track
    pub fn end_sector(&self) -> u64 {
        self.start_sector + self.length
    }

    /// Check if a sector lies within the track
    pub fn contains(&self, sector: u64) -> bool {
        sector >= self.start_sector && sector < self.end_sector()
    }

    /// Check if the DATA flag is set
    pub fn is_data_track(&self) -> bool {
        self.flags.contains(TrackFlags::DATA)
    }

    /// Check if the PRE flag is set
    pub fn has_emphasis(&self) -> bool {
        self.flags.contains(TrackFlags::PRE_EMPHASIS)
    }

    /// Check if the DCP flag is set
    pub fn copy_allowed(&self) -> bool {
        self.flags.contains(TrackFlags::COPY_PERMITTED)
    }

    /// Check if the 4CH flag is set
    pub fn quad_channel(&self) -> bool {
        self.flags.contains(TrackFlags::FOUR_CHANNEL)
    }

    /// Start of index 1, or of the first index when the track has no index 1
    pub fn main_index_start(&self) -> u64 {
        self.indices
            .iter()
            .find(|index| index.number == 1)
            .or_else(|| self.indices.first())
            .map_or(self.start_sector, |index| index.start_sector)
    }

    /// Length of the index 0 region, 0 when the track has none
    pub fn pregap_length(&self) -> u64 {
        match self.indices.first() {
            Some(index) if index.number == 0 => {
                self.main_index_start().saturating_sub(index.start_sector)
            }
            _ => 0,
        }
    }

    /// Position in `indices` of the index containing `sector`
    ///
    /// Sectors ahead of the first index resolve to the first index.
    pub fn index_position_at(&self, sector: u64) -> usize {
        self.indices
            .iter()
            .rposition(|index| index.start_sector <= sector)
            .unwrap_or(0)
    }
}

/// Read-only random access to the raw audio bytes of an image
pub trait SectorSource: Send + Sync {
    /// Total number of bytes available
    fn len(&self) -> u64;

    /// Check if the source holds no data
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy bytes starting at `offset` into `buf`
    ///
    /// Returns the number of bytes copied, short at the end of the image.
    /// Must not block on storage: implementations keep the data resident.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize;
}

/// Opens disc images and produces their table of contents
pub trait TocProvider {
    /// Open the image at `path`
    ///
    /// When the image has no TOC, `generate_missing_toc` decides between
    /// synthesizing one and failing with [`LoadError::TocUnavailable`].
    fn open(&self, path: &Path, generate_missing_toc: bool) -> Result<Disc, LoadError>;
}

/// A loaded compact disc
#[derive(Clone)]
pub struct Disc {
    tracks: Vec<Track>,
    total_sectors: u64,
    time_offset: u64,
    image: Arc<dyn SectorSource>,
}

impl Disc {
    /// Build a disc from its table of contents and sector store
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidToc`] when there are no tracks, tracks are out
    /// of order or overlap, a track has no index, an index lies outside its
    /// track, or a track extends past `total_sectors`.
    pub fn new(
        mut tracks: Vec<Track>,
        total_sectors: u64,
        time_offset: u64,
        image: impl SectorSource + 'static,
    ) -> Result<Self, LoadError> {
        if tracks.is_empty() {
            return Err(LoadError::InvalidToc("disc has no tracks".into()));
        }

        tracks.sort_by_key(|track| track.start_sector);

        let mut previous_end = 0;
        for track in &tracks {
            if track.start_sector < previous_end {
                return Err(LoadError::InvalidToc(format!(
                    "track {} overlaps the previous track",
                    track.number
                )));
            }
            if track.length == 0 {
                return Err(LoadError::InvalidToc(format!(
                    "track {} is empty",
                    track.number
                )));
            }
            if track.end_sector() > total_sectors {
                return Err(LoadError::InvalidToc(format!(
                    "track {} ends at sector {} past the disc end {}",
                    track.number,
                    track.end_sector(),
                    total_sectors
                )));
            }
            if track.indices.is_empty() {
                return Err(LoadError::InvalidToc(format!(
                    "track {} has no index",
                    track.number
                )));
            }
            if let Some(index) = track.indices.iter().find(|i| !track.contains(i.start_sector)) {
                return Err(LoadError::InvalidToc(format!(
                    "index {} of track {} starts outside the track",
                    index.number, track.number
                )));
            }
            if track
                .indices
                .windows(2)
                .any(|pair| pair[0].start_sector > pair[1].start_sector)
            {
                return Err(LoadError::InvalidToc(format!(
                    "indices of track {} are out of order",
                    track.number
                )));
            }
            previous_end = track.end_sector();
        }

        Ok(Disc {
            tracks,
            total_sectors,
            time_offset,
            image: Arc::new(image),
        })
    }

    /// Tracks ordered by start sector
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Number of tracks
    pub fn total_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Number of index entries across all tracks
    pub fn total_indices(&self) -> usize {
        self.tracks.iter().map(|track| track.indices.len()).sum()
    }

    /// Total sectors in the image
    pub fn total_sectors(&self) -> u64 {
        self.total_sectors
    }

    /// Time adjustment offset in sectors
    pub fn time_offset(&self) -> u64 {
        self.time_offset
    }

    /// Total playing time in sectors
    pub fn total_time(&self) -> u64 {
        self.total_sectors + self.time_offset
    }

    /// Number of the first track on the disc
    pub fn first_track_number(&self) -> u8 {
        self.tracks.first().map_or(0, |track| track.number)
    }

    /// Check if the first track hides audio in an oversized pre-gap
    pub fn has_hidden_track(&self) -> bool {
        self.tracks
            .first()
            .is_some_and(|track| track.pregap_length() > STANDARD_PREGAP)
    }

    /// Position in `tracks` of the track containing `sector`
    pub fn track_position_at(&self, sector: u64) -> Option<usize> {
        self.tracks.iter().position(|track| track.contains(sector))
    }

    /// Track containing `sector`
    pub fn track_at(&self, sector: u64) -> Option<&Track> {
        self.track_position_at(sector).map(|pos| &self.tracks[pos])
    }

    /// Index containing `sector`
    pub fn index_at(&self, sector: u64) -> Option<&Index> {
        self.track_at(sector)
            .map(|track| &track.indices[track.index_position_at(sector)])
    }

    /// Check if a track takes part in playback under the data-track policy
    pub fn is_playable(&self, position: usize, load_data_tracks: bool) -> bool {
        self.tracks
            .get(position)
            .is_some_and(|track| load_data_tracks || !track.is_data_track())
    }

    /// Sector where playback of a track begins
    ///
    /// This is the start of index 1, except for a hidden first-track pre-gap
    /// when hidden tracks are loaded.
    pub fn playback_start(&self, position: usize, load_hidden_tracks: bool) -> u64 {
        let Some(track) = self.tracks.get(position) else {
            return 0;
        };
        if position == 0 && load_hidden_tracks && self.has_hidden_track() {
            track.start_sector
        } else {
            track.main_index_start()
        }
    }

    /// Position of the first playable track at or after `from`
    pub fn next_playable(&self, from: usize, load_data_tracks: bool) -> Option<usize> {
        (from..self.tracks.len()).find(|&pos| self.is_playable(pos, load_data_tracks))
    }

    /// Position of the last playable track at or before `from`
    pub fn previous_playable(&self, from: usize, load_data_tracks: bool) -> Option<usize> {
        (0..=from.min(self.tracks.len().saturating_sub(1)))
            .rev()
            .find(|&pos| self.is_playable(pos, load_data_tracks))
    }

    /// End (exclusive) of the contiguous run of playable tracks starting at `position`
    ///
    /// An unplayable track ends the run at its own end so playback halts there.
    pub fn playable_run_end(&self, position: usize, load_data_tracks: bool) -> u64 {
        let Some(track) = self.tracks.get(position) else {
            return self.total_sectors;
        };
        if !self.is_playable(position, load_data_tracks) {
            return track.end_sector();
        }
        let mut end = track.end_sector();
        for next in &self.tracks[position + 1..] {
            if next.start_sector != end || (next.is_data_track() && !load_data_tracks) {
                break;
            }
            end = next.end_sector();
        }
        end
    }

    /// Copy raw audio bytes starting at byte `offset` of the image
    pub fn read_audio(&self, offset: u64, buf: &mut [u8]) -> usize {
        self.image.read_at(offset, buf)
    }
}

impl fmt::Debug for Disc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disc")
            .field("tracks", &self.tracks)
            .field("total_sectors", &self.total_sectors)
            .field("time_offset", &self.time_offset)
            .field("image_len", &self.image.len())
            .finish()
    }
}
