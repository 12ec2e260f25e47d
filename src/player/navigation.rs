//! Track, index and seek navigation
//!
//! Navigation never changes the play/pause state and never wraps around.
//! Boundary requests are silent no-ops, but still notify observers.

use super::{Player, Session, SEEK_STEP};
use log::debug;

impl Session {
    /// Position of the track at or around the current sector
    ///
    /// Outside any track this is the first track starting after the sector,
    /// as an `Err` so callers can tell the two apart.
    fn track_slot(&self) -> Result<usize, usize> {
        let sector = self.current_sector();
        match self.disc.track_position_at(sector) {
            Some(pos) => Ok(pos),
            None => Err(self
                .disc
                .tracks()
                .iter()
                .position(|track| track.start_sector > sector)
                .unwrap_or(self.disc.total_tracks())),
        }
    }

    /// Next playable track after the current sector
    fn following_playable(&self) -> Option<usize> {
        let from = match self.track_slot() {
            Ok(pos) => pos + 1,
            Err(next) => next,
        };
        self.disc.next_playable(from, self.load_data_tracks)
    }

    fn next_track(&self) -> bool {
        let Some(target) = self.following_playable() else {
            return false;
        };
        self.seek(self.disc.playback_start(target, self.load_hidden_tracks));
        debug!("Next track: {}", self.disc.tracks()[target].number);
        true
    }

    /// Enter the next playable track at its first index, pre-gap included
    fn next_track_first_index(&self) -> bool {
        let Some(target) = self.following_playable() else {
            return false;
        };
        let track = &self.disc.tracks()[target];
        let first = track
            .indices
            .first()
            .map_or(track.start_sector, |index| index.start_sector);
        self.seek(first.max(self.track_floor(target)));
        debug!("Next track {} first index", track.number);
        true
    }

    fn previous_track(&self) -> bool {
        let Some(before) = self.track_slot().unwrap_or_else(|next| next).checked_sub(1) else {
            return false;
        };
        let Some(target) = self.disc.previous_playable(before, self.load_data_tracks) else {
            return false;
        };
        self.seek(self.disc.playback_start(target, self.load_hidden_tracks));
        debug!("Previous track: {}", self.disc.tracks()[target].number);
        true
    }

    fn next_index(&self, change_track: bool) -> bool {
        let Ok(pos) = self.track_slot() else {
            return change_track && self.next_track_first_index();
        };
        let track = &self.disc.tracks()[pos];
        let current = track.index_position_at(self.current_sector());
        match track.indices.get(current + 1) {
            Some(index) => {
                self.seek(index.start_sector.max(self.track_floor(pos)));
                debug!("Track {} index {}", track.number, index.number);
                true
            }
            None => change_track && self.next_track_first_index(),
        }
    }

    fn previous_index(&self, change_track: bool) -> bool {
        let Ok(pos) = self.track_slot() else {
            return change_track && self.previous_track();
        };
        let track = &self.disc.tracks()[pos];
        let floor = self.track_floor(pos);
        let current = track.index_position_at(self.current_sector());

        if let Some(index) = current
            .checked_sub(1)
            .map(|i| &track.indices[i])
            .filter(|index| index.start_sector >= floor)
        {
            self.seek(index.start_sector);
            debug!("Track {} index {}", track.number, index.number);
            return true;
        }
        if !change_track {
            return false;
        }

        let Some(target) = pos
            .checked_sub(1)
            .and_then(|before| self.disc.previous_playable(before, self.load_data_tracks))
        else {
            return false;
        };
        let track = &self.disc.tracks()[target];
        let last = track
            .indices
            .last()
            .map_or(track.start_sector, |index| index.start_sector);
        self.seek(last.max(self.track_floor(target)));
        debug!("Previous track {} last index", track.number);
        true
    }

    /// Seek one [`SEEK_STEP`] without leaving the current track
    fn step(&self, forward: bool) -> bool {
        let sector = self.current_sector();
        let (floor, ceiling) = match self.disc.track_position_at(sector) {
            Some(pos) => (
                self.track_floor(pos),
                self.disc.tracks()[pos].end_sector() - 1,
            ),
            None => (0, self.disc.total_sectors().saturating_sub(1)),
        };
        let target = if forward {
            sector.saturating_add(SEEK_STEP).min(ceiling)
        } else {
            sector.saturating_sub(SEEK_STEP).max(floor)
        };
        if target == sector {
            return false;
        }
        self.seek(target);
        true
    }
}

impl Player {
    /// Move to the start of the next playable track
    ///
    /// No-op at the last playable track.
    pub fn next_track(&mut self) {
        self.navigate(Session::next_track);
    }

    /// Move to the start of the previous playable track
    ///
    /// No-op at the first playable track.
    pub fn previous_track(&mut self) {
        self.navigate(Session::previous_track);
    }

    /// Move to the next index of the current track
    ///
    /// At the last index, `change_track` moves on to the first index of the
    /// next playable track; otherwise the position stays at the last index.
    pub fn next_index(&mut self, change_track: bool) {
        self.navigate(|session| session.next_index(change_track));
    }

    /// Move to the previous index of the current track
    ///
    /// At the first index, `change_track` moves back to the last index of the
    /// previous playable track.
    pub fn previous_index(&mut self, change_track: bool) {
        self.navigate(|session| session.previous_index(change_track));
    }

    /// Skip forward one second, staying within the current track
    pub fn fast_forward(&mut self) {
        self.navigate(|session| session.step(true));
    }

    /// Skip back one second, staying within the current track
    pub fn rewind(&mut self) {
        self.navigate(|session| session.step(false));
    }

    fn navigate(&mut self, action: impl FnOnce(&Session) -> bool) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if !action(session) {
            debug!("Navigation at boundary, position unchanged");
        }
        self.notify();
    }
}
