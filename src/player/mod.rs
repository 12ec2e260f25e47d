//! Transport Engine
//!
//! [`Player`] owns the loaded disc, the shared transport state read by the
//! render thread, and the audio backend. Every operation is synchronous and
//! ends with a single [`PlayerSnapshot`] delivered to the registered observers.
//!
//! State machine: `NoDisc -> Stopped <-> Playing <-> Paused`. Only a load (or a
//! device failure) returns the engine to `NoDisc`.

mod navigation;
pub mod snapshot;

pub use snapshot::PlayerSnapshot;

use crate::audio::source::Transport;
use crate::audio::{volume_to_gain, AudioBackend, BackendFactory, PlayerSource};
use crate::disc::{Disc, TocProvider};
use crate::time::{self, DisplayFields};
use crate::{LoadError, Result};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;

/// Volume change applied by [`Player::volume_up`] and [`Player::volume_down`]
pub const VOLUME_STEP: u8 = 5;

/// Sectors skipped by [`Player::fast_forward`] and [`Player::rewind`] (one second)
pub const SEEK_STEP: u64 = 75;

/// Maximum volume
pub const MAX_VOLUME: u8 = 100;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// No disc loaded
    #[default]
    NoDisc,
    /// Disc loaded, not rendering
    Stopped,
    /// Currently playing
    Playing,
    /// Paused
    Paused,
}

/// Configuration applied by [`Player::load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Let the provider synthesize a TOC for images without one
    pub generate_missing_toc: bool,
    /// Make a hidden first-track pre-gap navigable
    pub load_hidden_tracks: bool,
    /// Play and navigate into data tracks
    pub load_data_tracks: bool,
    /// Start playing right after loading
    pub auto_play: bool,
    /// Initial volume, clamped to 0-100
    pub default_volume: i32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            generate_missing_toc: true,
            load_hidden_tracks: false,
            load_data_tracks: false,
            auto_play: false,
            default_volume: i32::from(MAX_VOLUME),
        }
    }
}

/// Handle returned by [`Player::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn FnMut(&PlayerSnapshot)>;

/// Clamp an arbitrary volume request into 0-100
fn clamp_volume(volume: i32) -> u8 {
    volume.clamp(0, i32::from(MAX_VOLUME)) as u8
}

/// Everything that exists only while a disc is loaded
struct Session {
    disc: Arc<Disc>,
    transport: Arc<Transport>,
    backend: Box<dyn AudioBackend>,
    state: PlayerState,
    /// Stored volume; mute leaves it alone
    volume: u8,
    muted: bool,
    load_hidden_tracks: bool,
    load_data_tracks: bool,
}

impl Session {
    /// Sector the transport is on, always inside the current playable run
    ///
    /// An exhausted run leaves the render position parked on the first
    /// sector past the run, which may belong to a skipped track; that state
    /// reports the run's last sector instead.
    fn current_sector(&self) -> u64 {
        let last = self.disc.total_sectors().saturating_sub(1);
        if self.transport.is_exhausted() {
            self.transport.limit().saturating_sub(1).min(last)
        } else {
            self.transport.current_sector().min(last)
        }
    }

    fn current_track_position(&self) -> Option<usize> {
        self.disc.track_position_at(self.current_sector())
    }

    /// Move the render position and re-arm the playback limit for the new run
    fn seek(&self, sector: u64) {
        let sector = sector.min(self.disc.total_sectors().saturating_sub(1));
        let limit = match self.disc.track_position_at(sector) {
            Some(pos) => self.disc.playable_run_end(pos, self.load_data_tracks),
            None => self.disc.total_sectors(),
        };
        self.transport.seek(sector);
        self.transport.set_limit(limit);
    }

    /// Lowest sector navigation may reach inside a track
    ///
    /// The hidden first-track pre-gap is only reachable when hidden tracks
    /// are loaded.
    fn track_floor(&self, position: usize) -> u64 {
        if position == 0 {
            self.disc.playback_start(0, self.load_hidden_tracks)
        } else {
            self.disc.tracks()[position].start_sector
        }
    }

    /// Playback start of the first playable track
    fn first_playable_start(&self) -> Option<u64> {
        self.disc
            .next_playable(0, self.load_data_tracks)
            .map(|pos| self.disc.playback_start(pos, self.load_hidden_tracks))
    }

    fn apply_volume(&mut self) {
        let gain = if self.muted {
            0.0
        } else {
            volume_to_gain(self.volume)
        };
        self.backend.set_volume(gain);
    }

    fn snapshot(&self) -> PlayerSnapshot {
        let disc = &self.disc;
        let sector = self.current_sector();
        let track = disc.track_at(sector);
        let index = disc.index_at(sector);

        let track_number = track.map_or(0, |t| t.number);
        let track_index = index.map_or(0, |i| i.number);
        let section_start_sector = match index {
            Some(index) if index.number == 0 => index.start_sector,
            _ => 0,
        };
        let display_time = time::display_sector_time(
            sector,
            section_start_sector,
            track_number,
            disc.first_track_number(),
            disc.time_offset(),
        );
        let digits = time::digit_string(&DisplayFields {
            track_number,
            track_index,
            sector_time: display_time,
            total_tracks: disc.total_tracks(),
            total_indices: disc.total_indices(),
            total_time: disc.total_time(),
        });

        PlayerSnapshot {
            state: self.state,
            current_sector: sector,
            current_track_number: track_number,
            current_track_index: track_index,
            section_start_sector,
            display_time,
            volume: self.volume,
            muted: self.muted,
            de_emphasis: self.transport.de_emphasis(),
            load_hidden_tracks: self.load_hidden_tracks,
            load_data_tracks: self.load_data_tracks,
            has_hidden_track: disc.has_hidden_track(),
            is_data_track: track.is_some_and(|t| t.is_data_track()),
            quad_channel: track.is_some_and(|t| t.quad_channel()),
            copy_allowed: track.is_some_and(|t| t.copy_allowed()),
            track_has_emphasis: track.is_some_and(|t| t.has_emphasis()),
            total_tracks: disc.total_tracks(),
            total_indices: disc.total_indices(),
            total_sectors: disc.total_sectors(),
            time_offset: disc.time_offset(),
            total_time: disc.total_time(),
            digits,
        }
    }
}

/// Red Book transport engine
pub struct Player {
    factory: Box<dyn BackendFactory>,
    session: Option<Session>,
    observers: Vec<(ObserverId, Observer)>,
    next_observer_id: u64,
    last_snapshot: PlayerSnapshot,
}

impl Player {
    /// Create an engine that builds its audio backend with `factory`
    pub fn new(factory: impl BackendFactory + 'static) -> Self {
        Player {
            factory: Box::new(factory),
            session: None,
            observers: Vec::new(),
            next_observer_id: 0,
            last_snapshot: PlayerSnapshot::no_disc(),
        }
    }

    /// Open the image at `path` through `provider` and load it
    ///
    /// # Errors
    ///
    /// Provider failures ([`PlayerError::Load`](crate::PlayerError::Load))
    /// leave the previously loaded disc untouched. Device failures leave the
    /// engine in [`PlayerState::NoDisc`].
    pub fn load(
        &mut self,
        provider: &dyn TocProvider,
        path: impl AsRef<Path>,
        options: LoadOptions,
    ) -> Result<()> {
        let path = path.as_ref();
        debug!("Opening disc image {}", path.display());
        let disc = provider.open(path, options.generate_missing_toc)?;
        self.load_disc(disc, options)
    }

    /// Load an already opened disc
    pub fn load_disc(&mut self, disc: Disc, options: LoadOptions) -> Result<()> {
        let first = disc
            .next_playable(0, options.load_data_tracks)
            .ok_or(LoadError::NoPlayableTracks)?;

        // Silence and release the previous device before building the next one
        self.release();

        let disc = Arc::new(disc);
        let start = disc.playback_start(first, options.load_hidden_tracks);
        let transport = Arc::new(Transport::new(
            start,
            disc.playable_run_end(first, options.load_data_tracks),
        ));
        let source = PlayerSource::new(Arc::clone(&disc), Arc::clone(&transport));

        let backend = match self.factory.create(source) {
            Ok(backend) => backend,
            Err(e) => {
                warn!("Failed to open audio device: {}", e);
                self.notify();
                return Err(e);
            }
        };

        let mut session = Session {
            disc,
            transport,
            backend,
            state: PlayerState::Stopped,
            volume: clamp_volume(options.default_volume),
            muted: false,
            load_hidden_tracks: options.load_hidden_tracks,
            load_data_tracks: options.load_data_tracks,
        };
        session.apply_volume();

        info!(
            "Loaded disc: {} tracks, {} sectors, starting at sector {}",
            session.disc.total_tracks(),
            session.disc.total_sectors(),
            start
        );
        self.session = Some(session);

        if options.auto_play {
            let result = self.start_playback();
            self.notify();
            return result;
        }

        self.notify();
        Ok(())
    }

    /// Stop playback, release the device and return to `NoDisc`
    pub fn eject(&mut self) {
        if self.session.is_none() {
            return;
        }
        self.release();
        info!("Disc ejected");
        self.notify();
    }

    /// Start or resume playback
    ///
    /// No-op when already playing or without a disc.
    pub fn play(&mut self) -> Result<()> {
        match self.session.as_ref().map(|s| s.state) {
            None => return Ok(()),
            Some(PlayerState::Playing) => {}
            Some(_) => {
                let result = self.start_playback();
                self.notify();
                return result;
            }
        }
        self.notify();
        Ok(())
    }

    /// Pause playback
    ///
    /// Only valid while playing; a no-op otherwise.
    pub fn pause(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let mut result = Ok(());
        if session.state == PlayerState::Playing {
            session.transport.set_running(false);
            result = session.backend.pause();
            session.state = PlayerState::Paused;
            debug!("Paused at sector {}", session.current_sector());
        }
        let result = self.check_device(result);
        self.notify();
        result
    }

    /// Pause when playing, play otherwise
    pub fn toggle_playback(&mut self) -> Result<()> {
        if self.state() == PlayerState::Playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Stop playback and return to the start of the current track
    pub fn stop(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        session.transport.set_running(false);
        let result = session.backend.stop();
        session.state = PlayerState::Stopped;

        let start = match session.current_track_position() {
            Some(pos) => session.disc.playback_start(pos, session.load_hidden_tracks),
            None => session.first_playable_start().unwrap_or(0),
        };
        session.seek(start);
        debug!("Stopped, position reset to sector {}", start);

        let result = self.check_device(result);
        self.notify();
        result
    }

    /// Set the volume (clamped to 0-100); clears mute
    pub fn set_volume(&mut self, volume: i32) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.volume = clamp_volume(volume);
        session.muted = false;
        session.apply_volume();
        self.notify();
    }

    /// Raise the volume by [`VOLUME_STEP`]
    pub fn volume_up(&mut self) {
        self.set_volume(i32::from(self.volume()) + i32::from(VOLUME_STEP));
    }

    /// Lower the volume by [`VOLUME_STEP`]
    pub fn volume_down(&mut self) {
        self.set_volume(i32::from(self.volume()) - i32::from(VOLUME_STEP));
    }

    /// Mute or restore the stored volume
    pub fn toggle_mute(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.muted = !session.muted;
        session.apply_volume();
        self.notify();
    }

    /// Enable the de-emphasis filter
    pub fn enable_de_emphasis(&mut self) {
        self.set_de_emphasis(true);
    }

    /// Disable the de-emphasis filter
    pub fn disable_de_emphasis(&mut self) {
        self.set_de_emphasis(false);
    }

    /// Flip the de-emphasis filter
    pub fn toggle_de_emphasis(&mut self) {
        let enabled = self.is_de_emphasis_enabled();
        self.set_de_emphasis(!enabled);
    }

    fn set_de_emphasis(&mut self, enabled: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.transport.set_de_emphasis(enabled);
        self.notify();
    }

    /// Include or skip data tracks in future navigation
    pub fn set_load_data_tracks(&mut self, load: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.load_data_tracks = load;
        // Only the end of the current run changes; the position stays put
        if let Some(pos) = session.current_track_position() {
            session
                .transport
                .set_limit(session.disc.playable_run_end(pos, load));
        }
        self.notify();
    }

    /// Make the hidden first-track pre-gap reachable by future navigation
    pub fn set_load_hidden_tracks(&mut self, load: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.load_hidden_tracks = load;
        self.notify();
    }

    /// Poll the render position
    ///
    /// Call periodically from the control thread. When playback ran off the
    /// end of its run of playable tracks this jumps to the next playable
    /// track, or stops at the first track once the disc is finished. A run
    /// that ends while paused stays on its last sector until playback resumes.
    /// Observers are notified only when the snapshot changed.
    pub fn refresh(&mut self) -> Result<()> {
        let mut result = Ok(());
        if let Some(session) = self.session.as_mut() {
            if session.state == PlayerState::Playing && session.transport.is_exhausted() {
                let limit = session.transport.limit();
                let next = session
                    .disc
                    .tracks()
                    .iter()
                    .position(|track| track.start_sector >= limit)
                    .and_then(|from| session.disc.next_playable(from, session.load_data_tracks));

                match next {
                    Some(pos) => {
                        let start = session.disc.playback_start(pos, session.load_hidden_tracks);
                        debug!("Advancing to track {}", session.disc.tracks()[pos].number);
                        session.seek(start);
                    }
                    None => {
                        info!("End of disc reached");
                        session.transport.set_running(false);
                        result = session.backend.stop();
                        session.state = PlayerState::Stopped;
                        let start = session.first_playable_start().unwrap_or(0);
                        session.seek(start);
                    }
                }
            }
        }
        let result = self.check_device(result);

        if self.snapshot() != self.last_snapshot {
            self.notify();
        }
        result
    }

    /// Register an observer called with a snapshot after every change
    pub fn subscribe(&mut self, observer: impl FnMut(&PlayerSnapshot) + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer; returns false when `id` is unknown
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    /// Current state of the engine
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.session
            .as_ref()
            .map_or_else(PlayerSnapshot::no_disc, Session::snapshot)
    }

    /// Get current playback state
    pub fn state(&self) -> PlayerState {
        self.session
            .as_ref()
            .map_or(PlayerState::NoDisc, |session| session.state)
    }

    /// Check if a disc is loaded
    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    /// Loaded disc
    pub fn disc(&self) -> Option<&Disc> {
        self.session.as_ref().map(|session| session.disc.as_ref())
    }

    /// Absolute sector being rendered (0 without a disc)
    pub fn current_sector(&self) -> u64 {
        self.session.as_ref().map_or(0, Session::current_sector)
    }

    /// Stored volume (0 without a disc)
    pub fn volume(&self) -> u8 {
        self.session.as_ref().map_or(0, |session| session.volume)
    }

    /// Check if output is muted
    pub fn is_muted(&self) -> bool {
        self.session.as_ref().is_some_and(|session| session.muted)
    }

    /// Check if de-emphasis is enabled
    pub fn is_de_emphasis_enabled(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.transport.de_emphasis())
    }

    /// Device's own view of the playback state
    pub fn device_state(&self) -> PlayerState {
        self.session
            .as_ref()
            .map_or(PlayerState::NoDisc, |session| session.backend.state())
    }

    fn start_playback(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        session.transport.set_running(true);
        let result = session.backend.play();
        session.state = PlayerState::Playing;
        debug!("Playing from sector {}", session.current_sector());
        self.check_device(result)
    }

    /// Drop to `NoDisc` when the device reported a failure
    fn check_device(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            warn!("Audio device failed, unloading disc: {}", e);
            self.release();
        }
        result
    }

    /// Halt the render thread, then stop and drop the backend
    fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.transport.set_running(false);
            if let Err(e) = session.backend.stop() {
                warn!("Failed to stop audio device: {}", e);
            }
        }
    }

    fn notify(&mut self) {
        let snapshot = self.snapshot();
        for (_, observer) in &mut self.observers {
            observer(&snapshot);
        }
        self.last_snapshot = snapshot;
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("state", &self.state())
            .field("disc", &self.disc())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}
