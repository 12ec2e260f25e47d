//! End-to-end transport behavior through the public API, driven by a
//! recording audio backend instead of a real device.

use parking_lot::Mutex;
use redbook_player::disc::image::MemoryImage;
use redbook_player::disc::SECTOR_SIZE;
use redbook_player::{
    AudioBackend, Disc, LoadError, LoadOptions, Player, PlayerError, PlayerSnapshot,
    PlayerSource, PlayerState, Result, TocProvider, Track, TrackFlags,
};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Play,
    Pause,
    Stop,
    Volume(f32),
}

/// What the mock device saw, shared with the test body
#[derive(Default)]
struct DeviceLog {
    calls: Vec<Call>,
    source: Option<PlayerSource>,
}

struct RecordingDevice {
    log: Arc<Mutex<DeviceLog>>,
    state: PlayerState,
}

impl AudioBackend for RecordingDevice {
    fn play(&mut self) -> Result<()> {
        self.log.lock().calls.push(Call::Play);
        self.state = PlayerState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.log.lock().calls.push(Call::Pause);
        self.state = PlayerState::Paused;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log.lock().calls.push(Call::Stop);
        self.state = PlayerState::Stopped;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.log.lock().calls.push(Call::Volume(volume));
    }

    fn state(&self) -> PlayerState {
        self.state
    }
}

fn recording_player() -> (Player, Arc<Mutex<DeviceLog>>) {
    let log = Arc::new(Mutex::new(DeviceLog::default()));
    let shared = Arc::clone(&log);
    let player = Player::new(move |source: PlayerSource| -> Result<Box<dyn AudioBackend>> {
        shared.lock().source = Some(source);
        Ok(Box::new(RecordingDevice {
            log: Arc::clone(&shared),
            state: PlayerState::Stopped,
        }))
    });
    (player, log)
}

fn last_volume(log: &Mutex<DeviceLog>) -> Option<f32> {
    log.lock().calls.iter().rev().find_map(|call| match call {
        Call::Volume(v) => Some(*v),
        _ => None,
    })
}

/// Pull `sectors` worth of PCM through the device's source
fn render(log: &Mutex<DeviceLog>, sectors: usize) -> Vec<u8> {
    let mut buf = vec![0xAAu8; sectors * SECTOR_SIZE];
    let mut guard = log.lock();
    let source = guard.source.as_mut().expect("device was built");
    assert_eq!(source.read(&mut buf), buf.len());
    buf
}

/// Audio, data, audio; ten sectors each, all bytes 0x11
fn three_track_disc() -> Disc {
    let tracks = vec![
        Track::new(1, TrackFlags::empty(), 0, 10),
        Track::new(2, TrackFlags::DATA, 10, 10),
        Track::new(3, TrackFlags::COPY_PERMITTED, 20, 10),
    ];
    Disc::new(tracks, 30, 0, MemoryImage::new(vec![0x11; 30 * SECTOR_SIZE])).expect("valid disc")
}

/// Same layout as `three_track_disc`, but each track carries its own byte
/// (0x11 audio, 0xDD data, 0x33 audio) so leaked data is visible in the PCM
fn marked_three_track_disc() -> Disc {
    let mut image = vec![0x11; 10 * SECTOR_SIZE];
    image.extend(std::iter::repeat(0xDD).take(10 * SECTOR_SIZE));
    image.extend(std::iter::repeat(0x33).take(10 * SECTOR_SIZE));
    let tracks = vec![
        Track::new(1, TrackFlags::empty(), 0, 10),
        Track::new(2, TrackFlags::DATA, 10, 10),
        Track::new(3, TrackFlags::empty(), 20, 10),
    ];
    Disc::new(tracks, 30, 0, MemoryImage::new(image)).expect("valid disc")
}

/// Three audio tracks, the second with a one-second pre-gap and two indices
fn long_disc() -> Disc {
    let tracks = vec![
        Track::new(1, TrackFlags::empty(), 0, 1000),
        Track::new(2, TrackFlags::empty(), 1000, 2000)
            .with_index(0, 1000)
            .with_index(1, 1075)
            .with_index(2, 2000),
        Track::new(3, TrackFlags::PRE_EMPHASIS, 3000, 1000),
    ];
    Disc::new(tracks, 4000, 150, MemoryImage::silent(4000)).expect("valid disc")
}

struct FailingProvider;

impl TocProvider for FailingProvider {
    fn open(&self, path: &Path, _generate_missing_toc: bool) -> std::result::Result<Disc, LoadError> {
        Err(LoadError::Unreadable(format!("{} is scratched", path.display())))
    }
}

#[test]
fn stop_returns_to_current_track_start() {
    let (mut player, _log) = recording_player();
    player.load_disc(long_disc(), LoadOptions::default()).unwrap();

    let starts = [0u64, 1075, 3000];
    for (n, &start) in starts.iter().enumerate() {
        if n > 0 {
            player.next_track();
        }
        player.play().unwrap();
        for _ in 0..4 {
            player.fast_forward();
        }
        assert_eq!(player.current_sector(), start + 300);

        player.stop().unwrap();
        assert_eq!(player.state(), PlayerState::Stopped);
        assert_eq!(player.current_sector(), start);
    }
}

#[test]
fn volume_is_clamped_and_idempotent() {
    let (mut player, log) = recording_player();
    player.load_disc(long_disc(), LoadOptions::default()).unwrap();

    for v in [-20, 0, 37, 100, 180] {
        player.set_volume(v);
        let first = player.volume();
        player.set_volume(v);
        assert_eq!(player.volume(), first);
        assert_eq!(first, v.clamp(0, 100) as u8);
    }

    player.set_volume(50);
    player.volume_up();
    assert_eq!(player.volume(), 55);
    player.volume_down();
    assert_eq!(player.volume(), 50);
    assert_eq!(last_volume(&log), Some(0.5));

    player.set_volume(100);
    player.volume_up();
    player.volume_down();
    assert_eq!(player.volume(), 95);

    player.set_volume(3);
    player.volume_down();
    assert_eq!(player.volume(), 0);
}

#[test]
fn mute_twice_restores_volume() {
    let (mut player, log) = recording_player();
    player.load_disc(long_disc(), LoadOptions::default()).unwrap();
    player.set_volume(40);

    player.toggle_mute();
    assert!(player.is_muted());
    assert_eq!(player.volume(), 40);
    assert_eq!(last_volume(&log), Some(0.0));

    player.toggle_mute();
    assert!(!player.is_muted());
    assert_eq!(player.volume(), 40);
    assert_eq!(last_volume(&log), Some(0.4));
}

#[test]
fn volume_change_clears_mute() {
    let (mut player, log) = recording_player();
    player.load_disc(long_disc(), LoadOptions::default()).unwrap();

    player.toggle_mute();
    player.volume_up();
    assert!(!player.is_muted());
    assert_eq!(last_volume(&log), Some(1.0));
}

#[test]
fn track_navigation_clamps_without_wrapping() {
    let (mut player, _log) = recording_player();
    player.load_disc(long_disc(), LoadOptions::default()).unwrap();

    player.previous_track();
    assert_eq!(player.current_sector(), 0);

    player.next_track();
    player.next_track();
    assert_eq!(player.current_sector(), 3000);
    player.next_track();
    assert_eq!(player.current_sector(), 3000);
}

#[test]
fn display_time_at_two_seconds() {
    let disc = Disc::new(
        vec![Track::new(1, TrackFlags::empty(), 0, 1000)],
        1000,
        0,
        MemoryImage::silent(1000),
    )
    .unwrap();
    let (mut player, _log) = recording_player();
    player.load_disc(disc, LoadOptions::default()).unwrap();

    let snapshot = player.snapshot();
    assert_eq!(&snapshot.digits[4..10], "000000");

    player.fast_forward();
    player.fast_forward();
    let snapshot = player.snapshot();
    assert_eq!(snapshot.current_sector, 150);
    assert_eq!(snapshot.current_time().to_string(), "00:02:00");
    assert_eq!(snapshot.digits, "01010002000101001325");
}

#[test]
fn pre_gap_counts_from_its_own_origin() {
    let (mut player, _log) = recording_player();
    player.load_disc(long_disc(), LoadOptions::default()).unwrap();
    player.next_track();
    player.previous_index(false);

    let snapshot = player.snapshot();
    assert_eq!(snapshot.current_track_index, 0);
    assert_eq!(snapshot.section_start_sector, 1000);
    assert_eq!(snapshot.display_time, 0);

    player.next_index(false);
    let snapshot = player.snapshot();
    assert_eq!(snapshot.section_start_sector, 0);
    assert_eq!(snapshot.display_time, 1075 + 150);
}

#[test]
fn source_is_silent_unless_playing() {
    let (mut player, log) = recording_player();
    player.load_disc(three_track_disc(), LoadOptions::default()).unwrap();

    for len in [1usize, 4, 1000, SECTOR_SIZE * 3 + 2] {
        let mut buf = vec![0x55u8; len];
        let mut guard = log.lock();
        let source = guard.source.as_mut().unwrap();
        assert_eq!(source.read(&mut buf), len);
        assert!(buf.iter().all(|&b| b == 0));
    }

    player.play().unwrap();
    player.pause().unwrap();
    assert!(render(&log, 2).iter().all(|&b| b == 0));
    assert_eq!(player.current_sector(), 0);

    player.play().unwrap();
    assert!(render(&log, 2).iter().all(|&b| b == 0x11));
    assert_eq!(player.current_sector(), 2);
}

#[test]
fn data_track_skipped_unless_loaded() {
    let (mut player, _log) = recording_player();
    player.load_disc(three_track_disc(), LoadOptions::default()).unwrap();

    player.next_track();
    assert_eq!(player.snapshot().current_track_number, 3);

    player.previous_track();
    assert_eq!(player.snapshot().current_track_number, 1);

    player.set_load_data_tracks(true);
    assert_eq!(player.current_sector(), 0);
    player.next_track();
    let snapshot = player.snapshot();
    assert_eq!(snapshot.current_track_number, 2);
    assert!(snapshot.is_data_track);
}

#[test]
fn load_data_tracks_round_trip_keeps_position() {
    let (mut player, _log) = recording_player();
    player.load_disc(three_track_disc(), LoadOptions::default()).unwrap();
    player.fast_forward();
    let before = player.current_sector();

    player.set_load_data_tracks(true);
    player.set_load_data_tracks(false);
    assert_eq!(player.current_sector(), before);

    player.next_track();
    assert_eq!(player.snapshot().current_track_number, 3);
}

#[test]
fn playback_skips_data_track_and_stops_at_end() {
    let (mut player, log) = recording_player();
    player.load_disc(three_track_disc(), LoadOptions::default()).unwrap();
    player.play().unwrap();

    // Track 1 runs into the data track: the source goes silent at its end
    let pcm = render(&log, 12);
    assert!(pcm[..10 * SECTOR_SIZE].iter().all(|&b| b == 0x11));
    assert!(pcm[10 * SECTOR_SIZE..].iter().all(|&b| b == 0));

    player.refresh().unwrap();
    assert_eq!(player.current_sector(), 20);
    assert_eq!(player.state(), PlayerState::Playing);

    render(&log, 10);
    player.refresh().unwrap();
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.current_sector(), 0);
    assert_eq!(log.lock().calls.last(), Some(&Call::Stop));
}

#[test]
fn refresh_notifies_only_on_change() {
    let (mut player, log) = recording_player();
    let count = Rc::new(RefCell::new(0usize));
    let seen = Rc::clone(&count);
    player.subscribe(move |_| *seen.borrow_mut() += 1);

    player.load_disc(three_track_disc(), LoadOptions::default()).unwrap();
    player.play().unwrap();
    assert_eq!(*count.borrow(), 2);

    player.refresh().unwrap();
    assert_eq!(*count.borrow(), 2);

    render(&log, 1);
    player.refresh().unwrap();
    assert_eq!(*count.borrow(), 3);
}

#[test]
fn failed_load_keeps_previous_disc() {
    let (mut player, _log) = recording_player();
    let result = player.load(&FailingProvider, "nothing.bin", LoadOptions::default());
    assert!(matches!(result, Err(PlayerError::Load(LoadError::Unreadable(_)))));
    assert_eq!(player.state(), PlayerState::NoDisc);

    player.load_disc(long_disc(), LoadOptions::default()).unwrap();
    player.next_track();
    player.play().unwrap();
    let before = player.snapshot();

    let result = player.load(&FailingProvider, "other.bin", LoadOptions::default());
    assert!(result.is_err());
    assert_eq!(player.snapshot(), before);
}

#[test]
fn device_failure_falls_back_to_no_disc() {
    let notified = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&notified);
    let mut player = Player::new(|_source: PlayerSource| -> Result<Box<dyn AudioBackend>> {
        Err(PlayerError::Device("no output device".into()))
    });
    player.subscribe(move |snapshot: &PlayerSnapshot| seen.borrow_mut().push(snapshot.state));

    let result = player.load_disc(long_disc(), LoadOptions::default());
    assert!(matches!(result, Err(PlayerError::Device(_))));
    assert_eq!(player.state(), PlayerState::NoDisc);
    assert_eq!(*notified.borrow(), vec![PlayerState::NoDisc]);
}

#[test]
fn every_operation_notifies_exactly_once() {
    let (mut player, _log) = recording_player();
    let snapshots = Rc::new(RefCell::new(Vec::<PlayerSnapshot>::new()));
    let seen = Rc::clone(&snapshots);
    player.subscribe(move |snapshot| seen.borrow_mut().push(snapshot.clone()));

    // Nothing is loaded: operations are silent
    player.next_track();
    player.set_volume(10);
    player.play().unwrap();
    assert!(snapshots.borrow().is_empty());

    let options = LoadOptions {
        auto_play: true,
        ..LoadOptions::default()
    };
    player.load_disc(long_disc(), options).unwrap();
    assert_eq!(snapshots.borrow().len(), 1);
    assert_eq!(snapshots.borrow()[0].state, PlayerState::Playing);

    let operations: Vec<Box<dyn Fn(&mut Player)>> = vec![
        Box::new(|p: &mut Player| p.next_track()),
        Box::new(|p: &mut Player| p.previous_track()),
        Box::new(|p: &mut Player| p.next_index(true)),
        Box::new(|p: &mut Player| p.previous_index(true)),
        Box::new(|p: &mut Player| p.fast_forward()),
        Box::new(|p: &mut Player| p.rewind()),
        Box::new(|p: &mut Player| p.volume_up()),
        Box::new(|p: &mut Player| p.volume_down()),
        Box::new(|p: &mut Player| p.toggle_mute()),
        Box::new(|p: &mut Player| p.toggle_de_emphasis()),
        Box::new(|p: &mut Player| p.set_load_hidden_tracks(true)),
        Box::new(|p: &mut Player| p.set_load_data_tracks(true)),
        Box::new(|p: &mut Player| p.toggle_playback().unwrap()),
        Box::new(|p: &mut Player| p.stop().unwrap()),
        Box::new(|p: &mut Player| p.eject()),
    ];
    for (n, operation) in operations.iter().enumerate() {
        operation(&mut player);
        assert_eq!(snapshots.borrow().len(), n + 2);
    }

    let last = snapshots.borrow().last().cloned().unwrap();
    assert_eq!(last.state, PlayerState::NoDisc);
}

#[test]
fn de_emphasis_flag_reaches_source() {
    let (mut player, log) = recording_player();
    player.load_disc(long_disc(), LoadOptions::default()).unwrap();

    player.enable_de_emphasis();
    assert!(player.snapshot().de_emphasis);
    player.toggle_de_emphasis();
    assert!(!player.is_de_emphasis_enabled());
    player.disable_de_emphasis();
    assert!(!player.snapshot().de_emphasis);

    // Silence stays silence through the filter
    player.enable_de_emphasis();
    player.play().unwrap();
    assert!(render(&log, 1).iter().all(|&b| b == 0));
}

#[test]
fn new_load_releases_previous_device() {
    let (mut player, log) = recording_player();
    player.load_disc(long_disc(), LoadOptions::default()).unwrap();
    player.play().unwrap();

    player.load_disc(three_track_disc(), LoadOptions::default()).unwrap();
    let calls = log.lock().calls.clone();
    let stop = calls.iter().rposition(|c| *c == Call::Stop).unwrap();
    let play = calls.iter().rposition(|c| *c == Call::Play).unwrap();
    assert!(play < stop);
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.snapshot().total_tracks, 3);
}

#[test]
fn run_end_before_data_track_reports_last_audio_sector() {
    let (mut player, log) = recording_player();
    player.load_disc(marked_three_track_disc(), LoadOptions::default()).unwrap();
    player.play().unwrap();
    render(&log, 10);

    let snapshot = player.snapshot();
    assert_eq!(snapshot.current_sector, 9);
    assert_eq!(snapshot.current_track_number, 1);
    assert!(!snapshot.is_data_track);

    player.fast_forward();
    assert_eq!(player.current_sector(), 9);
    assert_eq!(player.snapshot().current_track_number, 1);
}

#[test]
fn pause_at_run_end_stays_on_audio_track() {
    let (mut player, log) = recording_player();
    player.load_disc(marked_three_track_disc(), LoadOptions::default()).unwrap();
    player.play().unwrap();
    render(&log, 10);

    player.pause().unwrap();
    player.refresh().unwrap();
    let snapshot = player.snapshot();
    assert_eq!(snapshot.state, PlayerState::Paused);
    assert_eq!(snapshot.current_track_number, 1);
    assert!(!snapshot.is_data_track);

    // Resuming moves on past the data track
    player.play().unwrap();
    player.refresh().unwrap();
    assert_eq!(player.current_sector(), 20);
    let pcm = render(&log, 1);
    assert!(pcm.iter().all(|&b| b == 0x33));
}

#[test]
fn stop_at_run_end_never_plays_data_track() {
    let (mut player, log) = recording_player();
    player.load_disc(marked_three_track_disc(), LoadOptions::default()).unwrap();
    player.play().unwrap();
    render(&log, 10);
    player.pause().unwrap();

    player.stop().unwrap();
    let snapshot = player.snapshot();
    assert_eq!(snapshot.current_sector, 0);
    assert_eq!(snapshot.current_track_number, 1);
    assert!(!snapshot.is_data_track);

    player.play().unwrap();
    let pcm = render(&log, 12);
    assert!(pcm[..10 * SECTOR_SIZE].iter().all(|&b| b == 0x11));
    assert!(pcm[10 * SECTOR_SIZE..].iter().all(|&b| b == 0));
    assert!(!pcm.contains(&0xDD));
}

#[test]
fn next_index_falls_through_to_following_pre_gap() {
    let (mut player, _log) = recording_player();
    player.load_disc(long_disc(), LoadOptions::default()).unwrap();

    player.next_index(false);
    assert_eq!(player.current_sector(), 0);

    player.next_index(true);
    let snapshot = player.snapshot();
    assert_eq!(snapshot.current_sector, 1000);
    assert_eq!(snapshot.current_track_number, 2);
    assert_eq!(snapshot.current_track_index, 0);
}
