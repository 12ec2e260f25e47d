#[cfg(not(feature = "streaming"))]
fn main() {
    eprintln!(
        "The redbook-player CLI requires the \"streaming\" feature. Rebuild with `--features streaming` to enable playback."
    );
}

#[cfg(feature = "streaming")]
mod cli {
    use std::cell::Cell;
    use std::env;
    use std::io::{self, Read, Write};
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{bail, Context};
    use log::info;
    use redbook_player::disc::image::RawImageProvider;
    use redbook_player::{AudioDevice, Player, PlayerSnapshot, PlayerState, Settings};

    /// Display refresh interval
    const REFRESH_INTERVAL_MS: u64 = 50;

    /// Settings file used when `--settings` is not given
    const DEFAULT_SETTINGS_FILE: &str = "settings.json";

    const USAGE: &str = "Usage:\n  redbook-player [options] <image.bin>\n\nOptions:\n  --autoplay           Start playing as soon as the disc is loaded\n  --hidden             Treat index 0 of track 1 as a hidden track\n  --data               Play data tracks\n  --no-toc-gen         Fail instead of generating a missing TOC\n  --volume <0-100>     Initial volume\n  --settings <file>    Settings file (default: settings.json)\n  -h, --help           Show this help\n\nKeys:\n  space play/pause   s stop        n/p next/previous track\n  ]/[   index        f/r seek      +/- volume\n  m     mute         e de-emphasis q quit\n";

    #[cfg(unix)]
    fn set_raw_terminal(raw: bool) {
        let (echo, mode) = if raw { ("-echo", "raw") } else { ("echo", "-raw") };
        let _ = std::process::Command::new("stty")
            .arg(echo)
            .arg(mode)
            .status();
    }

    #[cfg(not(unix))]
    fn set_raw_terminal(_raw: bool) {}

    fn state_label(state: PlayerState) -> &'static str {
        match state {
            PlayerState::NoDisc => "NO DISC",
            PlayerState::Stopped => "STOP",
            PlayerState::Playing => "PLAY",
            PlayerState::Paused => "PAUSE",
        }
    }

    fn status_line(snapshot: &PlayerSnapshot) -> String {
        let mut flags = Vec::new();
        if snapshot.is_data_track {
            flags.push("DATA");
        }
        if snapshot.track_has_emphasis {
            flags.push("PRE");
        }
        if snapshot.copy_allowed {
            flags.push("DCP");
        }
        if snapshot.quad_channel {
            flags.push("4CH");
        }
        if snapshot.de_emphasis {
            flags.push("DE-EMPH");
        }
        if snapshot.has_hidden_track {
            flags.push("HIDDEN");
        }

        let volume = if snapshot.muted {
            "MUTE".to_string()
        } else {
            format!("{:3}", snapshot.volume)
        };

        format!(
            "[{:<5}] Track {:02} Index {:02}  {}  / {}  Vol {}  {}  [{}]",
            state_label(snapshot.state),
            snapshot.current_track_number,
            snapshot.current_track_index,
            snapshot.current_time(),
            snapshot.total_disc_time(),
            volume,
            flags.join(" "),
            snapshot.digits
        )
    }

    /// Apply one key press; returns false on quit
    fn handle_key(player: &mut Player, key: u8, change_track: bool) -> anyhow::Result<bool> {
        match key {
            b' ' => player.toggle_playback()?,
            b's' | b'S' => player.stop()?,
            b'n' | b'N' => player.next_track(),
            b'p' | b'P' => player.previous_track(),
            b']' => player.next_index(change_track),
            b'[' => player.previous_index(change_track),
            b'f' | b'F' => player.fast_forward(),
            b'r' | b'R' => player.rewind(),
            b'+' | b'=' => player.volume_up(),
            b'-' | b'_' => player.volume_down(),
            b'm' | b'M' => player.toggle_mute(),
            b'e' | b'E' => player.toggle_de_emphasis(),
            b'q' | b'Q' | b'\x03' => return Ok(false),
            _ => {}
        }
        Ok(true)
    }

    pub fn run() -> anyhow::Result<()> {
        let mut image_arg: Option<PathBuf> = None;
        let mut settings_path = PathBuf::from(DEFAULT_SETTINGS_FILE);
        let mut autoplay = false;
        let mut hidden = false;
        let mut data = false;
        let mut no_toc_gen = false;
        let mut volume: Option<i32> = None;

        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--autoplay" => autoplay = true,
                "--hidden" => hidden = true,
                "--data" => data = true,
                "--no-toc-gen" => no_toc_gen = true,
                "--volume" => {
                    let value = args.next().context("--volume requires an argument")?;
                    volume = Some(
                        value
                            .parse()
                            .with_context(|| format!("Invalid volume: {}", value))?,
                    );
                }
                "--settings" => {
                    settings_path = args
                        .next()
                        .map(PathBuf::from)
                        .context("--settings requires an argument")?;
                }
                "--help" | "-h" => {
                    eprint!("{}", USAGE);
                    return Ok(());
                }
                _ if arg.starts_with('-') => {
                    eprint!("{}", USAGE);
                    bail!("Unknown flag: {}", arg);
                }
                _ => image_arg = Some(PathBuf::from(arg)),
            }
        }

        let Some(image_path) = image_arg else {
            eprint!("{}", USAGE);
            return Ok(());
        };

        let settings = Settings::load(&settings_path);
        let mut options = settings.load_options();
        options.auto_play |= autoplay;
        options.load_hidden_tracks |= hidden;
        options.load_data_tracks |= data;
        if no_toc_gen {
            options.generate_missing_toc = false;
        }
        if let Some(volume) = volume {
            options.default_volume = volume;
        }

        println!("Red Book Player");
        println!("===============\n");
        println!("Loading disc image: {}\n", image_path.display());

        let mut player = Player::new(AudioDevice::factory());

        let last_state = Rc::new(Cell::new(PlayerState::NoDisc));
        let observed = Rc::clone(&last_state);
        player.subscribe(move |snapshot| {
            if observed.replace(snapshot.state) != snapshot.state {
                info!("Transport is now {}", state_label(snapshot.state));
            }
        });

        player
            .load(&RawImageProvider, &image_path, options)
            .with_context(|| format!("Failed to load '{}'", image_path.display()))?;

        if let Some(disc) = player.disc() {
            for track in disc.tracks() {
                println!(
                    "  Track {:02}  sector {:>7}  length {:>7}  flags {:?}",
                    track.number, track.start_sector, track.length, track.flags
                );
            }
        }
        println!();
        print!("{}", USAGE);
        println!();

        let (tx, rx) = std::sync::mpsc::channel::<u8>();
        let input_running = Arc::new(AtomicBool::new(true));
        let input_running_clone = Arc::clone(&input_running);
        std::thread::spawn(move || {
            set_raw_terminal(true);
            let mut stdin = io::stdin();
            let mut buf = [0u8; 1];
            while input_running_clone.load(Ordering::Relaxed) {
                if stdin.read_exact(&mut buf).is_ok() {
                    let _ = tx.send(buf[0]);
                    if matches!(buf[0], b'q' | b'Q' | b'\x03') {
                        break;
                    }
                } else {
                    break;
                }
            }
            set_raw_terminal(false);
        });

        let result = (|| -> anyhow::Result<()> {
            loop {
                std::thread::sleep(Duration::from_millis(REFRESH_INTERVAL_MS));

                while let Ok(key) = rx.try_recv() {
                    if !handle_key(&mut player, key, settings.index_button_change_track)? {
                        return Ok(());
                    }
                }

                player.refresh()?;
                if !player.is_loaded() {
                    bail!("Audio device stopped responding");
                }

                print!("\r{}\x1b[K", status_line(&player.snapshot()));
                io::stdout().flush()?;
            }
        })();

        input_running.store(false, Ordering::Relaxed);
        set_raw_terminal(false);
        println!();

        player.eject();
        result
    }
}

#[cfg(feature = "streaming")]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    cli::run()
}
