//! Audio device integration using rodio
//!
//! Renders a [`PlayerSource`] to the system audio device. rodio pulls
//! samples from its own thread; each refill asks the source for one sector's
//! worth of PCM.

use super::{AudioBackend, BackendFactory, PlayerSource, CHANNELS, SAMPLE_RATE};
use crate::disc::SECTOR_SIZE;
use crate::player::PlayerState;
use crate::{PlayerError, Result};
use rodio::{OutputStream, Sink, Source};
use std::time::Duration;

/// Bytes fetched from the source per refill
const PULL_BLOCK_BYTES: usize = SECTOR_SIZE;

/// rodio source that pulls 16-bit samples from the player
struct PullSource {
    source: PlayerSource,
    /// Internal buffer for batch reads
    buffer: Vec<u8>,
    /// Current byte position in the internal buffer
    buffer_pos: usize,
}

impl PullSource {
    fn new(source: PlayerSource) -> Self {
        PullSource {
            source,
            buffer: vec![0u8; PULL_BLOCK_BYTES],
            buffer_pos: PULL_BLOCK_BYTES, // Start by reading a new block
        }
    }
}

impl Source for PullSource {
    fn current_frame_len(&self) -> Option<usize> {
        let remaining = (self.buffer.len() - self.buffer_pos) / 2;
        if remaining > 0 {
            Some(remaining)
        } else {
            Some(PULL_BLOCK_BYTES / 2)
        }
    }

    fn channels(&self) -> u16 {
        CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Iterator for PullSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.buffer_pos + 2 > self.buffer.len() {
            self.source.read(&mut self.buffer);
            self.buffer_pos = 0;
        }

        let sample = i16::from_le_bytes([
            self.buffer[self.buffer_pos],
            self.buffer[self.buffer_pos + 1],
        ]);
        self.buffer_pos += 2;
        Some(sample)
    }
}

/// Audio playback device using rodio
pub struct AudioDevice {
    _stream: OutputStream,
    sink: Sink,
    state: PlayerState,
}

impl AudioDevice {
    /// Open the default output device and attach `source`
    ///
    /// The device starts paused; [`AudioBackend::play`] begins rendering.
    pub fn new(source: PlayerSource) -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| PlayerError::Device(format!("Failed to create audio stream: {}", e)))?;

        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| PlayerError::Device(format!("Failed to create audio sink: {}", e)))?;

        sink.pause();
        sink.append(PullSource::new(source));

        Ok(AudioDevice {
            _stream: stream,
            sink,
            state: PlayerState::Stopped,
        })
    }

    /// Factory that opens a new default-device backend per loaded disc
    pub fn factory() -> impl BackendFactory {
        |source: PlayerSource| -> Result<Box<dyn AudioBackend>> {
            Ok(Box::new(AudioDevice::new(source)?))
        }
    }
}

impl AudioBackend for AudioDevice {
    fn play(&mut self) -> Result<()> {
        self.sink.play();
        self.state = PlayerState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.sink.pause();
        self.state = PlayerState::Paused;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        // Sink::stop would drop the queued source; the halted source renders silence
        self.sink.pause();
        self.state = PlayerState::Stopped;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume.clamp(0.0, 1.0));
    }

    fn state(&self) -> PlayerState {
        self.state
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        // Pause on drop
        self.sink.pause();
    }
}
