//! Pull-based sample source
//!
//! The audio device calls [`PlayerSource::read`] from its render thread
//! whenever it needs PCM. The source reads from the current disc position,
//! advances it, and applies de-emphasis when enabled. It never blocks: all
//! state shared with the control thread lives in atomics, and the disc image
//! is memory-resident.
//!
//! The position is kept as a single byte offset so the render thread can
//! never observe a sector number and an intra-sector offset that disagree.

use super::{DeEmphasisFilter, BYTES_PER_FRAME, SAMPLE_RATE};
use crate::disc::{Disc, SECTOR_SIZE};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Transport state shared between the engine and the render thread
#[derive(Debug)]
pub(crate) struct Transport {
    /// Absolute byte offset of the next byte to render
    position: AtomicU64,
    /// First sector the render thread must not read (end of the playable run)
    limit: AtomicU64,
    /// Run/halt flag; the source renders silence while clear
    running: AtomicBool,
    /// De-emphasis requested
    de_emphasis: AtomicBool,
}

impl Transport {
    pub(crate) fn new(start_sector: u64, limit: u64) -> Self {
        Transport {
            position: AtomicU64::new(start_sector * SECTOR_SIZE as u64),
            limit: AtomicU64::new(limit),
            running: AtomicBool::new(false),
            de_emphasis: AtomicBool::new(false),
        }
    }

    pub(crate) fn current_sector(&self) -> u64 {
        self.position.load(Ordering::Acquire) / SECTOR_SIZE as u64
    }

    pub(crate) fn seek(&self, sector: u64) {
        self.position
            .store(sector * SECTOR_SIZE as u64, Ordering::Release);
    }

    pub(crate) fn limit(&self) -> u64 {
        self.limit.load(Ordering::Acquire)
    }

    pub(crate) fn set_limit(&self, sector: u64) {
        self.limit.store(sector, Ordering::Release);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub(crate) fn de_emphasis(&self) -> bool {
        self.de_emphasis.load(Ordering::Relaxed)
    }

    pub(crate) fn set_de_emphasis(&self, enabled: bool) {
        self.de_emphasis.store(enabled, Ordering::Relaxed);
    }

    /// Check if the render position reached the limit
    pub(crate) fn is_exhausted(&self) -> bool {
        self.position.load(Ordering::Acquire) >= self.limit() * SECTOR_SIZE as u64
    }
}

/// Pull adapter handed to the audio device
pub struct PlayerSource {
    disc: Arc<Disc>,
    transport: Arc<Transport>,
    filter: DeEmphasisFilter,
}

impl PlayerSource {
    pub(crate) fn new(disc: Arc<Disc>, transport: Arc<Transport>) -> Self {
        PlayerSource {
            disc,
            transport,
            filter: DeEmphasisFilter::new(SAMPLE_RATE),
        }
    }

    /// Fill `buf` with PCM and return the number of bytes produced
    ///
    /// Always produces `buf.len()` bytes. While the transport is halted, past
    /// the playable limit, or when a seek lands mid-read, the bytes are
    /// silence.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        if !self.transport.is_running() {
            buf.fill(0);
            return buf.len();
        }

        let position = self.transport.position.load(Ordering::Acquire);
        let limit = self.transport.limit() * SECTOR_SIZE as u64;
        let wanted = limit.saturating_sub(position).min(buf.len() as u64) as usize;
        let wanted = wanted - wanted % BYTES_PER_FRAME;

        let mut read = if wanted > 0 {
            self.disc.read_audio(position, &mut buf[..wanted])
        } else {
            0
        };
        read -= read % BYTES_PER_FRAME;

        if read > 0
            && self
                .transport
                .position
                .compare_exchange(
                    position,
                    position + read as u64,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_err()
        {
            // The control thread moved the position while we were reading
            read = 0;
        }

        if self.transport.de_emphasis() {
            self.filter.process(&mut buf[..read]);
        } else {
            self.filter.reset();
        }

        buf[read..].fill(0);
        buf.len()
    }
}

impl std::fmt::Debug for PlayerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerSource")
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}
