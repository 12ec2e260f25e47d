//! Disc Image Storage
//!
//! Memory-resident sector store and a provider for headerless raw CD-DA
//! images. Images are read completely at load time so the render thread
//! never waits on storage.

use super::{Disc, SectorSource, TocProvider, Track, TrackFlags, SECTOR_SIZE};
use crate::LoadError;
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Sector store backed by an in-memory byte buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryImage {
    data: Vec<u8>,
}

impl MemoryImage {
    /// Wrap raw image bytes
    pub fn new(data: Vec<u8>) -> Self {
        MemoryImage { data }
    }

    /// Create an all-zero image of `sectors` sectors
    ///
    /// Meant for fixtures and placeholder discs.
    ///
    /// # Panics
    ///
    /// Panics if the image size in bytes overflows `usize`.
    pub fn silent(sectors: u64) -> Self {
        let len = usize::try_from(sectors)
            .ok()
            .and_then(|sectors| sectors.checked_mul(SECTOR_SIZE));
        match len {
            Some(len) => MemoryImage { data: vec![0; len] },
            None => panic!("silent image of {} sectors overflows usize", sectors),
        }
    }

    /// Number of whole sectors held
    pub fn sector_count(&self) -> u64 {
        (self.data.len() / SECTOR_SIZE) as u64
    }
}

impl SectorSource for MemoryImage {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        let Ok(start) = usize::try_from(offset) else {
            return 0;
        };
        if start >= self.data.len() {
            return 0;
        }
        let count = buf.len().min(self.data.len() - start);
        buf[..count].copy_from_slice(&self.data[start..start + count]);
        count
    }
}

/// Opens headerless images made of consecutive 2352-byte audio sectors
///
/// Such images carry no table of contents. When generation is allowed a
/// single audio track spanning the whole image is synthesized.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawImageProvider;

impl TocProvider for RawImageProvider {
    fn open(&self, path: &Path, generate_missing_toc: bool) -> Result<Disc, LoadError> {
        let data = fs::read(path).map_err(|e| {
            LoadError::Unreadable(format!("Failed to read '{}': {}", path.display(), e))
        })?;

        let image = MemoryImage::new(data);
        let sectors = image.sector_count();
        if sectors == 0 {
            return Err(LoadError::Unreadable(format!(
                "'{}' is smaller than one sector",
                path.display()
            )));
        }
        if image.len() % SECTOR_SIZE as u64 != 0 {
            warn!(
                "Ignoring {} trailing bytes after the last whole sector of '{}'",
                image.len() % SECTOR_SIZE as u64,
                path.display()
            );
        }

        if !generate_missing_toc {
            return Err(LoadError::TocUnavailable);
        }

        info!(
            "Generated TOC for '{}': 1 audio track, {} sectors",
            path.display(),
            sectors
        );
        let track = Track::new(1, TrackFlags::empty(), 0, sectors);
        Disc::new(vec![track], sectors, 0, image)
    }
}
