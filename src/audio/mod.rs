//! Audio Output
//!
//! The engine drives an output device through the [`AudioBackend`]
//! capability and the device pulls PCM through a [`PlayerSource`]. Red Book
//! audio is always 44.1 kHz, 16-bit signed little-endian, interleaved stereo.

pub mod deemphasis;
#[cfg(feature = "streaming")]
pub mod device;
pub mod source;

pub use deemphasis::DeEmphasisFilter;
pub use source::PlayerSource;

use crate::player::PlayerState;
use crate::Result;

/// CD-DA sample rate in Hz
pub const SAMPLE_RATE: u32 = 44_100;

/// CD-DA channel count
pub const CHANNELS: u16 = 2;

/// Bytes per sample of one channel
pub const BYTES_PER_SAMPLE: usize = 2;

/// Bytes per interleaved stereo frame
pub const BYTES_PER_FRAME: usize = BYTES_PER_SAMPLE * CHANNELS as usize;

/// Platform audio output driven by the transport engine
///
/// Implementations own the hardware stream and render whatever the
/// [`PlayerSource`] they were built with produces.
pub trait AudioBackend {
    /// Start or resume rendering
    fn play(&mut self) -> Result<()>;

    /// Pause rendering, keeping the stream open
    fn pause(&mut self) -> Result<()>;

    /// Stop rendering
    fn stop(&mut self) -> Result<()>;

    /// Set output gain (0.0 to 1.0)
    fn set_volume(&mut self, volume: f32);

    /// Get the device's view of the playback state
    fn state(&self) -> PlayerState;
}

/// Builds an [`AudioBackend`] around a freshly created pull source
///
/// The engine invokes the factory once per loaded disc. Any closure with the
/// matching signature is a factory.
pub trait BackendFactory {
    /// Construct a backend rendering from `source`
    fn create(&mut self, source: PlayerSource) -> Result<Box<dyn AudioBackend>>;
}

impl<F> BackendFactory for F
where
    F: FnMut(PlayerSource) -> Result<Box<dyn AudioBackend>>,
{
    fn create(&mut self, source: PlayerSource) -> Result<Box<dyn AudioBackend>> {
        self(source)
    }
}

/// Convert a 0-100 volume into device gain
pub fn volume_to_gain(volume: u8) -> f32 {
    f32::from(volume.min(100)) / 100.0
}
