// ABOUTME: Audio sink adapter boundary (§6): platform audio devices are out of scope internals
// ABOUTME: A default cpal-backed implementation is provided so the crate runs out of the box

mod cpal_output;

pub use cpal_output::CpalOutput;

use crate::audio::{AudioFormat, Sample};
use crate::error::Result;

/// Narrow adapter to a platform audio output device.
///
/// Implementations must not block the audio context: `write` enqueues
/// samples for a realtime callback rather than performing I/O synchronously.
pub trait AudioOutput: Send {
    /// Opens the device for the given format. Called once per stream.
    fn open(&mut self, format: &AudioFormat) -> Result<()>;

    /// Enqueues samples for playback. Non-blocking.
    fn write(&mut self, samples: &[Sample]) -> Result<()>;

    /// Pauses output, e.g. while the time filter has not yet converged.
    fn pause(&mut self);

    /// Releases the device.
    fn close(&mut self);

    /// Reads the platform system volume, if the adapter exposes one.
    fn platform_volume_get(&self) -> Option<u8> {
        None
    }

    /// Sets the platform system volume, if the adapter exposes one.
    fn platform_volume_set(&mut self, _volume_0_100: u8) {}

    fn format(&self) -> Option<&AudioFormat>;
}

/// A no-op sink used in tests and headless operation: counts writes instead
/// of touching real hardware.
#[derive(Debug, Default)]
pub struct NullOutput {
    format: Option<AudioFormat>,
    pub writes: usize,
    pub samples_written: usize,
    pub paused: bool,
}

impl AudioOutput for NullOutput {
    fn open(&mut self, format: &AudioFormat) -> Result<()> {
        self.format = Some(format.clone());
        self.paused = false;
        Ok(())
    }

    fn write(&mut self, samples: &[Sample]) -> Result<()> {
        self.writes += 1;
        self.samples_written += samples.len();
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn close(&mut self) {
        self.format = None;
    }

    fn format(&self) -> Option<&AudioFormat> {
        self.format.as_ref()
    }
}
