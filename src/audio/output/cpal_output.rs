// ABOUTME: cpal-based audio output implementation
// ABOUTME: Cross-platform audio output adapter satisfying the `AudioOutput` trait (§6)

use crate::audio::output::AudioOutput;
use crate::audio::{AudioFormat, Sample};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};

/// cpal-based audio output. Opened lazily by [`AudioOutput::open`] so the
/// host device is only claimed once the stream format is known.
#[derive(Default)]
pub struct CpalOutput {
    format: Option<AudioFormat>,
    stream: Option<Stream>,
    sample_tx: Option<SyncSender<Arc<[Sample]>>>,
}

impl CpalOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_stream(
        device: &Device,
        config: &StreamConfig,
        sample_rx: Receiver<Arc<[Sample]>>,
        bit_depth: u8,
    ) -> Result<Stream> {
        let sample_rx = Arc::new(Mutex::new(sample_rx));
        let mut current_buffer: Option<Arc<[Sample]>> = None;
        let mut buffer_pos = 0;
        let full_scale = full_scale_for_bit_depth(bit_depth);

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for sample_out in data.iter_mut() {
                        // Get next sample from current buffer or receive new buffer
                        if current_buffer.is_none()
                            || buffer_pos >= current_buffer.as_ref().unwrap().len()
                        {
                            if let Ok(rx) = sample_rx.lock() {
                                if let Ok(buf) = rx.try_recv() {
                                    current_buffer = Some(buf);
                                    buffer_pos = 0;
                                }
                            }
                        }

                        *sample_out = match &current_buffer {
                            Some(buf) if buffer_pos < buf.len() => {
                                let sample = buf[buffer_pos];
                                buffer_pos += 1;
                                sample.0 as f32 / full_scale
                            }
                            _ => 0.0, // silence
                        };
                    }
                },
                |err| log::error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| Error::Adapter(e.to_string()))?;

        Ok(stream)
    }
}

// cpal::Stream is conservatively marked !Send on some platforms via an opaque
// PhantomData<*mut ()> guard, but holds no thread-affine state here (just the
// platform stream handle kept alive for its Drop); the AudioOutput trait
// requires Send so CpalOutput can live behind the session's Mutex<Box<dyn
// AudioOutput>>.
unsafe impl Send for CpalOutput {}

fn full_scale_for_bit_depth(bit_depth: u8) -> f32 {
    match bit_depth {
        16 => 32768.0,
        _ => 8_388_608.0, // 24-bit, also the fallback
    }
}

impl AudioOutput for CpalOutput {
    fn open(&mut self, format: &AudioFormat) -> Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Adapter("no output device available".to_string()))?;

        if let Ok(def) = device.default_output_config() {
            log::info!(
                "device default: {:?} {}Hz {}ch",
                def.sample_format(),
                def.sample_rate().0,
                def.channels()
            );
            if def.sample_rate().0 != format.sample_rate || def.channels() != format.channels as u16 {
                log::warn!(
                    "requested {}Hz/{}ch; device default is {}Hz/{}ch (OS may resample)",
                    format.sample_rate,
                    format.channels,
                    def.sample_rate().0,
                    def.channels()
                );
            }
        }

        let config = StreamConfig {
            channels: format.channels as u16,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // Bounded channel for backpressure: 10 buffers max ~= 200ms at 20ms chunks.
        let (sample_tx, sample_rx) = sync_channel::<Arc<[Sample]>>(10);
        let stream = Self::build_stream(&device, &config, sample_rx, format.bit_depth)?;
        stream.play().map_err(|e| Error::Adapter(e.to_string()))?;

        self.stream = Some(stream);
        self.sample_tx = Some(sample_tx);
        self.format = Some(format.clone());
        Ok(())
    }

    fn write(&mut self, samples: &[Sample]) -> Result<()> {
        let tx = self
            .sample_tx
            .as_ref()
            .ok_or_else(|| Error::Adapter("output not open".to_string()))?;
        tx.send(Arc::from(samples))
            .map_err(|_| Error::Adapter("audio thread is gone".to_string()))
    }

    fn pause(&mut self) {
        if let Some(stream) = &self.stream {
            let _ = stream.pause();
        }
    }

    fn close(&mut self) {
        self.stream = None;
        self.sample_tx = None;
        self.format = None;
    }

    fn format(&self) -> Option<&AudioFormat> {
        self.format.as_ref()
    }
}
