// ABOUTME: Chunk decoder (component C): decodes inbound media frames to DecodedFrame
// ABOUTME: Drops frames whose codec disagrees with the active stream descriptor

use std::sync::Arc;

use crate::audio::{Codec, DecodedFrame, Decoder};
use crate::error::{Error, Result};
use crate::model::StreamDescriptor;
use crate::protocol::BinaryFrameHeader;

/// Decodes inbound binary media frames into [`DecodedFrame`]s for the jitter
/// buffer, enforcing the active stream descriptor's codec.
pub struct ChunkDecoder {
    decoder: Box<dyn Decoder>,
    active_codec: Codec,
    sample_rate: u32,
    channels: u8,
}

impl ChunkDecoder {
    pub fn new(decoder: Box<dyn Decoder>, descriptor: &StreamDescriptor) -> Self {
        Self {
            decoder,
            active_codec: Codec::from_name(&descriptor.codec),
            sample_rate: descriptor.sample_rate_hz,
            channels: descriptor.channels.max(1),
        }
    }

    /// Decodes one inbound frame, checking the frame's codec tag against the
    /// active stream. Returns [`Error::StreamFormatMismatch`] (frame dropped,
    /// per §7) when they disagree.
    pub fn decode_frame(&self, header: &BinaryFrameHeader, payload: &[u8]) -> Result<DecodedFrame> {
        let frame_codec = Codec::from_tag(header.codec_tag);
        if frame_codec != self.active_codec {
            return Err(Error::StreamFormatMismatch {
                active: format!("{:?}", self.active_codec),
                frame: header.codec_tag,
            });
        }

        let samples = self.decoder.decode(payload)?;
        let frames = samples.len() / self.channels as usize;
        let duration_us = if self.sample_rate > 0 {
            (frames as i64 * 1_000_000) / self.sample_rate as i64
        } else {
            0
        };

        Ok(DecodedFrame {
            presentation_ts_server_us: header.presentation_ts_server_us,
            duration_us,
            pcm: Arc::from(samples),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::PcmDecoder;

    fn descriptor() -> StreamDescriptor {
        StreamDescriptor {
            codec: "pcm".to_string(),
            sample_rate_hz: 48_000,
            channels: 2,
            bit_depth: 16,
            playback_state: crate::model::PlaybackState::Playing,
            group_name: "living-room".to_string(),
        }
    }

    #[test]
    fn decodes_matching_codec() {
        let cd = ChunkDecoder::new(Box::new(PcmDecoder::new(16)), &descriptor());
        let header = BinaryFrameHeader {
            presentation_ts_server_us: 1000,
            codec_tag: Codec::Pcm.tag(),
            payload_len: 8,
        };
        // 2 frames of stereo 16-bit = 8 bytes.
        let payload = [0, 0, 0, 0, 0, 0, 0, 0];
        let frame = cd.decode_frame(&header, &payload).unwrap();
        assert_eq!(frame.presentation_ts_server_us, 1000);
        assert_eq!(frame.duration_us, (2 * 1_000_000) / 48_000);
        assert_eq!(frame.pcm.len(), 4);
    }

    #[test]
    fn rejects_mismatched_codec() {
        let cd = ChunkDecoder::new(Box::new(PcmDecoder::new(16)), &descriptor());
        let header = BinaryFrameHeader {
            presentation_ts_server_us: 1000,
            codec_tag: Codec::Unknown(9).tag(),
            payload_len: 4,
        };
        let err = cd.decode_frame(&header, &[0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, Error::StreamFormatMismatch { .. }));
    }
}
