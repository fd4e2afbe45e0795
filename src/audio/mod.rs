// ABOUTME: Audio data types shared by the decoder (C), jitter buffer (D), and playout scheduler (E)

pub mod decode;
pub mod output;

pub use decode::{Decoder, PcmDecoder, PcmEndian, UnsupportedDecoder};
pub use output::{AudioOutput, CpalOutput};

/// One decoded integer PCM sample, interleaved across channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample(pub i32);

/// Audio format negotiated via the `stream` control message.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFormat {
    pub codec: Codec,
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_depth: u8,
    pub codec_header: Option<Vec<u8>>,
}

/// Codec identifier. The exact codec tag space is enumerated by the server's
/// handshake (§9 Open Questions); this crate ships a PCM decoder and treats
/// any other tag as [`Codec::Unknown`], which the dispatcher turns into a
/// dropped frame plus [`crate::error::Error::Protocol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Pcm,
    Unknown(u8),
}

impl Codec {
    pub fn tag(self) -> u8 {
        match self {
            Codec::Pcm => 0,
            Codec::Unknown(tag) => tag,
        }
    }

    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Codec::Pcm,
            other => Codec::Unknown(other),
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "pcm" => Codec::Pcm,
            other => other
                .parse::<u8>()
                .map(Codec::Unknown)
                .unwrap_or(Codec::Unknown(0xFF)),
        }
    }
}

/// A decoded audio frame ready for the jitter buffer (component D).
///
/// Within a stream segment, frames are uniquely identified by
/// `presentation_ts_server_us`; the jitter buffer drops later duplicates.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub presentation_ts_server_us: i64,
    pub duration_us: i64,
    pub pcm: std::sync::Arc<[Sample]>,
}

impl DecodedFrame {
    pub fn end_ts_server_us(&self) -> i64 {
        self.presentation_ts_server_us + self.duration_us
    }
}
