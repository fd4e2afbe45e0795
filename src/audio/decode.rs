// ABOUTME: Codec decoder trait and the shipped PCM implementation
// ABOUTME: Component C delegates to a `Decoder` keyed by the active stream's codec

use crate::audio::Sample;
use crate::error::{Error, Result};

/// Decodes a codec payload to interleaved integer PCM samples.
///
/// Implementations are the extension point for codecs beyond PCM; the
/// server's handshake enumerates the codec tag space (§9).
pub trait Decoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Result<Vec<Sample>>;
}

/// Byte order of the PCM samples within a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmEndian {
    Little,
    Big,
}

/// Raw, uncompressed PCM decoder for 16-bit and 24-bit signed samples.
#[derive(Debug, Clone, Copy)]
pub struct PcmDecoder {
    bit_depth: u8,
    endian: PcmEndian,
}

impl PcmDecoder {
    pub fn new(bit_depth: u8) -> Self {
        Self::with_endian(bit_depth, PcmEndian::Little)
    }

    pub fn with_endian(bit_depth: u8, endian: PcmEndian) -> Self {
        Self { bit_depth, endian }
    }

    fn bytes_per_sample(&self) -> Result<usize> {
        match self.bit_depth {
            16 => Ok(2),
            24 => Ok(3),
            other => Err(Error::Decode(format!("unsupported PCM bit depth {other}"))),
        }
    }
}

impl Decoder for PcmDecoder {
    fn decode(&self, payload: &[u8]) -> Result<Vec<Sample>> {
        let bytes_per_sample = self.bytes_per_sample()?;
        if bytes_per_sample == 0 || payload.len() % bytes_per_sample != 0 {
            return Err(Error::Decode(format!(
                "payload length {} is not a multiple of {} bytes",
                payload.len(),
                bytes_per_sample
            )));
        }

        let mut out = Vec::with_capacity(payload.len() / bytes_per_sample);
        for chunk in payload.chunks_exact(bytes_per_sample) {
            let value = match (self.bit_depth, self.endian) {
                (16, PcmEndian::Little) => i16::from_le_bytes([chunk[0], chunk[1]]) as i32,
                (16, PcmEndian::Big) => i16::from_be_bytes([chunk[0], chunk[1]]) as i32,
                (24, PcmEndian::Little) => sign_extend_24(chunk[0], chunk[1], chunk[2], true),
                (24, PcmEndian::Big) => sign_extend_24(chunk[0], chunk[1], chunk[2], false),
                _ => unreachable!("bytes_per_sample already validated the bit depth"),
            };
            out.push(Sample(value));
        }
        Ok(out)
    }
}

/// Stand-in decoder for any codec tag this build does not ship support for;
/// every call fails so the chunk decoder drops the frame and logs it.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedDecoder {
    pub codec_name: &'static str,
}

impl Decoder for UnsupportedDecoder {
    fn decode(&self, _payload: &[u8]) -> Result<Vec<Sample>> {
        Err(Error::Decode(format!("no decoder available for codec {}", self.codec_name)))
    }
}

fn sign_extend_24(b0: u8, b1: u8, b2: u8, little: bool) -> i32 {
    let bytes = if little { [b0, b1, b2, 0] } else { [0, b2, b1, b0] };
    let raw = u32::from_le_bytes(bytes) as i32;
    // left-shift into the top byte then arithmetic-shift back to sign-extend.
    (raw << 8) >> 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_16_bit_little_endian() {
        let dec = PcmDecoder::with_endian(16, PcmEndian::Little);
        // -1 (0xFFFF) and 256 (0x0100)
        let payload = [0xFF, 0xFF, 0x00, 0x01];
        let samples = dec.decode(&payload).unwrap();
        assert_eq!(samples, vec![Sample(-1), Sample(256)]);
    }

    #[test]
    fn decodes_24_bit_little_endian_sign_extends() {
        let dec = PcmDecoder::with_endian(24, PcmEndian::Little);
        // -1 as 24-bit LE: 0xFF 0xFF 0xFF
        let payload = [0xFF, 0xFF, 0xFF];
        let samples = dec.decode(&payload).unwrap();
        assert_eq!(samples, vec![Sample(-1)]);
    }

    #[test]
    fn rejects_misaligned_payload() {
        let dec = PcmDecoder::new(16);
        assert!(dec.decode(&[0x00]).is_err());
    }

    #[test]
    fn rejects_unsupported_bit_depth() {
        let dec = PcmDecoder::new(8);
        assert!(dec.decode(&[0x00]).is_err());
    }
}
