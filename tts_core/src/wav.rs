//! Minimal RIFF/WAVE framing for raw PCM produced by the engines.

/// Length of the canonical header written by [`wrap_pcm16`].
pub const WAV_HEADER_LEN: usize = 44;

/// Sample rates outside this range are rejected as misconfiguration.
pub const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<u32> = 1_000..=384_000;

const NUM_CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// Check a sample rate read from configuration and narrow it to `u32`.
pub fn check_sample_rate(rate: u64) -> anyhow::Result<u32> {
    u32::try_from(rate)
        .ok()
        .filter(|rate| SAMPLE_RATE_RANGE.contains(rate))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Implausible sample rate {rate} Hz (expected {}..={})",
                SAMPLE_RATE_RANGE.start(),
                SAMPLE_RATE_RANGE.end()
            )
        })
}

/// Wrap 16-bit little-endian mono PCM bytes into a playable WAV file.
///
/// The payload is copied verbatim after the header: no resampling, no
/// padding, no recoding. `pcm` is only read.
pub fn wrap_pcm16(pcm: &[u8], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let data_size = u32::try_from(pcm.len())
        .ok()
        .filter(|size| *size <= u32::MAX - 36)
        .ok_or_else(|| {
            anyhow::anyhow!("PCM payload too large for a WAV container: {} bytes", pcm.len())
        })?;

    // WAV header fields
    let byte_rate = sample_rate
        .checked_mul(NUM_CHANNELS as u32 * (BITS_PER_SAMPLE as u32 / 8))
        .ok_or_else(|| anyhow::anyhow!("Sample rate {sample_rate} overflows the WAV byte rate"))?;
    let block_align: u16 = NUM_CHANNELS * (BITS_PER_SAMPLE / 8);
    let riff_size: u32 = 36 + data_size;

    let mut out = Vec::<u8>::with_capacity(WAV_HEADER_LEN + pcm.len());

    // RIFF header
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt chunk
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&NUM_CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data chunk
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(pcm);

    Ok(out)
}

/// PCM payload of a file written by [`wrap_pcm16`].
pub fn pcm_payload(wav: &[u8]) -> Option<&[u8]> {
    wav.get(WAV_HEADER_LEN..)
}

/// Convert f32 samples in [-1.0, 1.0] to 16-bit little-endian PCM bytes.
pub fn samples_to_pcm16(samples: &[f32]) -> Vec<u8> {
    const I16_MAX_F32: f32 = i16::MAX as f32;

    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * I16_MAX_F32) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}
