use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::wav;

/// A finished, independently playable WAV clip.
#[derive(Debug, Clone)]
pub struct FinishedClip {
    id: Uuid,
    sample_rate: u32,
    created_at: DateTime<Utc>,
    bytes: Vec<u8>,
}

impl FinishedClip {
    /// Frame a raw 16-bit mono PCM segment as a clip.
    pub fn from_pcm(pcm: &[u8], sample_rate: u32) -> anyhow::Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            sample_rate,
            created_at: Utc::now(),
            bytes: wav::wrap_pcm16(pcm, sample_rate)?,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Download name, unique per clip.
    pub fn filename(&self) -> String {
        format!("{}.wav", self.id)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whole file, header included.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn payload_len(&self) -> usize {
        self.bytes.len().saturating_sub(wav::WAV_HEADER_LEN)
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.payload_len() as u64 / 2) * 1000 / self.sample_rate as u64
    }
}
