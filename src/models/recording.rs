// src/models/recording.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordingType {
    Webcam,
    Screen,
    Audio,
}

/// Per-type upload counters. Media bytes live with the external blob store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordingTrack {
    pub chunk_count: u64,
    pub total_bytes: u64,
    pub last_sequence: Option<u64>,
}

/// Recording metadata attached to a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub webcam_enabled: bool,
    pub screen_enabled: bool,
    pub audio_enabled: bool,
    pub tracks: BTreeMap<RecordingType, RecordingTrack>,
}

impl RecordingSummary {
    pub fn is_enabled(&self, recording_type: RecordingType) -> bool {
        match recording_type {
            RecordingType::Webcam => self.webcam_enabled,
            RecordingType::Screen => self.screen_enabled,
            RecordingType::Audio => self.audio_enabled,
        }
    }

    pub fn total_chunks(&self) -> u64 {
        self.tracks.values().map(|t| t.chunk_count).sum()
    }
}

/// Largest single chunk the media pipeline uploads (2 GiB).
pub const MAX_CHUNK_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// DTO for `POST /sessions/{id}/recordings/chunks`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordingChunkRequest {
    pub recording_type: RecordingType,
    pub sequence: u64,
    #[validate(range(min = 1, max = MAX_CHUNK_BYTES))]
    pub byte_size: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Where the external media pipeline stored the blob, if known.
    #[serde(default)]
    #[validate(custom(function = validate_storage_url))]
    pub storage_url: Option<String>,
}

fn validate_storage_url(url: &str) -> Result<(), validator::ValidationError> {
    if url.len() > 2048 {
        return Err(validator::ValidationError::new("url_too_long"));
    }
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordingChunkResponse {
    pub recording_type: RecordingType,
    pub sequence: u64,
    pub track: RecordingTrack,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(byte_size: u64) -> RecordingChunkRequest {
        RecordingChunkRequest {
            recording_type: RecordingType::Webcam,
            sequence: 1,
            byte_size,
            started_at: Utc::now(),
            duration_ms: 5000,
            storage_url: Some("https://media.example.com/chunks/1".to_string()),
        }
    }

    #[test]
    fn byte_size_must_be_plausible() {
        assert!(chunk(4096).validate().is_ok());
        assert!(chunk(MAX_CHUNK_BYTES).validate().is_ok());
        assert!(chunk(0).validate().is_err());
        assert!(chunk(MAX_CHUNK_BYTES + 1).validate().is_err());
        assert!(chunk(u64::MAX).validate().is_err());
    }

    #[test]
    fn storage_url_must_parse() {
        let mut bad = chunk(1);
        bad.storage_url = Some("not a url".to_string());
        assert!(bad.validate().is_err());
    }
}
