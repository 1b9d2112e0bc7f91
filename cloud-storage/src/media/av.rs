use bytes::Bytes;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::{StorageError, StorageResult};

/// Audio containers the save node can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    #[default]
    Flac,
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Flac => "flac",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }
}

impl FromStr for AudioFormat {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flac" => Ok(AudioFormat::Flac),
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            other => Err(StorageError::invalid(format!("unsupported audio format: {other}"))),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Container and codec names as the host understands them. `"auto"`
/// lets the host pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFormat {
    pub container: String,
    pub codec: String,
}

impl Default for VideoFormat {
    fn default() -> Self {
        Self {
            container: "auto".to_string(),
            codec: "auto".to_string(),
        }
    }
}

/// Encoded video returned by the host.
#[derive(Debug, Clone)]
pub struct EncodedVideo {
    pub bytes: Bytes,
    /// Extension of the container actually written, without the dot
    pub extension: String,
    pub content_type: Option<String>,
}

/// Host-owned video that can serialize itself.
pub trait VideoSource: Send + Sync {
    fn encode(&self, format: &VideoFormat, metadata: Option<&Value>) -> StorageResult<EncodedVideo>;
}

/// Host-owned audio clip (waveform plus sample rate) that can serialize
/// itself.
pub trait AudioSource: Send + Sync {
    fn encode(&self, format: AudioFormat) -> StorageResult<Bytes>;
}
