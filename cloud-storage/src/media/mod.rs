//! Conversions between host media buffers and file bytes.
//!
//! Images are converted here; video and audio are encoded by the host
//! through [`VideoSource`] and [`AudioSource`].

mod av;
mod raster;

pub use av::{AudioFormat, AudioSource, EncodedVideo, VideoFormat, VideoSource};
pub use raster::{
    decode_image, encode_image, png_text_chunks, ImageFileFormat, ImageTensor, Mask,
};

use serde_json::{Map, Value};

/// Workflow information the host attaches to outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowMetadata {
    pub prompt: Option<Value>,
    pub extra_pnginfo: Option<Map<String, Value>>,
}

impl WorkflowMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompt(mut self, prompt: Value) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_extra<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.extra_pnginfo
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// `(keyword, JSON text)` pairs: `prompt` first, then every extra key.
    pub fn text_entries(&self) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        if let Some(prompt) = &self.prompt {
            entries.push(("prompt".to_string(), prompt.to_string()));
        }
        if let Some(extra) = &self.extra_pnginfo {
            for (key, value) in extra {
                entries.push((key.clone(), value.to_string()));
            }
        }
        entries
    }

    /// Container metadata for video: extra keys plus `prompt`, or `None`
    /// when there is nothing to embed.
    pub fn container_metadata(&self) -> Option<Value> {
        let mut merged = self.extra_pnginfo.clone().unwrap_or_default();
        if let Some(prompt) = &self.prompt {
            merged.insert("prompt".to_string(), prompt.clone());
        }
        (!merged.is_empty()).then_some(Value::Object(merged))
    }
}
