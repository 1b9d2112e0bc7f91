use crate::media::{AudioFormat, ImageFileFormat, VideoFormat};

/// Where and how to store a batch of images
#[derive(Debug, Clone)]
pub struct SaveImageRequest {
    pub key_prefix: String,
    /// `%batch_num%` is replaced with each image's index
    pub filename: String,
    pub format: ImageFileFormat,
    /// JPEG quality, 1–100
    pub quality: u8,
}

impl Default for SaveImageRequest {
    fn default() -> Self {
        Self {
            key_prefix: "comfyui/images/".to_string(),
            filename: "ComfyUI_%batch_num%".to_string(),
            format: ImageFileFormat::Png,
            quality: 95,
        }
    }
}

impl SaveImageRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_prefix<S: Into<String>>(mut self, key_prefix: S) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn with_format(mut self, format: ImageFileFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SaveVideoRequest {
    pub key_prefix: String,
    pub filename: String,
    pub format: VideoFormat,
}

impl Default for SaveVideoRequest {
    fn default() -> Self {
        Self {
            key_prefix: "comfyui/videos/".to_string(),
            filename: "ComfyUI_video".to_string(),
            format: VideoFormat::default(),
        }
    }
}

impl SaveVideoRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_prefix<S: Into<String>>(mut self, key_prefix: S) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = filename.into();
        self
    }

    /// Container and codec names, `"auto"` for either lets the host pick
    pub fn with_format<C: Into<String>, K: Into<String>>(mut self, container: C, codec: K) -> Self {
        self.format = VideoFormat {
            container: container.into(),
            codec: codec.into(),
        };
        self
    }
}

#[derive(Debug, Clone)]
pub struct SaveAudioRequest {
    pub key_prefix: String,
    pub filename: String,
    pub format: AudioFormat,
}

impl Default for SaveAudioRequest {
    fn default() -> Self {
        Self {
            key_prefix: "comfyui/audio/".to_string(),
            filename: "ComfyUI_audio".to_string(),
            format: AudioFormat::Flac,
        }
    }
}

impl SaveAudioRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_prefix<S: Into<String>>(mut self, key_prefix: S) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }
}
