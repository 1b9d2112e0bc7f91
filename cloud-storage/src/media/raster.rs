use bytes::Bytes;
use ::image::codecs::jpeg::JpegEncoder;
use ::image::codecs::png::{CompressionType, FilterType, PngEncoder};
use ::image::codecs::webp::WebPEncoder;
use ::image::{DynamicImage, GrayImage, ImageDecoder, ImageReader, RgbImage, RgbaImage};
use img_parts::png::{Png, PngChunk};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use crate::media::WorkflowMetadata;
use crate::{StorageError, StorageResult};

/// Output formats for saved images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFileFormat {
    #[default]
    Png,
    Jpg,
    Webp,
}

impl ImageFileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFileFormat::Png => "png",
            ImageFileFormat::Jpg => "jpg",
            ImageFileFormat::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFileFormat::Png => "image/png",
            ImageFileFormat::Jpg => "image/jpeg",
            ImageFileFormat::Webp => "image/webp",
        }
    }
}

impl FromStr for ImageFileFormat {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFileFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFileFormat::Jpg),
            "webp" => Ok(ImageFileFormat::Webp),
            other => Err(StorageError::invalid(format!("unsupported image format: {other}"))),
        }
    }
}

impl fmt::Display for ImageFileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One image from the host pipeline: row-major `height × width × channels`
/// floats in `[0, 1]`. Channels are 1 (gray), 3 (RGB) or 4 (RGBA).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<f32>,
}

impl ImageTensor {
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<f32>) -> StorageResult<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(StorageError::media(format!(
                "unsupported channel count {channels}"
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(StorageError::media(format!(
                "tensor has {} values, expected {expected} for {width}x{height}x{channels}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Value at `(x, y)` for channel `c`.
    pub fn value(&self, x: u32, y: u32, c: u8) -> f32 {
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize
            + c as usize;
        self.data[idx]
    }

    fn to_dynamic(&self) -> StorageResult<DynamicImage> {
        // 255 * v, clipped, truncated to u8
        let bytes: Vec<u8> = self
            .data
            .iter()
            .map(|v| (v * 255.0).clamp(0.0, 255.0) as u8)
            .collect();
        let size_error = || StorageError::media("pixel buffer does not match dimensions");
        Ok(match self.channels {
            1 => DynamicImage::ImageLuma8(
                GrayImage::from_raw(self.width, self.height, bytes).ok_or_else(size_error)?,
            ),
            3 => DynamicImage::ImageRgb8(
                RgbImage::from_raw(self.width, self.height, bytes).ok_or_else(size_error)?,
            ),
            _ => DynamicImage::ImageRgba8(
                RgbaImage::from_raw(self.width, self.height, bytes).ok_or_else(size_error)?,
            ),
        })
    }
}

/// Inverted alpha of a loaded image: 1.0 where the image is transparent.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Mask {
    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn value(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }
}

fn media_error(err: impl fmt::Display) -> StorageError {
    StorageError::media(err.to_string())
}

/// Encode one image. PNG gets workflow text chunks when `metadata` is
/// given; `quality` (1–100) only affects JPEG. WebP output is lossless.
pub fn encode_image(
    tensor: &ImageTensor,
    format: ImageFileFormat,
    quality: u8,
    metadata: Option<&WorkflowMetadata>,
) -> StorageResult<Vec<u8>> {
    let img = tensor.to_dynamic()?;
    let mut buf = Vec::new();

    match format {
        ImageFileFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut buf, CompressionType::Default, FilterType::Adaptive);
            img.write_with_encoder(encoder).map_err(media_error)?;
            if let Some(metadata) = metadata {
                buf = add_png_text(buf, &metadata.text_entries())?;
            }
        }
        ImageFileFormat::Jpg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(media_error)?;
        }
        ImageFileFormat::Webp => {
            let encoder = WebPEncoder::new_lossless(&mut buf);
            img.write_with_encoder(encoder).map_err(media_error)?;
        }
    }

    Ok(buf)
}

/// Text chunk payload: `tEXt` when the text is Latin-1, `iTXt` otherwise.
fn text_chunk(keyword: &str, text: &str) -> PngChunk {
    let keyword: Vec<u8> = keyword
        .chars()
        .filter(|c| (*c as u32) < 0x100)
        .take(79)
        .map(|c| c as u8)
        .collect();

    if text.chars().all(|c| (c as u32) < 0x100) {
        let mut contents = keyword;
        contents.push(0);
        contents.extend(text.chars().map(|c| c as u8));
        PngChunk::new(*b"tEXt", Bytes::from(contents))
    } else {
        let mut contents = keyword;
        // NUL, uncompressed, no language tag, no translated keyword
        contents.extend_from_slice(&[0, 0, 0, 0, 0]);
        contents.extend_from_slice(text.as_bytes());
        PngChunk::new(*b"iTXt", Bytes::from(contents))
    }
}

fn add_png_text(encoded: Vec<u8>, entries: &[(String, String)]) -> StorageResult<Vec<u8>> {
    if entries.is_empty() {
        return Ok(encoded);
    }
    let mut png = Png::from_bytes(Bytes::from(encoded)).map_err(media_error)?;
    let chunks = png.chunks_mut();
    // Keep IEND last
    let mut at = chunks.len().saturating_sub(1);
    for (keyword, text) in entries {
        chunks.insert(at, text_chunk(keyword, text));
        at += 1;
    }
    Ok(png.encoder().bytes().to_vec())
}

/// Read back `(keyword, text)` pairs from a PNG's text chunks.
pub fn png_text_chunks(data: &[u8]) -> StorageResult<Vec<(String, String)>> {
    let png = Png::from_bytes(Bytes::copy_from_slice(data)).map_err(media_error)?;
    let mut entries = Vec::new();
    for chunk in png.chunks() {
        let contents = chunk.contents();
        let Some(nul) = contents.iter().position(|b| *b == 0) else {
            continue;
        };
        let keyword: String = contents[..nul].iter().map(|b| *b as char).collect();
        match &chunk.kind() {
            b"tEXt" => {
                let text = contents[nul + 1..].iter().map(|b| *b as char).collect();
                entries.push((keyword, text));
            }
            b"iTXt" if contents.len() >= nul + 5 => {
                let text = String::from_utf8_lossy(&contents[nul + 5..]).into_owned();
                entries.push((keyword, text));
            }
            _ => {}
        }
    }
    Ok(entries)
}

/// Decode object bytes into an RGB tensor and mask. EXIF orientation is
/// applied; the mask is `1 - alpha`, or zeros without an alpha channel.
pub fn decode_image(data: &[u8]) -> StorageResult<(ImageTensor, Mask)> {
    let mut decoder = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_decoder()
        .map_err(media_error)?;
    let orientation = decoder.orientation().map_err(media_error)?;
    let mut img = DynamicImage::from_decoder(decoder).map_err(media_error)?;
    img.apply_orientation(orientation);

    let (width, height) = (img.width(), img.height());
    let rgb = img.to_rgb32f();
    let tensor = ImageTensor::new(width, height, 3, rgb.into_raw())?;

    let mask = if img.color().has_alpha() {
        let data = img
            .to_rgba32f()
            .pixels()
            .map(|p| 1.0 - p.0[3])
            .collect();
        Mask {
            width,
            height,
            data,
        }
    } else {
        Mask::zeros(width, height)
    };

    Ok((tensor, mask))
}
