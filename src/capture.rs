// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Card image capture types
//!
//! A capture is one or two immutable image buffers (front, optional back)
//! produced by the camera or file picker. Buffers are validated against
//! magic bytes on construction and can be rendered as base64 data URLs for
//! the vision API.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use thiserror::Error;

pub use image::ImageFormat;

/// Maximum image size (10MB)
const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Custom error types for capture image handling
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,
}

/// A single validated card image (front or back)
#[derive(Debug, Clone)]
pub struct CardImage {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl CardImage {
    /// Validate raw bytes and wrap them as a card image
    ///
    /// # Errors
    /// Returns error if the buffer is empty, oversized, or has no
    /// recognizable image magic bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::EmptyData);
        }
        if bytes.len() > MAX_IMAGE_SIZE {
            return Err(ImageError::TooLarge(bytes.len(), MAX_IMAGE_SIZE));
        }
        let format = detect_format(&bytes)?;
        Ok(Self { bytes, format })
    }

    /// Raw image bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Detected image format
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// MIME type derived from the detected format
    pub fn mime_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
            _ => "application/octet-stream",
        }
    }

    /// Render as a base64 `data:` URL for inline transport to the vision API
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type(),
            STANDARD.encode(&self.bytes)
        )
    }

    /// Fully decode the image, verifying the pixel data is intact
    pub fn decode(&self) -> Result<DynamicImage, ImageError> {
        image::load_from_memory_with_format(&self.bytes, self.format)
            .map_err(|e| ImageError::DecodeFailed(e.to_string()))
    }
}

/// One user-initiated capture: front image plus optional back image
#[derive(Debug, Clone)]
pub struct RawCapture {
    front: CardImage,
    back: Option<CardImage>,
}

impl RawCapture {
    pub fn new(front: CardImage, back: Option<CardImage>) -> Self {
        Self { front, back }
    }

    pub fn front(&self) -> &CardImage {
        &self.front
    }

    pub fn back(&self) -> Option<&CardImage> {
        self.back.as_ref()
    }

    /// All images in processing order (front first)
    pub fn images(&self) -> Vec<&CardImage> {
        let mut images = vec![&self.front];
        if let Some(back) = &self.back {
            images.push(back);
        }
        images
    }
}

/// Detect image format from magic bytes
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => Err(ImageError::UnsupportedFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 red PNG image (base64)
    const TINY_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    fn tiny_png_bytes() -> Vec<u8> {
        STANDARD.decode(TINY_PNG_BASE64).unwrap()
    }

    #[test]
    fn test_card_image_from_png_bytes() {
        let image = CardImage::from_bytes(tiny_png_bytes()).unwrap();
        assert_eq!(image.format(), ImageFormat::Png);
        assert_eq!(image.mime_type(), "image/png");

        let decoded = image.decode().unwrap();
        assert_eq!(decoded.width(), 1);
        assert_eq!(decoded.height(), 1);
    }

    #[test]
    fn test_card_image_empty_bytes_rejected() {
        let result = CardImage::from_bytes(Vec::new());
        assert!(matches!(result, Err(ImageError::EmptyData)));
    }

    #[test]
    fn test_card_image_garbage_rejected() {
        let result = CardImage::from_bytes(vec![0x00, 0x01, 0x02, 0x03, 0x04]);
        assert!(matches!(result, Err(ImageError::UnsupportedFormat)));
    }

    #[test]
    fn test_detect_format_jpeg_header() {
        let jpeg_header = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(detect_format(&jpeg_header).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_data_url_prefix() {
        let image = CardImage::from_bytes(tiny_png_bytes()).unwrap();
        let url = image.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.len() > "data:image/png;base64,".len());
    }

    #[test]
    fn test_capture_front_only() {
        let capture = RawCapture::new(CardImage::from_bytes(tiny_png_bytes()).unwrap(), None);
        assert_eq!(capture.images().len(), 1);
        assert!(capture.back().is_none());
    }

    #[test]
    fn test_capture_front_and_back() {
        let front = CardImage::from_bytes(tiny_png_bytes()).unwrap();
        let back = CardImage::from_bytes(tiny_png_bytes()).unwrap();
        let capture = RawCapture::new(front, Some(back));
        assert_eq!(capture.images().len(), 2);
    }
}
