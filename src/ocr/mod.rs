// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Local OCR engine adapter
//!
//! Wraps an in-process text-recognition engine behind the [`OcrEngine`]
//! trait. Engines must run automatic page segmentation with orientation
//! detection and no character whitelist, so digits and symbols come through
//! unfiltered. The adapter keeps only words above a confidence floor when
//! that leaves any text, falling back to the raw engine output otherwise.

#[cfg(feature = "tesseract-ocr")]
pub mod tesseract;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::capture::{CardImage, ImageError, RawCapture};

/// Words below this confidence are dropped from the preferred text
pub const WORD_CONFIDENCE_FLOOR: f32 = 30.0;

/// Errors from the OCR path
#[derive(Debug, Error)]
pub enum OcrError {
    /// No engine is available in this environment
    #[error("OCR engine unavailable: {reason}")]
    EngineUnavailable {
        /// Why the engine could not be used
        reason: String,
    },

    /// The engine failed while recognizing an image
    #[error("OCR recognition failed: {message}")]
    RecognitionFailed {
        /// Engine-reported failure
        message: String,
    },

    /// A remote image could not be fetched
    #[error("Failed to fetch image from {url}: {message}")]
    FetchFailed {
        /// The remote image URL
        url: String,
        /// Transport-level failure
        message: String,
    },

    /// The image bytes were not usable
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] ImageError),
}

/// A single recognized word with its confidence score (0-100)
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Raw output of one engine pass over one image
#[derive(Debug, Clone, Default)]
pub struct OcrPass {
    /// Unfiltered engine text
    pub raw_text: String,
    /// Per-word recognition results
    pub words: Vec<OcrWord>,
    /// Engine-reported mean confidence (0-100)
    pub mean_confidence: f32,
}

/// Raw text plus confidence for one or more images
#[derive(Debug, Clone)]
pub struct OcrObservation {
    pub text: String,
    /// 0-100; arithmetic mean across images for a multi-image capture
    pub confidence: f32,
}

/// Trait for in-process OCR engines
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text in a single image
    async fn recognize(&self, image: &CardImage) -> Result<OcrPass, OcrError>;

    /// Engine name for logging
    fn name(&self) -> &'static str;

    /// Whether the engine can run in this environment
    fn is_available(&self) -> bool {
        true
    }
}

/// Adapter that turns engine passes into extraction-ready observations
pub struct OcrTextExtractor {
    engine: Arc<dyn OcrEngine>,
    http: reqwest::Client,
}

impl OcrTextExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { engine, http }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Extract text from one image
    ///
    /// Prefers the concatenation of words above the confidence floor when
    /// that concatenation is non-empty, otherwise uses the raw engine text.
    pub async fn extract_image(&self, image: &CardImage) -> Result<OcrObservation, OcrError> {
        if !self.engine.is_available() {
            return Err(OcrError::EngineUnavailable {
                reason: format!("engine {} reported unavailable", self.engine.name()),
            });
        }

        let pass = self.engine.recognize(image).await?;

        let high_confidence_text = pass
            .words
            .iter()
            .filter(|w| w.confidence > WORD_CONFIDENCE_FLOOR)
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let text = if high_confidence_text.trim().is_empty() {
            pass.raw_text.clone()
        } else {
            high_confidence_text
        };

        debug!(
            "OCR pass via {}: {} words, mean confidence {:.1}",
            self.engine.name(),
            pass.words.len(),
            pass.mean_confidence
        );

        Ok(OcrObservation {
            text,
            confidence: pass.mean_confidence,
        })
    }

    /// Fetch a remote image and extract text from it
    pub async fn extract_url(&self, url: &str) -> Result<OcrObservation, OcrError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| OcrError::FetchFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(OcrError::FetchFailed {
                url: url.to_string(),
                message: format!("HTTP {}", response.status().as_u16()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| OcrError::FetchFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let image = CardImage::from_bytes(bytes.to_vec())?;
        self.extract_image(&image).await
    }

    /// Extract text from every image in a capture
    ///
    /// Images are processed as independent awaited passes; the texts are
    /// concatenated with a blank-line separator and the confidence is the
    /// arithmetic mean across images.
    pub async fn extract_capture(&self, capture: &RawCapture) -> Result<OcrObservation, OcrError> {
        let images = capture.images();
        let passes =
            futures::future::join_all(images.iter().map(|img| self.extract_image(img))).await;

        let mut texts = Vec::with_capacity(passes.len());
        let mut confidence_sum = 0.0f32;
        let mut count = 0usize;
        for pass in passes {
            match pass {
                Ok(obs) => {
                    confidence_sum += obs.confidence;
                    count += 1;
                    texts.push(obs.text);
                }
                Err(e) => return Err(e),
            }
        }

        if count == 0 {
            warn!("OCR produced no passes for capture");
            return Ok(OcrObservation {
                text: String::new(),
                confidence: 0.0,
            });
        }

        Ok(OcrObservation {
            text: texts.join("\n\n"),
            confidence: confidence_sum / count as f32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    const TINY_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    fn tiny_image() -> CardImage {
        CardImage::from_bytes(STANDARD.decode(TINY_PNG_BASE64).unwrap()).unwrap()
    }

    /// Engine returning a fixed pass
    struct FixedEngine {
        pass: OcrPass,
        available: bool,
    }

    #[async_trait]
    impl OcrEngine for FixedEngine {
        async fn recognize(&self, _image: &CardImage) -> Result<OcrPass, OcrError> {
            Ok(self.pass.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }

        fn is_available(&self) -> bool {
            self.available
        }
    }

    fn word(text: &str, confidence: f32) -> OcrWord {
        OcrWord {
            text: text.to_string(),
            confidence,
        }
    }

    #[tokio::test]
    async fn test_high_confidence_words_preferred() {
        let engine = FixedEngine {
            pass: OcrPass {
                raw_text: "raw garbage text".to_string(),
                words: vec![word("Acme", 91.0), word("#", 12.0), word("Corp", 85.0)],
                mean_confidence: 72.0,
            },
            available: true,
        };
        let extractor = OcrTextExtractor::new(Arc::new(engine));

        let obs = extractor.extract_image(&tiny_image()).await.unwrap();
        assert_eq!(obs.text, "Acme Corp");
        assert!((obs.confidence - 72.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_raw_text_fallback_when_all_words_low_confidence() {
        let engine = FixedEngine {
            pass: OcrPass {
                raw_text: "blurry but present".to_string(),
                words: vec![word("x", 5.0), word("y", 10.0)],
                mean_confidence: 8.0,
            },
            available: true,
        };
        let extractor = OcrTextExtractor::new(Arc::new(engine));

        let obs = extractor.extract_image(&tiny_image()).await.unwrap();
        assert_eq!(obs.text, "blurry but present");
    }

    #[tokio::test]
    async fn test_unavailable_engine_is_classified() {
        let engine = FixedEngine {
            pass: OcrPass::default(),
            available: false,
        };
        let extractor = OcrTextExtractor::new(Arc::new(engine));

        let err = extractor.extract_image(&tiny_image()).await.unwrap_err();
        assert!(matches!(err, OcrError::EngineUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_extract_url_unreachable_host_is_fetch_failure() {
        let engine = FixedEngine {
            pass: OcrPass::default(),
            available: true,
        };
        let extractor = OcrTextExtractor::new(Arc::new(engine));

        let err = extractor
            .extract_url("http://127.0.0.1:59997/card.png")
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::FetchFailed { url, .. } if url.contains("card.png")));
    }

    #[tokio::test]
    async fn test_capture_merges_with_blank_line_and_averages_confidence() {
        struct FrontBackEngine;

        #[async_trait]
        impl OcrEngine for FrontBackEngine {
            async fn recognize(&self, _image: &CardImage) -> Result<OcrPass, OcrError> {
                Ok(OcrPass {
                    raw_text: "side text".to_string(),
                    words: vec![],
                    mean_confidence: 60.0,
                })
            }

            fn name(&self) -> &'static str {
                "front-back"
            }
        }

        let extractor = OcrTextExtractor::new(Arc::new(FrontBackEngine));
        let capture = RawCapture::new(tiny_image(), Some(tiny_image()));

        let obs = extractor.extract_capture(&capture).await.unwrap();
        assert_eq!(obs.text, "side text\n\nside text");
        assert!((obs.confidence - 60.0).abs() < f32::EPSILON);
    }
}
