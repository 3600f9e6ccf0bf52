// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tesseract-backed OCR engine
//!
//! Configured for automatic page segmentation with orientation detection
//! and no character whitelist, so digits and punctuation are recognized
//! rather than filtered. Recognition is blocking C code and runs on the
//! blocking thread pool.

use async_trait::async_trait;
use tesseract::{PageSegMode, Tesseract};
use tracing::debug;

use super::{OcrEngine, OcrError, OcrPass, OcrWord};
use crate::capture::CardImage;
use crate::config::PipelineConfig;

/// Tesseract engine over the system `libtesseract`
pub struct TesseractEngine {
    language: String,
}

impl TesseractEngine {
    /// Create an engine for the given language (e.g. "eng")
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
        }
    }

    /// Create an engine for the configured OCR language
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.ocr_language)
    }

    fn recognize_blocking(language: &str, bytes: &[u8]) -> Result<OcrPass, OcrError> {
        let mut tess = Tesseract::new(None, Some(language))
            .map_err(|e| OcrError::EngineUnavailable {
                reason: e.to_string(),
            })?
            .set_image_from_mem(bytes)
            .map_err(|e| OcrError::RecognitionFailed {
                message: e.to_string(),
            })?;

        tess.set_page_seg_mode(PageSegMode::PsmAutoOsd);
        let mut tess = tess
            .set_variable("preserve_interword_spaces", "1")
            .map_err(|e| OcrError::RecognitionFailed {
                message: e.to_string(),
            })?;

        let raw_text = tess.get_text().map_err(|e| OcrError::RecognitionFailed {
            message: e.to_string(),
        })?;

        let tsv = tess
            .get_tsv_text(0)
            .map_err(|e| OcrError::RecognitionFailed {
                message: e.to_string(),
            })?;
        let words = parse_tsv_words(&tsv);

        let mean_confidence = (tess.mean_text_conf() as f32).clamp(0.0, 100.0);
        debug!(
            "Tesseract pass: {} words, mean confidence {:.1}",
            words.len(),
            mean_confidence
        );

        Ok(OcrPass {
            raw_text,
            words,
            mean_confidence,
        })
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image: &CardImage) -> Result<OcrPass, OcrError> {
        let language = self.language.clone();
        let bytes = image.bytes().to_vec();
        tokio::task::spawn_blocking(move || Self::recognize_blocking(&language, &bytes))
            .await
            .map_err(|e| OcrError::RecognitionFailed {
                message: format!("OCR task panicked: {}", e),
            })?
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}

/// Parse word rows (level 5) out of Tesseract TSV output
///
/// Columns: level, page, block, par, line, word, left, top, width, height,
/// conf, text.
fn parse_tsv_words(tsv: &str) -> Vec<OcrWord> {
    let mut words = Vec::new();
    for line in tsv.lines() {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let confidence: f32 = match cols[10].parse() {
            Ok(c) => c,
            Err(_) => continue,
        };
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        words.push(OcrWord {
            text: text.to_string(),
            confidence,
        });
    }
    words
}
