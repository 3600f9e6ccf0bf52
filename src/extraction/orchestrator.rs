// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Extraction strategy orchestration
//!
//! Chooses and sequences extraction strategies for a capture: vision first
//! when a credential is configured and no cooldown is active, local OCR +
//! heuristics otherwise or on failure. This is the only place that decides
//! whether a failure is recoverable via fallback or terminal.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::cooldown::{CooldownGate, KeyValueStore};
use super::heuristics::HeuristicParser;
use super::normalizer::normalize;
use super::types::{ExtractionError, ExtractionReport, FieldSet, StrategyPath};
use crate::capture::RawCapture;
use crate::config::PipelineConfig;
use crate::ocr::{OcrEngine, OcrTextExtractor};
use crate::vision::{OcrEnhancer, TextEnhancer, VisionClient, VisionExtractor};

/// Progress labels shown to the user, in the order the strategy ran
pub const PROGRESS_VISION: &str = "Analyzing business card with AI...";
pub const PROGRESS_OCR_BACKUP: &str = "Enhancing extraction with OCR backup...";
pub const PROGRESS_OCR: &str = "Processing images with OCR...";
pub const PROGRESS_AI_CLEANUP: &str = "Cleaning and parsing OCR text with AI...";
pub const PROGRESS_PARSE: &str = "Parsing extracted text...";

/// Orchestrates vision, OCR, heuristics, and enhancement for one capture
pub struct ExtractionPipeline {
    ocr: OcrTextExtractor,
    cooldown: CooldownGate,
    parser: HeuristicParser,
    vision: Option<Arc<dyn VisionExtractor>>,
    enhancer: Option<Arc<dyn OcrEnhancer>>,
}

impl ExtractionPipeline {
    /// Create a local-only pipeline (OCR + heuristics)
    pub fn new(ocr: OcrTextExtractor, cooldown: CooldownGate) -> Self {
        Self {
            ocr,
            cooldown,
            parser: HeuristicParser::new(),
            vision: None,
            enhancer: None,
        }
    }

    /// Build a pipeline from configuration
    ///
    /// The OCR engine and cooldown store stay injected; the vision client
    /// and enhancer are constructed only when a credential is configured.
    pub fn from_config(
        config: &PipelineConfig,
        engine: Arc<dyn OcrEngine>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let window = Duration::from_secs(config.cooldown_window_secs);
        let mut pipeline = Self::new(
            OcrTextExtractor::new(engine),
            CooldownGate::with_window(store, window),
        );

        if let Some(api_key) = &config.vision.api_key {
            let timeout = Duration::from_millis(config.vision.request_timeout_ms);
            pipeline = pipeline
                .with_vision(Arc::new(VisionClient::new(
                    &config.vision.endpoint,
                    api_key,
                    &config.vision.vision_model,
                    timeout,
                )))
                .with_enhancer(Arc::new(TextEnhancer::new(
                    &config.vision.endpoint,
                    api_key,
                    &config.vision.enhance_model,
                    timeout,
                )));
        }

        pipeline
    }

    /// Enable the vision-first strategy
    pub fn with_vision(mut self, vision: Arc<dyn VisionExtractor>) -> Self {
        self.vision = Some(vision);
        self
    }

    /// Enable best-effort AI enhancement of OCR results
    pub fn with_enhancer(mut self, enhancer: Arc<dyn OcrEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    /// Run the full extraction strategy sequence for one capture
    ///
    /// Returns a merged field set and the path taken, or
    /// [`ExtractionError::NoDataExtracted`] when every path yields nothing;
    /// the caller must then prompt for fully manual entry.
    pub async fn extract(&self, capture: &RawCapture) -> Result<ExtractionReport, ExtractionError> {
        let mut progress = Vec::new();
        let mut degraded = false;

        if let Some(vision) = &self.vision {
            if let Some(remaining) = self.cooldown.remaining() {
                info!(
                    "Vision cooldown active ({}s remaining), skipping vision path",
                    remaining.as_secs()
                );
                degraded = true;
            } else {
                progress.push(PROGRESS_VISION.to_string());
                match vision.extract_fields(capture).await {
                    Ok(fields) if fields.has_critical_field() => {
                        info!(
                            "Vision extraction authoritative with {} fields",
                            fields.len()
                        );
                        return Ok(ExtractionReport {
                            fields,
                            strategy: StrategyPath::VisionOnly,
                            progress,
                            degraded: false,
                            ocr_confidence: None,
                        });
                    }
                    Ok(fields) => {
                        // No critical field extracted; OCR fills the gaps
                        return self.vision_with_ocr_backup(capture, fields, progress).await;
                    }
                    Err(e) if e.is_quota() => {
                        warn!("Vision quota reached, engaging cooldown: {}", e);
                        self.cooldown.engage();
                        degraded = true;
                    }
                    Err(e) => {
                        warn!("Vision extraction failed, falling back to OCR: {}", e);
                    }
                }
            }
        }

        self.local_only(capture, progress, degraded).await
    }

    async fn vision_with_ocr_backup(
        &self,
        capture: &RawCapture,
        mut fields: FieldSet,
        mut progress: Vec<String>,
    ) -> Result<ExtractionReport, ExtractionError> {
        progress.push(PROGRESS_OCR_BACKUP.to_string());

        let mut ocr_confidence = None;
        match self.ocr.extract_capture(capture).await {
            Ok(observation) => {
                let text = normalize(&observation.text);
                if !text.is_empty() {
                    ocr_confidence = Some(observation.confidence);
                    let ocr_fields = self.parser.parse(&text);
                    fields.fill_missing_from(&ocr_fields);

                    if let Some(enhancer) = &self.enhancer {
                        progress.push(PROGRESS_AI_CLEANUP.to_string());
                        fields = enhancer.enhance_fields(&text, &fields).await;
                    }
                }
            }
            // A failed backup pass leaves the vision result standing
            Err(e) => warn!("OCR backup failed, keeping vision result: {}", e),
        }

        if fields.is_empty() {
            return Err(ExtractionError::NoDataExtracted);
        }

        Ok(ExtractionReport {
            fields,
            strategy: StrategyPath::VisionWithOcrBackup,
            progress,
            degraded: false,
            ocr_confidence,
        })
    }

    async fn local_only(
        &self,
        capture: &RawCapture,
        mut progress: Vec<String>,
        degraded: bool,
    ) -> Result<ExtractionReport, ExtractionError> {
        progress.push(PROGRESS_OCR.to_string());

        let observation = self.ocr.extract_capture(capture).await?;
        let text = normalize(&observation.text);
        if text.is_empty() {
            return Err(ExtractionError::NoDataExtracted);
        }

        let mut fields = self.parser.parse(&text);

        // Enhancement calls the same provider as vision, so it only runs
        // while that API is still believed usable
        let enhancement_allowed =
            self.vision.is_some() && !degraded && !self.cooldown.is_active();
        match &self.enhancer {
            Some(enhancer) if enhancement_allowed => {
                progress.push(PROGRESS_AI_CLEANUP.to_string());
                fields = enhancer.enhance_fields(&text, &fields).await;
            }
            _ => progress.push(PROGRESS_PARSE.to_string()),
        }

        if fields.is_empty() {
            return Err(ExtractionError::NoDataExtracted);
        }

        Ok(ExtractionReport {
            fields,
            strategy: StrategyPath::OcrOnly,
            progress,
            degraded,
            ocr_confidence: Some(observation.confidence),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    use crate::capture::CardImage;
    use crate::extraction::cooldown::{KeyValueStore, MemoryStore, VISION_COOLDOWN_KEY};
    use crate::ocr::{OcrEngine, OcrError, OcrPass};
    use crate::vision::VisionError;

    const TINY_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    fn capture() -> RawCapture {
        let image = CardImage::from_bytes(STANDARD.decode(TINY_PNG_BASE64).unwrap()).unwrap();
        RawCapture::new(image, None)
    }

    struct TextEngine {
        text: &'static str,
        calls: AtomicUsize,
    }

    impl TextEngine {
        fn new(text: &'static str) -> Self {
            Self {
                text,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OcrEngine for TextEngine {
        async fn recognize(&self, _image: &CardImage) -> Result<OcrPass, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(OcrPass {
                raw_text: self.text.to_string(),
                words: vec![],
                mean_confidence: 80.0,
            })
        }

        fn name(&self) -> &'static str {
            "text"
        }
    }

    struct ScriptedVision {
        result: Result<FieldSet, VisionError>,
        calls: AtomicUsize,
    }

    impl ScriptedVision {
        fn ok(fields: FieldSet) -> Self {
            Self {
                result: Ok(fields),
                calls: AtomicUsize::new(0),
            }
        }

        fn api_error(status: u16) -> Self {
            Self {
                result: Err(VisionError::Api {
                    status,
                    body: "{}".to_string(),
                }),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VisionExtractor for ScriptedVision {
        async fn extract_fields(&self, _capture: &RawCapture) -> Result<FieldSet, VisionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(fields) => Ok(fields.clone()),
                Err(VisionError::Api { status, body }) => Err(VisionError::Api {
                    status: *status,
                    body: body.clone(),
                }),
                Err(_) => unreachable!(),
            }
        }
    }

    fn pipeline_with(
        engine: Arc<TextEngine>,
        store: Arc<MemoryStore>,
        vision: Option<Arc<ScriptedVision>>,
    ) -> ExtractionPipeline {
        let mut pipeline = ExtractionPipeline::new(
            OcrTextExtractor::new(engine),
            CooldownGate::new(store),
        );
        if let Some(vision) = vision {
            pipeline = pipeline.with_vision(vision);
        }
        pipeline
    }

    #[tokio::test]
    async fn test_no_credential_goes_straight_to_ocr() {
        let engine = Arc::new(TextEngine::new("Jane Doe\nAcme Widgets LLC"));
        let pipeline = pipeline_with(engine.clone(), Arc::new(MemoryStore::new()), None);

        let report = pipeline.extract(&capture()).await.unwrap();
        assert_eq!(report.strategy, StrategyPath::OcrOnly);
        assert!(!report.degraded);
        assert_eq!(
            report.progress,
            vec![PROGRESS_OCR.to_string(), PROGRESS_PARSE.to_string()]
        );
        assert_eq!(report.fields.get("full_name"), Some("Jane Doe"));
        assert_eq!(report.ocr_confidence, Some(80.0));
    }

    #[tokio::test]
    async fn test_vision_with_critical_field_is_authoritative() {
        let engine = Arc::new(TextEngine::new("Other Person\nOther Company Inc"));
        let mut fields = FieldSet::new();
        fields.insert("company", "Acme");
        let vision = Arc::new(ScriptedVision::ok(fields));

        let pipeline = pipeline_with(
            engine.clone(),
            Arc::new(MemoryStore::new()),
            Some(vision.clone()),
        );

        let report = pipeline.extract(&capture()).await.unwrap();
        assert_eq!(report.strategy, StrategyPath::VisionOnly);
        assert_eq!(report.fields.get("company"), Some("Acme"));
        // OCR never ran
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.progress, vec![PROGRESS_VISION.to_string()]);
    }

    #[tokio::test]
    async fn test_vision_without_critical_fields_triggers_ocr_backup() {
        let engine = Arc::new(TextEngine::new(
            "John A. Smith\nAcme Corporation Inc\njohn@acme.com",
        ));
        let mut fields = FieldSet::new();
        fields.insert("website", "https://example.com");
        let vision = Arc::new(ScriptedVision::ok(fields));

        let pipeline = pipeline_with(
            engine.clone(),
            Arc::new(MemoryStore::new()),
            Some(vision.clone()),
        );

        let report = pipeline.extract(&capture()).await.unwrap();
        assert_eq!(report.strategy, StrategyPath::VisionWithOcrBackup);
        assert!(engine.calls.load(Ordering::SeqCst) > 0);
        // Vision value kept, OCR fills in the rest
        assert_eq!(report.fields.get("website"), Some("https://example.com"));
        assert_eq!(report.fields.get("full_name"), Some("John A. Smith"));
        assert_eq!(report.fields.get("email"), Some("john@acme.com"));
        assert_eq!(
            report.progress,
            vec![PROGRESS_VISION.to_string(), PROGRESS_OCR_BACKUP.to_string()]
        );
    }

    #[tokio::test]
    async fn test_quota_failure_engages_cooldown_and_falls_back() {
        let engine = Arc::new(TextEngine::new("Jane Doe\nAcme Widgets LLC"));
        let store = Arc::new(MemoryStore::new());
        let vision = Arc::new(ScriptedVision::api_error(429));

        let pipeline = pipeline_with(engine.clone(), store.clone(), Some(vision.clone()));

        let report = pipeline.extract(&capture()).await.unwrap();
        assert_eq!(report.strategy, StrategyPath::OcrOnly);
        assert!(report.degraded);
        assert!(store.get(VISION_COOLDOWN_KEY).is_some());

        // The next attempt skips vision entirely
        let report = pipeline.extract(&capture()).await.unwrap();
        assert_eq!(report.strategy, StrategyPath::OcrOnly);
        assert!(report.degraded);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_falls_back_without_cooldown() {
        let engine = Arc::new(TextEngine::new("Jane Doe\nAcme Widgets LLC"));
        let store = Arc::new(MemoryStore::new());
        let vision = Arc::new(ScriptedVision::api_error(500));

        let pipeline = pipeline_with(engine.clone(), store.clone(), Some(vision.clone()));

        let report = pipeline.extract(&capture()).await.unwrap();
        assert_eq!(report.strategy, StrategyPath::OcrOnly);
        assert!(!report.degraded);
        assert!(store.get(VISION_COOLDOWN_KEY).is_none());

        // Vision is retried on the next user-initiated attempt
        pipeline.extract(&capture()).await.unwrap();
        assert_eq!(vision.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_cooldown_reenables_vision() {
        let engine = Arc::new(TextEngine::new("Jane Doe\nAcme Widgets LLC"));
        let store = Arc::new(MemoryStore::new());
        let past = chrono::Utc::now().timestamp_millis() - 1000;
        store.set(VISION_COOLDOWN_KEY, &past.to_string());

        let mut fields = FieldSet::new();
        fields.insert("company", "Acme");
        let vision = Arc::new(ScriptedVision::ok(fields));

        let pipeline = pipeline_with(engine, store, Some(vision.clone()));
        let report = pipeline.extract(&capture()).await.unwrap();
        assert_eq!(report.strategy, StrategyPath::VisionOnly);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_from_config_without_credential_is_local_only() {
        let mut config = PipelineConfig::default();
        config.cooldown_window_secs = 120;
        let engine = Arc::new(TextEngine::new("Jane Doe\nAcme Widgets LLC"));

        let pipeline =
            ExtractionPipeline::from_config(&config, engine, Arc::new(MemoryStore::new()));
        let report = pipeline.extract(&capture()).await.unwrap();

        assert_eq!(report.strategy, StrategyPath::OcrOnly);
        assert!(!report.progress.contains(&PROGRESS_VISION.to_string()));
        assert_eq!(report.fields.get("full_name"), Some("Jane Doe"));
    }

    #[tokio::test]
    async fn test_from_config_with_credential_attempts_vision() {
        let mut config = PipelineConfig::default();
        config.vision.api_key = Some("sk-test".to_string());
        config.vision.endpoint = "http://127.0.0.1:59999".to_string();
        config.vision.request_timeout_ms = 200;
        let engine = Arc::new(TextEngine::new("Jane Doe\nAcme Widgets LLC"));

        let pipeline =
            ExtractionPipeline::from_config(&config, engine, Arc::new(MemoryStore::new()));
        let report = pipeline.extract(&capture()).await.unwrap();

        // Transport failure falls back to the local path without cooldown
        assert_eq!(report.strategy, StrategyPath::OcrOnly);
        assert!(!report.degraded);
        assert_eq!(report.progress[0], PROGRESS_VISION.to_string());
        assert_eq!(report.fields.get("full_name"), Some("Jane Doe"));
    }

    #[tokio::test]
    async fn test_empty_text_everywhere_is_terminal() {
        let engine = Arc::new(TextEngine::new(""));
        let pipeline = pipeline_with(engine, Arc::new(MemoryStore::new()), None);

        let err = pipeline.extract(&capture()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NoDataExtracted));
    }

    #[tokio::test]
    async fn test_noise_only_text_is_terminal() {
        // Lines that the normalizer drops entirely
        let engine = Arc::new(TextEngine::new("!!\n--\n.."));
        let pipeline = pipeline_with(engine, Arc::new(MemoryStore::new()), None);

        let err = pipeline.extract(&capture()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NoDataExtracted));
    }
}
