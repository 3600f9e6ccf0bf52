// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod capture;
pub mod config;
pub mod extraction;
pub mod hosting;
pub mod intake;
pub mod ocr;
pub mod store;
pub mod vision;

// Re-export main types
pub use capture::{CardImage, ImageError, ImageFormat, RawCapture};
pub use config::{HostingConfig, PipelineConfig, VisionConfig};
pub use extraction::{
    CooldownGate, ExtractionError, ExtractionPipeline, ExtractionReport, FieldSet, FileStore,
    HeuristicParser, KeyValueStore, MemoryStore, StandardField, StrategyPath,
};
pub use hosting::{CloudinaryHost, HostError, ImageHost};
pub use intake::{CardDraft, CardIntake};
pub use ocr::{OcrEngine, OcrError, OcrObservation, OcrTextExtractor};
pub use store::{BusinessCardRecord, CardStore, MemoryCardStore, NewBusinessCard, StoreError};
pub use vision::{OcrEnhancer, TextEnhancer, VisionClient, VisionError, VisionExtractor};
