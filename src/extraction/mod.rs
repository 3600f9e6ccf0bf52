// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Card field extraction
//!
//! This module provides:
//! - The field model shared by every extraction path ([`FieldSet`])
//! - Text normalization and regex heuristics for raw OCR output
//! - The quota cooldown gate for the hosted vision path
//! - The orchestrator that sequences vision, OCR, and enhancement

pub mod cooldown;
pub mod heuristics;
pub mod normalizer;
pub mod orchestrator;
pub mod types;

pub use cooldown::{
    CooldownGate, FileStore, KeyValueStore, MemoryStore, DEFAULT_COOLDOWN_WINDOW,
    VISION_COOLDOWN_KEY,
};
pub use heuristics::HeuristicParser;
pub use normalizer::normalize;
pub use orchestrator::ExtractionPipeline;
pub use types::{
    ExtractionError, ExtractionReport, FieldSet, StandardField, StrategyPath, CRITICAL_FIELDS,
};
