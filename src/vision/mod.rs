// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Hosted vision-model extraction
//!
//! This module provides:
//! - Structured field extraction from card images via an OpenAI-compatible
//!   chat-completions API
//! - Text-model cleanup and enhancement of noisy OCR output
//!
//! Both are single request/response calls with no internal retries; fallback
//! ordering lives in the extraction orchestrator.

pub mod client;
pub mod enhance;

pub use client::{VisionClient, VisionError, VisionExtractor};
pub use enhance::{OcrEnhancer, TextEnhancer};
