// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text-model cleanup and enhancement of OCR output
//!
//! A cheaper text model fixes common OCR misreads and re-extracts fields
//! from the cleaned text. Every failure here degrades to the caller's
//! input; enhancement is strictly best-effort and never fatal.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::extraction::types::FieldSet;

/// Trait for best-effort OCR field enhancement backends
#[async_trait]
pub trait OcrEnhancer: Send + Sync {
    /// Enhance a parsed field set; must return the input on any failure
    async fn enhance_fields(&self, ocr_text: &str, parsed: &FieldSet) -> FieldSet;
}

const CLEANUP_SYSTEM_PROMPT: &str = "You are an expert at cleaning and correcting OCR text from business cards. Remove random characters, fix common OCR errors, and return clean readable text.";

const ENHANCE_SYSTEM_PROMPT: &str = "You are a professional business card data extraction specialist. Your priority is to extract these CRITICAL fields accurately: 1) Company name (full name), 2) Person name (complete name), 3) Phone number (exactly as written with formatting), 4) Email address (complete email). Then extract all other visible information. Read every character carefully, especially numbers. Extract information exactly as it appears. Always return valid JSON only.";

/// Client for OCR text cleanup and field enhancement
pub struct TextEnhancer {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl TextEnhancer {
    pub fn new(endpoint: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// Clean OCR text; returns the original text when the call fails
    pub async fn clean_text(&self, ocr_text: &str) -> String {
        let request = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": CLEANUP_SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!(
                        "Clean and correct this OCR text from a business card. Remove random symbols, fix character recognition errors, and return only the clean readable text:\n\n{}",
                        ocr_text
                    ),
                },
            ],
            "temperature": 0.1,
            "max_tokens": 1000,
        });

        match self.send(&request).await {
            Some(content) => content.trim().to_string(),
            None => ocr_text.to_string(),
        }
    }

    /// Enhance a parsed field set from OCR text; AI values take precedence
    ///
    /// Returns the input fields unchanged when the call or the JSON parse
    /// fails. Only non-empty string values from the model are accepted.
    pub async fn enhance(&self, ocr_text: &str, parsed: &FieldSet) -> FieldSet {
        let cleaned = self.clean_text(ocr_text).await;
        let parsed_json =
            serde_json::to_string_pretty(parsed).unwrap_or_else(|_| "{}".to_string());

        let request = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": ENHANCE_SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!(
                        "Analyze this OCR text from a business card and extract ALL visible information accurately. Extract phone numbers EXACTLY as written, complete email addresses, the full company name, and the person's complete name. Include designation, website, address, purpose, and any additional fields (social_media, services, tagline, fax, mobile, other_contact) when visible.\n\nCleaned OCR Text:\n{}\n\nPreviously parsed data (for reference):\n{}\n\nReturn a JSON object with all extracted fields. If a field is not visible, omit it. Be extremely accurate - extract exactly what you see. Return ONLY valid JSON, no additional text.",
                        cleaned, parsed_json
                    ),
                },
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.0,
            "max_tokens": 1000,
        });

        let content = match self.send(&request).await {
            Some(content) => content,
            None => return parsed.clone(),
        };

        let ai_fields = match string_fields_from_json(&content) {
            Some(fields) => fields,
            None => {
                warn!("Enhancement response was not a JSON object, keeping parsed data");
                return parsed.clone();
            }
        };

        debug!("Enhancement contributed {} fields", ai_fields.len());
        let mut merged = parsed.clone();
        merged.merge_overriding(&ai_fields);
        merged
    }

    async fn send(&self, request: &serde_json::Value) -> Option<String> {
        let response = match self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Enhancement request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                "Enhancement request rejected: HTTP {}",
                response.status().as_u16()
            );
            return None;
        }

        let value: serde_json::Value = match response.json().await {
            Ok(value) => value,
            Err(e) => {
                warn!("Enhancement response unreadable: {}", e);
                return None;
            }
        };

        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
    }
}

#[async_trait]
impl OcrEnhancer for TextEnhancer {
    async fn enhance_fields(&self, ocr_text: &str, parsed: &FieldSet) -> FieldSet {
        self.enhance(ocr_text, parsed).await
    }
}

/// Keep only non-empty string values from a JSON object
fn string_fields_from_json(content: &str) -> Option<FieldSet> {
    let value: serde_json::Value = serde_json::from_str(content).ok()?;
    let object = value.as_object()?;

    let mut fields = FieldSet::new();
    for (key, value) in object {
        if let serde_json::Value::String(s) = value {
            fields.insert(key, s);
        }
    }
    Some(fields)
}
