// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision-model client for structured card extraction via OpenAI-compatible API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};

use crate::capture::RawCapture;
use crate::extraction::types::{FieldSet, StandardField};

/// Trait for vision-capable extraction backends
///
/// The orchestrator talks to this seam so tests can fake the hosted model.
#[async_trait]
pub trait VisionExtractor: Send + Sync {
    /// Extract a structured field set from the capture images
    async fn extract_fields(&self, capture: &RawCapture) -> Result<FieldSet, VisionError>;
}

// --- OpenAI-compatible serde structs ---

#[derive(serde::Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    max_tokens: u32,
    temperature: f32,
}

#[derive(serde::Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(serde::Serialize)]
struct ChatMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(serde::Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Errors from the vision extraction path
#[derive(Debug, Error)]
pub enum VisionError {
    /// Provider rejected the request; body is surfaced verbatim
    #[error("Vision API error: {status} - {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Raw provider error body
        body: String,
    },

    /// Provider returned non-JSON or malformed JSON content
    #[error("Failed to parse extraction response: {reason}")]
    MalformedResponse {
        /// Parse failure detail
        reason: String,
    },

    /// Transport-level failure
    #[error("Vision request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl VisionError {
    /// Whether this failure signals quota exhaustion or rate limiting
    ///
    /// True for HTTP 429 or a provider `error.code` of `insufficient_quota`.
    pub fn is_quota(&self) -> bool {
        match self {
            VisionError::Api { status: 429, .. } => true,
            VisionError::Api { body, .. } => provider_error_code(body)
                .is_some_and(|code| code == "insufficient_quota"),
            _ => false,
        }
    }
}

/// Pull `error.code` out of a provider error body
fn provider_error_code(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("code")?
        .as_str()
        .map(str::to_string)
}

const EXTRACTION_SYSTEM_PROMPT: &str = "You are a professional business card data extraction specialist. Your job is to read business card images with 100% accuracy and extract all visible information. Pay special attention to: 1) Company names (extract full name), 2) Person names (extract complete name), 3) Phone numbers (extract exactly with all formatting), 4) Email addresses (extract complete email). Read every character carefully, especially numbers. Extract information exactly as it appears on the card. Always return valid JSON only.";

const EXTRACTION_PROMPT: &str = r#"Analyze these business card images and extract ALL visible information accurately.

MOST IMPORTANT FIELDS (extract these first - they are critical):
1. company: The complete company or organization name (read it exactly as written, full name not abbreviated)
2. full_name: The person's complete name (first name, middle name if present, last name - everything visible)
3. phone: All phone numbers visible on the card (extract EXACTLY as written with all formatting: spaces, dashes, parentheses, country codes, extensions)
4. email: The email address (extract exactly as shown, including the full domain)

REQUIRED FIELDS (extract if visible):
- designation: Job title or position (exact title as written)
- website: Website URL (complete URL)
- address: Complete physical address (street number, street name, city, state, zip code, country - everything visible)

ADDITIONAL INFORMATION (extract if present):
- purpose: What is the purpose of this business card? (e.g., "Networking", "Service Provider", "Sales Contact", etc.)
- social_media: Social media handles or links (LinkedIn, Twitter, Facebook, Instagram, etc.)
- services: Services offered or specialties mentioned
- tagline: Any tagline or slogan
- fax: Fax number if present
- mobile: Mobile number if separate from main phone
- other_contact: Other contact methods (WhatsApp, Telegram, etc.)
- Any other relevant information visible on the card

CRITICAL INSTRUCTIONS:
- Read the card carefully line by line
- Extract phone numbers EXACTLY as written - preserve all formatting (spaces, dashes, parentheses, dots)
- Extract email addresses completely - include the full domain
- Extract company name completely - do not abbreviate
- Extract person's name completely - include middle names or initials if present
- Extract addresses completely - include all numbers (street number, zip code, etc.)
- Read numbers character by character - do not miss or misread any digits
- Extract everything visible - nothing should be skipped

Return a JSON object with all extracted fields. If a field is not visible, omit it. Be extremely accurate - extract exactly what you see on the card. Return ONLY valid JSON, no additional text."#;

/// Client for structured field extraction from card images
///
/// Temperature is pinned to 0 for deterministic, accuracy-first output and
/// strict JSON is requested via `response_format`. The client never retries;
/// fallback belongs to the orchestrator.
pub struct VisionClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl VisionClient {
    /// Create a new vision client
    pub fn new(endpoint: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let endpoint = endpoint.trim_end_matches('/').to_string();
        info!("Vision client configured: endpoint={}, model={}", endpoint, model);

        Self {
            client,
            endpoint,
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Extract a structured field set from the capture images
    pub async fn extract(&self, capture: &RawCapture) -> Result<FieldSet, VisionError> {
        let mut content = vec![serde_json::json!({
            "type": "text",
            "text": EXTRACTION_PROMPT,
        })];
        for image in capture.images() {
            content.push(serde_json::json!({
                "type": "image_url",
                "image_url": { "url": image.to_data_url() },
            }));
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: serde_json::Value::String(EXTRACTION_SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: serde_json::Value::Array(content),
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
            max_tokens: 1500,
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| VisionError::MalformedResponse {
                    reason: e.to_string(),
                })?;

        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        let fields = parse_extraction_json(content)?;
        debug!("Vision extraction produced {} fields", fields.len());
        Ok(fields)
    }
}

#[async_trait]
impl VisionExtractor for VisionClient {
    async fn extract_fields(&self, capture: &RawCapture) -> Result<FieldSet, VisionError> {
        self.extract(capture).await
    }
}

/// Parse the model's JSON content into a field set
///
/// Standard fields must be strings; dynamic fields also accept numbers
/// (stringified) and arrays (joined with `", "`). Values empty after
/// trimming are dropped.
pub fn parse_extraction_json(content: &str) -> Result<FieldSet, VisionError> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| VisionError::MalformedResponse {
            reason: e.to_string(),
        })?;

    let object = value
        .as_object()
        .ok_or_else(|| VisionError::MalformedResponse {
            reason: "response is not a JSON object".to_string(),
        })?;

    let mut fields = FieldSet::new();

    // Standard fields first, in priority order, strings only
    for field in StandardField::ALL {
        if let Some(serde_json::Value::String(s)) = object.get(field.key()) {
            fields.set_field(field, s);
        }
    }

    // Everything else is a dynamic field with relaxed coercion
    for (key, value) in object {
        if StandardField::from_key(key).is_some() {
            continue;
        }
        fields.insert_value(key, value);
    }

    Ok(fields)
}
