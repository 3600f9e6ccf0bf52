// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the card digitization pipeline

use std::env;

/// Configuration for the card digitization pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Vision / text model provider configuration
    pub vision: VisionConfig,
    /// Image hosting configuration
    pub hosting: HostingConfig,
    /// OCR language code (e.g. "eng")
    pub ocr_language: String,
    /// Cooldown window after a quota failure, in seconds
    pub cooldown_window_secs: u64,
}

/// Vision / text model provider configuration
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// API key for the OpenAI-compatible endpoint; vision path is skipped
    /// entirely when absent
    pub api_key: Option<String>,
    /// Base endpoint URL
    pub endpoint: String,
    /// Model used for image extraction
    pub vision_model: String,
    /// Cheaper model used for OCR cleanup and enhancement
    pub enhance_model: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

/// Image hosting configuration (Cloudinary unsigned uploads)
#[derive(Debug, Clone)]
pub struct HostingConfig {
    /// Cloudinary cloud name
    pub cloud_name: Option<String>,
    /// Unsigned upload preset name
    pub upload_preset: Option<String>,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            vision: VisionConfig {
                api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
                endpoint: env::var("OPENAI_API_BASE")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                vision_model: env::var("VISION_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
                enhance_model: env::var("ENHANCE_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                request_timeout_ms: env::var("VISION_REQUEST_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60000),
            },
            hosting: HostingConfig {
                cloud_name: env::var("CLOUDINARY_CLOUD_NAME").ok().filter(|v| !v.is_empty()),
                upload_preset: env::var("CLOUDINARY_UPLOAD_PRESET")
                    .ok()
                    .filter(|v| !v.is_empty()),
            },
            ocr_language: env::var("OCR_LANGUAGE").unwrap_or_else(|_| "eng".to_string()),
            cooldown_window_secs: env::var("VISION_COOLDOWN_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.vision.endpoint.is_empty() {
            return Err("Vision endpoint must not be empty".to_string());
        }
        if self.vision.request_timeout_ms == 0 {
            return Err("Vision request timeout must be greater than 0".to_string());
        }
        if self.cooldown_window_secs == 0 {
            return Err("Cooldown window must be greater than 0".to_string());
        }
        if self.ocr_language.is_empty() {
            return Err("OCR language must not be empty".to_string());
        }
        // Hosting needs both halves or neither
        if self.hosting.cloud_name.is_some() != self.hosting.upload_preset.is_some() {
            return Err(
                "Cloudinary requires both a cloud name and an upload preset".to_string(),
            );
        }
        Ok(())
    }

    /// Whether the hosted vision path can run at all
    pub fn has_vision_provider(&self) -> bool {
        self.vision.api_key.is_some()
    }

    /// Whether image hosting is configured
    pub fn has_image_host(&self) -> bool {
        self.hosting.cloud_name.is_some() && self.hosting.upload_preset.is_some()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vision: VisionConfig {
                api_key: None,
                endpoint: "https://api.openai.com/v1".to_string(),
                vision_model: "gpt-4o".to_string(),
                enhance_model: "gpt-4o-mini".to_string(),
                request_timeout_ms: 60000,
            },
            hosting: HostingConfig {
                cloud_name: None,
                upload_preset: None,
            },
            ocr_language: "eng".to_string(),
            cooldown_window_secs: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(!config.has_vision_provider());
        assert!(!config.has_image_host());
        assert_eq!(config.vision.endpoint, "https://api.openai.com/v1");
        assert_eq!(config.ocr_language, "eng");
        assert_eq!(config.cooldown_window_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_has_vision_provider() {
        let mut config = PipelineConfig::default();
        assert!(!config.has_vision_provider());

        config.vision.api_key = Some("sk-test".to_string());
        assert!(config.has_vision_provider());
    }

    #[test]
    fn test_validation_rejects_half_configured_hosting() {
        let mut config = PipelineConfig::default();
        config.hosting.cloud_name = Some("demo".to_string());
        assert!(config.validate().is_err());

        config.hosting.upload_preset = Some("unsigned_cards".to_string());
        assert!(config.validate().is_ok());
        assert!(config.has_image_host());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let mut config = PipelineConfig::default();
        config.vision.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_empty_language() {
        let mut config = PipelineConfig::default();
        config.ocr_language = String::new();
        assert!(config.validate().is_err());
    }
}
