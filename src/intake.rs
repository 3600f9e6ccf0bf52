// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Review-and-confirm intake flow
//!
//! Extraction results are never saved directly. They become an editable
//! [`CardDraft`] the user reviews; only a confirmed draft is uploaded and
//! persisted. Dropping a draft discards the capture with no side effects.

use std::sync::Arc;

use tracing::warn;

use crate::capture::RawCapture;
use crate::config::PipelineConfig;
use crate::extraction::{ExtractionReport, StandardField};
use crate::hosting::{CloudinaryHost, ImageHost};
use crate::store::{CardStore, NewBusinessCard, StoreError};

/// An editable card awaiting user confirmation
///
/// Standard fields map onto record columns. Dynamic fields discovered by
/// extraction have already been folded into `notes`; `purpose` stays
/// separate until save so the user can still edit it on its own.
#[derive(Debug, Clone, Default)]
pub struct CardDraft {
    pub full_name: String,
    pub company: String,
    pub designation: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub address: String,
    pub purpose: String,
    pub notes: String,
}

impl CardDraft {
    /// Build a draft from an extraction result
    ///
    /// Dynamic fields are appended to notes as a labelled block so nothing
    /// the extraction found is silently dropped.
    pub fn from_report(report: &ExtractionReport) -> Self {
        let (standard, dynamic) = report.partitioned_fields();

        let get = |field: StandardField| {
            standard.field(field).unwrap_or_default().to_string()
        };
        let mut draft = Self {
            full_name: get(StandardField::FullName),
            company: get(StandardField::Company),
            designation: get(StandardField::Designation),
            email: get(StandardField::Email),
            phone: get(StandardField::Phone),
            website: get(StandardField::Website),
            address: get(StandardField::Address),
            purpose: get(StandardField::Purpose),
            notes: String::new(),
        };

        let lines: Vec<String> = dynamic
            .iter()
            .map(|(key, value)| format!("{}: {}", field_label(key), value))
            .collect();
        if !lines.is_empty() {
            draft.notes = format!("Additional Information:\n{}", lines.join("\n"));
        }
        draft
    }

    /// Compose the final notes text: purpose first, then the notes body
    fn composed_notes(&self) -> String {
        let purpose = self.purpose.trim();
        let notes = self.notes.trim();
        match (purpose.is_empty(), notes.is_empty()) {
            (true, _) => notes.to_string(),
            (false, true) => format!("Purpose: {}", purpose),
            (false, false) => format!("Purpose: {}\n\n{}", purpose, notes),
        }
    }
}

/// Render a dynamic field key as a display label
///
/// Underscores become spaces and each word is capitalized, so
/// `social_media` renders as `Social Media`.
fn field_label(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Confirms drafts: hosts the images and persists the record
pub struct CardIntake {
    store: Arc<dyn CardStore>,
    host: Option<Arc<dyn ImageHost>>,
}

impl CardIntake {
    pub fn new(store: Arc<dyn CardStore>) -> Self {
        Self { store, host: None }
    }

    /// Build an intake from configuration
    ///
    /// An image host is attached only when both Cloudinary halves are set.
    pub fn from_config(config: &PipelineConfig, store: Arc<dyn CardStore>) -> Self {
        let mut intake = Self::new(store);
        if let (Some(cloud_name), Some(upload_preset)) =
            (&config.hosting.cloud_name, &config.hosting.upload_preset)
        {
            intake =
                intake.with_image_host(Arc::new(CloudinaryHost::new(cloud_name, upload_preset)));
        }
        intake
    }

    pub fn with_image_host(mut self, host: Arc<dyn ImageHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Persist a confirmed draft, returning the new record id
    ///
    /// The draft is validated before any upload; a rejected draft performs
    /// no network calls. Image uploads are best-effort: a failed or
    /// unconfigured upload is recorded as an empty URL and the card is
    /// saved anyway. Only an invalid draft or a storage failure aborts
    /// the save.
    pub async fn confirm(
        &self,
        draft: &CardDraft,
        capture: &RawCapture,
    ) -> Result<String, StoreError> {
        let notes = draft.composed_notes();
        let optional = |s: &str| {
            if s.trim().is_empty() {
                None
            } else {
                Some(s.trim().to_string())
            }
        };

        let mut card = NewBusinessCard {
            full_name: draft.full_name.clone(),
            company: optional(&draft.company),
            designation: optional(&draft.designation),
            email: optional(&draft.email),
            phone: optional(&draft.phone),
            website: optional(&draft.website),
            address: optional(&draft.address),
            notes: optional(&notes),
            front_image_url: String::new(),
            back_image_url: String::new(),
        }
        .normalized()?;

        card.front_image_url = self.upload_or_empty(capture.front()).await;
        if let Some(back) = capture.back() {
            card.back_image_url = self.upload_or_empty(back).await;
        }

        self.store.create(card).await
    }

    async fn upload_or_empty(&self, image: &crate::capture::CardImage) -> String {
        let host = match &self.host {
            Some(host) => host,
            None => return String::new(),
        };
        match host.upload(image).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Image upload failed, saving card without it: {}", e);
                String::new()
            }
        }
    }
}
