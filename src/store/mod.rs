// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Persistent storage of confirmed business card records
//!
//! Records are append-only documents keyed by an opaque id. Backends sit
//! behind [`CardStore`]; the in-memory implementation backs tests and
//! single-session use.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from card storage backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record failed validation before it reached the backend
    #[error("Invalid record: {reason}")]
    InvalidRecord { reason: String },

    /// The backend rejected or failed the operation
    #[error("Storage backend error: {message}")]
    Backend { message: String },

    /// No record with the given id exists
    #[error("Record not found: {id}")]
    NotFound { id: String },
}

/// A confirmed business card as the user chose to save it
///
/// Optional fields absent at confirmation are omitted from serialized
/// output rather than stored as empty strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessCardRecord {
    pub id: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Hosted front image URL; empty when hosting failed or was skipped
    pub front_image_url: String,
    /// Hosted back image URL; empty when no back image was captured
    pub back_image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a record; the backend assigns id and timestamp
#[derive(Debug, Clone, Default)]
pub struct NewBusinessCard {
    pub full_name: String,
    pub company: Option<String>,
    pub designation: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub front_image_url: String,
    pub back_image_url: String,
}

impl NewBusinessCard {
    /// Validate and normalize: trims all fields, drops empty optionals
    ///
    /// Only the contact name is required; a card can be saved with nothing
    /// else on it.
    pub fn normalized(mut self) -> Result<Self, StoreError> {
        self.full_name = self.full_name.trim().to_string();
        if self.full_name.is_empty() {
            return Err(StoreError::InvalidRecord {
                reason: "full_name is required".to_string(),
            });
        }

        let clean = |value: Option<String>| {
            value.and_then(|v| {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
        };
        self.company = clean(self.company);
        self.designation = clean(self.designation);
        self.email = clean(self.email);
        self.phone = clean(self.phone);
        self.website = clean(self.website);
        self.address = clean(self.address);
        self.notes = clean(self.notes);
        Ok(self)
    }
}

/// Trait for card record storage backends
#[async_trait]
pub trait CardStore: Send + Sync {
    /// Persist a new record, returning its assigned id
    async fn create(&self, card: NewBusinessCard) -> Result<String, StoreError>;

    /// List all records, newest first
    async fn list(&self) -> Result<Vec<BusinessCardRecord>, StoreError>;

    /// Delete a record by id
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// In-memory store for tests and single-session use
#[derive(Default)]
pub struct MemoryCardStore {
    records: Mutex<HashMap<String, BusinessCardRecord>>,
}

impl MemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CardStore for MemoryCardStore {
    async fn create(&self, card: NewBusinessCard) -> Result<String, StoreError> {
        let card = card.normalized()?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let record = BusinessCardRecord {
            id: id.clone(),
            full_name: card.full_name,
            company: card.company,
            designation: card.designation,
            email: card.email,
            phone: card.phone,
            website: card.website,
            address: card.address,
            notes: card.notes,
            front_image_url: card.front_image_url,
            back_image_url: card.back_image_url,
            created_at: now,
            updated_at: now,
        };
        self.records.lock().unwrap().insert(id.clone(), record);
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<BusinessCardRecord>, StoreError> {
        let mut records: Vec<BusinessCardRecord> =
            self.records.lock().unwrap().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        match self.records.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound { id: id.to_string() }),
        }
    }
}
