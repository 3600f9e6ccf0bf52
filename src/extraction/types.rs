// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Core types for card field extraction

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ocr::OcrError;

/// The closed set of standard contact fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardField {
    FullName,
    Company,
    Designation,
    Email,
    Phone,
    Website,
    Address,
    Purpose,
}

impl StandardField {
    /// All standard fields in display order
    pub const ALL: [StandardField; 8] = [
        StandardField::FullName,
        StandardField::Company,
        StandardField::Designation,
        StandardField::Email,
        StandardField::Phone,
        StandardField::Website,
        StandardField::Address,
        StandardField::Purpose,
    ];

    /// The map key used for this field
    pub fn key(&self) -> &'static str {
        match self {
            StandardField::FullName => "full_name",
            StandardField::Company => "company",
            StandardField::Designation => "designation",
            StandardField::Email => "email",
            StandardField::Phone => "phone",
            StandardField::Website => "website",
            StandardField::Address => "address",
            StandardField::Purpose => "purpose",
        }
    }

    /// Look up a standard field by its map key
    pub fn from_key(key: &str) -> Option<StandardField> {
        StandardField::ALL.iter().copied().find(|f| f.key() == key)
    }

    /// Whether this field counts toward the minimum viable extraction
    ///
    /// A vision result carrying none of the critical fields triggers the
    /// OCR backup pass.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StandardField::Company
                | StandardField::FullName
                | StandardField::Phone
                | StandardField::Email
        )
    }
}

/// The four fields treated as minimum viable extraction
pub const CRITICAL_FIELDS: [StandardField; 4] = [
    StandardField::Company,
    StandardField::FullName,
    StandardField::Phone,
    StandardField::Email,
];

/// A mapping from field name to extracted string value
///
/// Invariant: a key is present only if its value is non-empty after trimming.
/// Absent keys are omitted, never stored as empty strings. Keys outside the
/// [`StandardField`] set are "dynamic" fields discovered by the vision path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet {
    fields: BTreeMap<String, String>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, enforcing the trimmed non-empty invariant
    ///
    /// Returns true if the value was stored.
    pub fn insert(&mut self, key: &str, value: &str) -> bool {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.fields.insert(key.to_string(), trimmed.to_string());
        true
    }

    /// Insert a JSON value, coercing numbers and arrays to strings
    ///
    /// Strings are trimmed, numbers rendered with `to_string`, arrays joined
    /// with `", "`. Nulls, objects, booleans, and empty values are rejected.
    pub fn insert_value(&mut self, key: &str, value: &serde_json::Value) -> bool {
        match coerce_value(value) {
            Some(text) => self.insert(key, &text),
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn field(&self, field: StandardField) -> Option<&str> {
        self.get(field.key())
    }

    pub fn set_field(&mut self, field: StandardField, value: &str) -> bool {
        self.insert(field.key(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.fields.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether at least one critical field is present
    pub fn has_critical_field(&self) -> bool {
        CRITICAL_FIELDS.iter().any(|f| self.contains(f.key()))
    }

    /// Fill in any field absent from self with the value from `other`
    ///
    /// Existing values always win; this is the OCR-backup merge direction.
    pub fn fill_missing_from(&mut self, other: &FieldSet) {
        for (key, value) in other.iter() {
            if !self.contains(key) {
                self.insert(key, value);
            }
        }
    }

    /// Overlay `other` onto self, with `other` winning every conflict
    ///
    /// This is the AI-enhancement merge direction.
    pub fn merge_overriding(&mut self, other: &FieldSet) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }

    /// Split into (standard, dynamic) field sets for display
    pub fn partition(&self) -> (FieldSet, FieldSet) {
        let mut standard = FieldSet::new();
        let mut dynamic = FieldSet::new();
        for (key, value) in self.iter() {
            if StandardField::from_key(key).is_some() {
                standard.insert(key, value);
            } else {
                dynamic.insert(key, value);
            }
        }
        (standard, dynamic)
    }
}

/// Coerce a JSON value to a non-empty field string
pub fn coerce_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Array(items) if !items.is_empty() => {
            let joined = items
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            let trimmed = joined.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }
}

/// Which strategy path an extraction ended up taking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyPath {
    /// Vision result was authoritative, no OCR pass ran
    VisionOnly,
    /// Vision returned no critical field; OCR filled in the gaps
    VisionWithOcrBackup,
    /// Vision skipped or failed; local OCR + heuristics only
    OcrOnly,
}

/// Outcome of one user-initiated extraction
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    /// Merged field set
    pub fields: FieldSet,
    /// Strategy path actually taken
    pub strategy: StrategyPath,
    /// Human-readable progress labels in the order they were shown
    pub progress: Vec<String>,
    /// True when the vision path was skipped or abandoned due to quota
    pub degraded: bool,
    /// Composite OCR confidence (0-100) when an OCR pass ran
    pub ocr_confidence: Option<f32>,
}

impl ExtractionReport {
    /// Split the merged fields into (standard, dynamic) for display
    pub fn partitioned_fields(&self) -> (FieldSet, FieldSet) {
        self.fields.partition()
    }
}

/// Errors that can terminate an extraction
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Every path yielded zero extractable text/fields
    #[error("No text could be extracted from the images")]
    NoDataExtracted,

    /// The local OCR path itself failed
    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_field_keys_round_trip() {
        for field in StandardField::ALL {
            assert_eq!(StandardField::from_key(field.key()), Some(field));
        }
        assert_eq!(StandardField::from_key("social_media"), None);
    }

    #[test]
    fn test_critical_fields() {
        assert!(StandardField::Company.is_critical());
        assert!(StandardField::FullName.is_critical());
        assert!(StandardField::Phone.is_critical());
        assert!(StandardField::Email.is_critical());
        assert!(!StandardField::Website.is_critical());
        assert!(!StandardField::Purpose.is_critical());
    }

    #[test]
    fn test_insert_trims_and_rejects_empty() {
        let mut fields = FieldSet::new();
        assert!(fields.insert("company", "  Acme Corp  "));
        assert_eq!(fields.get("company"), Some("Acme Corp"));

        assert!(!fields.insert("email", "   "));
        assert!(!fields.contains("email"));
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_coerce_string_number_array() {
        assert_eq!(coerce_value(&json!(" hi ")), Some("hi".to_string()));
        assert_eq!(coerce_value(&json!(42)), Some("42".to_string()));
        assert_eq!(
            coerce_value(&json!(["@acme", "linkedin.com/acme"])),
            Some("@acme, linkedin.com/acme".to_string())
        );
        assert_eq!(coerce_value(&json!(null)), None);
        assert_eq!(coerce_value(&json!({"a": 1})), None);
        assert_eq!(coerce_value(&json!([])), None);
        assert_eq!(coerce_value(&json!("")), None);
    }

    #[test]
    fn test_fill_missing_prefers_existing() {
        let mut vision = FieldSet::new();
        vision.insert("company", "Acme");

        let mut ocr = FieldSet::new();
        ocr.insert("company", "Beta");
        ocr.insert("phone", "555-1234");

        vision.fill_missing_from(&ocr);
        assert_eq!(vision.get("company"), Some("Acme"));
        assert_eq!(vision.get("phone"), Some("555-1234"));
    }

    #[test]
    fn test_merge_overriding_lets_other_win() {
        let mut base = FieldSet::new();
        base.insert("company", "Acme");
        base.insert("phone", "555-1234");

        let mut enhanced = FieldSet::new();
        enhanced.insert("company", "Acme Corporation Inc");

        base.merge_overriding(&enhanced);
        assert_eq!(base.get("company"), Some("Acme Corporation Inc"));
        assert_eq!(base.get("phone"), Some("555-1234"));
    }

    #[test]
    fn test_has_critical_field() {
        let mut fields = FieldSet::new();
        fields.insert("website", "https://example.com");
        assert!(!fields.has_critical_field());

        fields.insert("email", "a@b.co");
        assert!(fields.has_critical_field());
    }

    #[test]
    fn test_partition_standard_vs_dynamic() {
        let mut fields = FieldSet::new();
        fields.insert("full_name", "Jane Doe");
        fields.insert("social_media", "@janedoe");
        fields.insert("tagline", "Build better");

        let (standard, dynamic) = fields.partition();
        assert_eq!(standard.len(), 1);
        assert_eq!(standard.get("full_name"), Some("Jane Doe"));
        assert_eq!(dynamic.len(), 2);
        assert!(dynamic.contains("social_media"));
        assert!(dynamic.contains("tagline"));
    }

    #[test]
    fn test_field_set_serializes_as_plain_map() {
        let mut fields = FieldSet::new();
        fields.insert("email", "a@b.co");
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"{"email":"a@b.co"}"#);
    }
}
