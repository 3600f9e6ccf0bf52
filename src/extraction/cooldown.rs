// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision-quota cooldown state
//!
//! After a quota or rate-limit failure the vision path is skipped
//! pre-emptively for a fixed window. The timestamp lives in an injected
//! key-value store so tests can fake it and a desktop build can point it
//! at a settings file. All reads and writes happen on one task; anyone
//! sharing a gate across tasks should move to a compare-and-set store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Storage key for the cooldown expiry (epoch milliseconds as a string)
pub const VISION_COOLDOWN_KEY: &str = "OPENAI_VISION_COOLDOWN_UNTIL";

/// Fixed cooldown window after a quota failure (60 minutes)
pub const DEFAULT_COOLDOWN_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Minimal key-value persistence, the shape of browser local storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// In-memory store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

/// File-backed store: a single JSON object on disk
///
/// Write failures are logged and swallowed; losing a cooldown record only
/// costs one extra failing vision call.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.load() {
            Ok(values) => values.get(key).cloned(),
            Err(e) => {
                warn!("Cooldown store read failed: {}", e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = match self.load() {
            Ok(values) => values,
            Err(_) => HashMap::new(),
        };
        values.insert(key.to_string(), value.to_string());
        if let Err(e) = self.save(&values) {
            warn!("Cooldown store write failed: {}", e);
        }
    }
}

/// Gate that decides whether the vision path is currently eligible
pub struct CooldownGate {
    store: Arc<dyn KeyValueStore>,
    window: Duration,
}

impl CooldownGate {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            window: DEFAULT_COOLDOWN_WINDOW,
        }
    }

    pub fn with_window(store: Arc<dyn KeyValueStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Remaining cooldown, or None when the vision path is eligible
    ///
    /// An absent, unparsable, or past timestamp all mean eligible.
    pub fn remaining(&self) -> Option<Duration> {
        let raw = self.store.get(VISION_COOLDOWN_KEY)?;
        let until: i64 = raw.parse().ok()?;
        let now = now_millis();
        if until > now {
            Some(Duration::from_millis((until - now) as u64))
        } else {
            None
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining().is_some()
    }

    /// Start a fresh cooldown window from now
    pub fn engage(&self) {
        let until = now_millis() + self.window.as_millis() as i64;
        self.store.set(VISION_COOLDOWN_KEY, &until.to_string());
        debug!(
            "Vision cooldown engaged for {}s (until epoch-ms {})",
            self.window.as_secs(),
            until
        );
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
