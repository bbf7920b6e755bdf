//! Per-instance settings delivered by the Stream Deck host.
//!
//! The host is the only writer of settings content. Whatever it sends is kept
//! verbatim, including keys this crate does not know about, and is handed back
//! unchanged when settings are persisted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

/// Placeholder stored on first run so the property inspector shows a hint.
pub const API_KEY_PLACEHOLDER: &str = "Request your api key first";

/// Settings of a single action instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(Map<String, Value>);

impl Settings {
    /// Builds settings from the three fields the controller uses.
    ///
    /// # Arguments
    ///
    /// * `device` - Vendor device identifier
    /// * `model` - Vendor model code
    /// * `api_key` - Govee API key, stored as given
    pub fn new(
        device: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let mut map = Map::new();
        map.insert("device".to_string(), Value::String(device.into()));
        map.insert("model".to_string(), Value::String(model.into()));
        map.insert("api_key".to_string(), Value::String(api_key.into()));
        Self(map)
    }

    /// Vendor device identifier (usually a MAC-like string).
    pub fn device(&self) -> Option<String> {
        self.field("device")
    }

    /// Vendor model code, e.g. `H6159`.
    pub fn model(&self) -> Option<String> {
        self.field("model")
    }

    /// Opaque API key, passed through untouched.
    pub fn api_key(&self) -> Option<String> {
        self.field("api_key")
    }

    /// The stored value under `key`, exactly as the host delivered it.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    fn field(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for Settings {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Payload of a host event carrying an instance's persisted settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    #[serde(default)]
    pub settings: Option<Value>,
}

impl SettingsSnapshot {
    pub fn new(settings: Value) -> Self {
        Self {
            settings: Some(settings),
        }
    }

    /// The `settings` object, or an empty one when absent or not an object.
    pub fn settings(&self) -> Settings {
        match &self.settings {
            Some(Value::Object(map)) => Settings(map.clone()),
            _ => Settings::default(),
        }
    }
}

/// Process-lifetime store for one action instance's settings.
#[derive(Debug, Default)]
pub struct SettingsCache {
    settings: RwLock<Settings>,
}

impl SettingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached settings with the snapshot's. No merge.
    pub async fn update(&self, snapshot: &SettingsSnapshot) {
        *self.settings.write().await = snapshot.settings();
    }

    /// First-run variant of [`update`](Self::update): an absent or empty
    /// snapshot is replaced by one holding only the api key placeholder.
    pub async fn seed_on_appear(&self, snapshot: &SettingsSnapshot) {
        let mut settings = snapshot.settings();
        if settings.is_empty() {
            settings
                .0
                .insert("api_key".to_string(), Value::String(API_KEY_PLACEHOLDER.to_string()));
        }
        *self.settings.write().await = settings;
    }

    /// A copy of the current settings.
    pub async fn current(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Writes `key = value` into the cached settings.
    ///
    /// # Arguments
    ///
    /// * `key` - Settings key, usually an sdpi input id
    /// * `value` - New value, stored verbatim
    ///
    /// # Returns
    ///
    /// The full updated record to push back to the host, or `None` when the
    /// key is empty or the value is falsy (`null`, `false`, `0`, `""`)
    pub async fn persist(&self, key: &str, value: Value) -> Option<Settings> {
        if key.is_empty() || !is_truthy(&value) {
            return None;
        }
        let mut settings = self.settings.write().await;
        settings.0.insert(key.to_string(), value);
        Some(settings.clone())
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
