//! # StreamDeck Govee Integration
//!
//! This library turns Stream Deck keys into power switches for Govee smart
//! lights, backed by the Govee developer API.
//!
//! ## Features
//!
//! - Stream Deck application plugin speaking the SDK websocket protocol
//! - Per-key settings (device, model, API key) delivered by the host
//! - Fresh state read before every toggle, no cached power state
//! - Direct HID deck support through `streamdeck-oxide` with YAML menus

pub mod config;
pub mod controller;
pub mod error;
pub mod govee;
pub mod host;
pub mod logging;
pub mod plugins;
pub mod sdk;
pub mod settings;

// Re-export main types for convenience
pub use config::{GoveeButton, GoveeConfig, GoveeMenu};
pub use controller::{ActivationOutcome, ActivationPolicy, PowerToggleAction};
pub use error::GoveeError;
pub use govee::{GoveeApi, GoveeClient, PowerState};
pub use host::PluginHost;
pub use plugins::{GoveeActions, GoveePlugin};
pub use settings::{Settings, SettingsCache, SettingsSnapshot};
