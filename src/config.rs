//! Configuration types and functions for driving a Stream Deck directly.
//!
//! The Stream Deck application keeps settings for plugin keys itself. When the
//! deck is driven over HID instead, the same settings come from a YAML file.

use serde::{Deserialize, Serialize};

use crate::{govee::DEVELOPER_API_URL, settings::Settings};

/// Main configuration for the Govee deck layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct GoveeConfig {
    /// Base URL of the Govee API, defaults to the public developer API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// API key shared by all lights; `GOVEE_API_KEY` is used when missing
    #[serde(default)]
    pub api_key: Option<String>,
    /// Root menu configuration
    pub menu: GoveeMenu,
}

fn default_api_base_url() -> String {
    DEVELOPER_API_URL.to_string()
}

/// Represents a menu in the StreamDeck interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct GoveeMenu {
    /// Display name for the menu
    pub name: String,
    /// List of buttons in this menu
    pub buttons: Vec<GoveeButton>,
}

/// Represents different types of buttons that can be placed on the StreamDeck.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoveeButton {
    /// A key toggling one light's power
    Power {
        name: String,
        device: String,
        model: String,
    },
    /// A submenu containing more buttons
    Menu(GoveeMenu),
}

impl GoveeConfig {
    /// Settings for one power key, as the Stream Deck application would
    /// deliver them.
    pub fn settings_for(&self, device: &str, model: &str, api_key: &str) -> Settings {
        Settings::new(device, model, self.api_key.as_deref().unwrap_or(api_key))
    }
}

/// Loads a configuration from a YAML file.
///
/// # Example
///
/// ```no_run
/// use streamdeck_govee::config;
///
/// let config = config::load_config("config.yaml").expect("Failed to load config");
/// println!("Using Govee API at: {}", config.api_base_url);
/// ```
pub fn load_config<S: Into<String>>(arg: S) -> Result<GoveeConfig, Box<dyn std::error::Error>> {
    let file = std::fs::File::open(arg.into())?;
    let reader = std::io::BufReader::new(file);
    let config: GoveeConfig = serde_yaml::from_reader(reader)?;
    Ok(config)
}
