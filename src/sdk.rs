//! Stream Deck SDK wire protocol.
//!
//! The Stream Deck application launches the plugin with a handful of
//! command line arguments, then talks JSON over a local websocket. Only the
//! events a key action needs are modelled; everything else is parsed as
//! [`InboundEvent::Other`] and dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::settings::{Settings, SettingsSnapshot};

/// Action UUID declared in the plugin manifest.
pub const POWER_ACTION_UUID: &str = "com.andreasbehrend.govee.power";

#[derive(Debug, Error, PartialEq)]
pub enum LaunchError {
    #[error("missing launch argument {0}")]
    Missing(&'static str),
    #[error("argument {0} has no value")]
    NoValue(String),
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("invalid -info payload: {0}")]
    InvalidInfo(String),
}

/// Arguments the host passes when starting the plugin process.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchArgs {
    pub port: u16,
    pub plugin_uuid: String,
    pub register_event: String,
    pub info: Value,
}

impl LaunchArgs {
    /// Parses `-port N -pluginUUID U -registerEvent E -info JSON`, in any
    /// order. Unknown flags are skipped together with their value.
    ///
    /// # Arguments
    ///
    /// * `args` - The process arguments, program name included or not
    ///
    /// # Returns
    ///
    /// The parsed arguments; `info` is `null` when `-info` was not given
    pub fn parse<I, S>(args: I) -> Result<Self, LaunchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut port = None;
        let mut plugin_uuid = None;
        let mut register_event = None;
        let mut info = None;

        let mut args = args.into_iter().map(Into::into);
        while let Some(flag) = args.next() {
            if !flag.starts_with('-') {
                continue;
            }
            let value = args.next().ok_or_else(|| LaunchError::NoValue(flag.clone()))?;
            match flag.as_str() {
                "-port" => {
                    port = Some(
                        value
                            .parse::<u16>()
                            .map_err(|_| LaunchError::InvalidPort(value.clone()))?,
                    )
                }
                "-pluginUUID" => plugin_uuid = Some(value),
                "-registerEvent" => register_event = Some(value),
                "-info" => {
                    info = Some(
                        serde_json::from_str(&value)
                            .map_err(|e| LaunchError::InvalidInfo(e.to_string()))?,
                    )
                }
                _ => {}
            }
        }

        Ok(Self {
            port: port.ok_or(LaunchError::Missing("-port"))?,
            plugin_uuid: plugin_uuid.ok_or(LaunchError::Missing("-pluginUUID"))?,
            register_event: register_event.ok_or(LaunchError::Missing("-registerEvent"))?,
            info: info.unwrap_or(Value::Null),
        })
    }

    /// Websocket address of the host.
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }
}

/// Payload of `sendToPlugin` as emitted by the sdpi property inspector.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyInspectorPayload {
    #[serde(default)]
    pub sdpi_collection: Option<SdpiCollection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SdpiCollection {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

/// Events received from the host.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum InboundEvent {
    WillAppear {
        action: String,
        context: String,
        #[serde(default)]
        payload: SettingsSnapshot,
    },
    WillDisappear {
        action: String,
        context: String,
    },
    DidReceiveSettings {
        action: String,
        context: String,
        #[serde(default)]
        payload: SettingsSnapshot,
    },
    KeyDown {
        action: String,
        context: String,
    },
    KeyUp {
        action: String,
        context: String,
    },
    SendToPlugin {
        action: String,
        context: String,
        #[serde(default)]
        payload: PropertyInspectorPayload,
    },
    #[serde(other)]
    Other,
}

impl InboundEvent {
    /// The action UUID the event is addressed to, if any.
    pub fn action(&self) -> Option<&str> {
        match self {
            InboundEvent::WillAppear { action, .. }
            | InboundEvent::WillDisappear { action, .. }
            | InboundEvent::DidReceiveSettings { action, .. }
            | InboundEvent::KeyDown { action, .. }
            | InboundEvent::KeyUp { action, .. }
            | InboundEvent::SendToPlugin { action, .. } => Some(action),
            InboundEvent::Other => None,
        }
    }
}

/// Messages sent to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Register {
        event: String,
        uuid: String,
    },
    SetSettings {
        event: &'static str,
        context: String,
        payload: Settings,
    },
    LogMessage {
        event: &'static str,
        payload: LogPayload,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogPayload {
    pub message: String,
}

impl OutboundMessage {
    pub fn register(args: &LaunchArgs) -> Self {
        OutboundMessage::Register {
            event: args.register_event.clone(),
            uuid: args.plugin_uuid.clone(),
        }
    }

    pub fn set_settings(context: impl Into<String>, settings: Settings) -> Self {
        OutboundMessage::SetSettings {
            event: "setSettings",
            context: context.into(),
            payload: settings,
        }
    }

    pub fn log_message(message: impl Into<String>) -> Self {
        OutboundMessage::LogMessage {
            event: "logMessage",
            payload: LogPayload {
                message: message.into(),
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
