//! Govee developer API client.
//!
//! Only the two endpoints needed for power toggling are covered: reading a
//! device's state and sending it a `turn` command.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    error::{GoveeError, GoveeResult},
    settings::Settings,
};

/// Public endpoint of the Govee developer API.
pub const DEVELOPER_API_URL: &str = "https://developer-api.govee.com";

/// Header carrying the user's API key.
pub const API_KEY_HEADER: &str = "Govee-API-Key";

const STATE_PATH: &str = "/v1/devices/state";
const CONTROL_PATH: &str = "/v1/devices/control";

/// Power state of a device as reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    /// Interprets a reported `powerState` value. Only `"on"` counts as on.
    pub fn from_reported(value: &Value) -> Self {
        match value.as_str() {
            Some("on") => PowerState::On,
            _ => PowerState::Off,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            PowerState::On => PowerState::Off,
            PowerState::Off => PowerState::On,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PowerState::On => "on",
            PowerState::Off => "off",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The remote operations the action controller depends on.
#[async_trait]
pub trait GoveeApi: Send + Sync {
    /// Reads the device's power state.
    ///
    /// `Ok(None)` means the device answered but reported no `powerState`.
    async fn get_power_state(&self, settings: &Settings) -> GoveeResult<Option<PowerState>>;

    /// Sends a `turn` command with the given target state.
    async fn set_power_state(&self, settings: &Settings, state: PowerState) -> GoveeResult<()>;
}

#[derive(Debug, Deserialize)]
struct StateResponse {
    data: StateData,
}

#[derive(Debug, Deserialize)]
struct StateData {
    properties: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct ControlRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a Value>,
    cmd: Command<'a>,
}

#[derive(Debug, Serialize)]
struct Command<'a> {
    name: &'a str,
    value: PowerState,
}

/// HTTP client for the Govee developer API.
#[derive(Debug, Clone)]
pub struct GoveeClient {
    base_url: String,
    client: Client,
}

impl GoveeClient {
    /// Creates a client against a Govee API deployment.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Scheme and host of the API, a trailing slash is ignored
    ///
    /// # Returns
    ///
    /// The client, or an error if the HTTP client could not be built
    pub fn new(base_url: impl Into<String>) -> GoveeResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Creates a client against the public developer API.
    pub fn developer() -> GoveeResult<Self> {
        Self::new(DEVELOPER_API_URL)
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        settings: &Settings,
    ) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(api_key) = settings.api_key() {
            request = request.header(API_KEY_HEADER, api_key);
        }
        request
    }
}

/// Finds the first property record exposing `powerState`.
fn find_power_state(body: &str) -> GoveeResult<Option<PowerState>> {
    let response: StateResponse =
        serde_json::from_str(body).map_err(|e| GoveeError::Malformed(e.to_string()))?;
    Ok(response
        .data
        .properties
        .iter()
        .filter_map(Value::as_object)
        .find_map(|property| property.get("powerState"))
        .map(PowerState::from_reported))
}

#[async_trait]
impl GoveeApi for GoveeClient {
    async fn get_power_state(&self, settings: &Settings) -> GoveeResult<Option<PowerState>> {
        let fields = [("device", settings.device()), ("model", settings.model())];
        let query: Vec<(&str, String)> = fields
            .into_iter()
            .filter_map(|(name, value)| value.map(|value| (name, value)))
            .collect();
        debug!(device = ?settings.device(), model = ?settings.model(), "reading power state");

        let response = self
            .request(reqwest::Method::GET, STATE_PATH, settings)
            .query(&query)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(GoveeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        trace!(%body, "state response");

        find_power_state(&body)
    }

    async fn set_power_state(&self, settings: &Settings, state: PowerState) -> GoveeResult<()> {
        // Values go out exactly as the host stored them, numbers and nulls
        // included; the API is left to reject them.
        let request = ControlRequest {
            device: settings.raw("device"),
            model: settings.raw("model"),
            cmd: Command {
                name: "turn",
                value: state,
            },
        };
        debug!(device = ?request.device, model = ?request.model, %state, "sending turn command");

        let response = self
            .request(reqwest::Method::PUT, CONTROL_PATH, settings)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GoveeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsSnapshot;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn settings() -> Settings {
        Settings::new("AA:BB:CC", "H6159", "K")
    }

    #[test]
    fn power_state_parsing() {
        assert_eq!(PowerState::from_reported(&json!("on")), PowerState::On);
        assert_eq!(PowerState::from_reported(&json!("off")), PowerState::Off);
        assert_eq!(PowerState::from_reported(&json!("ON")), PowerState::Off);
        assert_eq!(PowerState::from_reported(&Value::Null), PowerState::Off);
        assert_eq!(PowerState::On.toggled(), PowerState::Off);
        assert_eq!(PowerState::Off.toggled(), PowerState::On);
    }

    #[test]
    fn first_power_state_property_wins() {
        let body = json!({"data": {"properties": [
            {"online": true},
            {"powerState": "on"},
            {"powerState": "off"},
        ]}})
        .to_string();
        assert_eq!(find_power_state(&body).unwrap(), Some(PowerState::On));

        let body = json!({"data": {"properties": [{"online": true}, 7]}}).to_string();
        assert_eq!(find_power_state(&body).unwrap(), None);

        assert!(matches!(
            find_power_state("{\"data\": {}}"),
            Err(GoveeError::Malformed(_))
        ));
        assert!(matches!(find_power_state("<html>"), Err(GoveeError::Malformed(_))));
    }

    #[tokio::test]
    async fn get_power_state_sends_query_and_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/devices/state")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("device".into(), "AA:BB:CC".into()),
                Matcher::UrlEncoded("model".into(), "H6159".into()),
            ]))
            .match_header("Govee-API-Key", "K")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"data": {"properties": [{"powerState": "off"}]}}).to_string())
            .create_async()
            .await;

        let client = GoveeClient::new(server.url()).unwrap();
        let state = client.get_power_state(&settings()).await.unwrap();

        assert_eq!(state, Some(PowerState::Off));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_power_state_rejects_non_200() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/devices/state")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let client = GoveeClient::new(server.url()).unwrap();
        let result = client.get_power_state(&settings()).await;

        assert!(matches!(result, Err(GoveeError::Status { status: 401, .. })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn set_power_state_sends_turn_command() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/v1/devices/control")
            .match_header("Govee-API-Key", "K")
            .match_body(Matcher::Json(json!({
                "device": "AA:BB:CC",
                "model": "H6159",
                "cmd": {"name": "turn", "value": "on"}
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = GoveeClient::new(server.url()).unwrap();
        client
            .set_power_state(&settings(), PowerState::On)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn command_carries_settings_values_verbatim() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/v1/devices/control")
            .match_body(Matcher::Json(json!({
                "device": 42,
                "model": null,
                "cmd": {"name": "turn", "value": "on"}
            })))
            .with_status(200)
            .create_async()
            .await;

        let settings = SettingsSnapshot::new(json!({"device": 42, "model": null})).settings();
        let client = GoveeClient::new(server.url()).unwrap();
        client
            .set_power_state(&settings, PowerState::On)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn absent_fields_are_left_out_of_the_command() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/v1/devices/control")
            .match_body(Matcher::Json(json!({"cmd": {"name": "turn", "value": "off"}})))
            .with_status(200)
            .create_async()
            .await;

        let client = GoveeClient::new(server.url()).unwrap();
        client
            .set_power_state(&Settings::default(), PowerState::Off)
            .await
            .unwrap();

        mock.assert_async().await;
    }
}
