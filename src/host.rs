//! Host session for the Stream Deck application.
//!
//! Each key placed on the deck is an action instance identified by an opaque
//! context string. Instances own their settings and controller and share
//! nothing but the API client.

use std::{collections::HashMap, sync::Arc};

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::{
    controller::{ActivationOutcome, ActivationPolicy, PowerToggleAction},
    govee::GoveeApi,
    sdk::{InboundEvent, LaunchArgs, OutboundMessage, POWER_ACTION_UUID},
};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("websocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// What the session loop has to do after an event was handled.
#[derive(Debug)]
pub enum Reaction {
    None,
    Reply(OutboundMessage),
    Activation(JoinHandle<ActivationOutcome>),
}

/// Registry of live action instances.
pub struct PluginHost {
    api: Arc<dyn GoveeApi>,
    policy: ActivationPolicy,
    instances: HashMap<String, Arc<PowerToggleAction>>,
    outbound: UnboundedSender<OutboundMessage>,
}

impl PluginHost {
    /// Creates an empty registry.
    ///
    /// # Arguments
    ///
    /// * `api` - Client shared by every action instance
    /// * `outbound` - Messages produced after an activation finishes, drained
    ///   by [`run`]
    pub fn new(api: Arc<dyn GoveeApi>, outbound: UnboundedSender<OutboundMessage>) -> Self {
        Self {
            api,
            policy: ActivationPolicy::default(),
            instances: HashMap::new(),
            outbound,
        }
    }

    pub fn with_policy(mut self, policy: ActivationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn instance(&self, context: &str) -> Option<Arc<PowerToggleAction>> {
        self.instances.get(context).cloned()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn instance_or_insert(&mut self, context: &str) -> Arc<PowerToggleAction> {
        let api = &self.api;
        let policy = self.policy;
        self.instances
            .entry(context.to_string())
            .or_insert_with(|| Arc::new(PowerToggleAction::new(api.clone()).with_policy(policy)))
            .clone()
    }

    /// Handles one raw text frame from the host.
    pub async fn handle_text(&mut self, text: &str) -> Reaction {
        match serde_json::from_str::<InboundEvent>(text) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => {
                warn!(error = %e, "ignoring undecodable host message");
                Reaction::None
            }
        }
    }

    /// Applies a host event to the instance it targets.
    pub async fn handle_event(&mut self, event: InboundEvent) -> Reaction {
        if event.action().is_some_and(|action| action != POWER_ACTION_UUID) {
            debug!(action = ?event.action(), "event for another action");
            return Reaction::None;
        }

        match event {
            InboundEvent::WillAppear {
                context, payload, ..
            } => {
                let instance = self.instance_or_insert(&context);
                instance.settings().seed_on_appear(&payload).await;
                debug!(%context, "instance appeared");
                Reaction::None
            }
            InboundEvent::DidReceiveSettings {
                context, payload, ..
            } => {
                self.instance_or_insert(&context)
                    .settings()
                    .update(&payload)
                    .await;
                debug!(%context, "settings received");
                Reaction::None
            }
            InboundEvent::KeyUp { context, .. } => {
                let instance = self.instance_or_insert(&context);
                let outbound = self.outbound.clone();
                Reaction::Activation(tokio::spawn(async move {
                    let outcome = instance.on_activate().await;
                    debug!(%context, ?outcome, "activation finished");
                    if let Some(message) = failure_log(&context, &outcome) {
                        let _ = outbound.send(message);
                    }
                    outcome
                }))
            }
            InboundEvent::WillDisappear { context, .. } => {
                if let Some(instance) = self.instances.remove(&context) {
                    instance.retire();
                }
                debug!(%context, "instance disappeared");
                Reaction::None
            }
            InboundEvent::SendToPlugin {
                context, payload, ..
            } => {
                let Some(collection) = payload.sdpi_collection else {
                    return Reaction::None;
                };
                let instance = self.instance_or_insert(&context);
                match instance
                    .settings()
                    .persist(&collection.key, collection.value)
                    .await
                {
                    Some(settings) => {
                        debug!(%context, key = %collection.key, "persisting setting");
                        Reaction::Reply(OutboundMessage::set_settings(context, settings))
                    }
                    None => Reaction::None,
                }
            }
            InboundEvent::KeyDown { .. } | InboundEvent::Other => Reaction::None,
        }
    }
}

/// Entry for the Stream Deck log file when an activation did not reach the
/// light. Silent outcomes (no `powerState`, retired instance) produce none.
fn failure_log(context: &str, outcome: &ActivationOutcome) -> Option<OutboundMessage> {
    let message = match outcome {
        ActivationOutcome::ReadFailed(e) => format!("[{context}] reading power state failed: {e}"),
        ActivationOutcome::WriteFailed(target, e) => {
            format!("[{context}] turning {target} failed: {e}")
        }
        _ => return None,
    };
    Some(OutboundMessage::log_message(message))
}

/// Connects to the host, registers and serves events until the host closes
/// the connection.
///
/// # Arguments
///
/// * `args` - Launch arguments received from the Stream Deck application
/// * `host` - Instance registry handling inbound events
/// * `outbound` - Receiving end of the channel `host` was created with
pub async fn run(
    args: &LaunchArgs,
    mut host: PluginHost,
    mut outbound: UnboundedReceiver<OutboundMessage>,
) -> Result<(), HostError> {
    let (socket, _) = connect_async(args.url()).await?;
    info!(
        url = %args.url(),
        uuid = %args.plugin_uuid,
        version = ?args.info.pointer("/application/version"),
        "connected to Stream Deck"
    );
    let (mut sink, mut stream) = socket.split();

    sink.send(Message::Text(OutboundMessage::register(args).to_json()))
        .await?;

    loop {
        tokio::select! {
            message = stream.next() => {
                let Some(message) = message else {
                    break;
                };
                let text = match message? {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                if let Reaction::Reply(reply) = host.handle_text(&text).await {
                    sink.send(Message::Text(reply.to_json())).await?;
                }
            }
            Some(message) = outbound.recv() => {
                sink.send(Message::Text(message.to_json())).await?;
            }
        }
    }

    info!("Stream Deck closed the connection");
    Ok(())
}
