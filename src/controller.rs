//! Power toggle action controller.
//!
//! An activation reads the device's current power state and then commands the
//! opposite one. The state is fetched fresh each time so changes made from
//! other clients (the Govee app, voice assistants) are picked up.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::GoveeError,
    govee::{GoveeApi, PowerState},
    settings::SettingsCache,
};

/// How overlapping activations of one instance are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActivationPolicy {
    /// Every activation reads and writes independently. Rapid presses may
    /// both observe the same state and send the same command.
    #[default]
    Concurrent,
    /// Activations of the same instance run one after another.
    Serialized,
}

/// Result of a single activation.
#[derive(Debug)]
pub enum ActivationOutcome {
    /// The read succeeded and a command for this state was sent.
    Dispatched(PowerState),
    /// The device reported no `powerState`; nothing was sent.
    StateUnknown,
    /// The read failed; nothing was sent.
    ReadFailed(GoveeError),
    /// The command for this state could not be delivered.
    WriteFailed(PowerState, GoveeError),
    /// The instance went away while the read was in flight.
    Abandoned,
}

/// Liveness flag shared between an action instance and its in-flight
/// activations.
#[derive(Debug, Clone)]
pub struct InstanceLiveness(Arc<AtomicBool>);

impl InstanceLiveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn retire(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for InstanceLiveness {
    fn default() -> Self {
        Self::new()
    }
}

/// One power toggle key on the host surface.
pub struct PowerToggleAction {
    settings: SettingsCache,
    api: Arc<dyn GoveeApi>,
    liveness: InstanceLiveness,
    policy: ActivationPolicy,
    in_flight: Mutex<()>,
}

impl PowerToggleAction {
    pub fn new(api: Arc<dyn GoveeApi>) -> Self {
        Self {
            settings: SettingsCache::new(),
            api,
            liveness: InstanceLiveness::new(),
            policy: ActivationPolicy::default(),
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: ActivationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn settings(&self) -> &SettingsCache {
        &self.settings
    }

    pub fn liveness(&self) -> &InstanceLiveness {
        &self.liveness
    }

    /// Marks the instance as removed. Activations still in flight finish
    /// their read but do not send a command.
    pub fn retire(&self) {
        self.liveness.retire();
    }

    /// Reads the current power state and commands its complement.
    ///
    /// Settings are copied when the activation starts; later updates do not
    /// affect a request already in flight.
    ///
    /// # Returns
    ///
    /// What happened. Only [`ActivationOutcome::Dispatched`] and
    /// [`ActivationOutcome::WriteFailed`] mean a command was sent.
    pub async fn on_activate(&self) -> ActivationOutcome {
        let _guard = match self.policy {
            ActivationPolicy::Serialized => Some(self.in_flight.lock().await),
            ActivationPolicy::Concurrent => None,
        };

        let settings = self.settings.current().await;
        debug!(device = ?settings.device(), "activation started");

        let observed = match self.api.get_power_state(&settings).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(device = ?settings.device(), "no powerState reported, skipping");
                return ActivationOutcome::StateUnknown;
            }
            Err(e) => {
                debug!(device = ?settings.device(), error = %e, "state read failed, skipping");
                return ActivationOutcome::ReadFailed(e);
            }
        };

        if !self.liveness.is_alive() {
            debug!(device = ?settings.device(), "instance retired during read");
            return ActivationOutcome::Abandoned;
        }

        let target = observed.toggled();
        match self.api.set_power_state(&settings, target).await {
            Ok(()) => {
                info!(device = ?settings.device(), %observed, %target, "power toggled");
                ActivationOutcome::Dispatched(target)
            }
            Err(e) => {
                warn!(device = ?settings.device(), %target, error = %e, "turn command failed");
                ActivationOutcome::WriteFailed(target, e)
            }
        }
    }
}
