use std::{any::{Any, TypeId}, collections::BTreeMap, env, sync::Arc};

use streamdeck_govee::{
    config::{self, GoveeConfig},
    logging,
    plugins::{GoveeActions, GoveePlugin},
    ActivationPolicy, GoveeClient,
};
use streamdeck_oxide::{
    elgato_streamdeck,
    generic_array::typenum::{U3, U5},
    plugins::{PluginContext, PluginNavigation},
    run_with_external_triggers, ExternalTrigger, RenderConfig, Theme,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    // Load the configuration
    let config: GoveeConfig = config::load_config("config.yaml")?;
    let config = Arc::new(config);

    let hid = elgato_streamdeck::new_hidapi()?;
    let devices = elgato_streamdeck::list_devices(&hid);
    let (kind, serial) = devices
        .into_iter()
        .find(|(kind, _)| *kind == elgato_streamdeck::info::Kind::Mk2)
        .ok_or("No Stream Deck found")?;

    info!(?kind, %serial, "found Stream Deck");

    let deck = Arc::new(elgato_streamdeck::AsyncStreamDeck::connect(
        &hid, kind, &serial,
    )?);

    let fallback_key = match &config.api_key {
        Some(_) => String::new(),
        None => env::var("GOVEE_API_KEY").map_err(|err| {
            format!("Failed to get GOVEE_API_KEY from environment: {}", err)
        })?,
    };
    let client = GoveeClient::new(config.api_base_url.clone())?;
    let policy = ActivationPolicy::Concurrent;
    let actions = GoveeActions::from_config(&config, Arc::new(client), &fallback_key, policy).await;
    info!(lights = actions.len(), "actions ready");

    let context = PluginContext::new(BTreeMap::from([
        (
            TypeId::of::<GoveeConfig>(),
            Box::new(config.clone()) as Box<dyn Any + Send + Sync>,
        ),
        (
            TypeId::of::<GoveeActions>(),
            Box::new(Arc::new(actions)) as Box<dyn Any + Send + Sync>,
        ),
    ]));

    type Trigger = ExternalTrigger<PluginNavigation<U5, U3>, U5, U3, PluginContext>;
    let (sender, receiver) = tokio::sync::mpsc::channel::<Trigger>(1);

    sender.send(ExternalTrigger::new(
        PluginNavigation::<U5, U3>::new(GoveePlugin {
            menu: config.menu.clone(),
            back_navigation: None,
        }),
        true
    )).await?;

    run_with_external_triggers(Theme::light(), RenderConfig::default(), deck, context, receiver)
        .await?;

    Ok(())
}
