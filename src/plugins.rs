//! StreamDeck plugin for Govee lights.
//!
//! Renders the configured menu on a Stream Deck driven over HID. Every power
//! key is backed by a [`PowerToggleAction`], the same controller the Stream
//! Deck application plugin uses.

use std::{collections::BTreeMap, sync::Arc};

use streamdeck_oxide::{
    generic_array::ArrayLength,
    md_icons,
    plugins::{Plugin, PluginContext, PluginNavigation},
    view::customizable::{ClickButton, CustomizableView},
    View,
};
use tracing::debug;

use crate::{
    config::{GoveeButton, GoveeConfig, GoveeMenu},
    controller::{ActivationPolicy, PowerToggleAction},
    govee::GoveeApi,
    settings::SettingsSnapshot,
};

/// Power toggle actions for every light in the configuration.
pub struct GoveeActions {
    actions: BTreeMap<String, Arc<PowerToggleAction>>,
}

fn action_key(device: &str, model: &str) -> String {
    format!("{model}/{device}")
}

impl GoveeActions {
    /// Creates one action per configured light and seeds its settings.
    ///
    /// # Arguments
    ///
    /// * `config` - The deck configuration
    /// * `api` - Client shared by all actions
    /// * `fallback_api_key` - Used when the configuration carries no key
    /// * `policy` - How overlapping presses of one key are handled
    pub async fn from_config(
        config: &GoveeConfig,
        api: Arc<dyn GoveeApi>,
        fallback_api_key: &str,
        policy: ActivationPolicy,
    ) -> Self {
        let mut lights = Vec::new();
        collect_lights(&config.menu, &mut lights);

        let mut actions = BTreeMap::new();
        for (device, model) in lights {
            let key = action_key(device, model);
            if actions.contains_key(&key) {
                continue;
            }
            let action = PowerToggleAction::new(api.clone()).with_policy(policy);
            let settings = config.settings_for(device, model, fallback_api_key);
            action
                .settings()
                .update(&SettingsSnapshot::new(settings.to_value()))
                .await;
            actions.insert(key, Arc::new(action));
        }
        Self { actions }
    }

    pub fn get(&self, device: &str, model: &str) -> Option<Arc<PowerToggleAction>> {
        self.actions.get(&action_key(device, model)).cloned()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

fn collect_lights<'a>(menu: &'a GoveeMenu, lights: &mut Vec<(&'a str, &'a str)>) {
    for button in &menu.buttons {
        match button {
            GoveeButton::Power { device, model, .. } => {
                lights.push((device.as_str(), model.as_str()))
            }
            GoveeButton::Menu(submenu) => collect_lights(submenu, lights),
        }
    }
}

/// Main plugin for the Govee integration.
///
/// This plugin renders a menu of lights on the Stream Deck and handles
/// navigation between menus.
#[derive(Clone)]
pub struct GoveePlugin<W: ArrayLength, H: ArrayLength> {
    /// The menu configuration to display
    pub menu: GoveeMenu,
    /// Optional navigation to return to when "Back" is pressed
    pub back_navigation: Option<PluginNavigation<W, H>>,
}

/// Adds a button to the view based on the button configuration.
fn add_button<W, H>(
    view: &mut MenuView<W, H>,
    x: usize,
    y: usize,
    item: &GoveeButton,
    back_navigation: &Option<PluginNavigation<W, H>>,
) -> Result<(), Box<dyn std::error::Error>>
where
    W: ArrayLength,
    H: ArrayLength,
{
    match item {
        GoveeButton::Power {
            name,
            device,
            model,
        } => {
            let device = device.clone();
            let model = model.clone();
            view.set_button(
                x,
                y,
                ClickButton::new(
                    name,
                    Some(md_icons::filled::ICON_LIGHTBULB),
                    move |ctx: PluginContext| {
                        let device = device.clone();
                        let model = model.clone();
                        async move {
                            let actions = ctx
                                .get_context::<GoveeActions>()
                                .await
                                .ok_or("Failed to get GoveeActions")?;
                            let action = actions
                                .get(&device, &model)
                                .ok_or("No action for this light")?;
                            let outcome = action.on_activate().await;
                            debug!(%device, ?outcome, "key activation finished");
                            Ok(())
                        }
                    },
                ),
            )
        }
        GoveeButton::Menu(menu) => view.set_navigation(
            x,
            y,
            PluginNavigation::new(GoveePlugin {
                menu: menu.clone(),
                back_navigation: back_navigation.clone(),
            }),
            menu.name.clone(),
            Some(md_icons::filled::ICON_MENU),
        ),
    }
}

type MenuView<W, H> = CustomizableView<W, H, PluginContext, PluginNavigation<W, H>>;

/// Generates a menu view from a GoveePlugin configuration.
///
/// # Arguments
///
/// * `plugin` - The plugin configuration
///
/// # Returns
///
/// A customizable view with one key per configured button, plus "Back" in
/// submenus
fn generate_menu<W, H>(
    plugin: &GoveePlugin<W, H>,
) -> Result<MenuView<W, H>, Box<dyn std::error::Error>>
where
    W: ArrayLength,
    H: ArrayLength,
{
    let mut view = CustomizableView::new();
    let back_navigation = Some(PluginNavigation::<W, H>::new(GoveePlugin::<W, H> {
        menu: plugin.menu.clone(),
        back_navigation: plugin.back_navigation.clone(),
    }));
    let slots = W::to_usize() * H::to_usize();
    // The last key is reserved for "Back" in submenus.
    let usable = if plugin.back_navigation.is_some() {
        slots - 1
    } else {
        slots
    };
    for (index, item) in plugin.menu.buttons.iter().take(usable).enumerate() {
        let x = index % W::to_usize();
        let y = index / W::to_usize();
        add_button(&mut view, x, y, item, &back_navigation)?;
    }

    if let Some(back_navigation) = &plugin.back_navigation {
        view.set_navigation(
            W::to_usize() - 1,
            H::to_usize() - 1,
            back_navigation.clone(),
            "Back",
            Some(md_icons::filled::ICON_ARROW_BACK),
        )?;
    }

    Ok(view)
}

#[async_trait::async_trait]
impl<W, H> Plugin<W, H> for GoveePlugin<W, H>
where
    W: ArrayLength,
    H: ArrayLength,
{
    fn name(&self) -> &'static str {
        "GoveePlugin"
    }

    async fn get_view(
        &self,
        context: PluginContext,
    ) -> Result<
        Box<dyn View<W, H, PluginContext, PluginNavigation<W, H>>>,
        Box<dyn std::error::Error>,
    > {
        context
            .get_context::<GoveeActions>()
            .await
            .ok_or("Failed to get GoveeActions")?;
        Ok(Box::new(generate_menu(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::GoveeResult, govee::PowerState, settings::Settings};
    use async_trait::async_trait;

    struct NoopApi;

    #[async_trait]
    impl GoveeApi for NoopApi {
        async fn get_power_state(&self, _settings: &Settings) -> GoveeResult<Option<PowerState>> {
            Ok(None)
        }

        async fn set_power_state(
            &self,
            _settings: &Settings,
            _state: PowerState,
        ) -> GoveeResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn one_action_per_configured_light() {
        let config: GoveeConfig = serde_yaml::from_str(
            r#"
api_key: file-key
menu:
  name: Home
  buttons:
    - {type: power, name: Desk, device: "D1", model: H6159}
    - {type: power, name: Desk again, device: "D1", model: H6159}
    - type: menu
      name: Bedroom
      buttons:
        - {type: power, name: Strip, device: "D2", model: H6163}
"#,
        )
        .unwrap();

        let api = Arc::new(NoopApi);
        let actions =
            GoveeActions::from_config(&config, api, "env-key", ActivationPolicy::Concurrent).await;

        assert_eq!(actions.len(), 2);
        let strip = actions.get("D2", "H6163").unwrap();
        let settings = strip.settings().current().await;
        assert_eq!(settings.model().as_deref(), Some("H6163"));
        assert_eq!(settings.api_key().as_deref(), Some("file-key"));
        assert!(actions.get("D2", "H6159").is_none());
    }
}
