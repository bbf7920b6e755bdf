use std::sync::Arc;

use streamdeck_govee::{host, logging, sdk::LaunchArgs, GoveeClient, PluginHost};
use tokio::sync::mpsc;
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    let args = LaunchArgs::parse(std::env::args()).map_err(|err| {
        error!(error = %err, "invalid launch arguments");
        err
    })?;

    let client = GoveeClient::developer()?;
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let plugin = PluginHost::new(Arc::new(client), outbound_tx);

    host::run(&args, plugin, outbound_rx).await?;

    Ok(())
}
