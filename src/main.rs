use anyhow::Result;
use pieuvre::config::Config;
use pieuvre::poller::{AccountPoller, PollerCommand};
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // One config load for the whole process
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    let web_host = config.web.host.clone();
    let web_port = config.web.port;
    let timezone = config.parsed_timezone().unwrap_or(chrono_tz::Europe::Paris);

    // Create poller command channel
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<PollerCommand>();

    let (mut poller, snapshot_rx) = AccountPoller::new(config, cmd_rx)
        .map_err(|e| anyhow::anyhow!("Failed to create poller: {}", e))?;

    info!("Pieuvre account monitor starting up");

    // Spawn web server
    let web_cmd_tx = cmd_tx.clone();
    let web_task = tokio::spawn(async move {
        if let Err(e) =
            pieuvre::web::serve(snapshot_rx, web_cmd_tx, &web_host, web_port, timezone).await
        {
            error!("Web server error: {}", e);
        }
    });

    // Translate Ctrl-C into a shutdown command
    let signal_cmd_tx = cmd_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cmd_tx.send(PollerCommand::Shutdown).ok();
        }
    });

    match poller.run().await {
        Ok(()) => {
            info!("Poller shutdown complete");
            web_task.abort();
            Ok(())
        }
        Err(e) => {
            error!("Poller failed with error: {}", e);
            web_task.abort();
            Err(anyhow::anyhow!("Poller error: {}", e))
        }
    }
}
