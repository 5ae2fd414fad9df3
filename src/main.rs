use anyhow::Result;
use marketplace_monitor::{AppConfig, PollLoop};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("marketplace_monitor=info".parse()?),
        )
        .init();

    info!("🚀 Starting Marketplace Monitor...");

    let config = AppConfig::from_env().inspect_err(|e| error!("{}", e))?;
    info!(
        recipient = %config.email.recipient,
        partitions = ?config.monitor.partitions,
        "📧 Email notifications enabled"
    );

    let poll_loop = PollLoop::from_config(&config).inspect_err(|e| error!("{}", e))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handle = tokio::spawn(poll_loop.run(shutdown_rx));

    tokio::select! {
        result = &mut handle => {
            result?;
            return Ok(());
        }
        _ = signal::ctrl_c() => {
            info!("Shutting down...");
            let _ = shutdown_tx.send(true);
        }
    }

    handle.await?;
    Ok(())
}
