use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tuple_relay::discovery;
use tuple_relay::relay::{run_relay, RelayConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RelayConfig::default();
    let listen_addr = config.listen_addr;

    discovery::write(discovery::DEFAULT_PATH, listen_addr)?;
    tracing::info!(path = discovery::DEFAULT_PATH, %listen_addr, "discovery file written");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        signal_token.cancel();
    });

    let result = run_relay(config, shutdown).await;

    if let Err(e) = discovery::remove(discovery::DEFAULT_PATH) {
        tracing::warn!(error = %e, "failed to remove discovery file");
    }

    result?;
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "no SIGTERM handler, falling back to ctrl-c only");
            let _ = ctrl_c.await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
