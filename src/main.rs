use anyhow::Context;
use clap::Parser;
use conveyor::{
    config::{AppConfig, CliArgs},
    demo,
    server::Server,
    telemetry,
};


#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    telemetry::init_tracing(config.log_filter.as_deref())?;

    if config.skip_demos {
        tracing::info!("Console demos skipped");
    } else {
        tracing::info!("Running console demos");
        demo::run_all().await.context("console demos failed")?;
    }

    let server = Server::new(config.server.clone());
    let handle = server
        .start(&config.server_addr)
        .await
        .context("failed to start HTTP server")?;

    tracing::info!(
        addr = %handle.local_addr(),
        run_for = ?config.run_for,
        "Endpoints: / (main page), /slow (slow request), /health, /stats. Press Ctrl+C to stop"
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
        _ = tokio::time::sleep(config.run_for) => {
            tracing::info!("Demo run time elapsed");
        }
    }

    handle
        .shutdown(config.shutdown_timeout)
        .await
        .context("HTTP server shutdown failed")?;

    tracing::info!(
        total_requests = server.state().stats().total_requests(),
        "Shutdown complete"
    );
    Ok(())
}
