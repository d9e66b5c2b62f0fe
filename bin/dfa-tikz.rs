use std::sync::Arc;

use dfa_tikz::{
    config::{cli, Config},
    server::{router, Service},
};

use tracing::{info, trace};
use tracing_subscriber::{filter, prelude::*};

fn setup_logging(level: filter::LevelFilter) {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(stdout_log.with_filter(level))
        .init();

    trace!("setup {level} logging");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("could not listen for shutdown signal: {e}");
        return std::future::pending().await;
    }
    info!("shutdown signal received, stopping server");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_matches(&cli().get_matches());

    setup_logging(config.verbosity);

    if config.converter.locate().is_none() {
        tracing::warn!(
            "{} was not found, submitted forms will report an error",
            config.converter.program()
        );
    }

    let service = Arc::new(Service::from_config(&config));
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("serving DFA form on http://{}/dfa.html", listener.local_addr()?);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down");
    Ok(())
}
