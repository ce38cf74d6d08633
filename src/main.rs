// src/main.rs
use sea_freight_loader::api;
use sea_freight_loader::config::AppConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // .env may carry RUST_LOG, so it is read before the subscriber starts
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            tracing::warn!("Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();

    tracing::info!("Sea freight load calculator starting...");
    if let Err(err) = api::start_api_server(app_config).await {
        tracing::error!("API server terminated with an error: {err}");
        std::process::exit(1);
    }
}
