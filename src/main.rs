// src/main.rs
use deck_loader::api;
use deck_loader::config::AppConfig;
use deck_loader::ship::Ship;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // .env may carry RUST_LOG, so it is read before the subscriber exists.
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "deck_loader=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    let ship = Ship::new(
        app_config.ship.spec,
        app_config.ship.catalog,
        app_config.planner,
    );

    info!("Deck loader starting...");
    if let Err(err) = api::start_api_server(app_config.api, ship).await {
        error!("API server terminated with an error: {err}");
        std::process::exit(1);
    }
}
