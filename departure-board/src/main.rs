use std::net::SocketAddr;

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use departure_board::api::{BoardClient, ClientConfig};
use departure_board::config::BoardConfig;
use departure_board::coordinator::Coordinator;
use departure_board::tracking::LogNotifier;
use departure_board::web::{AppState, create_router};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "departure_board=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path =
        std::env::var("DEPARTURE_BOARD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = BoardConfig::load(&config_path)?;
    tracing::info!(
        config = %config_path,
        station = %config.station,
        data_source = %config.data_source,
        interval_secs = config.update_interval_secs,
        "loaded board configuration"
    );

    let mut client_config = ClientConfig::new().with_timeout(config.request_timeout_secs);
    if let Some(url) = &config.custom_api_url {
        client_config = client_config.with_base_url(url.clone());
    }
    let client = BoardClient::new(client_config)?;
    // Change-station boards always come from the default host.
    let lookahead =
        BoardClient::new(ClientConfig::new().with_timeout(config.request_timeout_secs))?;

    let interval = config.update_interval();
    let coordinator = Coordinator::new(config, client, lookahead, LogNotifier)?;
    let state = AppState::new(coordinator);

    let updater = state.coordinator.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let departures = updater.lock().await.update().await;
            tracing::debug!(departures = departures.len(), "board refreshed");
        }
    });

    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = std::env::var("DEPARTURE_BOARD_ADDR")
        .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
        .parse()?;
    tracing::info!(%addr, "departure board listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
