use anyhow::Context;
use federal_market_dashboard::config::AppConfig;
use federal_market_dashboard::routes;
use federal_market_dashboard::services::cache::{Clock, SystemClock};
use federal_market_dashboard::services::dashboard::DashboardService;
use federal_market_dashboard::services::markets::MarketRegistry;
use federal_market_dashboard::services::usaspending::UsaSpendingClient;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let config = AppConfig::from_env().context("invalid configuration")?;
    info!("Using PORT: {}", config.port);
    info!("Upstream API: {}", config.api_url);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = Arc::new(
        UsaSpendingClient::new(config.api_url.clone(), config.request_ttl(), clock.clone())
            .context("failed to build HTTP client")?,
    );
    let service = Arc::new(DashboardService::new(
        client.clone(),
        MarketRegistry::default(),
        config.service_settings(),
        clock,
    ));

    // Bind to 0.0.0.0 for container hosts
    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Will bind to: {}", addr);

    // Set up CORS
    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST", "OPTIONS"]);

    let api = routes::routes(service, client).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
