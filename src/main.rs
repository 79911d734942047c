use std::net::SocketAddr;
use std::sync::Arc;

use paymesol::config::Config;
use paymesol::gateway::{CacheStore, Gateway, HttpOrigin};
use paymesol::http::HttpServer;
use paymesol::prices::CoinGeckoSource;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = Arc::new(Config::from_env()?);

    // Offline cache gateway: install the asset manifest, purge stale
    // cache generations, then route all outbound requests through it.
    let store = Arc::new(CacheStore::new());
    let gateway = Arc::new(Gateway::new(
        &config,
        store,
        Arc::new(HttpOrigin::new()),
    ));
    gateway.install().await;
    gateway.activate();

    let rates = Arc::new(CoinGeckoSource::new(
        config.price_api_base.clone(),
        gateway.clone(),
    ));

    let server = HttpServer::new(config.clone(), rates, gateway);
    let addr: SocketAddr = format!("{}:{}", config.http_host, config.http_port).parse()?;
    tracing::info!("Paymesol POS listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(server.router().into_make_service())
        .await?;

    Ok(())
}
