use std::sync::Arc;

use cart_relay::{RelayState, router};
use tracing::info;

mod config;
mod logging;

use config::RelayConfig;

#[tokio::main]
async fn main() {
    logging::init();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("relay configuration error: {err}");
            std::process::exit(1);
        }
    };

    let state = Arc::new(RelayState::new(
        config.webhook_secret.as_bytes().to_vec(),
        config.pending_ttl,
        config.sse_capacity,
    ));
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(config.bind).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("failed to bind {}: {err}", config.bind);
            std::process::exit(1);
        }
    };

    info!(
        addr = %config.bind,
        ttl_ms = config.pending_ttl.as_millis() as u64,
        "cart update relay listening"
    );

    if let Err(err) = axum::serve(listener, app).await {
        eprintln!("relay server error: {err}");
        std::process::exit(1);
    }
}
