use std::sync::Arc;

use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradedesk::application::handlers::{router, AppState};
use tradedesk::config::Config;
use tradedesk::domain::gateway::TradingGateway;
use tradedesk::infrastructure::credentials::TokenSupplier;
use tradedesk::infrastructure::mock_gateway::MockGateway;
use tradedesk::infrastructure::public_api_client::PublicApiClient;
use tradedesk::persistence::init_database;

/// Request bodies above this size are rejected before parsing.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradedesk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // .env is optional; real deployments use environment variables.
    if dotenvy::dotenv().is_ok() {
        info!("Loaded environment from .env");
    }

    let config = Config::from_env();
    info!(
        "Trading dashboard server starting (mock: {}, trading enabled: {})",
        config.mock, config.enable_trading
    );
    if !config.mock && config.public_secret_token.is_empty() {
        error!("PUBLIC_SECRET_TOKEN is not set; live upstream calls will fail");
    }

    let pool = init_database(&config.database_url).await?;

    let tokens = Arc::new(TokenSupplier::new(&config)?);
    let gateway: Arc<dyn TradingGateway> = if config.mock {
        info!("Serving canned brokerage data (MOCK_PUBLIC_API=true)");
        Arc::new(MockGateway::default())
    } else {
        Arc::new(PublicApiClient::new(&config, tokens.clone())?)
    };

    let addr = config.bind_addr;
    let state = Arc::new(AppState {
        config,
        pool,
        gateway,
        tokens,
    });

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Shutdown complete");
    Ok(())
}
