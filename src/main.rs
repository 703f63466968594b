//! i-SMART keyword workspace server.
//!
//! Serves the login page and the keyword workspace, and forwards workspace
//! actions to the remote i-SMART service. The application is organized
//! into the following modules:
//!
//! - `controller`: keyword acquisition state machine
//! - `strategy`: local keyword strategies and capability discovery
//! - `api`: remote keyword/analysis service client
//! - `keywords`: keyword parsing, heuristic and editing rules
//! - `auth`: signed login session cookie
//! - `templates`, `handlers`: the web view

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ismart::{router, AppState, Config};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ismart=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let state = match AppState::new(config).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "failed to initialize");
            return ExitCode::FAILURE;
        }
    };

    // Wake a sleeping backend host without delaying startup
    let api = state.api.clone();
    tokio::spawn(async move { api.wake().await });

    let bind_addr = state.config.bind_addr.clone();
    let api_base = state.config.api_base.clone();

    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %bind_addr, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!("i-SMART workspace running at http://{}", bind_addr);
    info!("Remote service: {}", api_base);

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
