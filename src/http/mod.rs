pub(crate) mod routes;
mod state;
pub mod validation;

pub use routes::ToolResponse;
pub use state::AppState;

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use log::{debug, info};
use tokio::task::JoinHandle;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::LIMITER_SWEEP_INTERVAL_SECS;
use crate::limiter::{self, FixedWindowLimiter};

/// Full application router. Tool routes sit behind the AI limiter, leads
/// behind the general one.
pub fn router(state: AppState) -> Router {
    let tool_routes = Router::new()
        .route("/api/tools/status", get(routes::status))
        .route("/api/tools/rate-limit-status", get(routes::rate_limit_status))
        .route("/api/tools/summarize", post(routes::summarize))
        .route("/api/tools/translate", post(routes::translate))
        .route("/api/tools/extract-invoice", post(routes::extract_invoice))
        .route("/api/tools/extract-receipt", post(routes::extract_receipt))
        .route("/api/tools/parse-resume", post(routes::parse_resume))
        .route("/api/tools/analyze-contract", post(routes::analyze_contract))
        .route("/api/tools/scan-card", post(routes::scan_card))
        .route("/api/tools/chat", post(routes::chat))
        .route("/api/tools/extract-bank-statement", post(routes::extract_bank_statement))
        .route("/api/tools/analyze-policy", post(routes::analyze_policy))
        .route("/api/tools/find-clauses", post(routes::find_clauses))
        .route("/api/tools/compare", post(routes::compare))
        .route_layer(middleware::from_fn_with_state(
            state.ai_limiter.clone(),
            limiter::enforce,
        ));

    let lead_routes = Router::new()
        .route("/api/leads", get(routes::list_leads).post(routes::create_lead))
        .route_layer(middleware::from_fn_with_state(
            state.general_limiter.clone(),
            limiter::enforce,
        ));

    Router::new()
        .merge(tool_routes)
        .merge(lead_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn spawn_limiter_sweeper(limiters: Vec<FixedWindowLimiter>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(LIMITER_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            for limiter in &limiters {
                let removed = limiter.sweep().await;
                if removed > 0 {
                    debug!("{}: dropped {} expired windows", limiter.policy().name, removed);
                }
            }
        }
    })
}

pub async fn serve(bind: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    if !state.ai.is_configured() {
        log::warn!("OPENROUTER_API_KEY is not set; AI tool routes will fail until it is configured");
    }

    let sweeper = spawn_limiter_sweeper(vec![state.ai_limiter.clone(), state.general_limiter.clone()]);
    let router = router(state);

    let addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("ByteBeam tools server listening on http://{}", addr);
    info!("ByteBeam tools server listening on http://{}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(e) => {
                log::warn!("Cannot listen for Ctrl-C ({}); running until killed", e);
                std::future::pending::<()>().await
            }
        }
    })
    .await?;

    sweeper.abort();
    Ok(())
}
