//! HTTP front-end for the weather service.
//!
//! Exposes `GET /v1/weather/{city}` on top of any [`WeatherProvider`]; the
//! binary wires it to the OpenWeather-backed `WeatherClient`.

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::PathRejection},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::{any::Any, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use weather_core::WeatherProvider;

pub mod endpoint;

#[derive(Clone)]
pub struct AppState {
    provider: Arc<dyn WeatherProvider>,
}

pub fn create_app(provider: Arc<dyn WeatherProvider>) -> Router {
    let state = AppState { provider };

    Router::new()
        .route("/health", get(health_check))
        .route("/v1/weather/*city", get(get_weather))
        .fallback(fallback)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Starting weather server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server terminated unexpectedly")?;

    info!("Weather server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn get_weather(
    State(state): State<AppState>,
    city: Result<Path<String>, PathRejection>,
) -> Response {
    let city = match city {
        Ok(Path(city)) => city,
        Err(rejection) => {
            warn!(event = "validation_failure", message = %rejection, "Undecodable city parameter");
            return respond(endpoint::missing_city());
        }
    };

    respond(endpoint::handle(state.provider.as_ref(), &city).await)
}

/// `/v1/weather` and `/v1/weather/` never reach the wildcard route.
async fn fallback(uri: Uri) -> Response {
    if uri.path().trim_end_matches('/') == "/v1/weather" {
        return respond(endpoint::missing_city());
    }

    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not Found", "message": "The requested resource does not exist." })),
    )
        .into_response()
}

fn respond((status, body): (StatusCode, serde_json::Value)) -> Response {
    (status, Json(body)).into_response()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };

    error!(event = "unexpected_error", message = detail, "Request handler panicked");
    respond(endpoint::internal_error())
}
