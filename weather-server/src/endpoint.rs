//! `GET /v1/weather/{city}`: input validation and the mapping from
//! [`WeatherError`] to caller-facing status codes and JSON bodies.

use axum::http::StatusCode;
use serde_json::{Value, json};
use tracing::{error, warn};
use weather_core::{WeatherError, WeatherProvider};

pub const CITY_REQUIRED: &str = "The city parameter is required.";
pub const INVALID_RESPONSE: &str = "Received invalid data from the weather service.";
pub const UNEXPECTED: &str = "An unexpected error occurred. Please try again later.";

/// Handle one weather lookup. Never fails: every outcome is a status and a
/// JSON body.
pub async fn handle(provider: &dyn WeatherProvider, city_param: &str) -> (StatusCode, Value) {
    let city = city_param.trim();
    if city.is_empty() {
        return missing_city();
    }

    match provider.fetch(city).await {
        Ok(snapshot) => match serde_json::to_value(&snapshot) {
            Ok(body) => (StatusCode::OK, body),
            Err(err) => unexpected(city, &err),
        },
        Err(err) => error_response(city, &err),
    }
}

/// 400 body used when the city is blank or could not be decoded.
pub fn missing_city() -> (StatusCode, Value) {
    (
        StatusCode::BAD_REQUEST,
        json!({
            "error": "Invalid input",
            "message": CITY_REQUIRED,
            "errors": { "city": [CITY_REQUIRED] },
        }),
    )
}

/// Generic 500. The detail goes to the log only.
pub fn unexpected(city: &str, detail: &dyn std::fmt::Display) -> (StatusCode, Value) {
    error!(event = "unexpected_error", city, message = %detail, "Unexpected error while handling weather request");
    internal_error()
}

pub fn internal_error() -> (StatusCode, Value) {
    error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", UNEXPECTED)
}

fn error_response(city: &str, err: &WeatherError) -> (StatusCode, Value) {
    let (status, label, message) = match err {
        WeatherError::ValidationFailure { message, .. } => {
            (StatusCode::BAD_REQUEST, "Bad Request", message.as_str())
        }
        WeatherError::UpstreamClientError { status, message } => {
            (error_status_or_503(*status), "Client Error", message.as_str())
        }
        WeatherError::UpstreamServerError { status, message } => {
            let status = error_status_or_503(*status);
            let label = if status == StatusCode::SERVICE_UNAVAILABLE {
                "Service Unavailable"
            } else {
                "Server Error"
            };
            (status, label, message.as_str())
        }
        WeatherError::UpstreamUnreachable { message } => {
            (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable", message.as_str())
        }
        WeatherError::MalformedUpstreamResponse { .. } => {
            (StatusCode::BAD_GATEWAY, "Invalid Response", INVALID_RESPONSE)
        }
        WeatherError::ConfigurationError { .. } => return unexpected(city, err),
    };

    warn!(event = err.kind(), status = status.as_u16(), city, message, "Weather request failed");
    error_body(status, label, message)
}

fn error_body(status: StatusCode, label: &str, message: &str) -> (StatusCode, Value) {
    (status, json!({ "error": label, "message": message }))
}

/// Pass through 4xx/5xx provider statuses; anything else becomes 503.
fn error_status_or_503(status: u16) -> StatusCode {
    StatusCode::from_u16(status)
        .ok()
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
}
