use thiserror::Error;

pub const INVALID_API_KEY: &str = "Invalid API key. Please check your OpenWeather configuration.";
pub const CITY_NOT_FOUND: &str = "City not found. Please check the city name and try again.";
pub const RATE_LIMITED: &str = "API rate limit exceeded. Please try again later.";
pub const SERVICE_UNAVAILABLE: &str =
    "Weather service is currently unavailable. Please try again later.";
pub const FETCH_FAILED: &str = "Failed to fetch weather data. Please try again.";
pub const UNREACHABLE: &str = "Unable to connect to the weather service. Please try again later.";

/// Every way a weather lookup can fail.
///
/// Messages carried by the variants are safe to show to API consumers;
/// diagnostic detail (transport errors, raw payloads) is only ever logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error("invalid {field}: {message}")]
    ValidationFailure { field: String, message: String },

    #[error("provider rejected the request ({status}): {message}")]
    UpstreamClientError { status: u16, message: String },

    #[error("provider failed ({status}): {message}")]
    UpstreamServerError { status: u16, message: String },

    #[error("provider unreachable: {message}")]
    UpstreamUnreachable { message: String },

    #[error("malformed provider response: {message}")]
    MalformedUpstreamResponse { message: String },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },
}

impl WeatherError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::ValidationFailure { field: field.to_string(), message: message.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Classify a non-2xx provider status.
    ///
    /// `provider_message` is the `message` field of the error body, if the
    /// body had one. It is only used for statuses without a canned message.
    pub fn from_upstream_status(status: u16, provider_message: Option<String>) -> Self {
        if !(100..=599).contains(&status) {
            return Self::UpstreamServerError { status: 503, message: SERVICE_UNAVAILABLE.into() };
        }

        let message = match known_status_message(status) {
            Some(canned) => canned.to_string(),
            None => provider_message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| FETCH_FAILED.to_string()),
        };

        if (400..500).contains(&status) {
            Self::UpstreamClientError { status, message }
        } else {
            Self::UpstreamServerError { status, message }
        }
    }

    /// The caller-safe message carried by every variant.
    pub fn message(&self) -> &str {
        match self {
            Self::ValidationFailure { message, .. }
            | Self::UpstreamClientError { message, .. }
            | Self::UpstreamServerError { message, .. }
            | Self::UpstreamUnreachable { message }
            | Self::MalformedUpstreamResponse { message }
            | Self::ConfigurationError { message } => message,
        }
    }

    /// Short tag used as the `event` field in log records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationFailure { .. } => "validation_failure",
            Self::UpstreamClientError { .. } => "upstream_client_error",
            Self::UpstreamServerError { .. } => "upstream_server_error",
            Self::UpstreamUnreachable { .. } => "upstream_unreachable",
            Self::MalformedUpstreamResponse { .. } => "malformed_upstream_response",
            Self::ConfigurationError { .. } => "configuration_error",
        }
    }
}

fn known_status_message(status: u16) -> Option<&'static str> {
    match status {
        401 => Some(INVALID_API_KEY),
        404 => Some(CITY_NOT_FOUND),
        429 => Some(RATE_LIMITED),
        500 | 502 | 503 | 504 => Some(SERVICE_UNAVAILABLE),
        _ => None,
    }
}
