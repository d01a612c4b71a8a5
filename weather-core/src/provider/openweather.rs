use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::{fmt, time::Duration};
use tracing::{debug, error};

use crate::{
    ClientSettings, WeatherError, WeatherSnapshot,
    error::UNREACHABLE,
};

use super::WeatherProvider;

const INVALID_DATA: &str = "Received invalid weather data from the API";

/// OpenWeather "current weather" client.
///
/// Holds only immutable configuration and a pooled `reqwest::Client`, so a
/// single instance can be shared across concurrent requests.
#[derive(Clone)]
pub struct WeatherClient {
    api_key: String,
    endpoint: Url,
    http: Client,
}

impl WeatherClient {
    /// Build a client, rejecting unusable configuration up front.
    pub fn new(settings: ClientSettings) -> Result<Self, WeatherError> {
        if settings.api_key.trim().is_empty() {
            return Err(WeatherError::configuration(
                "OpenWeather API key is not configured. \
                 Set OPENWEATHER_API_KEY or run `weather-server configure`.",
            ));
        }

        if settings.timeout_ms == 0 {
            return Err(WeatherError::configuration("OpenWeather timeout must be greater than zero"));
        }

        let base = settings.base_url.trim().trim_end_matches('/');
        let endpoint = Url::parse(&format!("{base}/weather")).map_err(|e| {
            WeatherError::configuration(format!(
                "Invalid OpenWeather base URL '{}': {e}",
                settings.base_url
            ))
        })?;

        let http = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| WeatherError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { api_key: settings.api_key, endpoint, http })
    }

    /// Fully resolved `{base_url}/weather` URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn unreachable(&self, city: &str, err: reqwest::Error) -> WeatherError {
        // The request URL carries the API key in its query string.
        let err = err.without_url();
        error!(
            event = "upstream_unreachable",
            city,
            timeout = err.is_timeout(),
            message = %err,
            "Network error while fetching weather data"
        );
        WeatherError::UpstreamUnreachable { message: UNREACHABLE.to_string() }
    }
}

impl fmt::Debug for WeatherClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherClient")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

#[async_trait]
impl WeatherProvider for WeatherClient {
    async fn fetch(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(WeatherError::validation("city", "City name cannot be empty"));
        }

        let res = self
            .http
            .get(self.endpoint.clone())
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| self.unreachable(city, e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| self.unreachable(city, e))?;

        if !status.is_success() {
            let err = WeatherError::from_upstream_status(status.as_u16(), provider_message(&body));
            error!(
                event = err.kind(),
                status = status.as_u16(),
                city,
                message = err.message(),
                body = %truncate_body(&body),
                "Weather API error"
            );
            return Err(err);
        }

        match parse_current(&body) {
            Ok(snapshot) => {
                debug!(city, resolved = %snapshot.city, "Fetched current weather");
                Ok(snapshot)
            }
            Err(reason) => {
                error!(
                    event = "malformed_upstream_response",
                    status = status.as_u16(),
                    city,
                    message = %reason,
                    body = %truncate_body(&body),
                    "Invalid API response structure"
                );
                Err(WeatherError::MalformedUpstreamResponse { message: INVALID_DATA.to_string() })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: Option<String>,
    main: Option<OwMain>,
    weather: Option<Vec<OwWeather>>,
}

#[derive(Debug, Deserialize)]
struct OwErrorBody {
    message: Option<String>,
}

fn provider_message(body: &str) -> Option<String> {
    serde_json::from_str::<OwErrorBody>(body).ok().and_then(|b| b.message)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Validate a 2xx body and turn it into a snapshot. The error is a
/// diagnostic for the log, never shown to API consumers.
fn parse_current(body: &str) -> Result<WeatherSnapshot, String> {
    let parsed: OwCurrentResponse =
        serde_json::from_str(body).map_err(|e| format!("failed to parse current weather JSON: {e}"))?;

    let city = non_blank(parsed.name).ok_or("missing city name")?;
    let main = parsed.main.ok_or("missing `main` block")?;
    let temperature = main
        .temp
        .filter(|t| t.is_finite())
        .ok_or("missing numeric `main.temp`")?;

    let condition = non_blank(
        parsed
            .weather
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|w| w.main),
    )
    .ok_or("missing primary weather condition")?;

    let humidity = match main.humidity {
        Some(h) if !h.is_finite() || h < 0.0 => {
            return Err(format!("humidity out of range: {h}"));
        }
        other => other,
    };

    let snapshot = WeatherSnapshot::new(city, temperature, condition, humidity);
    if !snapshot.temperature_celsius.is_finite() {
        return Err(format!("temperature out of range: {temperature}"));
    }

    Ok(snapshot)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CITY_NOT_FOUND, FETCH_FAILED, INVALID_API_KEY, RATE_LIMITED, SERVICE_UNAVAILABLE};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> WeatherClient {
        WeatherClient::new(ClientSettings::new("test-key").with_base_url(server.uri()))
            .expect("client should build")
    }

    fn london_body() -> serde_json::Value {
        json!({
            "name": "London",
            "main": { "temp": 15.26, "feels_like": 14.0, "humidity": 72 },
            "weather": [{ "id": 803, "main": "Clouds", "description": "broken clouds" }],
            "cod": 200
        })
    }

    #[test]
    fn construction_rejects_missing_api_key() {
        let err = WeatherClient::new(ClientSettings::new("")).unwrap_err();
        assert!(matches!(err, WeatherError::ConfigurationError { .. }));

        let err = WeatherClient::new(ClientSettings::new("   ")).unwrap_err();
        assert!(matches!(err, WeatherError::ConfigurationError { .. }));
    }

    #[test]
    fn construction_rejects_bad_base_url_and_zero_timeout() {
        let err = WeatherClient::new(ClientSettings::new("k").with_base_url("not a url")).unwrap_err();
        assert!(matches!(err, WeatherError::ConfigurationError { .. }));

        let err = WeatherClient::new(ClientSettings::new("k").with_timeout_ms(0)).unwrap_err();
        assert!(matches!(err, WeatherError::ConfigurationError { .. }));
    }

    #[test]
    fn trailing_slashes_are_stripped_from_base_url() {
        let client =
            WeatherClient::new(ClientSettings::new("k").with_base_url("http://localhost:9000/v2//"))
                .unwrap();
        assert_eq!(client.endpoint().as_str(), "http://localhost:9000/v2/weather");
    }

    #[test]
    fn debug_output_hides_api_key() {
        let client = WeatherClient::new(ClientSettings::new("super-secret")).unwrap();
        assert!(!format!("{client:?}").contains("super-secret"));
    }

    #[tokio::test]
    async fn fetch_maps_successful_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "London,uk"))
            .and(query_param("appid", "test-key"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_body()))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = client_for(&server).fetch("  London,uk ").await.unwrap();

        assert_eq!(
            snapshot,
            WeatherSnapshot {
                city: "London".into(),
                temperature_celsius: 15.3,
                condition: "Clouds".into(),
                humidity_percent: Some(72),
            }
        );
    }

    #[tokio::test]
    async fn fetch_leaves_humidity_absent_when_provider_omits_it() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Reykjavik",
                "main": { "temp": -2.04 },
                "weather": [{ "main": "Snow" }]
            })))
            .mount(&server)
            .await;

        let snapshot = client_for(&server).fetch("Reykjavik").await.unwrap();
        assert_eq!(snapshot.humidity_percent, None);
        assert_eq!(snapshot.temperature_celsius, -2.0);
    }

    #[tokio::test]
    async fn fetch_rejects_blank_city_without_calling_provider() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_body()))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        for city in ["", "   ", "\t\n"] {
            let err = client.fetch(city).await.unwrap_err();
            assert!(matches!(err, WeatherError::ValidationFailure { ref field, .. } if field == "city"));
        }
    }

    #[tokio::test]
    async fn fetch_classifies_known_error_statuses() {
        let cases = [
            (401u16, WeatherError::UpstreamClientError { status: 401, message: INVALID_API_KEY.into() }),
            (404u16, WeatherError::UpstreamClientError { status: 404, message: CITY_NOT_FOUND.into() }),
            (429u16, WeatherError::UpstreamClientError { status: 429, message: RATE_LIMITED.into() }),
            (502u16, WeatherError::UpstreamServerError { status: 502, message: SERVICE_UNAVAILABLE.into() }),
        ];

        for (status, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/weather"))
                .respond_with(
                    ResponseTemplate::new(status)
                        .set_body_json(json!({ "cod": status.to_string(), "message": "upstream says no" })),
                )
                .expect(1)
                .mount(&server)
                .await;

            let err = client_for(&server).fetch("Atlantis").await.unwrap_err();
            assert_eq!(err, expected, "status {status}");
        }
    }

    #[tokio::test]
    async fn fetch_uses_provider_message_for_other_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "cod": "400", "message": "Nothing to geocode" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).fetch("?").await.unwrap_err();
        assert_eq!(
            err,
            WeatherError::UpstreamClientError { status: 400, message: "Nothing to geocode".into() }
        );
    }

    #[tokio::test]
    async fn fetch_falls_back_when_error_body_is_not_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(507).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch("Paris").await.unwrap_err();
        assert_eq!(
            err,
            WeatherError::UpstreamServerError { status: 507, message: FETCH_FAILED.into() }
        );
    }

    #[tokio::test]
    async fn fetch_reports_malformed_success_bodies() {
        let bodies = [
            json!({ "name": "London", "main": { "humidity": 50 }, "weather": [{ "main": "Rain" }] }),
            json!({ "name": "", "main": { "temp": 10.0 }, "weather": [{ "main": "Rain" }] }),
            json!({ "name": "London", "main": { "temp": 10.0 }, "weather": [] }),
            json!({ "name": "London", "main": { "temp": "warm" }, "weather": [{ "main": "Rain" }] }),
            json!({ "name": "London", "main": { "temp": 10.0, "humidity": -5 }, "weather": [{ "main": "Rain" }] }),
        ];

        for body in bodies {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
                .mount(&server)
                .await;

            let err = client_for(&server).fetch("London").await.unwrap_err();
            assert!(
                matches!(err, WeatherError::MalformedUpstreamResponse { .. }),
                "body {body} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn fetch_rejects_temperature_that_overflows_when_rounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"name":"X","main":{"temp":1.7e308},"weather":[{"main":"Clear"}]}"#,
            ))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch("X").await.unwrap_err();
        assert_eq!(
            err,
            WeatherError::MalformedUpstreamResponse { message: INVALID_DATA.into() }
        );
    }

    #[tokio::test]
    async fn fetch_reports_non_json_success_body_as_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch("London").await.unwrap_err();
        assert_eq!(
            err,
            WeatherError::MalformedUpstreamResponse { message: INVALID_DATA.into() }
        );
    }

    #[tokio::test]
    async fn fetch_times_out_as_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(london_body())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = WeatherClient::new(
            ClientSettings::new("test-key").with_base_url(server.uri()).with_timeout_ms(50),
        )
        .unwrap();

        let err = client.fetch("London").await.unwrap_err();
        assert_eq!(err, WeatherError::UpstreamUnreachable { message: UNREACHABLE.into() });
    }

    #[tokio::test]
    async fn fetch_connection_refused_is_unreachable() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let client = WeatherClient::new(
            ClientSettings::new("test-key").with_base_url(format!("http://127.0.0.1:{port}")),
        )
        .unwrap();

        let err = client.fetch("London").await.unwrap_err();
        assert!(matches!(err, WeatherError::UpstreamUnreachable { .. }));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "é".repeat(300);
        let out = truncate_body(&body);
        assert_eq!(out.chars().count(), 203);
        assert!(out.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }
}
