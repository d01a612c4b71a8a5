use serde::Serialize;

/// Normalized current weather for one city.
///
/// Serializes to the public JSON shape: `humidity` is always emitted and is
/// `null` when the provider did not report it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub city: String,
    #[serde(rename = "temperature")]
    pub temperature_celsius: f64,
    pub condition: String,
    #[serde(rename = "humidity")]
    pub humidity_percent: Option<u32>,
}

impl WeatherSnapshot {
    /// Build a snapshot from raw provider values.
    ///
    /// Temperature is rounded to one decimal (half away from zero), humidity
    /// truncated towards zero. Callers are responsible for having checked that
    /// the strings are non-empty and the numbers finite and non-negative.
    pub fn new(city: String, temperature: f64, condition: String, humidity: Option<f64>) -> Self {
        Self {
            city,
            temperature_celsius: round_to_tenth(temperature),
            condition,
            humidity_percent: humidity.map(|h| h.trunc() as u32),
        }
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
