use crate::{WeatherError, WeatherSnapshot};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Source of current weather. `WeatherClient` is the production
/// implementation; the HTTP layer only sees this trait.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch(&self, city: &str) -> Result<WeatherSnapshot, WeatherError>;
}
