//! Core library for the weather HTTP service.
//!
//! This crate defines:
//! - Configuration loading (file + environment)
//! - The OpenWeather client and the provider abstraction it implements
//! - Shared domain types (snapshot, error taxonomy)
//!
//! It is used by `weather-server`, but carries no HTTP-server concerns itself.

pub mod config;
pub mod error;
pub mod model;
pub mod provider;

pub use config::{ClientSettings, Config};
pub use error::WeatherError;
pub use model::WeatherSnapshot;
pub use provider::{WeatherProvider, openweather::WeatherClient};
