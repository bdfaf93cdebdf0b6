//! Core library for the city weather app.
//!
//! This crate defines:
//! - Provider adapters that fetch and normalize current conditions
//! - A per-city observation cache with time-based expiry
//! - The weather client combining the two (or serving mock data)
//! - The state coordinator UI surfaces read from and send commands to
//! - Configuration and the small persisted key-value store
//!
//! It is used by `weather-cli`, but can also be reused by other front ends.

pub mod cache;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod provider;
pub mod store;

pub use cache::{Clock, ObservationCache, SystemClock};
pub use client::{WeatherClient, WeatherSource, weather_client_from_config};
pub use config::{Config, ProviderConfig};
pub use coordinator::{StateCoordinator, Subscription};
pub use error::{ProviderError, ProviderErrorKind};
pub use model::{City, Phase, UiState, WeatherObservation, WeatherTheme};
pub use provider::{ProviderId, WeatherProvider};
pub use store::{FileStore, KeyValueStore, MemoryStore};
