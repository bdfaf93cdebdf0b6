//! Cache-aware entry point for "current weather in city X".

use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Config, ProviderError,
    cache::ObservationCache,
    model::{City, WeatherObservation, WeatherTheme},
    provider::{WeatherProvider, default_provider_from_config},
};

/// Anything the state coordinator can ask for current weather.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn get_weather(&self, city: City) -> Result<WeatherObservation, ProviderError>;
}

#[derive(Debug)]
enum Backend {
    Live {
        provider: Arc<dyn WeatherProvider>,
        cache: Arc<ObservationCache>,
    },
    Mock {
        delay: Duration,
    },
}

#[derive(Debug)]
pub struct WeatherClient {
    backend: Backend,
}

impl WeatherClient {
    pub fn new(provider: Arc<dyn WeatherProvider>, cache: Arc<ObservationCache>) -> Self {
        Self {
            backend: Backend::Live { provider, cache },
        }
    }

    /// Offline client that serves fixed observations after `delay`.
    pub fn mock(delay: Duration) -> Self {
        Self {
            backend: Backend::Mock { delay },
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self.backend, Backend::Mock { .. })
    }

    /// Cached observations first; one upstream request on a miss.
    /// Failures are returned as-is and never cached.
    pub async fn get_weather(&self, city: City) -> Result<WeatherObservation, ProviderError> {
        match &self.backend {
            Backend::Mock { delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(mock_observation(city, Utc::now()))
            }
            Backend::Live { provider, cache } => {
                if let Some(observation) = cache.get(city) {
                    tracing::debug!(%city, "weather cache hit");
                    return Ok(observation);
                }

                tracing::debug!(%city, provider = %provider.id(), "weather cache miss");
                let observation = provider.fetch(city).await.inspect_err(|err| {
                    tracing::warn!(%city, kind = %err.kind(), error = %err, "weather fetch failed");
                })?;

                cache.put(city, observation.clone());
                Ok(observation)
            }
        }
    }

    pub fn clear_cache(&self) {
        if let Backend::Live { cache, .. } = &self.backend {
            cache.clear();
        }
    }
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn get_weather(&self, city: City) -> Result<WeatherObservation, ProviderError> {
        WeatherClient::get_weather(self, city).await
    }
}

/// Fixed observation served in mock mode.
pub fn mock_observation(city: City, now: DateTime<Utc>) -> WeatherObservation {
    let (temperature_celsius, humidity_percent, wind_speed_kmh, condition_text, theme) = match city
    {
        City::Beijing => (22, 45, 12, "Sunny", WeatherTheme::Sunny),
        City::Shanghai => (26, 78, 18, "Light rain", WeatherTheme::Rainy),
        City::Shenzhen => (30, 82, 8, "Cloudy", WeatherTheme::Sunny),
    };

    WeatherObservation {
        temperature_celsius,
        humidity_percent,
        wind_speed_kmh,
        condition_text: condition_text.to_string(),
        theme,
        observed_at: now,
    }
}

/// Build the client the configuration asks for: mock data, or the default
/// provider behind a fresh cache.
pub fn weather_client_from_config(config: &Config) -> anyhow::Result<WeatherClient> {
    if config.mock_data {
        tracing::info!("using offline mock weather data");
        return Ok(WeatherClient::mock(config.mock_delay()));
    }

    let provider = default_provider_from_config(config)?;
    let cache = Arc::new(ObservationCache::new(config.cache_ttl()));
    Ok(WeatherClient::new(provider, cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{ManualClock, default_ttl},
        provider::ProviderId,
    };
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct ScriptedProvider {
        calls: AtomicUsize,
        responses: Mutex<Vec<Result<WeatherObservation, ProviderError>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<WeatherObservation, ProviderError>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(responses),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        fn id(&self) -> ProviderId {
            ProviderId::OpenWeather
        }

        async fn fetch(&self, city: City) -> Result<WeatherObservation, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Ok(mock_observation(city, Utc::now()))
            } else {
                responses.remove(0)
            }
        }
    }

    fn live_client(provider: Arc<ScriptedProvider>) -> (WeatherClient, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = Arc::new(ObservationCache::with_clock(default_ttl(), clock.clone()));
        (WeatherClient::new(provider, cache), clock)
    }

    #[tokio::test]
    async fn back_to_back_calls_hit_upstream_once() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (client, _) = live_client(provider.clone());

        let first = client.get_weather(City::Beijing).await.unwrap();
        let second = client.get_weather(City::Beijing).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn cities_are_cached_independently() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (client, _) = live_client(provider.clone());

        client.get_weather(City::Beijing).await.unwrap();
        client.get_weather(City::Shanghai).await.unwrap();
        client.get_weather(City::Beijing).await.unwrap();

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn expired_entry_triggers_new_fetch() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (client, clock) = live_client(provider.clone());

        client.get_weather(City::Shenzhen).await.unwrap();
        clock.advance(default_ttl());
        client.get_weather(City::Shenzhen).await.unwrap();

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn failures_propagate_and_are_not_cached() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::RateLimited)]));
        let (client, _) = live_client(provider.clone());

        let err = client.get_weather(City::Beijing).await.unwrap_err();
        assert_eq!(err, ProviderError::RateLimited);

        let ok = client.get_weather(City::Beijing).await;
        assert!(ok.is_ok());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn clear_cache_forces_refetch() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (client, _) = live_client(provider.clone());

        client.get_weather(City::Beijing).await.unwrap();
        client.clear_cache();
        client.get_weather(City::Beijing).await.unwrap();

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn mock_mode_serves_fixtures() {
        let client = WeatherClient::mock(Duration::ZERO);
        assert!(client.is_mock());

        let beijing = client.get_weather(City::Beijing).await.unwrap();
        assert_eq!(beijing.temperature_celsius, 22);
        assert_eq!(beijing.theme, WeatherTheme::Sunny);

        let shanghai = client.get_weather(City::Shanghai).await.unwrap();
        assert_eq!(shanghai.theme, WeatherTheme::Rainy);
        assert_eq!(shanghai.humidity_percent, 78);
    }

    #[tokio::test]
    async fn mock_observations_are_always_fresh() {
        let client = WeatherClient::mock(Duration::ZERO);
        let first = client.get_weather(City::Shenzhen).await.unwrap();
        let second = client.get_weather(City::Shenzhen).await.unwrap();
        assert!(second.observed_at >= first.observed_at);
    }

    #[test]
    fn config_selects_mock_backend() {
        let config = Config {
            mock_data: true,
            ..Config::default()
        };
        let client = weather_client_from_config(&config).unwrap();
        assert!(client.is_mock());
    }

    #[test]
    fn config_without_provider_is_an_error() {
        let err = weather_client_from_config(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("No default provider configured"));
    }
}
