use crate::{
    Config, ProviderError,
    model::{City, WeatherObservation},
    provider::{openweather::OpenWeatherProvider, weatherapi::WeatherApiProvider},
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::{convert::TryFrom, fmt::Debug, sync::Arc, time::Duration};

pub mod openweather;
pub mod weatherapi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    WeatherApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::WeatherApi => "weatherapi",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::WeatherApi]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, weatherapi."
            )),
        }
    }
}

/// One remote weather service, reduced to "current conditions for a city".
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    /// Issue exactly one upstream request and normalize the response.
    async fn fetch(&self, city: City) -> Result<WeatherObservation, ProviderError>;
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.provider_api_key(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `weather configure {id}` and enter your API key, \
                 or pass `--mock` to use offline data."
        )
    })?;
    let timeout = config.request_timeout();
    let base_url = config.provider_base_url(id);

    let provider: Arc<dyn WeatherProvider> = match id {
        ProviderId::OpenWeather => Arc::new(OpenWeatherProvider::with_base_url(
            api_key.to_owned(),
            base_url.unwrap_or(OpenWeatherProvider::DEFAULT_BASE_URL),
            timeout,
        )?),
        ProviderId::WeatherApi => Arc::new(WeatherApiProvider::with_base_url(
            api_key.to_owned(),
            base_url.unwrap_or(WeatherApiProvider::DEFAULT_BASE_URL),
            timeout,
        )?),
    };

    Ok(provider)
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Resolve a city through a provider's static location table.
fn location_for(table: &[(City, &'static str)], city: City) -> Result<&'static str, ProviderError> {
    table
        .iter()
        .find(|(c, _)| *c == city)
        .map(|(_, location)| *location)
        .ok_or_else(|| ProviderError::MalformedResponse(format!("no location code for {city}")))
}

/// Statuses whose meaning does not depend on the body.
fn classify_status(status: StatusCode) -> Option<ProviderError> {
    match status {
        StatusCode::TOO_MANY_REQUESTS => Some(ProviderError::RateLimited),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(ProviderError::Unauthorized),
        _ => None,
    }
}

/// Read the body of a response, classifying non-success statuses.
async fn success_body(provider: ProviderId, res: Response) -> Result<String, ProviderError> {
    let status = res.status();
    if let Some(err) = classify_status(status) {
        return Err(err);
    }

    let body = res.text().await.map_err(|err| {
        ProviderError::NetworkFailure(format!("failed to read {provider} response body: {err}"))
    })?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(ProviderError::NetworkFailure(format!(
            "{provider} request failed with status {status}: {}",
            truncate_body(&body)
        )))
    }
}

fn send_error(provider: ProviderId, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::NetworkFailure(format!("{provider} request timed out"))
    } else {
        ProviderError::NetworkFailure(format!("failed to send request to {provider}: {err}"))
    }
}

fn parse_error(provider: ProviderId, err: serde_json::Error) -> ProviderError {
    ProviderError::MalformedResponse(format!("failed to parse {provider} JSON: {err}"))
}

fn round_to_u32(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

fn clamp_humidity(value: Option<f64>) -> u8 {
    value.unwrap_or(0.0).round().clamp(0.0, 100.0) as u8
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
