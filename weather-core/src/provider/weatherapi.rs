use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{
    ProviderError,
    model::{City, WeatherObservation, WeatherTheme},
    provider::{
        ProviderId, clamp_humidity, http_client, location_for, parse_error, round_to_u32,
        send_error, success_body,
    },
};

use super::WeatherProvider;

const LOCATIONS: &[(City, &str)] = &[
    (City::Beijing, "Beijing"),
    (City::Shanghai, "Shanghai"),
    (City::Shenzhen, "Shenzhen"),
];

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.weatherapi.com/v1";

    pub fn with_base_url(
        api_key: String,
        base_url: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client(timeout)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    humidity: Option<f64>,
    wind_kph: Option<f64>,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    current: WaCurrent,
}

fn normalize(parsed: WaResponse, now: DateTime<Utc>) -> WeatherObservation {
    let current = parsed.current;
    let condition_text = current.condition.text.trim().to_string();

    WeatherObservation {
        temperature_celsius: current.temp_c.round() as i32,
        humidity_percent: clamp_humidity(current.humidity),
        wind_speed_kmh: round_to_u32(current.wind_kph.unwrap_or(0.0)),
        theme: WeatherTheme::from_condition_text(&condition_text),
        condition_text,
        observed_at: now,
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    async fn fetch(&self, city: City) -> Result<WeatherObservation, ProviderError> {
        let location = location_for(LOCATIONS, city)?;
        let url = format!("{}/current.json", self.base_url);

        tracing::info!(%city, location, "requesting current weather from WeatherAPI");

        let res = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("q", location)])
            .send()
            .await
            .map_err(|err| send_error(self.id(), err))?;

        let body = success_body(self.id(), res).await?;

        let parsed: WaResponse =
            serde_json::from_str(&body).map_err(|err| parse_error(self.id(), err))?;

        Ok(normalize(parsed, Utc::now()))
    }
}
