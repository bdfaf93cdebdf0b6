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

const MPS_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openweathermap.org/data/2.5";

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
struct OwMain {
    temp: f64,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    cod: Option<serde_json::Value>,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: Option<OwWind>,
}

fn cod_is_ok(cod: &serde_json::Value) -> bool {
    match cod {
        serde_json::Value::Number(n) => n.as_u64() == Some(200),
        serde_json::Value::String(s) => s == "200",
        _ => false,
    }
}

fn normalize(
    parsed: OwCurrentResponse,
    now: DateTime<Utc>,
) -> Result<WeatherObservation, ProviderError> {
    if let Some(cod) = parsed.cod.as_ref().filter(|cod| !cod_is_ok(cod)) {
        return Err(ProviderError::MalformedResponse(format!(
            "OpenWeather reported cod {cod}"
        )));
    }

    let weather = parsed.weather.first().ok_or_else(|| {
        ProviderError::MalformedResponse("OpenWeather response contained no conditions".into())
    })?;

    let theme = weather
        .icon
        .as_deref()
        .and_then(WeatherTheme::from_openweather_icon)
        .unwrap_or_else(|| WeatherTheme::from_condition_text(&weather.description));

    let wind_mps = parsed.wind.and_then(|w| w.speed).unwrap_or(0.0);

    Ok(WeatherObservation {
        temperature_celsius: parsed.main.temp.round() as i32,
        humidity_percent: clamp_humidity(parsed.main.humidity),
        wind_speed_kmh: round_to_u32(wind_mps * MPS_TO_KMH),
        condition_text: weather.description.clone(),
        theme,
        observed_at: now,
    })
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn fetch(&self, city: City) -> Result<WeatherObservation, ProviderError> {
        let location = location_for(LOCATIONS, city)?;
        let url = format!("{}/weather", self.base_url);

        tracing::info!(%city, location, "requesting current weather from OpenWeather");

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|err| send_error(self.id(), err))?;

        let body = success_body(self.id(), res).await?;

        let parsed: OwCurrentResponse =
            serde_json::from_str(&body).map_err(|err| parse_error(self.id(), err))?;

        normalize(parsed, Utc::now())
    }
}
