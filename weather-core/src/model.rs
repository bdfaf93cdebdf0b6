use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// One of the fixed set of cities the app shows weather for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum City {
    #[default]
    Beijing,
    Shanghai,
    Shenzhen,
}

impl City {
    pub fn as_str(&self) -> &'static str {
        match self {
            City::Beijing => "beijing",
            City::Shanghai => "shanghai",
            City::Shenzhen => "shenzhen",
        }
    }

    pub const fn all() -> &'static [City] {
        &[City::Beijing, City::Shanghai, City::Shenzhen]
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for City {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lower = value.trim().to_lowercase();

        City::all()
            .iter()
            .copied()
            .find(|city| city.as_str() == lower)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown city '{value}'. Supported cities: beijing, shanghai, shenzhen."
                )
            })
    }
}

/// Visual category of the current conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherTheme {
    #[default]
    Sunny,
    Rainy,
    Snowy,
    Windy,
}

const RAIN_TOKENS: &[&str] = &["rain", "drizzle", "shower", "thunder", "storm", "雨"];
const SNOW_TOKENS: &[&str] = &["snow", "sleet", "blizzard", "ice", "雪"];
const WIND_TOKENS: &[&str] = &[
    "wind", "fog", "mist", "haze", "dust", "sand", "风", "雾", "霾",
];

impl WeatherTheme {
    /// Classify free-form condition text. Rain wins over snow, snow over wind;
    /// anything unrecognised is sunny.
    pub fn from_condition_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        let has_any = |tokens: &[&str]| tokens.iter().any(|t| lower.contains(t));

        if has_any(RAIN_TOKENS) {
            Self::Rainy
        } else if has_any(SNOW_TOKENS) {
            Self::Snowy
        } else if has_any(WIND_TOKENS) {
            Self::Windy
        } else {
            Self::Sunny
        }
    }

    /// Classify an OpenWeatherMap icon code such as `"10d"`.
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_openweather_icon(icon: &str) -> Option<Self> {
        match icon.get(..2)? {
            "01" | "02" | "03" | "04" => Some(Self::Sunny),
            "09" | "10" | "11" => Some(Self::Rainy),
            "13" => Some(Self::Snowy),
            "50" => Some(Self::Windy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sunny => "sunny",
            Self::Rainy => "rainy",
            Self::Snowy => "snowy",
            Self::Windy => "windy",
        }
    }
}

impl fmt::Display for WeatherTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized current conditions for one city, built from a single provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub temperature_celsius: i32,
    pub humidity_percent: u8,
    pub wind_speed_kmh: u32,
    pub condition_text: String,
    pub theme: WeatherTheme,
    /// When the observation was normalized, not when the provider measured it.
    pub observed_at: DateTime<Utc>,
}

/// Coarse state of the UI, derived from [`UiState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Everything a UI surface needs to draw the weather card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiState {
    pub current_city: City,
    pub observation: Option<WeatherObservation>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl UiState {
    pub fn loading(city: City) -> Self {
        Self {
            current_city: city,
            observation: None,
            is_loading: true,
            error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.is_loading {
            Phase::Loading
        } else if self.error.is_some() {
            Phase::Failed
        } else if self.observation.is_some() {
            Phase::Ready
        } else {
            Phase::Idle
        }
    }
}
