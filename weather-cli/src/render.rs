use chrono::Local;
use weather_core::{City, Phase, UiState, WeatherTheme};

fn city_label(city: City) -> &'static str {
    match city {
        City::Beijing => "Beijing",
        City::Shanghai => "Shanghai",
        City::Shenzhen => "Shenzhen",
    }
}

fn theme_label(theme: WeatherTheme) -> &'static str {
    match theme {
        WeatherTheme::Sunny => "Sunny",
        WeatherTheme::Rainy => "Rain",
        WeatherTheme::Snowy => "Snow",
        WeatherTheme::Windy => "Wind / fog",
    }
}

/// One-line summary used while the state is changing.
pub fn status_line(state: &UiState) -> String {
    let city = city_label(state.current_city);
    match state.phase() {
        Phase::Loading => format!("Loading weather for {city}..."),
        Phase::Failed => format!("{city}: {}", state.error.as_deref().unwrap_or_default()),
        Phase::Ready => format!("{city}: updated"),
        Phase::Idle => format!("{city}: no data"),
    }
}

/// Multi-line weather card for a settled state.
pub fn card(state: &UiState) -> String {
    let mut out = format!("{}\n", city_label(state.current_city));

    match &state.observation {
        Some(obs) => {
            out.push_str(&format!(
                "  {} ({})\n",
                obs.condition_text,
                theme_label(obs.theme)
            ));
            out.push_str(&format!("  Temperature: {}°C\n", obs.temperature_celsius));
            out.push_str(&format!("  Humidity:    {}%\n", obs.humidity_percent));
            out.push_str(&format!("  Wind:        {} km/h\n", obs.wind_speed_kmh));
            out.push_str(&format!(
                "  Updated:     {}\n",
                obs.observed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            ));
        }
        None => out.push_str("  No weather data yet.\n"),
    }

    if let Some(error) = &state.error {
        out.push_str(&format!("  Error: {error}\n"));
    }

    out
}
