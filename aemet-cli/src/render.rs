//! Human-friendly text for forecasts.

use std::fmt::Write;

use aemet_core::{Coverage, DayForecast, DayPeriods, Forecast, PeriodData};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Local, NaiveDateTime};

const RULE: &str = "==============================================";

/// "2025-05-20T00:00:00" -> "Tuesday, May 20". Unparseable input is returned as is.
pub fn format_date(raw: &str) -> String {
    NaiveDateTime::parse_from_str(raw, aemet_core::model::AEMET_DATETIME_FORMAT)
        .map(|dt| dt.format("%A, %b %d").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Arrow pointing where a wind from `direction` blows to.
pub fn wind_emoji(direction: &str) -> &'static str {
    match direction {
        "N" => "⬇️",
        "NE" => "↙️",
        "E" => "⬅️",
        "SE" => "↖️",
        "S" => "⬆️",
        "SW" | "SO" => "↗️",
        "W" | "O" => "➡️",
        "NW" | "NO" => "↘️",
        "C" => "🔄",
        _ => "💨",
    }
}

/// Pick an emoji from the Spanish sky description and the rain probability.
pub fn weather_emoji(description: &str, rain_probability: i32) -> &'static str {
    let desc = description.to_lowercase();

    if rain_probability > 70 {
        "🌧️"
    } else if rain_probability > 30 {
        "🌦️"
    } else if desc.contains("tormenta") {
        "⛈️"
    } else if desc.contains("nieve") {
        "❄️"
    } else if desc.contains("niebla") {
        "🌫️"
    } else if desc.contains("nubos") {
        if desc.contains("poco") {
            "🌤️"
        } else if desc.contains("muy") {
            "☁️"
        } else {
            "⛅"
        }
    } else if desc.contains("despejado") {
        "☀️"
    } else if desc.contains("lluvia") {
        if desc.contains("escasa") { "🌦️" } else { "🌧️" }
    } else {
        "☀️"
    }
}

pub fn period_line(label: &str, data: &PeriodData) -> String {
    let mut line = format!("{label}: {} {}", weather_emoji(&data.sky, data.rain_probability), data.sky);

    if data.rain_probability > 0 {
        let _ = write!(line, " (💧 {}%)", data.rain_probability);
    }
    if !data.wind_direction.is_empty() && data.wind_speed > 0 {
        let _ = write!(
            line,
            " {} {} at {} km/h",
            wind_emoji(&data.wind_direction),
            data.wind_direction,
            data.wind_speed
        );
    }

    line.trim_end().to_string()
}

pub fn day_block(day: &DayForecast) -> String {
    let mut out = format!(
        "📅 {} (🌡️ {}°C to {}°C)\n",
        format_date(&day.date),
        day.temperature.min,
        day.temperature.max
    );

    match DayPeriods::from_day(day).coverage() {
        Coverage::HalfDay { morning, afternoon } => {
            out.push_str(&period_line("Morning (00-12h)", &morning));
            out.push('\n');
            out.push_str(&period_line("Afternoon (12-24h)", &afternoon));
            out.push('\n');
        }
        Coverage::WholeDay(data) => {
            out.push_str(&period_line("All day", &data));
            out.push('\n');
        }
        Coverage::Empty => {}
    }

    out
}

pub fn forecast_header(forecast: &Forecast, now: DateTime<Local>) -> String {
    let updated = forecast
        .issued_at()
        .map(|dt| dt.format("%A, %B %d at %H:%M").to_string())
        .unwrap_or_else(|| now.format("%A, %B %d at %H:%M").to_string());

    format!(
        "🌤️  Weather forecast for {} ({})\n📊 Forecast updated on {updated}\n{RULE}\n",
        forecast.name, forecast.province
    )
}

/// Full multi-day forecast.
pub fn forecast(forecast: &Forecast, now: DateTime<Local>) -> String {
    let mut out = forecast_header(forecast, now);
    for day in forecast.days() {
        out.push('\n');
        out.push_str(&day_block(day));
    }
    out
}

pub fn day_heading() -> String {
    format!("🌤️  El tiempo hoy\n{RULE}")
}

/// One line describing today's weather.
pub fn day_summary(forecast: &Forecast) -> Result<String> {
    let today = forecast.today().ok_or_else(|| anyhow!("no forecast data available"))?;
    let data = DayPeriods::from_day(today).summary().unwrap_or_default();

    let mut line = format!(
        "{} {}: {} {}°C-{}°C",
        weather_emoji(&data.sky, data.rain_probability),
        forecast.name,
        data.sky,
        today.temperature.min,
        today.temperature.max
    );

    if data.rain_probability > 0 {
        let _ = write!(line, " (💧 {}%)", data.rain_probability);
    }
    if !data.wind_direction.is_empty() && data.wind_speed > 0 {
        let _ = write!(line, " {} {} km/h", wind_emoji(&data.wind_direction), data.wind_speed);
    }

    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aemet_core::model::{PrecipitationProbability, Prediction, Range, SkyState, Wind};

    fn day(date: &str) -> DayForecast {
        DayForecast {
            precipitation: vec![
                PrecipitationProbability { value: 30, period: "00-12".into() },
                PrecipitationProbability { value: 80, period: "12-24".into() },
            ],
            sky: vec![
                SkyState { value: "12".into(), period: "00-12".into(), description: "Poco nuboso".into() },
                SkyState { value: "25".into(), period: "12-24".into(), description: "Muy nuboso con lluvia".into() },
            ],
            wind: vec![
                Wind { direction: "NE".into(), speed: 20, period: "00-12".into() },
                Wind { direction: "S".into(), speed: 10, period: "12-24".into() },
            ],
            temperature: Range { max: 27, min: 14, hourly: vec![] },
            date: date.into(),
            ..Default::default()
        }
    }

    fn forecast(days: Vec<DayForecast>) -> Forecast {
        Forecast {
            issued_at: "2025-05-20T11:46:37".into(),
            name: "Madrid".into(),
            province: "Madrid".into(),
            prediction: Prediction { days },
            id: 28079,
            version: 1.0,
        }
    }

    #[test]
    fn formats_dates() {
        assert_eq!(format_date("2025-05-20T00:00:00"), "Tuesday, May 20");
        assert_eq!(format_date("not a date"), "not a date");
    }

    #[test]
    fn picks_weather_emoji() {
        assert_eq!(weather_emoji("Despejado", 80), "🌧️");
        assert_eq!(weather_emoji("Despejado", 40), "🌦️");
        assert_eq!(weather_emoji("Nuboso con tormenta", 0), "⛈️");
        assert_eq!(weather_emoji("Poco nuboso", 0), "🌤️");
        assert_eq!(weather_emoji("Muy nuboso", 0), "☁️");
        assert_eq!(weather_emoji("Intervalos nubosos", 10), "⛅");
        assert_eq!(weather_emoji("Cubierto con lluvia escasa", 0), "🌦️");
        assert_eq!(weather_emoji("", 0), "☀️");
    }

    #[test]
    fn picks_wind_emoji() {
        assert_eq!(wind_emoji("N"), "⬇️");
        assert_eq!(wind_emoji("C"), "🔄");
        assert_eq!(wind_emoji("??"), "💨");
    }

    #[test]
    fn period_line_hides_zero_rain_and_calm_wind() {
        let data = PeriodData { sky: "Despejado".into(), wind_direction: "C".into(), ..Default::default() };
        assert_eq!(period_line("All day", &data), "All day: ☀️ Despejado");
    }

    #[test]
    fn day_block_shows_both_halves() {
        let block = day_block(&day("2025-05-20T00:00:00"));

        assert!(block.starts_with("📅 Tuesday, May 20 (🌡️ 14°C to 27°C)"));
        assert!(block.contains("Morning (00-12h): 🌤️ Poco nuboso (💧 30%) ↙️ NE at 20 km/h"));
        assert!(block.contains("Afternoon (12-24h): 🌧️ Muy nuboso con lluvia (💧 80%) ⬆️ S at 10 km/h"));
    }

    #[test]
    fn summary_uses_rainier_and_windier_halves() {
        let line = day_summary(&forecast(vec![day("2025-05-20T00:00:00")])).unwrap();
        assert_eq!(line, "🌧️ Madrid: Muy nuboso con lluvia 14°C-27°C (💧 80%) ↙️ 20 km/h");
    }

    #[test]
    fn summary_without_days_is_an_error() {
        let err = day_summary(&forecast(vec![])).unwrap_err();
        assert!(err.to_string().contains("no forecast data available"));
    }

    #[test]
    fn full_forecast_lists_every_day() {
        let text = super::forecast(
            &forecast(vec![day("2025-05-20T00:00:00"), day("2025-05-21T00:00:00")]),
            Local::now(),
        );

        assert!(text.contains("Weather forecast for Madrid (Madrid)"));
        assert!(text.contains("Forecast updated on Tuesday, May 20 at 11:46"));
        assert_eq!(text.matches("📅").count(), 2);
    }
}
