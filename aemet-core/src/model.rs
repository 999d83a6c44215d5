use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Format of the `fecha` and `elaborado` timestamps sent by AEMET.
pub const AEMET_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A weather station from the climatological inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    #[serde(rename = "indicativo")]
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "provincia", default)]
    pub province: String,
    #[serde(rename = "altitud", default)]
    pub altitude: String,
    #[serde(rename = "latitud", default)]
    pub latitude: String,
    #[serde(rename = "longitud", default)]
    pub longitude: String,
    #[serde(rename = "indsinop", default)]
    pub synoptic_id: String,
}

/// Daily forecast for one municipality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(rename = "elaborado", default)]
    pub issued_at: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "provincia", default)]
    pub province: String,
    #[serde(rename = "prediccion", default)]
    pub prediction: Prediction,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub version: f64,
}

impl Forecast {
    pub fn days(&self) -> &[DayForecast] {
        &self.prediction.days
    }

    /// The first forecast day, which AEMET issues for the current date.
    pub fn today(&self) -> Option<&DayForecast> {
        self.prediction.days.first()
    }

    pub fn issued_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.issued_at, AEMET_DATETIME_FORMAT).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "dia", default)]
    pub days: Vec<DayForecast>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayForecast {
    #[serde(rename = "probPrecipitacion", default)]
    pub precipitation: Vec<PrecipitationProbability>,
    #[serde(rename = "cotaNieveProv", default)]
    pub snow_level: Vec<PeriodText>,
    #[serde(rename = "estadoCielo", default)]
    pub sky: Vec<SkyState>,
    #[serde(rename = "viento", default)]
    pub wind: Vec<Wind>,
    #[serde(rename = "rachaMax", default)]
    pub max_gust: Vec<PeriodText>,
    #[serde(rename = "temperatura", default)]
    pub temperature: Range,
    #[serde(rename = "sensTermica", default)]
    pub feels_like: Range,
    #[serde(rename = "humedadRelativa", default)]
    pub humidity: Range,
    #[serde(rename = "uvMax", default)]
    pub uv_max: Option<i32>,
    #[serde(rename = "fecha", default)]
    pub date: String,
}

impl DayForecast {
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDateTime::parse_from_str(&self.date, AEMET_DATETIME_FORMAT)
            .map(|dt| dt.date())
            .ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecipitationProbability {
    #[serde(default)]
    pub value: i32,
    #[serde(rename = "periodo", default)]
    pub period: String,
}

/// Snow level and maximum gust values, which AEMET sends as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodText {
    #[serde(default)]
    pub value: String,
    #[serde(rename = "periodo", default)]
    pub period: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkyState {
    /// Sky state code, e.g. "11" for clear or "15n" for cloudy at night.
    #[serde(default)]
    pub value: String,
    #[serde(rename = "periodo", default)]
    pub period: String,
    #[serde(rename = "descripcion", default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    #[serde(rename = "direccion", default)]
    pub direction: String,
    /// km/h
    #[serde(rename = "velocidad", default)]
    pub speed: i32,
    #[serde(rename = "periodo", default)]
    pub period: String,
}

/// Min/max pair plus hourly readings, used for temperature, feels-like and
/// relative humidity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(rename = "maxima", default)]
    pub max: i32,
    #[serde(rename = "minima", default)]
    pub min: i32,
    #[serde(rename = "dato", default)]
    pub hourly: Vec<HourlyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyValue {
    #[serde(default)]
    pub value: i32,
    #[serde(rename = "hora", default)]
    pub hour: u8,
}
