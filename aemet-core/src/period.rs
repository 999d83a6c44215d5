//! Sub-day period handling for daily forecasts.
//!
//! AEMET reports the first days of a forecast in half-day periods
//! (`00-12`, `12-24`) and later days as a single `00-24` entry, or as
//! entries with no period at all, which mean the same thing.

use std::collections::BTreeMap;

use crate::model::DayForecast;

pub const MORNING: &str = "00-12";
pub const AFTERNOON: &str = "12-24";
pub const WHOLE_DAY: &str = "00-24";

/// Values reported for one period of a day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodData {
    pub rain_probability: i32,
    pub sky: String,
    pub wind_direction: String,
    /// km/h
    pub wind_speed: i32,
}

/// What granularity a day was reported at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    HalfDay { morning: PeriodData, afternoon: PeriodData },
    WholeDay(PeriodData),
    Empty,
}

/// Precipitation, sky and wind of one day, grouped by period key.
#[derive(Debug, Clone, Default)]
pub struct DayPeriods {
    periods: BTreeMap<String, PeriodData>,
    has_morning: bool,
    has_afternoon: bool,
    has_whole_day: bool,
}

impl DayPeriods {
    pub fn from_day(day: &DayForecast) -> Self {
        let mut periods = Self::default();

        for p in &day.precipitation {
            periods.entry(&p.period).rain_probability = p.value;
        }
        for s in &day.sky {
            periods.entry(&s.period).sky = s.description.clone();
        }
        for w in &day.wind {
            let data = periods.entry(&w.period);
            data.wind_direction = w.direction.clone();
            data.wind_speed = w.speed;
        }

        periods
    }

    fn entry(&mut self, period: &str) -> &mut PeriodData {
        match period {
            MORNING => self.has_morning = true,
            AFTERNOON => self.has_afternoon = true,
            WHOLE_DAY | "" => self.has_whole_day = true,
            _ => {}
        }
        self.periods.entry(period.to_owned()).or_default()
    }

    /// Data for an exact period key; `""` is the unlabelled entry.
    pub fn get(&self, period: &str) -> Option<&PeriodData> {
        self.periods.get(period)
    }

    pub fn has_half_days(&self) -> bool {
        self.has_morning && self.has_afternoon
    }

    pub fn has_whole_day(&self) -> bool {
        self.has_whole_day
    }

    /// The `00-24` entry, with empty fields filled in from the unlabelled one.
    pub fn whole_day(&self) -> PeriodData {
        let mut data = self.periods.get(WHOLE_DAY).cloned().unwrap_or_default();

        if let Some(unlabelled) = self.periods.get("") {
            if data.rain_probability == 0 && unlabelled.rain_probability > 0 {
                data.rain_probability = unlabelled.rain_probability;
            }
            if data.sky.is_empty() && !unlabelled.sky.is_empty() {
                data.sky = unlabelled.sky.clone();
            }
            if data.wind_direction.is_empty() && !unlabelled.wind_direction.is_empty() {
                data.wind_direction = unlabelled.wind_direction.clone();
                data.wind_speed = unlabelled.wind_speed;
            }
        }

        data
    }

    pub fn coverage(&self) -> Coverage {
        if self.has_half_days() {
            Coverage::HalfDay {
                morning: self.periods.get(MORNING).cloned().unwrap_or_default(),
                afternoon: self.periods.get(AFTERNOON).cloned().unwrap_or_default(),
            }
        } else if self.has_whole_day {
            Coverage::WholeDay(self.whole_day())
        } else {
            Coverage::Empty
        }
    }

    /// One set of values for the whole day.
    ///
    /// With half-day data, sky and rain come from the rainier half and wind
    /// from the windier half, chosen independently; ties go to the afternoon.
    pub fn summary(&self) -> Option<PeriodData> {
        match self.coverage() {
            Coverage::HalfDay { morning, afternoon } => {
                let wet = if morning.rain_probability > afternoon.rain_probability {
                    &morning
                } else {
                    &afternoon
                };
                let windy = if morning.wind_speed > afternoon.wind_speed {
                    &morning
                } else {
                    &afternoon
                };

                Some(PeriodData {
                    rain_probability: wet.rain_probability,
                    sky: wet.sky.clone(),
                    wind_direction: windy.wind_direction.clone(),
                    wind_speed: windy.wind_speed,
                })
            }
            Coverage::WholeDay(data) => Some(data),
            Coverage::Empty => None,
        }
    }
}
