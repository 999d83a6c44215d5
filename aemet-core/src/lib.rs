//! Core library for the `aemet` CLI.
//!
//! This crate defines:
//! - A client for the AEMET OpenData station inventory and municipal forecasts
//! - The two-step redirect fetch those endpoints require, with retry
//! - The bundled municipality directory used to resolve names to codes
//! - Typed forecast models and half-day/whole-day period handling
//!
//! ```no_run
//! # async fn run() -> aemet_core::Result<()> {
//! let client = aemet_core::AemetClient::from_env()?;
//! let forecast = client.forecast_by_name("Madrid").await?;
//! println!("{} ({})", forecast.name, forecast.province);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod fetch;
pub mod model;
pub mod period;

pub use client::AemetClient;
pub use config::{ClientConfig, ENV_API_KEY, Settings};
pub use directory::{Municipality, MunicipalityDirectory};
pub use error::{Error, ErrorKind, Result};
pub use fetch::{Fetcher, ReqwestTransport, RetryPolicy, Transport};
pub use model::{DayForecast, Forecast, Station};
pub use period::{Coverage, DayPeriods, PeriodData};
