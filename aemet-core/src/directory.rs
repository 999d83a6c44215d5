//! Bundled municipality lookup table.
//!
//! AEMET issues municipal forecasts keyed by the INE municipality code. The
//! table shipped in `data/municipalities.json` maps names to those codes; it
//! is parsed once per process and shared through an [`Arc`]. A complete dump
//! of the AEMET feed can be loaded from disk with
//! [`MunicipalityDirectory::from_path`] instead.

use std::{
    fs,
    path::Path,
    sync::{Arc, OnceLock},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

const EMBEDDED_MUNICIPALITIES: &str = include_str!("../data/municipalities.json");

/// Prefix the source feed puts in front of every municipality code.
const LEGACY_ID_PREFIX: &str = "id";

static EMBEDDED: OnceLock<Result<Arc<MunicipalityDirectory>, String>> = OnceLock::new();

/// One municipality record. Every field is kept as the string the feed carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Municipality {
    /// Bare INE code, e.g. "08019".
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "capital", default)]
    pub capital: String,
    #[serde(rename = "zona_comarcal", default)]
    pub region: String,
    #[serde(rename = "num_hab", default)]
    pub population: String,
    #[serde(rename = "altitud", default)]
    pub altitude: String,
    #[serde(rename = "latitud", default)]
    pub latitude: String,
    #[serde(rename = "longitud", default)]
    pub longitude: String,
    #[serde(rename = "latitud_dec", default)]
    pub latitude_dec: String,
    #[serde(rename = "longitud_dec", default)]
    pub longitude_dec: String,
    #[serde(rename = "id_old", default)]
    pub legacy_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "destacada", default)]
    pub highlighted: String,
}

#[derive(Debug, Clone, Default)]
pub struct MunicipalityDirectory {
    municipalities: Vec<Municipality>,
}

impl MunicipalityDirectory {
    /// The directory compiled into the binary, parsed on first use.
    ///
    /// Concurrent first callers block until the single parse finishes. A
    /// broken dataset is reported to every caller, not only the first.
    pub fn embedded() -> Result<Arc<MunicipalityDirectory>> {
        EMBEDDED
            .get_or_init(|| {
                let directory = Self::parse(EMBEDDED_MUNICIPALITIES)?;
                info!(count = directory.len(), "loaded embedded municipality directory");
                Ok(Arc::new(directory))
            })
            .clone()
            .map_err(Error::DataUnavailable)
    }

    /// Parse a dataset in the AEMET municipality schema.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::parse(json).map_err(Error::DataUnavailable)
    }

    /// Read a dataset file in the AEMET municipality schema.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            Error::DataUnavailable(format!("failed to read {}: {e}", path.display()))
        })?;
        let directory = Self::from_json(&json)?;
        info!(count = directory.len(), path = %path.display(), "loaded municipality directory");

        Ok(directory)
    }

    fn parse(json: &str) -> Result<Self, String> {
        let mut municipalities: Vec<Municipality> = serde_json::from_str(json)
            .map_err(|e| format!("failed to parse municipality data: {e}"))?;

        for m in &mut municipalities {
            if let Some(bare) = m.id.strip_prefix(LEGACY_ID_PREFIX) {
                m.id = bare.to_owned();
            }
        }

        Ok(Self { municipalities })
    }

    pub fn all(&self) -> &[Municipality] {
        &self.municipalities
    }

    pub fn len(&self) -> usize {
        self.municipalities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.municipalities.is_empty()
    }

    /// Code of the first municipality whose name equals `name`, ignoring case
    /// and surrounding whitespace.
    pub fn find_id_by_exact_name(&self, name: &str) -> Result<&str> {
        let needle = normalize(name);

        self.municipalities
            .iter()
            .find(|m| m.name.to_lowercase() == needle)
            .map(|m| m.id.as_str())
            .ok_or_else(|| Error::NotFound(name.to_owned()))
    }

    /// All municipalities whose name contains `partial`, in dataset order.
    pub fn find_by_partial_name(&self, partial: &str) -> Vec<&Municipality> {
        let needle = normalize(partial);

        self.municipalities
            .iter()
            .filter(|m| m.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Look up a municipality by its bare code. A code that still carries the
    /// feed's "id" prefix is accepted too.
    pub fn find_by_id(&self, id: &str) -> Result<&Municipality> {
        let id = id.trim();
        let bare = id.strip_prefix(LEGACY_ID_PREFIX).unwrap_or(id);

        self.municipalities
            .iter()
            .find(|m| m.id == bare)
            .ok_or_else(|| Error::NotFound(id.to_owned()))
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
