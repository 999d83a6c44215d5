use std::sync::Arc;

use tracing::{Dispatch, debug, instrument::WithSubscriber};

use crate::{
    config::ClientConfig,
    directory::MunicipalityDirectory,
    error::{Error, Result},
    fetch::{Fetcher, ReqwestTransport, RetryPolicy, Transport},
    model::{Forecast, Station},
};

const STATIONS_PATH: &str = "api/valores/climatologicos/inventarioestaciones/todasestaciones";
const DAILY_FORECAST_PATH: &str = "api/prediccion/especifica/municipio/diaria";

/// Client for the AEMET OpenData station inventory and municipal forecasts.
#[derive(Debug, Clone)]
pub struct AemetClient {
    fetcher: Fetcher,
    directory: Option<Arc<MunicipalityDirectory>>,
    logger: Option<Dispatch>,
}

impl AemetClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;

        let transport: Arc<dyn Transport> = match (config.transport, config.http_client) {
            (Some(transport), _) => transport,
            (None, Some(http)) => Arc::new(ReqwestTransport::with_client(http)),
            (None, None) => Arc::new(ReqwestTransport::new()?),
        };

        Ok(Self {
            fetcher: Fetcher::new(api_key, transport),
            directory: config.directory,
            logger: config.logger,
        })
    }

    /// Build a client from `AEMET_API_KEY` with default settings.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// The lookup table used for name resolution.
    pub fn directory(&self) -> Result<Arc<MunicipalityDirectory>> {
        match &self.directory {
            Some(directory) => Ok(directory.clone()),
            None => MunicipalityDirectory::embedded(),
        }
    }

    /// Every station in the climatological inventory. Not retried.
    pub async fn stations(&self) -> Result<Vec<Station>> {
        self.logged(self.fetcher.fetch_redirected(STATIONS_PATH)).await
    }

    /// Daily forecast for a municipality code such as "28079".
    pub async fn forecast_by_id(&self, municipality_id: &str) -> Result<Forecast> {
        let path = format!("{DAILY_FORECAST_PATH}/{municipality_id}");

        let forecasts: Vec<Forecast> = self
            .logged(async {
                debug!(municipality_id, "fetching daily forecast");
                self.fetcher.fetch_redirected_with_retry(&path, RetryPolicy::default()).await
            })
            .await?;

        forecasts
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoData(municipality_id.to_owned()))
    }

    /// Daily forecast for a municipality named exactly `name` (case-insensitive).
    pub async fn forecast_by_name(&self, name: &str) -> Result<Forecast> {
        let id = self
            .logged(async {
                let directory = self.directory()?;
                let id = directory.find_id_by_exact_name(name)?.to_owned();
                debug!(name, id = %id, "resolved municipality");
                Ok::<_, Error>(id)
            })
            .await?;

        self.forecast_by_id(&id).await
    }

    async fn logged<F: Future>(&self, fut: F) -> F::Output {
        match &self.logger {
            Some(dispatch) => fut.with_subscriber(dispatch.clone()).await,
            None => fut.await,
        }
    }
}
