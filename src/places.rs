use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::geodesy::LatLng;
use crate::listing::Listing;
use crate::store;

const FIND_PLACE_FIELDS: &str =
    "business_status,formatted_address,geometry,icon,name,photos,place_id,plus_code,types";
const LOCATION_BIAS: &str =
    "rectangle:35.1598723715222,138.82338748509508|37.16621915151721,137.27180990577534";

#[derive(Debug, Clone, Deserialize)]
pub struct FindPlaceResponse {
    #[serde(default)]
    pub candidates: Vec<PlaceCandidate>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceCandidate {
    #[serde(default)]
    pub formatted_address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub place_id: Option<String>,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

impl PlaceCandidate {
    pub fn location(&self) -> LatLng {
        self.geometry.location
    }
}

/// Free-text place search. Implementations return the raw service payload so
/// it can be cached verbatim.
#[async_trait]
pub trait PlaceLookup: Send + Sync {
    async fn find_place(&self, query: &str) -> AppResult<Value>;
}

pub struct HttpPlacesClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    language: String,
}

impl HttpPlacesClient {
    pub fn new(config: &AppConfig, api_key: SecretString) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("listing-geocoder/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.places_endpoint.clone(),
            api_key,
            language: config.places_language.clone(),
        })
    }
}

#[async_trait]
impl PlaceLookup for HttpPlacesClient {
    async fn find_place(&self, query: &str) -> AppResult<Value> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("input", query),
                ("inputtype", "textquery"),
                ("fields", FIND_PLACE_FIELDS),
                ("language", self.language.as_str()),
                ("locationbias", LOCATION_BIAS),
                ("key", self.api_key.expose_secret()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let payload: Value = response.json().await?;
        match payload.get("status").and_then(Value::as_str) {
            None | Some("OK") | Some("ZERO_RESULTS") => Ok(payload),
            Some(status) => {
                let detail = payload
                    .get("error_message")
                    .and_then(Value::as_str)
                    .unwrap_or("no error message");
                Err(AppError::Places(format!("{status}: {detail}")))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lookup {
    pub candidates: Vec<PlaceCandidate>,
    pub from_cache: bool,
}

impl Lookup {
    pub fn top(&self) -> Option<&PlaceCandidate> {
        self.candidates.first()
    }
}

/// Places lookups keyed by listing identifier. Each key is queried at most
/// once for the lifetime of the cache directory; responses are never refreshed.
#[derive(Clone)]
pub struct PlacesService {
    inner: Arc<dyn PlaceLookup>,
    cache_dir: PathBuf,
    delay: Duration,
}

impl PlacesService {
    pub fn new(inner: Arc<dyn PlaceLookup>, cache_dir: &Path, delay: Duration) -> Self {
        Self {
            inner,
            cache_dir: cache_dir.to_path_buf(),
            delay,
        }
    }

    pub fn from_config(config: &AppConfig, api_key: SecretString) -> AppResult<Self> {
        let client = HttpPlacesClient::new(config, api_key)?;
        Ok(Self::new(
            Arc::new(client),
            &config.geo_cache_dir,
            Duration::from_millis(config.places_request_delay_ms),
        ))
    }

    pub async fn by_name(&self, listing: &Listing) -> AppResult<Lookup> {
        self.cached(listing.id(), &listing.name_query()).await
    }

    pub async fn by_address(&self, listing: &Listing, prefecture: &str) -> AppResult<Lookup> {
        let key = format!("{}_addr", listing.id());
        self.cached(&key, &listing.address_query(prefecture)).await
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }

    async fn cached(&self, key: &str, query: &str) -> AppResult<Lookup> {
        let path = self.cache_path(key);
        let from_cache = path.exists();
        if from_cache {
            trace!(key, "places response served from cache");
        } else {
            debug!(key, query, "querying places");
            let payload = self.inner.find_place(query).await?;
            sleep(self.delay).await;
            store::write_json(&path, &payload)?;
        }
        let response: FindPlaceResponse = store::read_json(&path)?;
        Ok(Lookup {
            candidates: response.candidates,
            from_cache,
        })
    }
}
