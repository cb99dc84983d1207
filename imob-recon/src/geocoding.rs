//! Geocoding resolution
//!
//! Turns a property address into coordinates by trying progressively
//! coarser strategies: the full structured address, then a postal-code
//! lookup resolved to a canonical address, then the bare neighborhood
//! (centroid precision). Provider errors and timeouts are treated the same
//! as "not found" so a flaky upstream can never fail an update; when the
//! whole cascade misses, the caller keeps the previously stored
//! coordinates.

use imob_common::config::GeocodingConfig;
use reqwest::{header, Client};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Resolved WGS84 coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Canonical address returned by a postal-code lookup
#[derive(Debug, Clone)]
pub struct PostalAddress {
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

/// Address fields relevant to geocoding, already normalized by the caller
#[derive(Debug, Clone, Default)]
pub struct AddressInput {
    pub endereco: Option<String>,
    pub numero: Option<String>,
    pub complemento: Option<String>,
    pub bairro: Option<String>,
    pub cidade: Option<String>,
    pub estado: Option<String>,
    pub cep: Option<String>,
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("network error: {0}")]
    Network(String),
    #[error("provider returned error: {0}")]
    Api(String),
    #[error("response parse failed: {0}")]
    Parse(String),
}

/// External geocoding provider seam. The HTTP implementation talks to a
/// free-text search endpoint and a postal-code lookup endpoint; tests
/// script this trait directly.
#[async_trait::async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Free-text geocode of an address within a city/state.
    async fn geocode(
        &self,
        address: &str,
        city: &str,
        state: &str,
    ) -> Result<Option<Coordinates>, GeocodeError>;

    /// Resolve a postal code to its canonical address.
    async fn lookup_postal_code(&self, code: &str)
        -> Result<Option<PostalAddress>, GeocodeError>;
}

/// HTTP provider: Nominatim-style search plus ViaCEP-style postal lookup.
pub struct HttpGeocodeProvider {
    http: Client,
    config: GeocodingConfig,
}

impl HttpGeocodeProvider {
    pub fn new(config: GeocodingConfig) -> Self {
        let mut headers = header::HeaderMap::new();
        if let Ok(ua) = header::HeaderValue::from_str(&config.user_agent) {
            headers.insert(header::USER_AGENT, ua);
        }

        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .default_headers(headers)
                .build()
                .expect("Failed to create HTTP client"),
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct PostalLookupResponse {
    #[serde(default)]
    erro: bool,
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
}

#[async_trait::async_trait]
impl GeocodeProvider for HttpGeocodeProvider {
    async fn geocode(
        &self,
        address: &str,
        city: &str,
        state: &str,
    ) -> Result<Option<Coordinates>, GeocodeError> {
        let query = format!("{}, {}, {}, {}", address, city, state, self.config.country);
        debug!(query = %query, "Geocoding free-text query");

        let response = self
            .http
            .get(&self.config.search_url)
            .query(&[("q", query.as_str()), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| GeocodeError::Network(format!("geocode request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GeocodeError::Api(format!(
                "geocode endpoint returned {}",
                response.status()
            )));
        }

        let hits: Vec<SearchHit> = response
            .json()
            .await
            .map_err(|e| GeocodeError::Parse(format!("geocode response: {}", e)))?;

        let Some(hit) = hits.first() else {
            return Ok(None);
        };

        match (hit.lat.parse::<f64>(), hit.lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => Ok(Some(Coordinates { lat, lon })),
            _ => Err(GeocodeError::Parse(format!(
                "non-numeric coordinates: lat={} lon={}",
                hit.lat, hit.lon
            ))),
        }
    }

    async fn lookup_postal_code(
        &self,
        code: &str,
    ) -> Result<Option<PostalAddress>, GeocodeError> {
        let digits: String = code.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() != 8 {
            debug!(cep = %code, "Postal code is not 8 digits, skipping lookup");
            return Ok(None);
        }

        let url = format!("{}/{}/json/", self.config.postal_url, digits);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GeocodeError::Network(format!("postal lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GeocodeError::Api(format!(
                "postal endpoint returned {}",
                response.status()
            )));
        }

        let body: PostalLookupResponse = response
            .json()
            .await
            .map_err(|e| GeocodeError::Parse(format!("postal response: {}", e)))?;

        if body.erro || body.localidade.is_empty() {
            return Ok(None);
        }

        Ok(Some(PostalAddress {
            street: body.logradouro,
            neighborhood: body.bairro,
            city: body.localidade,
            state: body.uf,
        }))
    }
}

/// Recomputation policy: coordinates are refreshed only when the postal
/// code or street number differs from the stored value, or when no
/// coordinates are stored at all. Unrelated edits never trigger a
/// geocoding call.
pub fn needs_refresh(
    stored_cep: Option<&str>,
    stored_numero: Option<&str>,
    has_coordinates: bool,
    new_cep: Option<&str>,
    new_numero: Option<&str>,
) -> bool {
    new_cep != stored_cep || new_numero != stored_numero || !has_coordinates
}

/// Cascading resolver over a [`GeocodeProvider`].
pub struct GeocodingResolver {
    provider: Box<dyn GeocodeProvider>,
}

impl GeocodingResolver {
    pub fn new(provider: Box<dyn GeocodeProvider>) -> Self {
        Self { provider }
    }

    pub fn from_config(config: GeocodingConfig) -> Self {
        Self::new(Box::new(HttpGeocodeProvider::new(config)))
    }

    /// Try each strategy in order, stopping at the first hit. A provider
    /// error at any step counts as a miss for that step only. Returns
    /// `None` when the whole cascade misses; the caller must keep the
    /// previously stored coordinates in that case.
    pub async fn resolve(&self, addr: &AddressInput) -> Option<Coordinates> {
        if let Some(coords) = self.try_full_address(addr).await {
            return Some(coords);
        }

        if let Some(coords) = self.try_postal_code(addr).await {
            return Some(coords);
        }

        if let Some(coords) = self.try_neighborhood(addr).await {
            warn!("Coordinates resolved from neighborhood only (centroid precision)");
            return Some(coords);
        }

        debug!("All geocoding strategies failed, keeping stored coordinates");
        None
    }

    async fn try_full_address(&self, addr: &AddressInput) -> Option<Coordinates> {
        let (street, numero, cidade, estado) = match (
            addr.endereco.as_deref(),
            addr.numero.as_deref(),
            addr.cidade.as_deref(),
            addr.estado.as_deref(),
        ) {
            (Some(s), Some(n), Some(c), Some(e)) => (s, n, c, e),
            _ => return None,
        };

        let mut query = format!("{}, {}", street, numero);
        if let Some(complemento) = addr.complemento.as_deref() {
            query.push_str(", ");
            query.push_str(complemento);
        }
        if let Some(bairro) = addr.bairro.as_deref() {
            query.push_str(", ");
            query.push_str(bairro);
        }

        self.attempt("full address", &query, cidade, estado).await
    }

    async fn try_postal_code(&self, addr: &AddressInput) -> Option<Coordinates> {
        let cep = addr.cep.as_deref()?;
        let postal = match self.provider.lookup_postal_code(cep).await {
            Ok(Some(postal)) => postal,
            Ok(None) => {
                debug!(cep = %cep, "Postal code lookup found nothing");
                return None;
            }
            Err(e) => {
                warn!(cep = %cep, error = %e, "Postal code lookup failed, continuing cascade");
                return None;
            }
        };

        let query = if postal.neighborhood.is_empty() {
            postal.street.clone()
        } else {
            format!("{}, {}", postal.street, postal.neighborhood)
        };
        self.attempt("postal code", &query, &postal.city, &postal.state)
            .await
    }

    async fn try_neighborhood(&self, addr: &AddressInput) -> Option<Coordinates> {
        let (bairro, cidade, estado) = match (
            addr.bairro.as_deref(),
            addr.cidade.as_deref(),
            addr.estado.as_deref(),
        ) {
            (Some(b), Some(c), Some(e)) => (b, c, e),
            _ => return None,
        };
        self.attempt("neighborhood", bairro, cidade, estado).await
    }

    async fn attempt(
        &self,
        strategy: &'static str,
        query: &str,
        city: &str,
        state: &str,
    ) -> Option<Coordinates> {
        match self.provider.geocode(query, city, state).await {
            Ok(Some(coords)) => {
                debug!(strategy, lat = coords.lat, lon = coords.lon, "Geocoding hit");
                Some(coords)
            }
            Ok(None) => {
                debug!(strategy, query = %query, "Geocoding miss");
                None
            }
            Err(e) => {
                warn!(strategy, error = %e, "Geocoding attempt failed, treating as miss");
                None
            }
        }
    }
}
