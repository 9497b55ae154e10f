//! Reverse geocoding of coordinates to a city name

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::GeocoderConfig;
use crate::news::Coordinates;
use crate::{Error, Result};

/// Administrative names for a point
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub city: String,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the service knows no city for the point
    async fn reverse(&self, coords: Coordinates) -> Result<Option<Place>>;
}

#[derive(Deserialize)]
struct ReverseResponse {
    address: Option<Address>,
}

#[derive(Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

/// Official names like "City of Los Angeles" become "Los Angeles"
fn strip_city_prefix(name: &str) -> &str {
    name.strip_prefix("City of ").unwrap_or(name).trim()
}

impl ReverseResponse {
    fn into_place(self) -> Option<Place> {
        let address = self.address?;
        let city = address.city.or(address.town).or(address.village)?;
        let city = strip_city_prefix(&city);
        if city.is_empty() {
            return None;
        }

        Some(Place {
            city: city.to_string(),
            state: address.state,
            country: address.country,
        })
    }
}

/// OpenStreetMap Nominatim reverse lookup
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    zoom: u8,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            zoom: config.zoom,
        })
    }
}

#[async_trait::async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, coords: Coordinates) -> Result<Option<Place>> {
        let url = format!("{}/reverse", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", coords.lat.to_string()),
                ("lon", coords.lon.to_string()),
                ("zoom", self.zoom.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Geocode(format!("reverse lookup returned HTTP {}", status)));
        }

        let body: ReverseResponse = response.json().await?;
        Ok(body.into_place())
    }
}
