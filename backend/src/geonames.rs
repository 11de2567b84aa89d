//! Geo Service: nearest place, ocean and timezone lookups over HTTP/JSON.

use crate::error::ServiceError;
use flightfollowing_shared::Position;
use serde::{Deserialize, Deserializer};
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_GEONAMES_URL: &str = "http://api.geonames.org";
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const SEARCH_RADIUS_KM: u32 = 200;
/// Geonames "no result found"; a normal answer for ocean and timezone.
const STATUS_NO_RESULT: i64 = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub name: String,
    pub admin_name: String,
    pub distance_km: f64,
    pub position: Position,
}

pub trait GeoService: Send + Sync + 'static {
    fn nearest_place(
        &self,
        at: Position,
    ) -> impl Future<Output = Result<Option<Place>, ServiceError>> + Send;

    fn ocean(&self, at: Position) -> impl Future<Output = Result<Option<String>, ServiceError>> + Send;

    /// IANA zone identifier, e.g. "America/New_York".
    fn timezone(&self, at: Position)
    -> impl Future<Output = Result<Option<String>, ServiceError>> + Send;
}

// ----------------------------------------------------------------------
//  Wire format
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
    #[serde(default)]
    value: i64,
}

/// Geonames sends most numbers as strings.
fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(f64),
        Text(String),
    }
    match NumOrText::deserialize(d)? {
        NumOrText::Num(n) => Ok(n),
        NumOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
struct PlaceRecord {
    name: String,
    #[serde(rename = "adminName1", default)]
    admin_name1: String,
    #[serde(deserialize_with = "lenient_f64")]
    distance: f64,
    #[serde(deserialize_with = "lenient_f64")]
    lat: f64,
    #[serde(deserialize_with = "lenient_f64")]
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    geonames: Vec<PlaceRecord>,
    status: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct Ocean {
    name: String,
}

#[derive(Debug, Deserialize)]
struct OceanResponse {
    ocean: Option<Ocean>,
    status: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct TimezoneResponse {
    #[serde(rename = "timezoneId")]
    timezone_id: Option<String>,
    status: Option<Status>,
}

/// Error payloads arrive with HTTP 200; only "no result" is not an error.
fn check_status(status: Option<Status>) -> Result<(), ServiceError> {
    match status {
        Some(s) if s.value != STATUS_NO_RESULT => Err(ServiceError::Api {
            code: s.value,
            message: s.message,
        }),
        _ => Ok(()),
    }
}

fn parse<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, ServiceError> {
    serde_json::from_str(body).map_err(|e| ServiceError::Body(e.to_string()))
}

pub(crate) fn parse_places(body: &str) -> Result<Option<Place>, ServiceError> {
    let resp: PlacesResponse = parse(body)?;
    check_status(resp.status)?;
    Ok(resp.geonames.into_iter().next().map(|p| Place {
        name: p.name,
        admin_name: p.admin_name1,
        distance_km: p.distance,
        position: Position {
            latitude: p.lat,
            longitude: p.lng,
        },
    }))
}

pub(crate) fn parse_ocean(body: &str) -> Result<Option<String>, ServiceError> {
    let resp: OceanResponse = parse(body)?;
    check_status(resp.status)?;
    Ok(resp.ocean.map(|o| o.name).filter(|n| !n.is_empty()))
}

pub(crate) fn parse_timezone(body: &str) -> Result<Option<String>, ServiceError> {
    let resp: TimezoneResponse = parse(body)?;
    check_status(resp.status)?;
    Ok(resp.timezone_id.filter(|id| !id.is_empty()))
}

// ----------------------------------------------------------------------
//  HTTP client
// ----------------------------------------------------------------------

pub struct GeonamesClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
}

impl GeonamesClient {
    pub fn new(base_url: &str, username: &str) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("flightfollowing/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
        })
    }

    fn url(&self, endpoint: &str, at: Position, extra: &str) -> String {
        format!(
            "{}/{endpoint}?lat={}&lng={}&username={}{extra}",
            self.base_url, at.latitude, at.longitude, self.username
        )
    }

    async fn get(&self, url: String) -> Result<String, ServiceError> {
        let resp = self.http.get(url).send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }
}

impl GeoService for GeonamesClient {
    async fn nearest_place(&self, at: Position) -> Result<Option<Place>, ServiceError> {
        let extra = format!("&style=long&cities=cities5000&radius={SEARCH_RADIUS_KM}");
        let body = self.get(self.url("findNearbyPlaceNameJSON", at, &extra)).await?;
        parse_places(&body)
    }

    async fn ocean(&self, at: Position) -> Result<Option<String>, ServiceError> {
        let body = self.get(self.url("oceanJSON", at, "")).await?;
        parse_ocean(&body)
    }

    async fn timezone(&self, at: Position) -> Result<Option<String>, ServiceError> {
        let body = self.get(self.url("timezoneJSON", at, "")).await?;
        parse_timezone(&body)
    }
}
