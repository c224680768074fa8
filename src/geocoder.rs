use crate::{domain::Geocoder, errors::GeocodeError, models::GeocodeMatch};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing;

pub const GOOGLE_GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Client for the Google Geocoding API.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(endpoint: String, api_key: String, timeout: Duration) -> Result<Self, GeocodeError> {
        let client = Client::builder().timeout(timeout).build()?;
        tracing::info!(%endpoint, "Initializing GoogleGeocoder");
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[derive(Deserialize, Debug)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize, Debug)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Deserialize, Debug)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize, Debug)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GeocodeResponse {
    /// `ZERO_RESULTS` is a normal empty answer; any other non-OK status is an error.
    fn into_matches(self) -> Result<Vec<GeocodeMatch>, GeocodeError> {
        match self.status.as_str() {
            "OK" => Ok(self
                .results
                .into_iter()
                .map(|r| GeocodeMatch {
                    latitude: r.geometry.location.lat,
                    longitude: r.geometry.location.lng,
                    formatted_address: r.formatted_address,
                })
                .collect()),
            "ZERO_RESULTS" => Ok(Vec::new()),
            _ => Err(GeocodeError::Provider {
                message: self.error_message.unwrap_or_default(),
                status: self.status,
            }),
        }
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Vec<GeocodeMatch>, GeocodeError> {
        tracing::debug!(%address, "Geocoding address");
        let response: GeocodeResponse = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let matches = response.into_matches()?;
        tracing::debug!(%address, matches = matches.len(), "Geocoding complete");
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Vec<GeocodeMatch>, GeocodeError> {
        serde_json::from_str::<GeocodeResponse>(raw)
            .expect("parse sample")
            .into_matches()
    }

    #[test]
    fn ok_response_yields_matches_in_order() {
        let raw = r#"{
            "status": "OK",
            "results": [
                {"formatted_address": "Boulder, CO, USA",
                 "geometry": {"location": {"lat": 40.01499, "lng": -105.27055}, "location_type": "APPROXIMATE"},
                 "place_id": "abc"},
                {"formatted_address": "Boulder, MT, USA",
                 "geometry": {"location": {"lat": 46.2366, "lng": -112.1208}}}
            ]
        }"#;
        let matches = parse(raw).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(
            matches[0],
            GeocodeMatch {
                latitude: 40.01499,
                longitude: -105.27055,
                formatted_address: "Boulder, CO, USA".into(),
            }
        );
    }

    #[test]
    fn zero_results_is_empty_not_error() {
        let matches = parse(r#"{"status": "ZERO_RESULTS", "results": []}"#).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn denied_request_is_provider_error() {
        let err = parse(r#"{"status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#)
            .unwrap_err();
        match err {
            GeocodeError::Provider { status, message } => {
                assert_eq!(status, "REQUEST_DENIED");
                assert_eq!(message, "The provided API key is invalid.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
