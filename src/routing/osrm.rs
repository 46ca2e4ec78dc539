//! Route provider backed by an OSRM HTTP endpoint.

use std::time::Duration;

use log::warn;
use reqwest::blocking::Client;
use serde::Deserialize;

use super::{Route, RouteProvider};
use crate::error::OracleError;
use crate::GeoPoint;

/// Default request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Routes via an OSRM HTTP endpoint (e.g. `"http://localhost:5000"`).
pub struct OsrmRoutes {
    client: Client,
    endpoint: String,
}

impl OsrmRoutes {
    pub fn new(endpoint: &str) -> reqwest::Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

/// Minimal OSRM JSON response structures.
#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    distance: f64, // metres
    duration: f64, // seconds
    geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>, // [lng, lat]
}

impl RouteProvider for OsrmRoutes {
    fn route(&self, points: &[GeoPoint]) -> Result<Route, OracleError> {
        let unavailable = |reason: String| OracleError::RouteUnavailable {
            origin: format!("{:?}", points.first()),
            destination: format!("{:?}", points.last()),
            reason,
        };

        if points.len() < 2 {
            return Err(unavailable("at least two points are required".to_string()));
        }

        let locations = points
            .iter()
            .map(|p| format!("{},{}", p.lng, p.lat))
            .collect::<Vec<_>>()
            .join(";");
        let url = format!(
            "{}/route/v1/driving/{}?overview=full&geometries=geojson",
            self.endpoint, locations
        );

        let resp: OsrmResponse = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.json())
            .map_err(|e| {
                if e.is_timeout() {
                    warn!("[OSRM] request timed out: {}", url);
                    OracleError::Timeout {
                        operation: "route".to_string(),
                    }
                } else {
                    unavailable(e.to_string())
                }
            })?;

        if resp.code != "Ok" {
            return Err(unavailable(format!("OSRM code {}", resp.code)));
        }

        let route = resp
            .routes
            .and_then(|routes| routes.into_iter().next())
            .ok_or_else(|| unavailable("no route returned".to_string()))?;

        Ok(Route {
            coordinates: route
                .geometry
                .coordinates
                .iter()
                .map(|c| GeoPoint::new(c[1], c[0]))
                .collect(),
            duration: route.duration,
            distance: route.distance,
        })
    }
}
