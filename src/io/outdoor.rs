//! Outdoor routing collaborators
//!
//! The engine treats outdoor routing as an opaque async service: a pair of
//! geo coordinates in, a polyline (or nothing) out. Cancellation is not
//! assumed; the engine bounds every call with a timeout and discards stale
//! results itself.

use crate::domain::error::{Result, WayfindError};
use crate::domain::types::{GeoCoord, Polyline};
use crate::infra::config::{Config, OutdoorMode};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[async_trait]
pub trait OutdoorRouter: Send + Sync {
    /// Route between two outdoor coordinates; `None` when the provider has no route
    async fn route(&self, from: GeoCoord, to: GeoCoord) -> Result<Option<Polyline>>;
}

/// Direct segment between the two coordinates (offline use)
#[derive(Debug, Default, Clone, Copy)]
pub struct StraightLineRouter;

#[async_trait]
impl OutdoorRouter for StraightLineRouter {
    async fn route(&self, from: GeoCoord, to: GeoCoord) -> Result<Option<Polyline>> {
        Ok(Some(vec![from, to]))
    }
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(default)]
    points: Vec<[f64; 2]>,
}

impl RouteResponse {
    fn into_polyline(self) -> Option<Polyline> {
        if self.points.is_empty() {
            return None;
        }
        Some(self.points.into_iter().map(|[lat, lng]| GeoCoord::new(lat, lng)).collect())
    }
}

/// Remote routing service: `GET url?origin=lat,lng&destination=lat,lng`
pub struct HttpOutdoorRouter {
    url: String,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
}

impl HttpOutdoorRouter {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let (url, username, password) = Self::parse_url_with_auth(url);
        // Client is built once for connection pooling
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, username, password, client })
    }

    /// Strip `user:pass@` from the URL, returning the clean URL and credentials
    fn parse_url_with_auth(url: &str) -> (String, Option<String>, Option<String>) {
        for scheme in ["http://", "https://"] {
            let Some(rest) = url.strip_prefix(scheme) else { continue };
            let Some((auth, host)) = rest.split_once('@') else { break };
            if let Some((user, pass)) = auth.split_once(':') {
                return (format!("{scheme}{host}"), Some(user.to_string()), Some(pass.to_string()));
            }
        }
        (url.to_string(), None, None)
    }

    fn request_url(&self, from: GeoCoord, to: GeoCoord) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{sep}origin={},{}&destination={},{}",
            self.url, from.lat, from.lng, to.lat, to.lng
        )
    }
}

#[async_trait]
impl OutdoorRouter for HttpOutdoorRouter {
    async fn route(&self, from: GeoCoord, to: GeoCoord) -> Result<Option<Polyline>> {
        let start = Instant::now();
        let mut request = self.client.get(self.request_url(from, to)).header("Accept", "application/json");

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            let encoded = STANDARD.encode(format!("{username}:{password}").as_bytes());
            request = request.header("Authorization", format!("Basic {encoded}"));
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "outdoor_route_request_error");
            WayfindError::ProviderFailure(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status.as_u16(), "outdoor_route_bad_status");
            return Err(WayfindError::ProviderFailure(format!("status {}", status.as_u16())));
        }

        let body: RouteResponse = response
            .json()
            .await
            .map_err(|e| WayfindError::ProviderFailure(format!("bad response body: {e}")))?;

        let polyline = body.into_polyline();
        debug!(
            latency_us = %start.elapsed().as_micros(),
            points = %polyline.as_ref().map_or(0, Vec::len),
            "outdoor_route_response"
        );
        Ok(polyline)
    }
}

/// Build the configured outdoor router
pub fn create_router(config: &Config) -> anyhow::Result<Arc<dyn OutdoorRouter>> {
    Ok(match config.outdoor_mode() {
        OutdoorMode::StraightLine => Arc::new(StraightLineRouter),
        OutdoorMode::Http => Arc::new(HttpOutdoorRouter::new(
            config.outdoor_url(),
            Duration::from_millis(config.outdoor_timeout_ms()),
        )?),
    })
}
