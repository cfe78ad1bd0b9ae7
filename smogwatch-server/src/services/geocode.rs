//! Best-effort reverse geocoding via Nominatim
//!
//! Used only to fill in a display name for trigger-supplied coordinates;
//! every failure degrades to None.

use serde::Deserialize;
use std::time::Duration;

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/reverse";
const USER_AGENT: &str = concat!("smogwatch/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

/// Look up a human-readable name for the coordinates.
pub async fn reverse_geocode(latitude: f64, longitude: f64) -> Option<String> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .ok()?;

    let response = client
        .get(NOMINATIM_URL)
        .query(&[
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("format", "json".to_string()),
        ])
        .send()
        .await
        .map_err(|e| tracing::debug!(error = %e, "reverse geocode request failed"))
        .ok()?;

    if !response.status().is_success() {
        tracing::debug!(status = %response.status(), "reverse geocode rejected");
        return None;
    }

    let body: ReverseResponse = response.json().await.ok()?;
    body.display_name.filter(|name| !name.trim().is_empty())
}
