// Gateway HTTP client
//
// Wraps `reqwest::Client` with gateway URL construction, the `DeviceToken`
// header, status mapping and envelope unwrapping. Every call is a single
// bounded request; the transport timeout is the only deadline.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::gateway::models::{DeviceSelf, GatewayResponse, LcgAssignment};
use crate::transport::TransportConfig;

/// Header carrying the device credential on authenticated requests.
pub const DEVICE_TOKEN_HEADER: &str = "DeviceToken";

/// Raw HTTP client for the gateway API.
///
/// Cheap to clone: the inner `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GatewayClient {
    /// Create a new gateway client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `https://api.gateway.example`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a gateway client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Exchange a pair code for a device credential.
    ///
    /// Returns the raw `data` string, which may be empty; judging an empty
    /// credential is the caller's business.
    pub async fn pair(&self, code: u32) -> Result<String, Error> {
        let url = self.api_url(&format!("1/device/pair/{code}"))?;
        debug!(%url, "GET");

        let resp = self.http.get(url).send().await?;
        let envelope: GatewayResponse<String> = Self::parse_response(resp).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Look up the device the token belongs to.
    pub async fn device_self(&self, token: &SecretString) -> Result<DeviceSelf, Error> {
        let url = self.api_url("1/device/self")?;
        self.get_authenticated(url, token).await
    }

    /// Ask the backend which realtime gateway this device should use.
    pub async fn assign_lcg(&self, token: &SecretString) -> Result<LcgAssignment, Error> {
        let url = self.api_url("1/device/assignLCG")?;
        self.get_authenticated(url, token).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Build `{base}/{path}` without losing any path prefix on the base.
    fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    async fn get_authenticated<T: DeserializeOwned + Default>(
        &self,
        url: Url,
        token: &SecretString,
    ) -> Result<T, Error> {
        debug!(%url, "GET");

        let resp = self
            .http
            .get(url)
            .header(DEVICE_TOKEN_HEADER, token.expose_secret())
            .send()
            .await?;

        let envelope: GatewayResponse<T> = Self::parse_response(resp).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Map the HTTP status, then decode the `{ message, data }` envelope.
    async fn parse_response<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<GatewayResponse<T>, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::InvalidDeviceToken);
        }

        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Gateway {
                status: status.as_u16(),
                message: preview(&body).to_owned(),
            });
        }

        let body = resp.text().await?;
        trace!(len = body.len(), "gateway response body");

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })
    }
}

/// First 200 characters of a body, cut on a char boundary.
fn preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn api_url_keeps_base_path() {
        let client = GatewayClient::with_client(
            reqwest::Client::new(),
            Url::parse("https://api.gateway.example/prefix/").unwrap(),
        );
        let url = client.api_url("1/device/self").unwrap();
        assert_eq!(url.as_str(), "https://api.gateway.example/prefix/1/device/self");
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let body = "x".repeat(500);
        assert_eq!(preview(&body).len(), 200);
        assert_eq!(preview("short"), "short");
    }
}
