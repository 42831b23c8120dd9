//! HTTPS client for RWA registry APIs.
//!
//! One client speaks to one registry base URL and can serve as any of the
//! data-source capabilities.
//!
//! ## Endpoints
//!
//! - `GET /v1/assets/{token}` - Asset metadata (404 when unknown)
//! - `GET /v1/custody/{token}` - Custody record
//! - `GET /v1/compliance/{token}` - Compliance report
//! - `GET /v1/collateral/{token}` - Outstanding collateral positions
//!
//! `{token}` is the canonical identifier, percent-encoded as one path
//! segment.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::error::ProofError;
use crate::identifier::TokenIdentifier;
use crate::sources::{
    CollateralPosition, ComplianceReport, CustodyRecord, CustodyRegistry, LendingProtocolScanner,
    MetadataSource, RegulatoryRegistry,
};
use crate::types::AssetMetadata;

/// HTTPS client for one registry endpoint.
pub struct HttpsClient {
    client: Client,
    /// Base URL for the API, without trailing slash.
    base_url: String,
    /// Name reported in warnings; the host part of the base URL.
    name: String,
}

impl HttpsClient {
    /// Create a new HTTPS client.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::ConfigError`] if the underlying client cannot be
    /// built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProofError> {
        // Fail fast on unreachable hosts; the verifier timeout is the real bound
        let connect_timeout = timeout.min(Duration::from_secs(2));

        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(format!("rwa-proof/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProofError::ConfigError {
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let name = host_of(&base_url).to_string();

        Ok(Self {
            client,
            base_url,
            name,
        })
    }

    /// Base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, resource: &str, token: &TokenIdentifier) -> String {
        format!(
            "{}/v1/{}/{}",
            self.base_url,
            resource,
            urlencoding::encode(&token.canonical())
        )
    }

    /// GET a JSON resource. `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        token: &TokenIdentifier,
    ) -> Result<Option<T>, ProofError> {
        let url = self.url_for(resource, token);
        debug!(url = %url, "HTTPS: fetching");

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTPS request failed");
            ProofError::unavailable(&self.name, format!("request to {url} failed: {e}"))
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "HTTPS: not found");
            return Ok(None);
        }
        if !status.is_success() {
            warn!(url = %url, status = %status, "HTTPS: non-success status");
            return Err(ProofError::unavailable(
                &self.name,
                format!("HTTP {status} from {url}"),
            ));
        }

        let body = response.json::<T>().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTPS: failed to parse JSON response");
            ProofError::unavailable(&self.name, format!("bad response from {url}: {e}"))
        })?;
        Ok(Some(body))
    }

    async fn require_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        token: &TokenIdentifier,
    ) -> Result<T, ProofError> {
        self.get_json(resource, token).await?.ok_or_else(|| {
            ProofError::unavailable(&self.name, format!("no {resource} endpoint for {token}"))
        })
    }
}

fn host_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}

#[async_trait]
impl MetadataSource for HttpsClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(source = %self.name))]
    async fn resolve(&self, token: &TokenIdentifier) -> Result<Option<AssetMetadata>, ProofError> {
        self.get_json("assets", token).await
    }
}

#[async_trait]
impl CustodyRegistry for HttpsClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(source = %self.name))]
    async fn lookup(&self, token: &TokenIdentifier) -> Result<CustodyRecord, ProofError> {
        // A registry without an entry answers 404
        Ok(self
            .get_json("custody", token)
            .await?
            .unwrap_or(CustodyRecord::Missing))
    }
}

#[async_trait]
impl RegulatoryRegistry for HttpsClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(source = %self.name))]
    async fn check(&self, token: &TokenIdentifier) -> Result<ComplianceReport, ProofError> {
        self.require_json("compliance", token).await
    }
}

#[async_trait]
impl LendingProtocolScanner for HttpsClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(source = %self.name))]
    async fn scan(&self, token: &TokenIdentifier) -> Result<Vec<CollateralPosition>, ProofError> {
        Ok(self
            .get_json("collateral", token)
            .await?
            .unwrap_or_default())
    }
}
