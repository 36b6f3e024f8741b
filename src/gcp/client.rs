//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality. Service endpoint bases are configurable so that
//! integration tests can point the client at a mock server.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use anyhow::{Context, Result};
use serde_json::Value;

/// Base URLs for the GCP services the reports touch
#[derive(Clone, Debug)]
pub struct Endpoints {
    pub compute: String,
    pub sqladmin: String,
    pub monitoring: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            compute: "https://compute.googleapis.com/compute/v1".to_string(),
            sqladmin: "https://sqladmin.googleapis.com/v1".to_string(),
            monitoring: "https://monitoring.googleapis.com/v3".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every service at a single base URL (mock servers)
    pub fn with_base(base: &str) -> Self {
        Self {
            compute: format!("{}/compute/v1", base),
            sqladmin: format!("{}/sql/v1", base),
            monitoring: format!("{}/monitoring/v3", base),
        }
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub project_id: String,
    pub endpoints: Endpoints,
}

impl GcpClient {
    /// Create a new GCP client using Application Default Credentials
    pub async fn new(project_id: &str) -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        let http = GcpHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            project_id: project_id.to_string(),
            endpoints: Endpoints::default(),
        })
    }

    /// Create a client with a fixed token and explicit endpoints (tests, CI)
    pub fn with_static_token(project_id: &str, token: &str, endpoints: Endpoints) -> Result<Self> {
        Ok(Self {
            credentials: GcpCredentials::from_static(token),
            http: GcpHttpClient::new()?,
            project_id: project_id.to_string(),
            endpoints,
        })
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    /// Build Compute Engine API URL
    pub fn compute_url(&self, path: &str) -> String {
        format!("{}/projects/{}/{}", self.endpoints.compute, self.project_id, path)
    }

    /// Build aggregated Compute Engine API URL (all zones)
    pub fn compute_aggregated_url(&self, resource: &str) -> String {
        self.compute_url(&format!("aggregated/{}", resource))
    }

    // =========================================================================
    // Cloud SQL Admin API helpers
    // =========================================================================

    /// Build Cloud SQL Admin API URL
    pub fn sqladmin_url(&self, path: &str) -> String {
        format!("{}/projects/{}/{}", self.endpoints.sqladmin, self.project_id, path)
    }

    // =========================================================================
    // Cloud Monitoring API helpers
    // =========================================================================

    /// Build Cloud Monitoring timeSeries.list URL
    pub fn monitoring_timeseries_url(&self) -> String {
        format!(
            "{}/projects/{}/timeSeries",
            self.endpoints.monitoring, self.project_id
        )
    }
}

/// Format a GCP API error for display
pub fn format_gcp_error(error: &anyhow::Error) -> String {
    super::http::format_gcp_error(error)
}
