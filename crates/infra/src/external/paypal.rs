//! Payment provider adapter.
//!
//! The checkout UI lives with the client; this side only captures an order
//! the client already approved.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub const SANDBOX_BASE_URL: &str = "https://api-m.sandbox.paypal.com";
pub const LIVE_BASE_URL: &str = "https://api-m.paypal.com";

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("billing is not configured")]
    NotConfigured,

    #[error("payment provider rejected the request: {0}")]
    Rejected(String),

    #[error("payment provider unreachable: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Completed { capture_id: Option<String> },
    /// The provider answered but the payment is not settled (e.g. `PENDING`).
    Incomplete { status: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn capture_order(&self, order_id: &str) -> Result<CaptureOutcome, BillingError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn capture_order(&self, _order_id: &str) -> Result<CaptureOutcome, BillingError> {
        Err(BillingError::NotConfigured)
    }
}

#[derive(Debug, Clone)]
pub struct PayPalGateway {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct AccessToken {
    access_token: String,
}

#[derive(Deserialize)]
struct CaptureResponse {
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Deserialize)]
struct PurchaseUnit {
    payments: Option<Payments>,
}

#[derive(Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Deserialize)]
struct Capture {
    id: String,
}

fn outcome(response: CaptureResponse) -> CaptureOutcome {
    if response.status != "COMPLETED" {
        return CaptureOutcome::Incomplete { status: response.status };
    }
    let capture_id = response
        .purchase_units
        .into_iter()
        .filter_map(|u| u.payments)
        .flat_map(|p| p.captures)
        .map(|c| c.id)
        .next();
    CaptureOutcome::Completed { capture_id }
}

fn transport(e: reqwest::Error) -> BillingError {
    BillingError::Transport(e.to_string())
}

impl PayPalGateway {
    /// `live` selects the production endpoint; otherwise the sandbox.
    pub fn new(client_id: String, client_secret: String, live: bool) -> Result<Self, BillingError> {
        let base = if live { LIVE_BASE_URL } else { SANDBOX_BASE_URL };
        Self::with_base_url(client_id, client_secret, base)
    }

    pub fn with_base_url(
        client_id: String,
        client_secret: String,
        base_url: impl Into<String>,
    ) -> Result<Self, BillingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id,
            client_secret,
        })
    }

    async fn access_token(&self) -> Result<String, BillingError> {
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(BillingError::Rejected(format!("token request returned HTTP {}", response.status())));
        }
        let token: AccessToken = response.json().await.map_err(transport)?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    async fn capture_order(&self, order_id: &str) -> Result<CaptureOutcome, BillingError> {
        let order_id = order_id.trim();
        if order_id.is_empty() || !order_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(BillingError::Rejected("malformed order id".to_string()));
        }

        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!("{}/v2/checkout/orders/{}/capture", self.base_url, order_id))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BillingError::Rejected(format!("capture returned HTTP {status}")));
        }
        let body: CaptureResponse = response.json().await.map_err(transport)?;
        Ok(outcome(body))
    }
}
