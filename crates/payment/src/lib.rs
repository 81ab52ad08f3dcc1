//! Payment gateway adapter.
//!
//! Checkout asks a [`PaymentGateway`] for a hosted payment page and stores the
//! returned link on the transaction. [`MidtransGateway`] talks to the Midtrans
//! Snap API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Payment gateway answered {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Payment gateway returned no payment link")]
    MissingLink,
}

/// What the gateway needs to open a payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Merchant-side order reference; the transaction id.
    pub order_id: i64,
    /// Gross amount in minor units.
    pub amount: i64,
    pub buyer_name: String,
    pub buyer_email: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns the URL the buyer is redirected to.
    async fn create_payment_link(&self, request: &PaymentRequest) -> Result<String, PaymentError>;
}

#[derive(Debug, Serialize)]
struct SnapRequest<'a> {
    transaction_details: TransactionDetails,
    customer_details: CustomerDetails<'a>,
}

#[derive(Debug, Serialize)]
struct TransactionDetails {
    order_id: String,
    gross_amount: i64,
}

#[derive(Debug, Serialize)]
struct CustomerDetails<'a> {
    first_name: &'a str,
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct SnapResponse {
    #[serde(default)]
    redirect_url: Option<String>,
}

/// Midtrans Snap client.
#[derive(Clone)]
pub struct MidtransGateway {
    client: reqwest::Client,
    base_url: String,
    server_key: String,
}

impl MidtransGateway {
    pub fn new(base_url: &str, server_key: &str, timeout: Duration) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            server_key: server_key.to_owned(),
        })
    }
}

#[async_trait]
impl PaymentGateway for MidtransGateway {
    async fn create_payment_link(&self, request: &PaymentRequest) -> Result<String, PaymentError> {
        let body = SnapRequest {
            transaction_details: TransactionDetails {
                order_id: request.order_id.to_string(),
                gross_amount: request.amount,
            },
            customer_details: CustomerDetails {
                first_name: &request.buyer_name,
                email: &request.buyer_email,
            },
        };

        let response = self
            .client
            .post(format!("{}/snap/v1/transactions", self.base_url))
            .basic_auth(&self.server_key, None::<&str>)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                order_id = request.order_id,
                status = status.as_u16(),
                "Snap rejected payment request"
            );
            return Err(PaymentError::Rejected { status: status.as_u16(), body });
        }

        let snap: SnapResponse = response.json().await?;
        let link = snap
            .redirect_url
            .filter(|url| !url.is_empty())
            .ok_or(PaymentError::MissingLink)?;
        debug!(order_id = request.order_id, "Payment link created");
        Ok(link)
    }
}
