//! Razorpay gateway client
//!
//! Thin REST client over the two order endpoints the reconciler needs:
//! create order and fetch order. Authentication is HTTP basic with the key
//! id/secret pair.

use serde::{Deserialize, Serialize};

use crate::error::{BillingError, BillingResult};

const DEFAULT_API_BASE_URL: &str = "https://api.razorpay.com/v1";

/// Razorpay credentials and signing secrets
#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    /// Separate secret for webhook body signatures (server-to-server push);
    /// the key secret signs the per-transaction callback signature.
    pub webhook_secret: String,
    pub api_base_url: String,
}

impl RazorpayConfig {
    /// Load config from environment variables. Missing credentials are
    /// tolerated here; operations that need them fail with
    /// `GatewayMisconfigured` at call time.
    pub fn from_env() -> Self {
        Self {
            key_id: std::env::var("RAZORPAY_KEY_ID").unwrap_or_default(),
            key_secret: std::env::var("RAZORPAY_KEY_SECRET").unwrap_or_default(),
            webhook_secret: std::env::var("RAZORPAY_WEBHOOK_SECRET").unwrap_or_default(),
            api_base_url: std::env::var("RAZORPAY_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
        }
    }
}

/// Order handle as returned by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: Option<String>,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

/// Razorpay billing client
#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    config: RazorpayConfig,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(RazorpayConfig::from_env())
    }

    pub fn config(&self) -> &RazorpayConfig {
        &self.config
    }

    /// Public key material the client needs to open the payment UI
    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    pub fn ensure_configured(&self) -> BillingResult<()> {
        if self.config.key_id.is_empty() || self.config.key_secret.is_empty() {
            return Err(BillingError::GatewayMisconfigured);
        }
        Ok(())
    }

    /// Create a remote order for `amount_paise` with auto-capture enabled
    pub async fn create_order(
        &self,
        amount_paise: i64,
        currency: &str,
        receipt: &str,
    ) -> BillingResult<GatewayOrder> {
        self.ensure_configured()?;

        let body = CreateOrderBody {
            amount: amount_paise,
            currency,
            receipt,
            payment_capture: 1,
        };

        let response = self
            .http
            .post(format!("{}/orders", self.config.api_base_url))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BillingError::Gateway(format!(
                "order create returned {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// Fetch an order by its gateway id. Single best-effort call, no retry;
    /// callers map failure to a redirect or a webhook no-op.
    pub async fn fetch_order(&self, order_id: &str) -> BillingResult<GatewayOrder> {
        self.ensure_configured()?;

        let response = self
            .http
            .get(format!("{}/orders/{}", self.config.api_base_url, order_id))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BillingError::Gateway(format!(
                "order fetch returned {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_client(base_url: String) -> RazorpayClient {
        RazorpayClient::new(RazorpayConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: "secret".to_string(),
            webhook_secret: "whsec".to_string(),
            api_base_url: base_url,
        })
    }

    #[tokio::test]
    async fn test_create_order_parses_handle() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/orders")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"order_abc123","amount":19900,"currency":"INR",
                   "receipt":"u|lite|1700000000","status":"created"}"#,
            )
            .create_async()
            .await;

        let client = test_client(server.url());
        let order = client
            .create_order(19_900, "INR", "u|lite|1700000000")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(order.id, "order_abc123");
        assert_eq!(order.amount, 19_900);
        assert_eq!(order.status.as_deref(), Some("created"));
    }

    #[tokio::test]
    async fn test_fetch_order_not_found_is_gateway_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/orders/order_missing")
            .with_status(404)
            .create_async()
            .await;

        let client = test_client(server.url());
        let err = client.fetch_order("order_missing").await.unwrap_err();
        assert!(matches!(err, BillingError::Gateway(_)));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_closed() {
        let client = RazorpayClient::new(RazorpayConfig {
            key_id: String::new(),
            key_secret: String::new(),
            webhook_secret: String::new(),
            api_base_url: "http://127.0.0.1:1".to_string(),
        });
        assert!(matches!(
            client.create_order(100, "INR", "r").await,
            Err(BillingError::GatewayMisconfigured)
        ));
    }
}
