//! Billing error types

use thiserror::Error;

/// Billing-specific errors
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Unknown plan: {0}")]
    UnknownPlan(String),

    #[error("Payment gateway credentials not configured")]
    GatewayMisconfigured,

    #[error("Gateway API error: {0}")]
    Gateway(String),

    #[error("Signature verification failed")]
    InvalidSignature,

    #[error("Order could not be resolved: {0}")]
    OrderUnresolvable(String),

    #[error("Monthly quota exceeded: {used}/{quota} requests on plan {plan}")]
    QuotaExceeded { plan: String, used: i64, quota: i64 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for BillingError {
    fn from(err: reqwest::Error) -> Self {
        BillingError::Gateway(err.to_string())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
