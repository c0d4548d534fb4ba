//! Checkout orchestration
//!
//! Creates a gateway order tied to the user via a receipt token and records
//! it in the ledger. Deliberately not idempotent: a user may abandon checkout
//! and retry, and each attempt is a distinct order.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::PlanCatalog;
use crate::error::BillingResult;
use crate::gateway::{GatewayOrder, RazorpayClient};
use crate::orders::OrderLedger;
use crate::receipt::build_receipt;

/// What the client needs to open the payment UI. The receipt token stays
/// server-side.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub key_id: String,
    pub order: GatewayOrder,
}

#[derive(Clone)]
pub struct CheckoutService {
    gateway: RazorpayClient,
    catalog: PlanCatalog,
    orders: OrderLedger,
}

impl CheckoutService {
    pub fn new(gateway: RazorpayClient, catalog: PlanCatalog, orders: OrderLedger) -> Self {
        Self {
            gateway,
            catalog,
            orders,
        }
    }

    /// Create a gateway order for the plan's price and persist the ledger row
    pub async fn create_order(
        &self,
        user_id: Uuid,
        plan_id: &str,
    ) -> BillingResult<CheckoutResponse> {
        let plan = self.catalog.resolve(plan_id)?;
        self.gateway.ensure_configured()?;

        let receipt = build_receipt(
            user_id,
            plan.id.as_str(),
            OffsetDateTime::now_utc().unix_timestamp(),
        );

        let order = self
            .gateway
            .create_order(plan.price_paise(), "INR", &receipt)
            .await?;

        self.orders
            .insert_created(
                &order.id,
                user_id,
                plan.id,
                &receipt,
                plan.price_paise(),
                "INR",
                order.status.as_deref().unwrap_or("created"),
            )
            .await?;

        tracing::info!(
            user_id = %user_id,
            order_id = %order.id,
            plan = %plan.id,
            amount_paise = plan.price_paise(),
            "Created checkout order"
        );

        Ok(CheckoutResponse {
            key_id: self.gateway.key_id().to_string(),
            order,
        })
    }
}
