//! CropSense billing: plans, checkout, payment settlement, and quotas
//!
//! The interesting part of this crate is the settlement reconciler in
//! [`settlement`]: a Razorpay order moves `created -> paid | mismatch`, driven
//! by either a browser redirect callback or an asynchronous webhook, in any
//! order, any number of times. Everything it touches is keyed by a unique
//! constraint and written with atomic upserts, so redundant deliveries are
//! harmless.

pub mod catalog;
pub mod checkout;
pub mod error;
pub mod gateway;
pub mod orders;
pub mod receipt;
pub mod settlement;
pub mod signature;
pub mod subscriptions;
pub mod usage;

pub use catalog::{Plan, PlanCatalog, PlanFeatures, PlanId};
pub use checkout::{CheckoutResponse, CheckoutService};
pub use error::{BillingError, BillingResult};
pub use gateway::{GatewayOrder, RazorpayClient, RazorpayConfig};
pub use orders::{Order, OrderLedger, OrderStatus};
pub use settlement::{
    CallbackOutcome, CallbackParams, CallbackRejection, SettlementService, ACTIVATION_WINDOW_DAYS,
};
pub use subscriptions::{SubscriptionStore, SubscriptionView};
pub use usage::{month_key, QuotaGate, SubscriptionSummary, UsageCounters};
