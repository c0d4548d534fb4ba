//! Settlement reconciliation
//!
//! Two independent entry points drive the same `created -> paid | mismatch`
//! transition: the browser redirect callback and the gateway webhook. Neither
//! ordering between them is assumed; both must be safe to run zero, one, or
//! many times. Activation is idempotent (a repeat restarts the 30-day window,
//! it never shortens access), so the callback path activates unconditionally
//! on every valid call, while the webhook path short-circuits on an
//! already-paid order to stay safe against gateway redelivery.
//!
//! The two paths verify different signatures with different secrets: the
//! callback authenticates a per-transaction signature over
//! `order_id|payment_id`, the webhook a persistent shared secret over the
//! exact raw body bytes.

use serde::Deserialize;
use uuid::Uuid;

use crate::catalog::{Plan, PlanCatalog, PlanId};
use crate::error::{BillingError, BillingResult};
use crate::gateway::RazorpayClient;
use crate::orders::{Order, OrderLedger, OrderStatus, SettledDetails};
use crate::receipt::parse_receipt;
use crate::signature::{verify_payment_signature, verify_webhook_signature};
use crate::subscriptions::SubscriptionStore;

/// Paid-access window granted per settlement
pub const ACTIVATION_WINDOW_DAYS: i64 = 30;

/// Allowed drift between observed and expected amount, in paise
const AMOUNT_TOLERANCE_PAISE: i64 = 50;

/// Fields carried by the redirect callback from the payment UI
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// Machine-readable rejection reasons for the failure redirect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackRejection {
    InvalidSignature,
    OrderNotFound,
    PlanOrUserMissing,
}

impl CallbackRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            CallbackRejection::InvalidSignature => "invalid_signature",
            CallbackRejection::OrderNotFound => "order_not_found",
            CallbackRejection::PlanOrUserMissing => "plan_or_user_missing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Settled { plan_id: PlanId },
    Rejected(CallbackRejection),
}

// Webhook payload shapes. Fields are all optional up front; resolution fails
// closed (webhook no-op) when required correlation data is missing.

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(default)]
    event: String,
    #[serde(default)]
    payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPayload {
    payment: Option<Entity<PaymentEntity>>,
    order: Option<Entity<OrderEntity>>,
}

#[derive(Debug, Deserialize)]
struct Entity<T> {
    entity: Option<T>,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: Option<String>,
    order_id: Option<String>,
    amount: Option<i64>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderEntity {
    id: Option<String>,
    amount: Option<i64>,
    currency: Option<String>,
}

/// Payment facts extracted from a webhook, payment entity preferred with the
/// order entity as fallback for each field
#[derive(Debug, Default, PartialEq)]
struct WebhookFacts {
    order_id: Option<String>,
    payment_id: Option<String>,
    amount: Option<i64>,
    currency: Option<String>,
}

fn extract_facts(envelope: &WebhookEnvelope) -> WebhookFacts {
    let payment = envelope
        .payload
        .payment
        .as_ref()
        .and_then(|e| e.entity.as_ref());
    let order = envelope
        .payload
        .order
        .as_ref()
        .and_then(|e| e.entity.as_ref());

    WebhookFacts {
        order_id: payment
            .and_then(|p| p.order_id.clone())
            .or_else(|| order.and_then(|o| o.id.clone())),
        payment_id: payment.and_then(|p| p.id.clone()),
        amount: payment
            .and_then(|p| p.amount)
            .or_else(|| order.and_then(|o| o.amount)),
        currency: payment
            .and_then(|p| p.currency.clone())
            .or_else(|| order.and_then(|o| o.currency.clone()))
            .or_else(|| Some("INR".to_string())),
    }
}

/// Resolve the settling user and plan, preferring values already stored on
/// the ledger row over segments parsed from the receipt token.
fn resolve_parties(
    existing: Option<&Order>,
    receipt: Option<&str>,
) -> (Option<Uuid>, Option<String>) {
    let stored_user = existing.and_then(|o| o.user_id);
    let stored_plan = existing.and_then(|o| o.plan_id.clone());

    let parsed = receipt.and_then(parse_receipt);
    let user = stored_user.or(parsed.map(|(u, _)| u));
    let plan = stored_plan.or(parsed.map(|(_, p)| p.to_string()));

    (user, plan)
}

/// Whether the observed amount is consistent with the plan price. The check
/// only fires when the plan actually costs something, an amount was observed,
/// and the currency is INR; anything else passes through (flagging unpriced
/// or foreign-currency events is out of scope for this gate).
fn amount_consistent(plan: &Plan, amount: Option<i64>, currency: Option<&str>) -> bool {
    let expected = plan.price_paise();
    if expected <= 0 || currency != Some("INR") {
        return true;
    }
    match amount {
        Some(observed) => (observed - expected).abs() <= AMOUNT_TOLERANCE_PAISE,
        None => true,
    }
}

/// The settlement state machine
#[derive(Clone)]
pub struct SettlementService {
    gateway: RazorpayClient,
    catalog: PlanCatalog,
    orders: OrderLedger,
    subscriptions: SubscriptionStore,
}

impl SettlementService {
    pub fn new(
        gateway: RazorpayClient,
        catalog: PlanCatalog,
        orders: OrderLedger,
        subscriptions: SubscriptionStore,
    ) -> Self {
        Self {
            gateway,
            catalog,
            orders,
            subscriptions,
        }
    }

    /// Redirect-callback path. Rejections carry the reason for the failure
    /// redirect and guarantee no state was mutated.
    pub async fn process_callback(&self, params: &CallbackParams) -> BillingResult<CallbackOutcome> {
        if !verify_payment_signature(
            &self.gateway.config().key_secret,
            &params.order_id,
            &params.payment_id,
            &params.signature,
        ) {
            tracing::warn!(order_id = %params.order_id, "Callback signature rejected");
            return Ok(CallbackOutcome::Rejected(CallbackRejection::InvalidSignature));
        }

        let existing = self.orders.find(&params.order_id).await?;
        let (mut user_id, mut plan_id) =
            resolve_parties(existing.as_ref(), existing.as_ref().and_then(|o| o.receipt.as_deref()));

        // Fall back to the gateway's copy of the receipt when the ledger row
        // is missing or incomplete.
        if user_id.is_none() || plan_id.is_none() {
            match self.gateway.fetch_order(&params.order_id).await {
                Ok(remote) => {
                    if let Some((u, p)) = remote.receipt.as_deref().and_then(parse_receipt) {
                        user_id = user_id.or(Some(u));
                        plan_id = plan_id.or(Some(p.to_string()));
                    }
                }
                Err(err) => {
                    tracing::warn!(order_id = %params.order_id, error = %err, "Gateway order fetch failed");
                    return Ok(CallbackOutcome::Rejected(CallbackRejection::OrderNotFound));
                }
            }
        }

        let (Some(user_id), Some(plan_id)) = (user_id, plan_id) else {
            return Ok(CallbackOutcome::Rejected(CallbackRejection::PlanOrUserMissing));
        };
        let Ok(plan) = self.catalog.resolve(&plan_id) else {
            return Ok(CallbackOutcome::Rejected(CallbackRejection::PlanOrUserMissing));
        };

        // No already-paid short-circuit on this path: a browser redirect
        // fires at most once per user action, and Activate tolerates repeats.
        self.subscriptions
            .activate(user_id, plan.id, ACTIVATION_WINDOW_DAYS)
            .await?;
        self.orders
            .upsert_paid(&params.order_id, Some(&params.payment_id), None)
            .await?;

        tracing::info!(
            order_id = %params.order_id,
            user_id = %user_id,
            plan = %plan.id,
            "Order settled via callback"
        );

        Ok(CallbackOutcome::Settled { plan_id: plan.id })
    }

    /// Webhook path. Returns `InvalidSignature` for authentication failures
    /// (the gateway should retry those); every business-level dead end is a
    /// successful no-op, because redelivery cannot fix unresolvable data.
    pub async fn process_webhook(&self, body: &[u8], signature: Option<&str>) -> BillingResult<()> {
        let secret = &self.gateway.config().webhook_secret;
        if secret.is_empty() {
            return Err(BillingError::GatewayMisconfigured);
        }
        let verified = signature
            .map(|sig| verify_webhook_signature(secret, body, sig))
            .unwrap_or(false);
        if !verified {
            tracing::warn!("Webhook signature rejected");
            return Err(BillingError::InvalidSignature);
        }

        let Ok(envelope) = serde_json::from_slice::<WebhookEnvelope>(body) else {
            tracing::warn!("Unparseable webhook body acknowledged as no-op");
            return Ok(());
        };
        if !matches!(envelope.event.as_str(), "payment.captured" | "order.paid") {
            return Ok(());
        }

        let mut facts = extract_facts(&envelope);
        let Some(order_id) = facts.order_id.clone() else {
            return Ok(());
        };

        let existing = self.orders.find(&order_id).await?;
        if existing.as_ref().map(|o| o.status) == Some(OrderStatus::Paid) {
            // Redelivery of a settled order; the one short-circuit in the system.
            tracing::info!(order_id = %order_id, "Webhook for already-paid order ignored");
            return Ok(());
        }

        let mut receipt = existing.as_ref().and_then(|o| o.receipt.clone());
        if receipt.is_none() {
            match self.gateway.fetch_order(&order_id).await {
                Ok(remote) => {
                    receipt = remote.receipt;
                    facts.amount = facts.amount.or(Some(remote.amount));
                    facts.currency = facts.currency.or(Some(remote.currency));
                }
                Err(err) => {
                    tracing::warn!(order_id = %order_id, error = %err, "Gateway order fetch failed; acknowledging");
                    return Ok(());
                }
            }
        }

        let (user_id, plan_id) = resolve_parties(existing.as_ref(), receipt.as_deref());
        let (Some(user_id), Some(plan_id)) = (user_id, plan_id) else {
            return Ok(());
        };
        let Ok(plan) = self.catalog.resolve(&plan_id) else {
            return Ok(());
        };

        if !amount_consistent(plan, facts.amount, facts.currency.as_deref()) {
            tracing::warn!(
                order_id = %order_id,
                observed = ?facts.amount,
                expected = plan.price_paise(),
                "Amount mismatch; order flagged for review"
            );
            self.orders
                .upsert_mismatch(&order_id, facts.amount, facts.currency.as_deref())
                .await?;
            return Ok(());
        }

        self.subscriptions
            .activate(user_id, plan.id, ACTIVATION_WINDOW_DAYS)
            .await?;
        self.orders
            .upsert_paid(
                &order_id,
                facts.payment_id.as_deref(),
                Some(&SettledDetails {
                    user_id,
                    plan_id: plan.id,
                    receipt,
                    amount: facts.amount,
                    currency: facts.currency.clone(),
                }),
            )
            .await?;

        tracing::info!(
            order_id = %order_id,
            user_id = %user_id,
            plan = %plan.id,
            "Order settled via webhook"
        );

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn envelope(json: &str) -> WebhookEnvelope {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_extract_prefers_payment_entity() {
        let env = envelope(
            r#"{
                "event": "payment.captured",
                "payload": {
                    "payment": {"entity": {"id": "pay_1", "order_id": "order_1",
                                           "amount": 19900, "currency": "INR"}},
                    "order": {"entity": {"id": "order_other", "amount": 1,
                                         "currency": "USD"}}
                }
            }"#,
        );
        let facts = extract_facts(&env);
        assert_eq!(facts.order_id.as_deref(), Some("order_1"));
        assert_eq!(facts.payment_id.as_deref(), Some("pay_1"));
        assert_eq!(facts.amount, Some(19_900));
        assert_eq!(facts.currency.as_deref(), Some("INR"));
    }

    #[test]
    fn test_extract_falls_back_to_order_entity() {
        let env = envelope(
            r#"{
                "event": "order.paid",
                "payload": {
                    "order": {"entity": {"id": "order_2", "amount": 49900}}
                }
            }"#,
        );
        let facts = extract_facts(&env);
        assert_eq!(facts.order_id.as_deref(), Some("order_2"));
        assert_eq!(facts.payment_id, None);
        assert_eq!(facts.amount, Some(49_900));
        // Missing currency defaults to INR
        assert_eq!(facts.currency.as_deref(), Some("INR"));
    }

    #[test]
    fn test_extract_tolerates_empty_payload() {
        let facts = extract_facts(&envelope(r#"{"event": "payment.captured"}"#));
        assert_eq!(facts.order_id, None);
    }

    #[test]
    fn test_amount_consistency_tolerance() {
        let catalog = PlanCatalog;
        let lite = catalog.get(PlanId::Lite); // 19900 paise

        assert!(amount_consistent(lite, Some(19_900), Some("INR")));
        assert!(amount_consistent(lite, Some(19_950), Some("INR")));
        assert!(amount_consistent(lite, Some(19_850), Some("INR")));
        assert!(!amount_consistent(lite, Some(19_951), Some("INR")));
        assert!(!amount_consistent(lite, Some(15_000), Some("INR")));
    }

    #[test]
    fn test_amount_check_skips_free_missing_and_foreign() {
        let catalog = PlanCatalog;
        let free = catalog.get(PlanId::Free);
        let lite = catalog.get(PlanId::Lite);

        assert!(amount_consistent(free, Some(1), Some("INR")));
        assert!(amount_consistent(lite, None, Some("INR")));
        assert!(amount_consistent(lite, Some(1), Some("USD")));
        assert!(amount_consistent(lite, Some(1), None));
    }

    #[test]
    fn test_resolve_parties_prefers_ledger_row() {
        let stored_user = Uuid::new_v4();
        let receipt_user = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let order = Order {
            order_id: "order_1".to_string(),
            user_id: Some(stored_user),
            plan_id: Some("pro".to_string()),
            receipt: None,
            amount: None,
            currency: None,
            status: OrderStatus::Created,
            payment_id: None,
            created_at: now,
            updated_at: now,
        };
        let receipt = format!("{}|lite|1700000000", receipt_user);

        let (user, plan) = resolve_parties(Some(&order), Some(&receipt));
        assert_eq!(user, Some(stored_user));
        assert_eq!(plan.as_deref(), Some("pro"));
    }

    #[test]
    fn test_resolve_parties_from_receipt_alone() {
        let receipt_user = Uuid::new_v4();
        let receipt = format!("{}|lite|1700000000", receipt_user);

        let (user, plan) = resolve_parties(None, Some(&receipt));
        assert_eq!(user, Some(receipt_user));
        assert_eq!(plan.as_deref(), Some("lite"));

        let (user, plan) = resolve_parties(None, None);
        assert_eq!(user, None);
        assert_eq!(plan, None);
    }

    #[test]
    fn test_rejection_reasons_are_stable() {
        assert_eq!(CallbackRejection::InvalidSignature.reason(), "invalid_signature");
        assert_eq!(CallbackRejection::OrderNotFound.reason(), "order_not_found");
        assert_eq!(
            CallbackRejection::PlanOrUserMissing.reason(),
            "plan_or_user_missing"
        );
    }
}
