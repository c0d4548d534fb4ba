//! Billing routes: plan catalog, checkout, and the two settlement entrypoints
//!
//! `/billing/verify` is the browser redirect callback (form-encoded, answers
//! with a 303 redirect either way); `/billing/webhook` is the server-to-server
//! push (raw body, signature header, JSON acknowledgment). Both feed the same
//! settlement reconciler.

use axum::{
    extract::State,
    http::HeaderMap,
    response::Redirect,
    Extension, Form, Json,
};
use serde::Deserialize;
use serde_json::json;

use cropsense_billing::{
    BillingError, CallbackOutcome, CallbackParams, CheckoutResponse, Plan, SubscriptionSummary,
};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// List the plan catalog
pub async fn plans(State(state): State<AppState>) -> Json<&'static [Plan]> {
    Json(state.catalog.all())
}

/// Current user's plan and usage for this month
pub async fn my_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<SubscriptionSummary>> {
    Ok(Json(state.quota.summary(auth.user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(rename = "planId")]
    pub plan_id: String,
}

/// Create a gateway order for a plan upgrade
pub async fn create_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    let checkout = state.checkout.create_order(auth.user_id, &req.plan_id).await?;
    Ok(Json(checkout))
}

/// Field names as posted by the Razorpay checkout redirect
#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

fn failure_redirect(frontend: &str, reason: &str) -> Redirect {
    Redirect::to(&format!("{frontend}/payment/failure?reason={reason}"))
}

/// Redirect callback after the user completes (or fails) payment. Every exit
/// is a 303 to the frontend; the reason code is the only diagnostic a user
/// sees.
pub async fn verify(
    State(state): State<AppState>,
    Form(form): Form<VerifyForm>,
) -> ApiResult<Redirect> {
    let params = CallbackParams {
        order_id: form.razorpay_order_id,
        payment_id: form.razorpay_payment_id,
        signature: form.razorpay_signature,
    };

    let frontend = &state.config.frontend_base_url;
    match state.settlement.process_callback(&params).await {
        Ok(CallbackOutcome::Settled { plan_id }) => Ok(Redirect::to(&format!(
            "{frontend}/payment/success?planId={plan_id}"
        ))),
        Ok(CallbackOutcome::Rejected(rejection)) => {
            Ok(failure_redirect(frontend, rejection.reason()))
        }
        // Gateway fetch failure on the fallback path is user-visible as an
        // unresolvable order, not a server error
        Err(BillingError::OrderUnresolvable(_)) => {
            Ok(failure_redirect(frontend, "order_not_found"))
        }
        Err(err) => Err(err.into()),
    }
}

/// Webhook entrypoint. Signature failures are the only errors surfaced to the
/// gateway; business dead-ends are acknowledged so retries stop.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<serde_json::Value>> {
    let signature = headers
        .get("x-razorpay-signature")
        .and_then(|h| h.to_str().ok());

    state
        .settlement
        .process_webhook(body.as_bytes(), signature)
        .await?;

    Ok(Json(json!({ "ok": true })))
}
