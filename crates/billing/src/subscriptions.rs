//! Subscription store
//!
//! At most one subscription row per user; absence of a row is an implicit
//! active free subscription. Rows are created idempotently at registration
//! and mutated only by settlement's Activate.

use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::catalog::{PlanCatalog, PlanId};
use crate::error::BillingResult;

/// Resolved view of a user's subscription. Always well-defined: missing or
/// inactive rows resolve to the free tier instead of leaking nullable lookups
/// into call sites.
#[derive(Debug, Clone)]
pub struct SubscriptionView {
    pub plan_id: PlanId,
    pub active: bool,
    pub valid_till: Option<OffsetDateTime>,
}

impl SubscriptionView {
    fn free() -> Self {
        Self {
            plan_id: PlanId::Free,
            active: true,
            valid_till: None,
        }
    }
}

/// Persistence for per-user plan records
#[derive(Clone)]
pub struct SubscriptionStore {
    pool: PgPool,
}

impl SubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a free subscription on first registration (idempotent)
    pub async fn ensure_free(&self, user_id: Uuid) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, plan_id, active, valid_till)
            VALUES ($1, 'free', TRUE, NULL)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Resolve the user's current subscription to a well-defined record
    pub async fn resolve(&self, user_id: Uuid) -> BillingResult<SubscriptionView> {
        let row: Option<(String, bool, Option<OffsetDateTime>)> = sqlx::query_as(
            "SELECT plan_id, active, valid_till FROM subscriptions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((plan_id, active, valid_till)) = row else {
            return Ok(SubscriptionView::free());
        };
        if !active {
            return Ok(SubscriptionView::free());
        }
        // A stored plan id outside the catalog degrades to free rather than
        // failing the request.
        let plan_id = PlanId::parse(&plan_id).unwrap_or(PlanId::Free);

        Ok(SubscriptionView {
            plan_id,
            active: true,
            valid_till,
        })
    }

    /// Idempotent activation: set the plan and restart the validity window
    /// from now. Repeated calls extend paid access; they never shorten it,
    /// and renewal periods do not stack.
    pub async fn activate(
        &self,
        user_id: Uuid,
        plan_id: PlanId,
        window_days: i64,
    ) -> BillingResult<()> {
        let valid_till = OffsetDateTime::now_utc() + Duration::days(window_days);

        sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, plan_id, active, valid_till)
            VALUES ($1, $2, TRUE, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                plan_id = $2,
                active = TRUE,
                valid_till = $3,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(plan_id.as_str())
        .bind(valid_till)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            user_id = %user_id,
            plan = %plan_id,
            valid_till = %valid_till,
            "Subscription activated"
        );

        Ok(())
    }

    /// Plan record for the user's resolved subscription
    pub async fn resolve_plan(
        &self,
        user_id: Uuid,
        catalog: &PlanCatalog,
    ) -> BillingResult<(&'static crate::catalog::Plan, SubscriptionView)> {
        let view = self.resolve(user_id).await?;
        Ok((catalog.get(view.plan_id), view))
    }
}
