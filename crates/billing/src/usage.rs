//! Usage counters and the quota gate
//!
//! One counter row per `(user, month)`; the month key is a `YYYY-MM` string,
//! so counters "reset" by rollover rather than by mutation. Increments are
//! atomic upserts; the gate's read-then-work-then-increment sequence is
//! deliberately not serialized, so concurrent requests from one user can
//! slip past an exact cap. Accepted weak consistency.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::{PlanCatalog, PlanFeatures, PlanId};
use crate::error::{BillingError, BillingResult};
use crate::subscriptions::SubscriptionStore;

/// Month key (`YYYY-MM`) for the usage-counting period containing `at`
pub fn month_key(at: OffsetDateTime) -> String {
    format!("{:04}-{:02}", at.year(), u8::from(at.month()))
}

fn current_month_key() -> String {
    month_key(OffsetDateTime::now_utc())
}

/// Persistence for per-user-per-month request counters
#[derive(Clone)]
pub struct UsageCounters {
    pool: PgPool,
}

impl UsageCounters {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Count for a given month; absence reads as zero
    pub async fn get(&self, user_id: Uuid, month_key: &str) -> BillingResult<i64> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT count FROM usage_counters WHERE user_id = $1 AND month_key = $2",
        )
        .bind(user_id)
        .bind(month_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(c,)| c).unwrap_or(0))
    }

    /// Atomically increment this month's counter, creating it at zero first
    pub async fn increment(&self, user_id: Uuid, month_key: &str) -> BillingResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO usage_counters (user_id, month_key, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id, month_key) DO UPDATE SET
                count = usage_counters.count + 1
            RETURNING count
            "#,
        )
        .bind(user_id)
        .bind(month_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

/// Plan plus usage, packed for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionSummary {
    #[serde(rename = "planId")]
    pub plan_id: PlanId,
    pub monthly_quota: i64,
    pub used: i64,
    pub remaining: i64,
    pub features: PlanFeatures,
    #[serde(rename = "validTill", with = "time::serde::rfc3339::option")]
    pub valid_till: Option<OffsetDateTime>,
}

/// Check-and-increment guard limiting metered requests per user per month
#[derive(Clone)]
pub struct QuotaGate {
    subscriptions: SubscriptionStore,
    usage: UsageCounters,
    catalog: PlanCatalog,
}

impl QuotaGate {
    pub fn new(
        subscriptions: SubscriptionStore,
        usage: UsageCounters,
        catalog: PlanCatalog,
    ) -> Self {
        Self {
            subscriptions,
            usage,
            catalog,
        }
    }

    /// Permit or deny a metered request. Callers perform the metered work
    /// only on `Ok` and then call [`QuotaGate::record_use`] on success.
    pub async fn check(&self, user_id: Uuid) -> BillingResult<&'static crate::catalog::Plan> {
        let (plan, _view) = self.subscriptions.resolve_plan(user_id, &self.catalog).await?;
        let used = self.usage.get(user_id, &current_month_key()).await?;

        if used >= plan.monthly_quota {
            tracing::info!(
                user_id = %user_id,
                plan = %plan.id,
                used = used,
                quota = plan.monthly_quota,
                "Metered request denied"
            );
            return Err(BillingError::QuotaExceeded {
                plan: plan.id.to_string(),
                used,
                quota: plan.monthly_quota,
            });
        }

        Ok(plan)
    }

    /// Consume one unit of this month's quota after successful metered work
    pub async fn record_use(&self, user_id: Uuid) -> BillingResult<i64> {
        self.usage.increment(user_id, &current_month_key()).await
    }

    /// Plan + usage summary for the current month
    pub async fn summary(&self, user_id: Uuid) -> BillingResult<SubscriptionSummary> {
        let (plan, view) = self.subscriptions.resolve_plan(user_id, &self.catalog).await?;
        let used = self.usage.get(user_id, &current_month_key()).await?;

        Ok(SubscriptionSummary {
            plan_id: plan.id,
            monthly_quota: plan.monthly_quota,
            used,
            remaining: (plan.monthly_quota - used).max(0),
            features: plan.features,
            valid_till: view.valid_till,
        })
    }
}
