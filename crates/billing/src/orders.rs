//! Order ledger
//!
//! One row per gateway order id. Status moves forward only:
//! `created -> paid` or `created -> mismatch`; once `paid`, no writer
//! downgrades it. All writes are single-row upserts keyed by `order_id`.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::PlanId;
use crate::error::BillingResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Paid,
    Mismatch,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Paid => "paid",
            OrderStatus::Mismatch => "mismatch",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "paid" => OrderStatus::Paid,
            "mismatch" => OrderStatus::Mismatch,
            // Gateway-echoed statuses like "attempted" count as not yet settled
            _ => OrderStatus::Created,
        }
    }
}

/// A ledger row correlating a gateway order to a user and plan
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub order_id: String,
    pub user_id: Option<Uuid>,
    pub plan_id: Option<String>,
    pub receipt: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub status: OrderStatus,
    pub payment_id: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for Order {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        let status: String = row.try_get("status")?;
        Ok(Self {
            order_id: row.try_get("order_id")?,
            user_id: row.try_get("user_id")?,
            plan_id: row.try_get("plan_id")?,
            receipt: row.try_get("receipt")?,
            amount: row.try_get("amount")?,
            currency: row.try_get("currency")?,
            status: OrderStatus::parse(&status),
            payment_id: row.try_get("payment_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Fields written back when the webhook settles an order it has fully
/// resolved (the callback path only records the payment id).
#[derive(Debug, Clone)]
pub struct SettledDetails {
    pub user_id: Uuid,
    pub plan_id: PlanId,
    pub receipt: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
}

/// Persistence for gateway orders
#[derive(Clone)]
pub struct OrderLedger {
    pool: PgPool,
}

impl OrderLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a freshly created gateway order, echoing the gateway's status
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_created(
        &self,
        order_id: &str,
        user_id: Uuid,
        plan_id: PlanId,
        receipt: &str,
        amount: i64,
        currency: &str,
        gateway_status: &str,
    ) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_id, user_id, plan_id, receipt, amount, currency, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order_id)
        .bind(user_id)
        .bind(plan_id.as_str())
        .bind(receipt)
        .bind(amount)
        .bind(currency)
        .bind(gateway_status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find(&self, order_id: &str) -> BillingResult<Option<Order>> {
        let order: Option<Order> = sqlx::query_as(
            r#"
            SELECT order_id, user_id, plan_id, receipt, amount, currency,
                   status, payment_id, created_at, updated_at
            FROM orders
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Mark an order paid with insert-on-conflict semantics. Fields not known
    /// to the caller are left untouched on an existing row.
    pub async fn upsert_paid(
        &self,
        order_id: &str,
        payment_id: Option<&str>,
        details: Option<&SettledDetails>,
    ) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_id, user_id, plan_id, receipt, amount, currency,
                                status, payment_id)
            VALUES ($1, $2, $3, $4, $5, $6, 'paid', $7)
            ON CONFLICT (order_id) DO UPDATE SET
                status = 'paid',
                payment_id = COALESCE($7, orders.payment_id),
                user_id = COALESCE($2, orders.user_id),
                plan_id = COALESCE($3, orders.plan_id),
                receipt = COALESCE($4, orders.receipt),
                amount = COALESCE($5, orders.amount),
                currency = COALESCE($6, orders.currency),
                updated_at = NOW()
            "#,
        )
        .bind(order_id)
        .bind(details.map(|d| d.user_id))
        .bind(details.map(|d| d.plan_id.as_str()))
        .bind(details.and_then(|d| d.receipt.as_deref()))
        .bind(details.and_then(|d| d.amount))
        .bind(details.and_then(|d| d.currency.as_deref()))
        .bind(payment_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Flag an order whose observed amount disagrees with the plan price.
    /// A row already marked `paid` is never downgraded.
    pub async fn upsert_mismatch(
        &self,
        order_id: &str,
        amount: Option<i64>,
        currency: Option<&str>,
    ) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_id, amount, currency, status)
            VALUES ($1, $2, $3, 'mismatch')
            ON CONFLICT (order_id) DO UPDATE SET
                status = 'mismatch',
                amount = COALESCE($2, orders.amount),
                currency = COALESCE($3, orders.currency),
                updated_at = NOW()
            WHERE orders.status <> 'paid'
            "#,
        )
        .bind(order_id)
        .bind(amount)
        .bind(currency)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
