//! Integration tests for payment settlement against a real Postgres database.
//!
//! The callback and webhook can arrive in either order, any number of times;
//! these tests pin down the reconciler's end state for the interesting
//! interleavings.
//!
//! Run with a disposable database:
//! ```bash
//! export DATABASE_URL="postgres://localhost/cropsense_test"
//! cargo test -p cropsense-billing --test settlement -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::PgPool;
use uuid::Uuid;

use cropsense_billing::{
    BillingError, CallbackOutcome, CallbackParams, OrderLedger, OrderStatus, PlanCatalog, PlanId,
    QuotaGate, RazorpayClient, RazorpayConfig, SettlementService, SubscriptionStore, UsageCounters,
};

const KEY_SECRET: &str = "test_key_secret";
const WEBHOOK_SECRET: &str = "test_webhook_secret";

type HmacSha256 = Hmac<Sha256>;

fn sign(secret: &str, message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

fn callback_signature(order_id: &str, payment_id: &str) -> String {
    sign(KEY_SECRET, format!("{order_id}|{payment_id}").as_bytes())
}

fn webhook_body(event: &str, order_id: &str, payment_id: &str, amount: i64) -> String {
    serde_json::json!({
        "event": event,
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "order_id": order_id,
                    "amount": amount,
                    "currency": "INR"
                }
            }
        }
    })
    .to_string()
}

struct Harness {
    pool: PgPool,
    settlement: SettlementService,
    orders: OrderLedger,
    subscriptions: SubscriptionStore,
}

async fn setup(api_base_url: &str) -> Harness {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");
    let pool = cropsense_shared::create_pool(&database_url)
        .await
        .expect("Failed to connect to test database");
    cropsense_shared::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let gateway = RazorpayClient::new(RazorpayConfig {
        key_id: "rzp_test_key".to_string(),
        key_secret: KEY_SECRET.to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        api_base_url: api_base_url.to_string(),
    });
    let orders = OrderLedger::new(pool.clone());
    let subscriptions = SubscriptionStore::new(pool.clone());
    let settlement = SettlementService::new(
        gateway,
        PlanCatalog,
        orders.clone(),
        subscriptions.clone(),
    );

    Harness {
        pool,
        settlement,
        orders,
        subscriptions,
    }
}

async fn create_user(pool: &PgPool) -> Uuid {
    let user_id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email) VALUES ($1, $2)")
        .bind(user_id)
        .bind(format!("test-{user_id}@example.com"))
        .execute(pool)
        .await
        .expect("Failed to create test user");
    user_id
}

/// Seed a `created` ledger row the way checkout would
async fn create_order(h: &Harness, user_id: Uuid, plan_id: PlanId, amount: i64) -> String {
    let order_id = format!("order_test_{}", Uuid::new_v4().simple());
    let receipt = format!("{user_id}|{plan_id}|1700000000");
    h.orders
        .insert_created(&order_id, user_id, plan_id, &receipt, amount, "INR", "created")
        .await
        .expect("Failed to insert order");
    order_id
}

async fn order_status(h: &Harness, order_id: &str) -> OrderStatus {
    h.orders
        .find(order_id)
        .await
        .expect("Order lookup failed")
        .expect("Order missing")
        .status
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_callback_then_webhook_settles_once() {
    let h = setup("http://127.0.0.1:1").await;
    let user_id = create_user(&h.pool).await;
    let order_id = create_order(&h, user_id, PlanId::Lite, 19_900).await;

    let params = CallbackParams {
        order_id: order_id.clone(),
        payment_id: "pay_cb_1".to_string(),
        signature: callback_signature(&order_id, "pay_cb_1"),
    };
    let outcome = h.settlement.process_callback(&params).await.unwrap();
    assert_eq!(outcome, CallbackOutcome::Settled { plan_id: PlanId::Lite });
    assert_eq!(order_status(&h, &order_id).await, OrderStatus::Paid);

    let view = h.subscriptions.resolve(user_id).await.unwrap();
    assert_eq!(view.plan_id, PlanId::Lite);
    assert!(view.active);
    let first_valid_till = view.valid_till;

    // Late webhook for the same order is an acknowledged no-op
    let body = webhook_body("payment.captured", &order_id, "pay_wh_1", 19_900);
    let sig = sign(WEBHOOK_SECRET, body.as_bytes());
    h.settlement
        .process_webhook(body.as_bytes(), Some(&sig))
        .await
        .unwrap();

    let order = h.orders.find(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    // Short-circuited: the callback's payment id was not overwritten
    assert_eq!(order.payment_id.as_deref(), Some("pay_cb_1"));
    let view = h.subscriptions.resolve(user_id).await.unwrap();
    assert_eq!(view.valid_till, first_valid_till);
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_webhook_then_callback_settles_once() {
    let h = setup("http://127.0.0.1:1").await;
    let user_id = create_user(&h.pool).await;
    let order_id = create_order(&h, user_id, PlanId::Pro, 49_900).await;

    let body = webhook_body("payment.captured", &order_id, "pay_wh_2", 49_900);
    let sig = sign(WEBHOOK_SECRET, body.as_bytes());
    h.settlement
        .process_webhook(body.as_bytes(), Some(&sig))
        .await
        .unwrap();

    assert_eq!(order_status(&h, &order_id).await, OrderStatus::Paid);
    let view = h.subscriptions.resolve(user_id).await.unwrap();
    assert_eq!(view.plan_id, PlanId::Pro);
    assert!(view.active);

    // Callback arrives after; it re-activates (idempotent) and stays settled
    let params = CallbackParams {
        order_id: order_id.clone(),
        payment_id: "pay_cb_2".to_string(),
        signature: callback_signature(&order_id, "pay_cb_2"),
    };
    let outcome = h.settlement.process_callback(&params).await.unwrap();
    assert_eq!(outcome, CallbackOutcome::Settled { plan_id: PlanId::Pro });
    assert_eq!(order_status(&h, &order_id).await, OrderStatus::Paid);
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_webhook_redelivery_is_idempotent() {
    let h = setup("http://127.0.0.1:1").await;
    let user_id = create_user(&h.pool).await;
    let order_id = create_order(&h, user_id, PlanId::Lite, 19_900).await;

    let body = webhook_body("payment.captured", &order_id, "pay_wh_3", 19_900);
    let sig = sign(WEBHOOK_SECRET, body.as_bytes());

    for _ in 0..3 {
        h.settlement
            .process_webhook(body.as_bytes(), Some(&sig))
            .await
            .unwrap();
    }

    assert_eq!(order_status(&h, &order_id).await, OrderStatus::Paid);
    let view = h.subscriptions.resolve(user_id).await.unwrap();
    assert_eq!(view.plan_id, PlanId::Lite);
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_tampered_callback_signature_mutates_nothing() {
    let h = setup("http://127.0.0.1:1").await;
    let user_id = create_user(&h.pool).await;
    let order_id = create_order(&h, user_id, PlanId::Lite, 19_900).await;

    let params = CallbackParams {
        order_id: order_id.clone(),
        payment_id: "pay_cb_4".to_string(),
        signature: callback_signature(&order_id, "pay_something_else"),
    };
    let outcome = h.settlement.process_callback(&params).await.unwrap();
    assert!(matches!(outcome, CallbackOutcome::Rejected(_)));

    assert_eq!(order_status(&h, &order_id).await, OrderStatus::Created);
    let view = h.subscriptions.resolve(user_id).await.unwrap();
    assert_eq!(view.plan_id, PlanId::Free);
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_tampered_webhook_signature_is_an_error() {
    let h = setup("http://127.0.0.1:1").await;
    let user_id = create_user(&h.pool).await;
    let order_id = create_order(&h, user_id, PlanId::Lite, 19_900).await;

    let body = webhook_body("payment.captured", &order_id, "pay_wh_5", 19_900);
    let result = h
        .settlement
        .process_webhook(body.as_bytes(), Some("deadbeef"))
        .await;
    assert!(matches!(result, Err(BillingError::InvalidSignature)));
    assert_eq!(order_status(&h, &order_id).await, OrderStatus::Created);
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_amount_mismatch_never_activates() {
    let h = setup("http://127.0.0.1:1").await;
    let user_id = create_user(&h.pool).await;
    let order_id = create_order(&h, user_id, PlanId::Pro, 49_900).await;

    // Underpaid by far more than the tolerance
    let body = webhook_body("payment.captured", &order_id, "pay_wh_6", 100);
    let sig = sign(WEBHOOK_SECRET, body.as_bytes());
    h.settlement
        .process_webhook(body.as_bytes(), Some(&sig))
        .await
        .unwrap();

    assert_eq!(order_status(&h, &order_id).await, OrderStatus::Mismatch);
    let view = h.subscriptions.resolve(user_id).await.unwrap();
    assert_eq!(view.plan_id, PlanId::Free);

    // A correct redelivery can still settle the flagged order
    let body = webhook_body("payment.captured", &order_id, "pay_wh_6", 49_900);
    let sig = sign(WEBHOOK_SECRET, body.as_bytes());
    h.settlement
        .process_webhook(body.as_bytes(), Some(&sig))
        .await
        .unwrap();
    assert_eq!(order_status(&h, &order_id).await, OrderStatus::Paid);
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_callback_recovers_parties_from_gateway_receipt() {
    // Order unknown to the local ledger; the reconciler falls back to the
    // gateway's copy and parses its receipt token.
    let mut server = mockito::Server::new_async().await;
    let h = setup(&server.url()).await;
    let user_id = create_user(&h.pool).await;
    let order_id = format!("order_remote_{}", Uuid::new_v4().simple());

    server
        .mock("GET", format!("/orders/{order_id}").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!({
                "id": order_id,
                "amount": 19_900,
                "currency": "INR",
                "receipt": format!("{user_id}|lite|1700000000"),
                "status": "paid"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let params = CallbackParams {
        order_id: order_id.clone(),
        payment_id: "pay_cb_7".to_string(),
        signature: callback_signature(&order_id, "pay_cb_7"),
    };
    let outcome = h.settlement.process_callback(&params).await.unwrap();
    assert_eq!(outcome, CallbackOutcome::Settled { plan_id: PlanId::Lite });

    let view = h.subscriptions.resolve(user_id).await.unwrap();
    assert_eq!(view.plan_id, PlanId::Lite);
    assert_eq!(order_status(&h, &order_id).await, OrderStatus::Paid);
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_free_plan_quota_denies_second_request() {
    let h = setup("http://127.0.0.1:1").await;
    let user_id = create_user(&h.pool).await;
    h.subscriptions.ensure_free(user_id).await.unwrap();

    let quota = QuotaGate::new(
        h.subscriptions.clone(),
        UsageCounters::new(h.pool.clone()),
        PlanCatalog,
    );

    // Free tier: one metered request per month
    quota.check(user_id).await.unwrap();
    quota.record_use(user_id).await.unwrap();

    let denied = quota.check(user_id).await;
    assert!(matches!(
        denied,
        Err(BillingError::QuotaExceeded { used: 1, quota: 1, .. })
    ));
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_activation_window_resets_from_latest_call() {
    let h = setup("http://127.0.0.1:1").await;
    let user_id = create_user(&h.pool).await;

    h.subscriptions
        .activate(user_id, PlanId::Lite, 30)
        .await
        .unwrap();
    let first = h.subscriptions.resolve(user_id).await.unwrap().valid_till;

    h.subscriptions
        .activate(user_id, PlanId::Lite, 30)
        .await
        .unwrap();
    let second = h.subscriptions.resolve(user_id).await.unwrap().valid_till;

    // Windows do not stack; the latest call wins
    assert!(second >= first);
    let view = h.subscriptions.resolve(user_id).await.unwrap();
    assert_eq!(view.plan_id, PlanId::Lite);
    assert!(view.active);
}
