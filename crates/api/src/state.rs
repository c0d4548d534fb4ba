//! Shared application state

use std::sync::Arc;

use cropsense_billing::{
    CheckoutService, OrderLedger, PlanCatalog, QuotaGate, RazorpayClient, SettlementService,
    SubscriptionStore, UsageCounters,
};
use cropsense_engine::Enricher;
use sqlx::PgPool;

use crate::auth::JwtManager;
use crate::config::Config;

/// Application state shared with all request handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: JwtManager,
    pub http: reqwest::Client,
    pub catalog: PlanCatalog,
    pub subscriptions: SubscriptionStore,
    pub quota: QuotaGate,
    pub checkout: CheckoutService,
    pub settlement: SettlementService,
    pub enricher: Arc<dyn Enricher>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: Config,
        gateway: RazorpayClient,
        enricher: Arc<dyn Enricher>,
    ) -> Self {
        let jwt = JwtManager::new(&config.jwt_secret, config.jwt_expiry_days);
        let catalog = PlanCatalog;
        let orders = OrderLedger::new(pool.clone());
        let subscriptions = SubscriptionStore::new(pool.clone());
        let usage = UsageCounters::new(pool.clone());
        let quota = QuotaGate::new(subscriptions.clone(), usage, catalog);
        let checkout = CheckoutService::new(gateway.clone(), catalog, orders.clone());
        let settlement = SettlementService::new(gateway, catalog, orders, subscriptions.clone());

        Self {
            pool,
            config: Arc::new(config),
            jwt,
            http: reqwest::Client::new(),
            catalog,
            subscriptions,
            quota,
            checkout,
            settlement,
            enricher,
        }
    }
}
