#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use orm_vs_sql::{
    config::AppConfig,
    db,
    entities::{category, order, order_item, product, user},
    services::seeder::{self, SeedConfig, SeedOutcome},
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_DELAY: Duration = Duration::from_secs(2);

/// Connects with a bounded number of retries, for stores that may still be
/// starting up.
pub async fn connect_with_retry(cfg: &AppConfig) -> db::DbPool {
    let mut last_err = None;
    for attempt in 1..=CONNECT_ATTEMPTS {
        match db::establish_connection_from_app_config(cfg).await {
            Ok(pool) => match db::check_connection(&pool).await {
                Ok(()) => return pool,
                Err(e) => last_err = Some(e),
            },
            Err(e) => last_err = Some(e),
        }
        if attempt < CONNECT_ATTEMPTS {
            tokio::time::sleep(CONNECT_DELAY).await;
        }
    }
    panic!("database not reachable: {:?}", last_err);
}

/// Application router over a fresh, migrated SQLite file in a temp dir.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    /// Migrated but empty store.
    pub async fn new() -> Self {
        Self::with_environment("test").await
    }

    pub async fn with_environment(environment: &str) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("orders.db").display());

        let mut cfg = AppConfig::new(url, "127.0.0.1".to_string(), 0, environment.to_string());
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.seed_rng_seed = Some(7);

        let pool = connect_with_retry(&cfg).await;
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = orm_vs_sql::app_router(state.clone());

        Self {
            router,
            state,
            _dir: dir,
        }
    }

    /// Store populated by the default seeder.
    pub async fn seeded() -> Self {
        let app = Self::new().await;
        let outcome = app.seed().await;
        assert!(matches!(outcome, SeedOutcome::Seeded(_)));
        app
    }

    pub fn db(&self) -> &db::DbPool {
        &self.state.db
    }

    pub async fn seed(&self) -> SeedOutcome {
        let config = SeedConfig::default().with_rng_seed(self.state.config.seed_rng_seed);
        seeder::seed(self.db(), &config)
            .await
            .expect("seeding failed")
    }

    pub async fn request(&self, method: Method, uri: &str) -> axum::response::Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let response = self.request(Method::GET, uri).await;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn insert_user(&self, name: &str) -> user::Model {
        user::ActiveModel {
            name: Set(name.to_string()),
            email: Set(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("insert user")
    }

    pub async fn insert_product(&self, name: &str, price: Decimal) -> product::Model {
        let category = category::ActiveModel {
            name: Set(format!("{name} category")),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("insert category");

        product::ActiveModel {
            name: Set(name.to_string()),
            price: Set(price),
            category_id: Set(category.id),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("insert product")
    }

    /// Inserts an order with `(product, quantity)` lines priced at the
    /// product's current price.
    pub async fn insert_order(
        &self,
        user: &user::Model,
        created_at: DateTime<Utc>,
        lines: &[(&product::Model, i32)],
    ) -> order::Model {
        let saved = order::ActiveModel {
            created_at: Set(created_at),
            user_id: Set(user.id),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("insert order");

        for (product, quantity) in lines {
            self.insert_order_item(&saved, product, *quantity).await;
        }

        saved
    }

    /// Adds one line to an existing order at the product's current price.
    pub async fn insert_order_item(
        &self,
        order: &order::Model,
        product: &product::Model,
        quantity: i32,
    ) -> order_item::Model {
        order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(product.id),
            quantity: Set(quantity),
            unit_price: Set(product.price),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("insert order item")
    }
}
