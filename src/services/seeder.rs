use crate::{
    db::DbPool,
    entities::{category, order, order_item, product, user},
    errors::ServiceError,
};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, EntityTrait, PaginatorTrait, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument};
use validator::{Validate, ValidationError};

/// Shape of the generated demo data set
#[derive(Debug, Clone, Validate)]
pub struct SeedConfig {
    #[validate(range(min = 1))]
    pub categories: usize,
    #[validate(range(min = 1))]
    pub products: usize,
    #[validate(range(min = 1))]
    pub users: usize,
    pub orders: usize,
    #[validate(range(min = 1))]
    pub max_items_per_order: usize,
    #[validate(range(min = 1))]
    pub max_quantity: i32,
    /// Orders are spread over `now - [0, window) minutes`
    #[validate(range(min = 1))]
    pub window_minutes: i64,
    pub rng_seed: Option<u64>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            categories: 5,
            products: 30,
            users: 20,
            orders: 100,
            max_items_per_order: 5,
            max_quantity: 4,
            window_minutes: 60 * 24 * 30,
            rng_seed: None,
        }
    }
}

impl SeedConfig {
    pub fn with_rng_seed(mut self, seed: Option<u64>) -> Self {
        self.rng_seed = seed;
        self
    }

    fn rng(&self) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

fn validate_money(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() || value.scale() > 2 {
        let mut err = ValidationError::new("money");
        err.message = Some("Must be non-negative with at most two decimal places".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(custom = "validate_money")]
    pub price: Decimal,
    /// Index into `SeedPlan::categories`
    pub category: usize,
}

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email, length(max = 320))]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct NewOrderItem {
    /// Index into `SeedPlan::products`
    pub product: usize,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(custom = "validate_money")]
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct NewOrder {
    pub created_at: DateTime<Utc>,
    /// Index into `SeedPlan::users`
    pub user: usize,
    #[validate(length(min = 1))]
    pub items: Vec<NewOrderItem>,
}

/// Everything the seeder will write, with relations expressed as indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedPlan {
    pub categories: Vec<NewCategory>,
    pub products: Vec<NewProduct>,
    pub users: Vec<NewUser>,
    pub orders: Vec<NewOrder>,
}

impl SeedPlan {
    pub fn generate<R: Rng>(config: &SeedConfig, now: DateTime<Utc>, rng: &mut R) -> Self {
        let categories: Vec<NewCategory> = (1..=config.categories)
            .map(|i| NewCategory {
                name: format!("Category {i}"),
            })
            .collect();

        // [1.00, 101.00) in cents
        let products: Vec<NewProduct> = (1..=config.products)
            .map(|i| NewProduct {
                name: format!("Product {i}"),
                price: Decimal::new(rng.gen_range(100..10_100), 2),
                category: rng.gen_range(0..categories.len()),
            })
            .collect();

        let users: Vec<NewUser> = (1..=config.users)
            .map(|i| NewUser {
                name: format!("User {i}"),
                email: format!("user{i}@example.com"),
            })
            .collect();

        let orders = (0..config.orders)
            .map(|_| {
                let user = rng.gen_range(0..users.len());
                let created_at = now - Duration::minutes(rng.gen_range(0..config.window_minutes));
                let item_count = rng.gen_range(1..=config.max_items_per_order);
                let items = (0..item_count)
                    .map(|_| {
                        let product = rng.gen_range(0..products.len());
                        NewOrderItem {
                            product,
                            quantity: rng.gen_range(1..=config.max_quantity),
                            unit_price: products[product].price,
                        }
                    })
                    .collect();
                NewOrder {
                    created_at,
                    user,
                    items,
                }
            })
            .collect();

        Self {
            categories,
            products,
            users,
            orders,
        }
    }

    /// Checks every record and every cross-reference in the plan.
    pub fn validate(&self) -> Result<(), ServiceError> {
        for c in &self.categories {
            c.validate()?;
        }
        for p in &self.products {
            p.validate()?;
            if p.category >= self.categories.len() {
                return Err(ServiceError::ValidationError(format!(
                    "{} references unknown category #{}",
                    p.name, p.category
                )));
            }
        }
        for u in &self.users {
            u.validate()?;
        }
        for (n, o) in self.orders.iter().enumerate() {
            o.validate()?;
            if o.user >= self.users.len() {
                return Err(ServiceError::ValidationError(format!(
                    "order #{n} references unknown user #{}",
                    o.user
                )));
            }
            for item in &o.items {
                item.validate()?;
                if item.product >= self.products.len() {
                    return Err(ServiceError::ValidationError(format!(
                        "order #{n} references unknown product #{}",
                        item.product
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn item_count(&self) -> usize {
        self.orders.iter().map(|o| o.items.len()).sum()
    }
}

/// Row counts of the seeded tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub categories: u64,
    pub products: u64,
    pub users: u64,
    pub orders: u64,
    pub order_items: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Users already existed; nothing was written
    AlreadySeeded,
    Seeded(SeedSummary),
}

/// Current row count of every seeded table.
pub async fn table_counts<C: ConnectionTrait>(db: &C) -> Result<SeedSummary, ServiceError> {
    Ok(SeedSummary {
        categories: category::Entity::find().count(db).await?,
        products: product::Entity::find().count(db).await?,
        users: user::Entity::find().count(db).await?,
        orders: order::Entity::find().count(db).await?,
        order_items: order_item::Entity::find().count(db).await?,
    })
}

/// Populates an empty store with demo data. A store that already has users is
/// left untouched.
#[instrument(skip(db, config))]
pub async fn seed(db: &DbPool, config: &SeedConfig) -> Result<SeedOutcome, ServiceError> {
    config.validate()?;

    if user::Entity::find().count(db).await? > 0 {
        info!("Users present, skipping seed");
        return Ok(SeedOutcome::AlreadySeeded);
    }

    let plan = SeedPlan::generate(config, Utc::now(), &mut config.rng());
    plan.validate()?;

    let summary = persist(db, &plan).await?;
    info!(
        categories = summary.categories,
        products = summary.products,
        users = summary.users,
        orders = summary.orders,
        order_items = summary.order_items,
        "Demo data seeded"
    );
    Ok(SeedOutcome::Seeded(summary))
}

/// Writes the whole plan in one transaction.
async fn persist(db: &DbPool, plan: &SeedPlan) -> Result<SeedSummary, ServiceError> {
    let txn = db.begin().await?;

    let mut category_ids = Vec::with_capacity(plan.categories.len());
    for c in &plan.categories {
        let saved = category::ActiveModel {
            name: Set(c.name.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        category_ids.push(saved.id);
    }

    let mut product_ids = Vec::with_capacity(plan.products.len());
    for p in &plan.products {
        let saved = product::ActiveModel {
            name: Set(p.name.clone()),
            price: Set(p.price),
            category_id: Set(category_ids[p.category]),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        product_ids.push(saved.id);
    }

    let mut user_ids = Vec::with_capacity(plan.users.len());
    for u in &plan.users {
        let saved = user::ActiveModel {
            name: Set(u.name.clone()),
            email: Set(u.email.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        user_ids.push(saved.id);
    }

    for o in &plan.orders {
        let saved = order::ActiveModel {
            created_at: Set(o.created_at),
            user_id: Set(user_ids[o.user]),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let items: Vec<order_item::ActiveModel> = o
            .items
            .iter()
            .map(|item| order_item::ActiveModel {
                order_id: Set(saved.id),
                product_id: Set(product_ids[item.product]),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                ..Default::default()
            })
            .collect();
        if !items.is_empty() {
            order_item::Entity::insert_many(items).exec(&txn).await?;
        }
    }

    txn.commit().await?;

    Ok(SeedSummary {
        categories: category_ids.len() as u64,
        products: product_ids.len() as u64,
        users: user_ids.len() as u64,
        orders: plan.orders.len() as u64,
        order_items: plan.item_count() as u64,
    })
}
