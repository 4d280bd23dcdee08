use crate::{
    db::DbPool,
    dto::orders::{order_total, OrderDto, OrderItemDto, OrderListResponse, QueryMode},
    entities::{order, order_item, product, user},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ConnectionTrait, EntityTrait, FromQueryResult, LoaderTrait, QueryOrder, QuerySelect,
    Statement,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Number of orders returned by the top-orders query
pub const TOP_ORDERS_LIMIT: u64 = 10;

/// Latest orders first; the subquery limits orders, not joined rows, so an
/// order's items are never cut off. Item columns are NULL for orders
/// without lines.
fn top_orders_sql() -> String {
    format!(
        "SELECT o.id AS order_id, o.created_at AS created_at, o.user_id AS user_id, \
         u.name AS user_name, oi.id AS order_item_id, oi.product_id AS product_id, \
         p.name AS product_name, oi.quantity AS quantity, oi.unit_price AS unit_price \
         FROM (SELECT id, created_at, user_id FROM orders \
               ORDER BY created_at DESC, id DESC LIMIT {limit}) o \
         JOIN users u ON u.id = o.user_id \
         LEFT JOIN order_items oi ON oi.order_id = o.id \
         LEFT JOIN products p ON p.id = oi.product_id \
         ORDER BY o.created_at DESC, o.id DESC, oi.id ASC",
        limit = TOP_ORDERS_LIMIT
    )
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn elapsed_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// One row of the flat join: an (order, item) pair.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct OrderItemRow {
    pub order_id: i32,
    pub created_at: DateTime<Utc>,
    pub user_id: i32,
    pub user_name: String,
    pub order_item_id: Option<i32>,
    pub product_id: Option<i32>,
    pub product_name: Option<String>,
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
}

impl OrderItemRow {
    fn item(&self) -> Result<Option<OrderItemDto>, ServiceError> {
        let Some(id) = self.order_item_id else {
            return Ok(None);
        };

        match (
            self.product_id,
            self.product_name.as_ref(),
            self.quantity,
            self.unit_price,
        ) {
            (Some(product_id), Some(product_name), Some(quantity), Some(unit_price)) => {
                Ok(Some(OrderItemDto {
                    id,
                    product_id,
                    product_name: product_name.clone(),
                    quantity,
                    unit_price,
                }))
            }
            _ => Err(ServiceError::InternalError(format!(
                "order item {} of order {} has no matching product",
                id, self.order_id
            ))),
        }
    }
}

/// Folds flat join rows into orders, keeping the order in which each order id
/// first appears, then fills in every total.
pub fn group_order_rows(rows: Vec<OrderItemRow>) -> Result<Vec<OrderDto>, ServiceError> {
    let mut orders: Vec<OrderDto> = Vec::new();
    let mut index: HashMap<i32, usize> = HashMap::new();

    for row in rows {
        let item = row.item()?;
        let slot = match index.get(&row.order_id) {
            Some(&slot) => slot,
            None => {
                index.insert(row.order_id, orders.len());
                orders.push(OrderDto {
                    id: row.order_id,
                    created_at: row.created_at,
                    user_id: row.user_id,
                    user_name: row.user_name,
                    total: Decimal::ZERO,
                    items: Vec::new(),
                });
                orders.len() - 1
            }
        };

        if let Some(item) = item {
            orders[slot].items.push(item);
        }
    }

    for order in &mut orders {
        order.total = order_total(&order.items);
    }

    Ok(orders)
}

/// Serves the latest orders with user, items, and products through either
/// query strategy.
#[derive(Clone)]
pub struct OrderAggregationService {
    db: Arc<DbPool>,
}

impl OrderAggregationService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Runs the chosen strategy and reports how long querying and shaping took.
    #[instrument(skip(self, mode), fields(mode = %mode))]
    pub async fn top_orders(&self, mode: QueryMode) -> Result<OrderListResponse, ServiceError> {
        let started = Instant::now();

        let orders = match mode {
            QueryMode::Orm => self.load_via_entities().await?,
            QueryMode::RawSql => self.load_via_sql().await?,
        };

        let elapsed_ms = elapsed_millis(started.elapsed());
        info!(orders = orders.len(), elapsed_ms, "top orders served");

        Ok(OrderListResponse {
            mode,
            orders,
            elapsed_ms,
        })
    }

    /// Entity graph: orders with their user, then items, then each item's
    /// product, all ordered and limited by the database.
    pub async fn load_via_entities(&self) -> Result<Vec<OrderDto>, ServiceError> {
        let db = &*self.db;

        let (orders, users): (Vec<order::Model>, Vec<Option<user::Model>>) =
            order::Entity::find()
                .find_also_related(user::Entity)
                .order_by_desc(order::Column::CreatedAt)
                .order_by_desc(order::Column::Id)
                .limit(TOP_ORDERS_LIMIT)
                .all(db)
                .await?
                .into_iter()
                .unzip();

        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let items_per_order: Vec<Vec<order_item::Model>> = orders
            .load_many(
                order_item::Entity::find().order_by_asc(order_item::Column::Id),
                db,
            )
            .await?;

        let all_items: Vec<order_item::Model> = items_per_order.iter().flatten().cloned().collect();
        let products: HashMap<i32, product::Model> = if all_items.is_empty() {
            HashMap::new()
        } else {
            all_items
                .load_one(product::Entity, db)
                .await?
                .into_iter()
                .flatten()
                .map(|p| (p.id, p))
                .collect()
        };
        debug!(
            orders = orders.len(),
            items = all_items.len(),
            products = products.len(),
            "entity graph loaded"
        );

        orders
            .into_iter()
            .zip(users)
            .zip(items_per_order)
            .map(|((order, user), items)| {
                let user = user.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "order {} references missing user {}",
                        order.id, order.user_id
                    ))
                })?;

                let items = items
                    .into_iter()
                    .map(|item| {
                        let product = products.get(&item.product_id).ok_or_else(|| {
                            ServiceError::InternalError(format!(
                                "order item {} references missing product {}",
                                item.id, item.product_id
                            ))
                        })?;
                        Ok(OrderItemDto {
                            id: item.id,
                            product_id: item.product_id,
                            product_name: product.name.clone(),
                            quantity: item.quantity,
                            unit_price: item.unit_price,
                        })
                    })
                    .collect::<Result<Vec<_>, ServiceError>>()?;

                Ok(OrderDto {
                    id: order.id,
                    created_at: order.created_at,
                    user_id: order.user_id,
                    user_name: user.name,
                    total: order_total(&items),
                    items,
                })
            })
            .collect()
    }

    /// Single flat join, decoded into typed rows and grouped in memory.
    pub async fn load_via_sql(&self) -> Result<Vec<OrderDto>, ServiceError> {
        let db = &*self.db;
        let stmt = Statement::from_string(db.get_database_backend(), top_orders_sql());

        let rows = OrderItemRow::find_by_statement(stmt).all(db).await?;
        debug!(rows = rows.len(), "flat join rows fetched");

        group_order_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn row(order_id: i32, item: Option<(i32, i32, i32, Decimal)>) -> OrderItemRow {
        OrderItemRow {
            order_id,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            user_id: order_id * 10,
            user_name: format!("User {}", order_id * 10),
            order_item_id: item.map(|(id, ..)| id),
            product_id: item.map(|(_, pid, ..)| pid),
            product_name: item.map(|(_, pid, ..)| format!("Product {pid}")),
            quantity: item.map(|(_, _, q, _)| q),
            unit_price: item.map(|(.., price)| price),
        }
    }

    #[test]
    fn rows_are_grouped_in_first_seen_order() {
        let rows = vec![
            row(5, Some((50, 1, 2, dec!(10.00)))),
            row(5, Some((51, 2, 1, dec!(3.50)))),
            row(3, Some((30, 1, 4, dec!(1.25)))),
            row(9, Some((90, 3, 1, dec!(99.99)))),
        ];

        let orders = group_order_rows(rows).unwrap();
        let ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![5, 3, 9]);
        assert_eq!(orders[0].items.len(), 2);
        assert_eq!(orders[0].total, dec!(23.50));
        assert_eq!(orders[1].total, dec!(5.00));
        assert_eq!(orders[2].total, dec!(99.99));
        assert_eq!(orders[0].user_name, "User 50");
    }

    #[test]
    fn order_without_items_has_zero_total() {
        let orders = group_order_rows(vec![row(4, None)]).unwrap();
        assert_eq!(orders.len(), 1);
        assert!(orders[0].items.is_empty());
        assert_eq!(orders[0].total, Decimal::ZERO);
    }

    #[test]
    fn item_without_product_is_an_internal_error() {
        let mut broken = row(1, Some((10, 2, 1, dec!(1.00))));
        broken.product_name = None;
        assert_matches!(
            group_order_rows(vec![broken]),
            Err(ServiceError::InternalError(_))
        );
    }

    #[test]
    fn no_rows_means_no_orders() {
        assert!(group_order_rows(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn elapsed_millis_saturates() {
        assert_eq!(elapsed_millis(Duration::from_micros(2_500)), 2);
        assert_eq!(elapsed_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn sql_limits_orders_before_joining_items() {
        let sql = top_orders_sql();
        assert!(sql.contains("ORDER BY created_at DESC, id DESC LIMIT 10) o"));
        assert!(sql.trim_end().ends_with("ORDER BY o.created_at DESC, o.id DESC, oi.id ASC"));
    }
}
