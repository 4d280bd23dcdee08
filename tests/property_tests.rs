//! Property-based tests for order totals and row grouping.
//!
//! These use proptest to check that totals always equal the sum of their
//! lines and that grouping flat join rows never loses, duplicates, or
//! reorders anything.

use chrono::{TimeZone, Utc};
use orm_vs_sql::dto::orders::{order_total, OrderItemDto};
use orm_vs_sql::services::order_aggregation::{group_order_rows, OrderItemRow};
use proptest::prelude::*;
use rust_decimal::Decimal;

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn item_strategy() -> impl Strategy<Value = (i32, i32, Decimal)> {
    (1i32..50, 1i32..10, price_strategy())
}

/// Orders as (order id, items); ids are unique and items may be empty.
fn orders_strategy() -> impl Strategy<Value = Vec<(i32, Vec<(i32, i32, Decimal)>)>> {
    prop::collection::vec(prop::collection::vec(item_strategy(), 0..6), 0..12).prop_map(
        |orders| {
            orders
                .into_iter()
                .enumerate()
                .map(|(n, items)| (1000 - n as i32, items))
                .collect()
        },
    )
}

fn flatten(orders: &[(i32, Vec<(i32, i32, Decimal)>)]) -> Vec<OrderItemRow> {
    let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut rows = Vec::new();
    let mut next_item_id = 1;
    for (order_id, items) in orders {
        let base = OrderItemRow {
            order_id: *order_id,
            created_at,
            user_id: 1,
            user_name: "User 1".to_string(),
            order_item_id: None,
            product_id: None,
            product_name: None,
            quantity: None,
            unit_price: None,
        };
        if items.is_empty() {
            rows.push(base);
            continue;
        }
        for (product_id, quantity, price) in items {
            rows.push(OrderItemRow {
                order_item_id: Some(next_item_id),
                product_id: Some(*product_id),
                product_name: Some(format!("Product {product_id}")),
                quantity: Some(*quantity),
                unit_price: Some(*price),
                ..base.clone()
            });
            next_item_id += 1;
        }
    }
    rows
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn total_is_sum_of_lines(items in prop::collection::vec(item_strategy(), 0..20)) {
        let dtos: Vec<OrderItemDto> = items
            .iter()
            .enumerate()
            .map(|(n, (product_id, quantity, price))| OrderItemDto {
                id: n as i32,
                product_id: *product_id,
                product_name: format!("Product {product_id}"),
                quantity: *quantity,
                unit_price: *price,
            })
            .collect();

        let expected = items
            .iter()
            .fold(Decimal::ZERO, |acc, (_, q, p)| acc + Decimal::from(*q) * *p);
        prop_assert_eq!(order_total(&dtos), expected);
        prop_assert!(order_total(&dtos) >= Decimal::ZERO);
    }

    #[test]
    fn grouping_preserves_orders_items_and_totals(orders in orders_strategy()) {
        let grouped = group_order_rows(flatten(&orders)).unwrap();

        prop_assert_eq!(grouped.len(), orders.len());
        for (dto, (order_id, items)) in grouped.iter().zip(&orders) {
            prop_assert_eq!(dto.id, *order_id);
            prop_assert_eq!(dto.items.len(), items.len());
            prop_assert_eq!(dto.total, order_total(&dto.items));
            for (item, (product_id, quantity, price)) in dto.items.iter().zip(items) {
                prop_assert_eq!(item.product_id, *product_id);
                prop_assert_eq!(item.quantity, *quantity);
                prop_assert_eq!(item.unit_price, *price);
            }
        }
    }
}
