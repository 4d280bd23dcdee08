use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Execution strategy for the top-orders query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum QueryMode {
    /// Entity graph with eager-loaded relations
    #[default]
    #[serde(rename = "ef")]
    Orm,
    /// One hand-written flat join, grouped in memory
    #[serde(rename = "dapper")]
    RawSql,
}

impl QueryMode {
    /// Parses the `mode` query parameter. Matching is case-insensitive;
    /// anything other than `dapper` selects the ORM strategy.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("dapper") => QueryMode::RawSql,
            _ => QueryMode::Orm,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Orm => "ef",
            QueryMode::RawSql => "dapper",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDto {
    pub id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    /// Price captured when the order was placed
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64, example = 19.99)]
    pub unit_price: Decimal,
}

impl OrderItemDto {
    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub user_id: i32,
    pub user_name: String,
    /// Sum of quantity × unit price over `items`
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64, example = 59.97)]
    pub total: Decimal,
    pub items: Vec<OrderItemDto>,
}

/// Body of `GET /orders/top10`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderListResponse {
    pub mode: QueryMode,
    pub orders: Vec<OrderDto>,
    /// Wall-clock time spent querying and shaping the result
    pub elapsed_ms: u64,
}

/// Sum of every line in `items`; zero for an empty slice.
pub fn order_total(items: &[OrderItemDto]) -> Decimal {
    items.iter().map(OrderItemDto::line_total).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(None, QueryMode::Orm)]
    #[case(Some(""), QueryMode::Orm)]
    #[case(Some("ef"), QueryMode::Orm)]
    #[case(Some("EF"), QueryMode::Orm)]
    #[case(Some("dapper"), QueryMode::RawSql)]
    #[case(Some("Dapper"), QueryMode::RawSql)]
    #[case(Some(" DAPPER "), QueryMode::RawSql)]
    #[case(Some("xyz"), QueryMode::Orm)]
    fn mode_parameter_parsing(#[case] raw: Option<&str>, #[case] expected: QueryMode) {
        assert_eq!(QueryMode::from_param(raw), expected);
    }

    #[test]
    fn empty_order_totals_zero() {
        assert_eq!(order_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn response_uses_camel_case_and_numeric_money() {
        let created_at = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let items = vec![OrderItemDto {
            id: 7,
            product_id: 3,
            product_name: "Product 3".into(),
            quantity: 2,
            unit_price: dec!(12.50),
        }];
        let response = OrderListResponse {
            mode: QueryMode::RawSql,
            orders: vec![OrderDto {
                id: 1,
                created_at,
                user_id: 4,
                user_name: "User 4".into(),
                total: order_total(&items),
                items,
            }],
            elapsed_ms: 3,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["mode"], "dapper");
        assert_eq!(json["elapsedMs"], 3);
        let order = &json["orders"][0];
        assert_eq!(order["userName"], "User 4");
        assert_eq!(order["userId"], 4);
        assert_eq!(order["total"], 25.0);
        assert_eq!(order["items"][0]["productName"], "Product 3");
        assert_eq!(order["items"][0]["unitPrice"], 12.5);
        assert!(order.get("created_at").is_none());
        assert!(order["createdAt"].is_string());
    }
}
