use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    dto::orders::{OrderListResponse, QueryMode},
    errors::ServiceError,
    AppState,
};

/// Query string of `GET /orders/top10`
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TopOrdersQuery {
    /// `ef` (entity graph, default) or `dapper` (raw SQL); case-insensitive,
    /// unknown values fall back to `ef`
    pub mode: Option<String>,
}

/// Ten most recent orders with user, items, products, and totals
#[utoipa::path(
    get,
    path = "/orders/top10",
    tag = "Orders",
    summary = "Top 10 latest orders",
    description = "Returns the ten most recently created orders, newest first, loaded through the selected query strategy, together with the time the strategy took.",
    params(TopOrdersQuery),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = OrderListResponse,
            headers(
                ("X-Request-Id" = String, description = "Unique request id"),
            )
        ),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn top_orders(
    State(state): State<AppState>,
    Query(query): Query<TopOrdersQuery>,
) -> Result<Json<OrderListResponse>, ServiceError> {
    let mode = QueryMode::from_param(query.mode.as_deref());
    let response = state.services.orders.top_orders(mode).await?;
    Ok(Json(response))
}

pub fn orders_routes() -> Router<AppState> {
    Router::new().route("/orders/top10", get(top_orders))
}
