use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ORM vs SQL Orders API",
        version = "0.1.0",
        description = r#"
Serves the ten most recent orders, with user, line items, products, and a
computed total, through two interchangeable query strategies:

- `ef`: entity graph with eager-loaded relations (default)
- `dapper`: one hand-written flat join grouped in memory

Both return the same JSON for the same data; `elapsedMs` reports how long the
chosen strategy took.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order aggregation endpoints")
    ),
    paths(
        crate::handlers::orders::top_orders,
    ),
    components(
        schemas(
            crate::dto::orders::QueryMode,
            crate::dto::orders::OrderItemDto,
            crate::dto::orders::OrderDto,
            crate::dto::orders::OrderListResponse,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_describes_top_orders() {
        let json = serde_json::to_string_pretty(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("/orders/top10"));
        assert!(json.contains("OrderListResponse"));
        assert!(json.contains("elapsedMs"));
    }
}
