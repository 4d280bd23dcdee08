pub mod orders;

pub use orders::{order_total, OrderDto, OrderItemDto, OrderListResponse, QueryMode};
