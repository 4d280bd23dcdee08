//! sea-orm entities for the order catalogue.
//!
//! `order` → `user` and `order` → `order_item` → `product` are the relations
//! walked by the entity-graph aggregation strategy.

pub mod category;
pub mod order;
pub mod order_item;
pub mod product;
pub mod user;

pub mod prelude {
    pub use super::category::Entity as Category;
    pub use super::order::Entity as Order;
    pub use super::order_item::Entity as OrderItem;
    pub use super::product::Entity as Product;
    pub use super::user::Entity as User;
}
