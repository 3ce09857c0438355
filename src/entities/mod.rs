pub mod order;
pub mod product;

pub use order::Entity as Order;
pub use product::Entity as ProductRow;
