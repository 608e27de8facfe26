pub mod catalog;
pub mod error;
pub mod order;
pub mod report;
pub mod repository;
pub mod user;

pub use error::{StoreError, StoreResult};
pub use order::{
    NewOrderLine, NewOrderRecord, Order, OrderDetail, OrderLineDetail, OrderStatus,
};
