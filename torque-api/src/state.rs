use std::sync::Arc;

use torque_core::repository::{CategoryRepository, ItemRepository, UserRepository};
use torque_order::OrderService;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub categories: Arc<dyn CategoryRepository>,
    pub items: Arc<dyn ItemRepository>,
    pub users: Arc<dyn UserRepository>,
    pub orders: Arc<OrderService>,
    pub auth: AuthConfig,
}
