pub mod app_config;
pub mod category_repo;
pub mod database;
pub mod item_repo;
pub mod memory;
pub mod order_repo;
pub mod user_repo;

pub use category_repo::PgCategoryRepository;
pub use database::DbClient;
pub use item_repo::PgItemRepository;
pub use memory::MemoryStore;
pub use order_repo::PgOrderRepository;
pub use user_repo::PgUserRepository;
