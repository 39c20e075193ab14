pub mod catalog_store;
pub use catalog_store::{CatalogStore, CatalogTx, LockScope, WriteBatch};
pub mod memory_store;
pub use memory_store::MemoryCatalogStore;
pub mod pg_catalog_store;
pub use pg_catalog_store::PgCatalogStore;
pub mod user_repo;
pub use user_repo::{MemoryUserStore, UserRepository, UserStore};
