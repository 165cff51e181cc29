//! Cache Store implementations: relational (sqlx `AnyPool`) and in-memory.

pub mod db;
pub mod memory;
pub mod sql;

pub use db::CacheDb;
pub use memory::MemoryCacheStore;
pub use sql::SqlCacheStore;
