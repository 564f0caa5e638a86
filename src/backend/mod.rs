//! Store backends.

mod memory;
mod redis_store;

pub use memory::InMemoryStore;
pub use redis_store::RedisStore;
