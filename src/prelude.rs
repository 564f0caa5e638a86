// Convenience re-exports: use rediz::prelude::*;
pub use crate::backend::{InMemoryStore, RedisStore};
pub use crate::core::{
    Batch, Command, ConfigStore, Configurable, Keyspace, NamespacedClient, Reply, SharedStore,
    Store, StoreConfig,
};
