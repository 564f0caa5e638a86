pub mod batch;
pub mod client;
pub mod command;
pub mod config;
pub mod store;

pub use batch::Batch;
pub use client::{Keyspace, NamespacedClient, namespaced};
pub use command::{Command, Reply};
pub use config::{ConfigError, ConfigStore, Configurable, StoreConfig};
pub use store::{SharedStore, Store};
