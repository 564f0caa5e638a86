use std::sync::Arc;

use redis::{RedisResult, Value, aio::ConnectionManager};
use tracing::{debug, info};

use crate::core::{
    command::{Command, Reply},
    config::StoreConfig,
    store::{SharedStore, Store},
};

/// Store backed by a Redis server.
///
/// Holds one multiplexed, auto-reconnecting connection. Cloning is cheap and
/// every clone shares that connection.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    addr: String,
}

impl RedisStore {
    /// Open the process-wide connection. Call once at startup.
    pub async fn connect(config: &StoreConfig) -> RedisResult<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let addr = client.get_connection_info().addr.to_string();

        info!("Connecting to redis at {}", addr);
        let manager = ConnectionManager::new(client).await?;
        info!("Connected to redis at {}", addr);

        Ok(Self { manager, addr })
    }

    /// Wrap an already established connection manager.
    pub fn from_manager(manager: ConnectionManager, addr: impl Into<String>) -> Self {
        Self {
            manager,
            addr: addr.into(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(self)
    }

    /// Release this handle. The connection closes once the last clone is gone.
    pub fn shutdown(self) {
        info!("Closing redis connection to {}", self.addr);
    }
}

#[async_trait::async_trait]
impl Store for RedisStore {
    async fn execute(&self, command: Command) -> RedisResult<Reply> {
        let mut conn = self.manager.clone();
        let value: Value = command.to_cmd().query_async(&mut conn).await?;
        command.decode(&value)
    }

    async fn execute_batch(&self, commands: Vec<Command>) -> RedisResult<Vec<Reply>> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for command in &commands {
            pipe.add_command(command.to_cmd());
        }

        debug!("Sending pipeline of {} commands to {}", commands.len(), self.addr);
        let mut conn = self.manager.clone();
        let values: Vec<Value> = pipe.query_async(&mut conn).await?;

        commands
            .iter()
            .zip(values.iter())
            .map(|(command, value)| command.decode(value))
            .collect()
    }
}
