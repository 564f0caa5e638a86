use std::sync::Arc;

use redis::RedisResult;

use crate::core::command::{Command, Reply};

/// Outbound seam to the key-value store.
///
/// Implementors execute commands exactly as given; keys are already
/// namespaced. Errors are the store's own and are passed to callers
/// untouched.
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    async fn execute(&self, command: Command) -> RedisResult<Reply>;

    /// Execute `commands` in order as a single batch. Replies are returned in
    /// the same order.
    async fn execute_batch(&self, commands: Vec<Command>) -> RedisResult<Vec<Reply>>;
}

/// Process-wide connection handle, created at startup and passed explicitly.
pub type SharedStore = Arc<dyn Store>;
