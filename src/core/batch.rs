use redis::RedisResult;
use tracing::debug;

use crate::core::{
    command::{Command, Reply},
    store::Store,
};

/// Ordered queue of pending commands.
///
/// Nothing reaches the store until [`Batch::flush`] is called. The queue is
/// drained before the round-trip, so a failed flush does not re-queue.
#[derive(Debug, Default)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command and return the index its reply will have after flush.
    pub fn push(&mut self, command: Command) -> usize {
        self.commands.push(command);
        self.commands.len() - 1
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain queued commands in order.
    pub fn take(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Drop queued commands, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let count = self.commands.len();
        self.commands.clear();
        count
    }

    /// Send all queued commands to `store` in one batch.
    pub async fn flush(&mut self, store: &dyn Store) -> RedisResult<Vec<Reply>> {
        if self.commands.is_empty() {
            return Ok(Vec::new());
        }

        let commands = self.take();
        debug!("Flushing batch of {} commands", commands.len());
        store.execute_batch(commands).await
    }
}
