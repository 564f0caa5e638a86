//! Namespaced accessors over a shared store.
//!
//! Every method resolves its key (explicit or the client's default), applies
//! the prefix, and delegates one command to the store.
//!
//! # Example
//!
//! ```ignore
//! use rediz::prelude::*;
//!
//! struct OnlineUsers;
//!
//! impl Keyspace for OnlineUsers {
//!     const PREFIX: &'static str = "online";
//!
//!     fn default_key(&self) -> String {
//!         "users".to_string()
//!     }
//! }
//!
//! let online = NamespacedClient::for_keyspace(store.clone(), &OnlineUsers);
//! online.add_member(None, "42").await?;
//! assert!(online.is_member(None, "42").await?);
//! ```

use std::collections::{HashMap, HashSet};

use redis::RedisResult;
use tracing::{debug, warn};

use crate::core::{
    batch::Batch,
    command::{Command, Reply},
    store::SharedStore,
};

/// A domain helper that owns a namespace within the shared store.
pub trait Keyspace {
    /// Namespace prepended to every key
    const PREFIX: &'static str;

    /// Key used when a call does not name one
    fn default_key(&self) -> String;
}

/// Join `prefix` and `key` the way every client addresses the store.
///
/// An empty prefix leaves the key untouched.
pub fn namespaced(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", prefix, key)
    }
}

/// Prefix-aware accessors over a [`SharedStore`]
///
/// Each call takes an optional key. Without one the client's default key is
/// used. Store errors are returned exactly as the store reported them.
pub struct NamespacedClient {
    store: SharedStore,
    prefix: String,
    key: String,
    // Built on first use, kept for the client's lifetime.
    pipe: Option<Batch>,
}

impl NamespacedClient {
    /// Create a client for `prefix` with `key` as its default key
    ///
    /// An empty prefix addresses keys unchanged.
    pub fn new(store: SharedStore, prefix: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            key: key.into(),
            pipe: None,
        }
    }

    /// Create a client from a [`Keyspace`] implementation
    pub fn for_keyspace<K: Keyspace>(store: SharedStore, keyspace: &K) -> Self {
        Self::new(store, K::PREFIX, keyspace.default_key())
    }

    /// Namespace of this client
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key used when a call passes `None`
    pub fn default_key(&self) -> &str {
        &self.key
    }

    /// The shared store handle
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Effective key for `key` under this client's prefix
    pub fn prefixed(&self, key: &str) -> String {
        namespaced(&self.prefix, key)
    }

    // `None` and `Some("")` both fall back to the default key.
    fn resolve(&self, key: Option<&str>) -> String {
        let key = key.filter(|k| !k.is_empty()).unwrap_or(&self.key);
        self.prefixed(key)
    }

    async fn dispatch(&self, command: Command) -> RedisResult<Reply> {
        debug!("{} {}", command.name(), command.key());
        self.store.execute(command).await
    }

    // ========================================================================
    // Strings
    // ========================================================================

    /// Store `value` under the key, replacing any previous value and TTL
    pub async fn set(&self, key: Option<&str>, value: &str) -> RedisResult<()> {
        self.dispatch(Command::Set {
            key: self.resolve(key),
            value: value.to_string(),
        })
        .await?
        .into_unit()
    }

    /// Set only when the key does not exist yet. Returns whether it was set.
    pub async fn set_if_absent(&self, key: Option<&str>, value: &str) -> RedisResult<bool> {
        self.dispatch(Command::SetNx {
            key: self.resolve(key),
            value: value.to_string(),
        })
        .await?
        .into_bool()
    }

    /// Read immediately.
    pub async fn get(&self, key: Option<&str>) -> RedisResult<Option<String>> {
        self.dispatch(Command::Get {
            key: self.resolve(key),
        })
        .await?
        .into_value()
    }

    /// Queue a read on this client's pipe instead of executing it.
    ///
    /// Returns the index of the reply in the result of [`Self::flush`].
    pub fn get_batched(&mut self, key: Option<&str>) -> usize {
        let command = Command::Get {
            key: self.resolve(key),
        };
        self.pipe().push(command)
    }

    /// Add `by` to the integer stored at the key, starting from 0
    ///
    /// Returns the new value.
    pub async fn increment(&self, key: Option<&str>, by: i64) -> RedisResult<i64> {
        self.dispatch(Command::IncrBy {
            key: self.resolve(key),
            by,
        })
        .await?
        .into_int()
    }

    /// Shorthand for `increment(key, 1)`
    pub async fn incr(&self, key: Option<&str>) -> RedisResult<i64> {
        self.increment(key, 1).await
    }

    // ========================================================================
    // Lists
    // ========================================================================

    /// Returns the list length after the push.
    pub async fn push_front(&self, key: Option<&str>, value: &str) -> RedisResult<i64> {
        self.dispatch(Command::LPush {
            key: self.resolve(key),
            value: value.to_string(),
        })
        .await?
        .into_int()
    }

    /// Remove every occurrence of `value`. Returns the number removed.
    pub async fn remove(&self, key: Option<&str>, value: &str) -> RedisResult<i64> {
        self.dispatch(Command::LRem {
            key: self.resolve(key),
            value: value.to_string(),
        })
        .await?
        .into_int()
    }

    // ========================================================================
    // Sets
    // ========================================================================

    /// Add `value` to the set. Returns 1 if it was new, else 0.
    pub async fn add_member(&self, key: Option<&str>, value: &str) -> RedisResult<i64> {
        self.dispatch(Command::SAdd {
            key: self.resolve(key),
            value: value.to_string(),
        })
        .await?
        .into_int()
    }

    /// Remove `value` from the set. Returns 1 if it was present, else 0.
    pub async fn remove_member(&self, key: Option<&str>, value: &str) -> RedisResult<i64> {
        self.dispatch(Command::SRem {
            key: self.resolve(key),
            value: value.to_string(),
        })
        .await?
        .into_int()
    }

    /// Whether `value` belongs to the set
    pub async fn is_member(&self, key: Option<&str>, value: &str) -> RedisResult<bool> {
        self.dispatch(Command::SIsMember {
            key: self.resolve(key),
            value: value.to_string(),
        })
        .await?
        .into_bool()
    }

    /// All members of the set, in no particular order
    pub async fn members(&self, key: Option<&str>) -> RedisResult<HashSet<String>> {
        self.dispatch(Command::SMembers {
            key: self.resolve(key),
        })
        .await?
        .into_members()
    }

    // ========================================================================
    // Sorted sets
    // ========================================================================

    /// Add `value` to the sorted set with `score`, or update its score
    ///
    /// Returns 1 if the member was new, else 0.
    pub async fn add_scored(&self, key: Option<&str>, score: f64, value: &str) -> RedisResult<i64> {
        self.dispatch(Command::ZAdd {
            key: self.resolve(key),
            score,
            value: value.to_string(),
        })
        .await?
        .into_int()
    }

    /// Number of members in the sorted set
    pub async fn cardinality(&self, key: Option<&str>) -> RedisResult<i64> {
        self.dispatch(Command::ZCard {
            key: self.resolve(key),
        })
        .await?
        .into_int()
    }

    // ========================================================================
    // Hashes
    // ========================================================================

    /// Set `field` in the hash. Returns 1 if the field was new, else 0.
    pub async fn hash_set(&self, key: Option<&str>, field: &str, value: &str) -> RedisResult<i64> {
        self.dispatch(Command::HSet {
            key: self.resolve(key),
            field: field.to_string(),
            value: value.to_string(),
        })
        .await?
        .into_int()
    }

    /// Value of `field` in the hash, if any
    pub async fn hash_get(&self, key: Option<&str>, field: &str) -> RedisResult<Option<String>> {
        self.dispatch(Command::HGet {
            key: self.resolve(key),
            field: field.to_string(),
        })
        .await?
        .into_value()
    }

    /// Every field and value of the hash
    pub async fn hash_get_all(&self, key: Option<&str>) -> RedisResult<HashMap<String, String>> {
        self.dispatch(Command::HGetAll {
            key: self.resolve(key),
        })
        .await?
        .into_fields()
    }

    // ========================================================================
    // Key lifecycle
    // ========================================================================

    /// Delete `key` (an empty key means the default key). Returns the number
    /// of keys removed.
    pub async fn delete(&self, key: &str) -> RedisResult<i64> {
        self.dispatch(Command::Del {
            key: self.resolve(Some(key)),
        })
        .await?
        .into_int()
    }

    /// Expire the key after `seconds`
    ///
    /// Returns false when the key does not exist. A non-positive value
    /// deletes the key right away.
    pub async fn expire(&self, key: Option<&str>, seconds: i64) -> RedisResult<bool> {
        self.dispatch(Command::Expire {
            key: self.resolve(key),
            seconds,
        })
        .await?
        .into_bool()
    }

    // ========================================================================
    // Pipe
    // ========================================================================

    /// This client's pipe, created on first access.
    pub fn pipe(&mut self) -> &mut Batch {
        let prefix = &self.prefix;
        self.pipe.get_or_insert_with(|| {
            debug!("Creating pipe for namespace '{}'", prefix);
            Batch::new()
        })
    }

    /// Whether the pipe has been created yet
    pub fn has_pipe(&self) -> bool {
        self.pipe.is_some()
    }

    /// Send everything queued on the pipe. The pipe itself is kept.
    pub async fn flush(&mut self) -> RedisResult<Vec<Reply>> {
        match self.pipe.as_mut() {
            Some(pipe) => pipe.flush(self.store.as_ref()).await,
            None => Ok(Vec::new()),
        }
    }

    /// Drop everything queued on the pipe. Returns how many were discarded.
    pub fn discard(&mut self) -> usize {
        self.pipe.as_mut().map_or(0, Batch::clear)
    }
}

impl Drop for NamespacedClient {
    fn drop(&mut self) {
        if let Some(pipe) = &self.pipe {
            if !pipe.is_empty() {
                warn!(
                    "Discarding {} unflushed commands for namespace '{}'",
                    pipe.len(),
                    self.prefix
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::InMemoryStore;

    struct OnlineUsers;

    impl Keyspace for OnlineUsers {
        const PREFIX: &'static str = "online";

        fn default_key(&self) -> String {
            "users".to_string()
        }
    }

    fn client(prefix: &str, key: &str) -> (Arc<InMemoryStore>, NamespacedClient) {
        let store = Arc::new(InMemoryStore::new());
        let client = NamespacedClient::new(store.clone(), prefix, key);
        (store, client)
    }

    #[test]
    fn namespacing_rule() {
        assert_eq!(namespaced("users", "42"), "users:42");
        assert_eq!(namespaced("", "42"), "42");
        assert_eq!(namespaced("a:b", "c"), "a:b:c");
    }

    #[tokio::test]
    async fn effective_key_reaches_store() {
        let (store, online) = client("online", "users");
        online.add_member(None, "42").await.unwrap();
        online.add_member(Some("admins"), "1").await.unwrap();
        online.add_member(Some(""), "7").await.unwrap();

        let keys: Vec<String> = store.history().iter().map(|c| c.key().to_string()).collect();
        assert_eq!(keys, vec!["online:users", "online:admins", "online:users"]);
    }

    #[tokio::test]
    async fn empty_prefix_leaves_key_alone() {
        let (store, plain) = client("", "counter");
        plain.incr(None).await.unwrap();
        assert_eq!(store.history()[0].key(), "counter");
    }

    #[tokio::test]
    async fn keyspace_supplies_prefix_and_key() {
        let store = Arc::new(InMemoryStore::new());
        let online = NamespacedClient::for_keyspace(store.clone(), &OnlineUsers);
        assert_eq!(online.prefix(), "online");
        assert_eq!(online.default_key(), "users");

        online.set(None, "x").await.unwrap();
        assert_eq!(store.history()[0].key(), "online:users");
    }

    #[tokio::test]
    async fn set_then_get() {
        let (_store, names) = client("names", "current");
        assert_eq!(names.get(None).await.unwrap(), None);
        names.set(None, "ada").await.unwrap();
        assert_eq!(names.get(None).await.unwrap().as_deref(), Some("ada"));
        assert_eq!(names.get(Some("current")).await.unwrap().as_deref(), Some("ada"));
    }

    #[tokio::test]
    async fn set_if_absent_only_once() {
        let (_store, locks) = client("lock", "job");
        assert!(locks.set_if_absent(None, "a").await.unwrap());
        assert!(!locks.set_if_absent(None, "b").await.unwrap());
        assert_eq!(locks.get(None).await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn increment_accumulates() {
        let (_store, hits) = client("hits", "home");
        assert_eq!(hits.incr(None).await.unwrap(), 1);
        assert_eq!(hits.increment(None, 5).await.unwrap(), 6);
        assert_eq!(hits.increment(None, -2).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn list_push_and_remove_all() {
        let (_store, recent) = client("recent", "items");
        recent.push_front(None, "a").await.unwrap();
        recent.push_front(None, "b").await.unwrap();
        assert_eq!(recent.push_front(None, "a").await.unwrap(), 3);

        assert_eq!(recent.remove(None, "a").await.unwrap(), 2);
        assert_eq!(recent.remove(None, "a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn set_membership() {
        let (_store, online) = client("online", "users");
        assert_eq!(online.add_member(None, "42").await.unwrap(), 1);
        assert_eq!(online.add_member(None, "42").await.unwrap(), 0);
        online.add_member(None, "7").await.unwrap();
        assert!(online.is_member(None, "42").await.unwrap());

        let members = online.members(None).await.unwrap();
        assert_eq!(members, HashSet::from(["42".to_string(), "7".to_string()]));

        assert_eq!(online.remove_member(None, "42").await.unwrap(), 1);
        assert!(!online.is_member(None, "42").await.unwrap());
    }

    #[tokio::test]
    async fn sorted_set_cardinality() {
        let (_store, board) = client("board", "scores");
        assert_eq!(board.cardinality(None).await.unwrap(), 0);
        board.add_scored(None, 1.5, "ada").await.unwrap();
        board.add_scored(None, 3.0, "bob").await.unwrap();
        assert_eq!(board.add_scored(None, 9.0, "ada").await.unwrap(), 0);
        assert_eq!(board.cardinality(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn hash_fields() {
        let (_store, profile) = client("profile", "7");
        profile.hash_set(None, "name", "ada").await.unwrap();
        profile.hash_set(None, "lang", "rust").await.unwrap();

        assert_eq!(
            profile.hash_get(None, "name").await.unwrap().as_deref(),
            Some("ada")
        );
        assert_eq!(profile.hash_get(None, "missing").await.unwrap(), None);

        let all = profile.hash_get_all(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["lang"], "rust");
    }

    #[tokio::test]
    async fn delete_and_expire() {
        let (_store, tokens) = client("token", "abc");
        assert_eq!(tokens.delete("nothing-here").await.unwrap(), 0);
        assert!(!tokens.expire(None, 30).await.unwrap());

        tokens.set(None, "v").await.unwrap();
        assert!(tokens.expire(None, 30).await.unwrap());
        assert_eq!(tokens.delete("").await.unwrap(), 1);
        assert_eq!(tokens.get(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn out_of_range_expire_is_an_error() {
        let (_store, tokens) = client("token", "abc");
        tokens.set(None, "v").await.unwrap();

        let err = tokens.expire(None, i64::MAX).await.unwrap_err();
        assert!(err.to_string().contains("invalid expire time"));
        assert_eq!(tokens.get(None).await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn nan_score_is_an_error() {
        let (_store, board) = client("board", "scores");
        assert!(board.add_scored(None, f64::NAN, "ada").await.is_err());
        assert_eq!(board.cardinality(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn store_errors_pass_through() {
        let (_store, mixed) = client("mixed", "k");
        mixed.add_member(None, "a").await.unwrap();
        let err = mixed.get(None).await.unwrap_err();
        assert!(err.to_string().contains("WRONGTYPE"));
    }

    #[tokio::test]
    async fn batched_get_is_deferred() {
        let (store, mut names) = client("names", "current");
        names.set(None, "ada").await.unwrap();
        store.clear_history();

        assert!(!names.has_pipe());
        assert_eq!(names.get_batched(None), 0);
        assert_eq!(names.get_batched(Some("other")), 1);
        assert!(store.history().is_empty());

        let replies = names.flush().await.unwrap();
        assert_eq!(
            replies,
            vec![Reply::Value(Some("ada".into())), Reply::Value(None)]
        );
        assert_eq!(store.history().len(), 2);
    }

    #[tokio::test]
    async fn pipe_is_reused() {
        let (_store, mut names) = client("names", "current");
        let first = names.pipe() as *const Batch;
        names.get_batched(None);
        let second = names.pipe() as *const Batch;
        assert_eq!(first, second);

        names.flush().await.unwrap();
        let third = names.pipe() as *const Batch;
        assert_eq!(first, third);
        assert!(names.has_pipe());
    }

    #[tokio::test]
    async fn discard_drops_queued_commands() {
        let (store, mut names) = client("names", "current");
        assert_eq!(names.discard(), 0);
        names.get_batched(None);
        names.get_batched(None);
        assert_eq!(names.discard(), 2);
        assert!(names.flush().await.unwrap().is_empty());
        assert!(store.history().is_empty());
    }
}
