use std::{
    collections::{HashMap, HashSet, VecDeque},
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use redis::{ErrorKind, RedisError, RedisResult};

use crate::core::{
    command::{Command, Reply},
    store::Store,
};

/// In-process store for tests and demos.
///
/// Follows Redis semantics for the commands it understands, including
/// WRONGTYPE errors and lazy expiry. Every received command is recorded so
/// callers can inspect the effective keys.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands received so far, oldest first.
    pub fn history(&self) -> Vec<Command> {
        self.state.lock().history.clone()
    }

    pub fn clear_history(&self) {
        self.state.lock().history.clear();
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn execute(&self, command: Command) -> RedisResult<Reply> {
        let mut state = self.state.lock();
        let reply = state.apply(&command);
        state.history.push(command);
        reply
    }

    async fn execute_batch(&self, commands: Vec<Command>) -> RedisResult<Vec<Reply>> {
        let mut state = self.state.lock();
        // Every command runs even if an earlier one fails; the first error wins.
        let mut replies = Vec::with_capacity(commands.len());
        for command in commands {
            replies.push(state.apply(&command));
            state.history.push(command);
        }
        replies.into_iter().collect()
    }
}

enum Entry {
    Str(String),
    List(VecDeque<String>),
    Set(HashSet<String>),
    ZSet(HashMap<String, f64>),
    Hash(HashMap<String, String>),
}

impl Entry {
    fn is_empty(&self) -> bool {
        match self {
            Self::Str(_) => false,
            Self::List(list) => list.is_empty(),
            Self::Set(set) => set.is_empty(),
            Self::ZSet(zset) => zset.is_empty(),
            Self::Hash(hash) => hash.is_empty(),
        }
    }

    fn as_str(&self) -> RedisResult<&str> {
        match self {
            Self::Str(value) => Ok(value),
            _ => Err(wrong_type()),
        }
    }

    fn as_str_mut(&mut self) -> RedisResult<&mut String> {
        match self {
            Self::Str(value) => Ok(value),
            _ => Err(wrong_type()),
        }
    }

    fn as_list_mut(&mut self) -> RedisResult<&mut VecDeque<String>> {
        match self {
            Self::List(list) => Ok(list),
            _ => Err(wrong_type()),
        }
    }

    fn as_set(&self) -> RedisResult<&HashSet<String>> {
        match self {
            Self::Set(set) => Ok(set),
            _ => Err(wrong_type()),
        }
    }

    fn as_set_mut(&mut self) -> RedisResult<&mut HashSet<String>> {
        match self {
            Self::Set(set) => Ok(set),
            _ => Err(wrong_type()),
        }
    }

    fn as_zset(&self) -> RedisResult<&HashMap<String, f64>> {
        match self {
            Self::ZSet(zset) => Ok(zset),
            _ => Err(wrong_type()),
        }
    }

    fn as_zset_mut(&mut self) -> RedisResult<&mut HashMap<String, f64>> {
        match self {
            Self::ZSet(zset) => Ok(zset),
            _ => Err(wrong_type()),
        }
    }

    fn as_hash(&self) -> RedisResult<&HashMap<String, String>> {
        match self {
            Self::Hash(hash) => Ok(hash),
            _ => Err(wrong_type()),
        }
    }

    fn as_hash_mut(&mut self) -> RedisResult<&mut HashMap<String, String>> {
        match self {
            Self::Hash(hash) => Ok(hash),
            _ => Err(wrong_type()),
        }
    }
}

struct Slot {
    entry: Entry,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(entry: Entry) -> Self {
        Self {
            entry,
            expires_at: None,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

#[derive(Default)]
struct State {
    slots: HashMap<String, Slot>,
    history: Vec<Command>,
}

impl State {
    /// The slot for `key`, evicting it first if its TTL has passed.
    fn live(&mut self, key: &str) -> Option<&mut Slot> {
        if self.slots.get(key).is_some_and(Slot::is_expired) {
            self.slots.remove(key);
        }
        self.slots.get_mut(key)
    }

    fn live_or_insert(&mut self, key: &str, entry: impl FnOnce() -> Entry) -> &mut Slot {
        if self.slots.get(key).is_some_and(Slot::is_expired) {
            self.slots.remove(key);
        }
        self.slots
            .entry(key.to_string())
            .or_insert_with(|| Slot::new(entry()))
    }

    // Collections that become empty no longer exist.
    fn remove_if_empty(&mut self, key: &str) {
        if self.slots.get(key).is_some_and(|slot| slot.entry.is_empty()) {
            self.slots.remove(key);
        }
    }

    fn apply(&mut self, command: &Command) -> RedisResult<Reply> {
        match command {
            Command::Set { key, value } => {
                self.slots
                    .insert(key.clone(), Slot::new(Entry::Str(value.clone())));
                Ok(Reply::Ok)
            }
            Command::SetNx { key, value } => {
                if self.live(key).is_some() {
                    return Ok(Reply::Bool(false));
                }
                self.slots
                    .insert(key.clone(), Slot::new(Entry::Str(value.clone())));
                Ok(Reply::Bool(true))
            }
            Command::Get { key } => match self.live(key) {
                Some(slot) => Ok(Reply::Value(Some(slot.entry.as_str()?.to_string()))),
                None => Ok(Reply::Value(None)),
            },
            Command::IncrBy { key, by } => {
                let current = self
                    .live_or_insert(key, || Entry::Str("0".to_string()))
                    .entry
                    .as_str_mut()?;
                let next = current
                    .parse::<i64>()
                    .map_err(|_| not_an_integer())?
                    .checked_add(*by)
                    .ok_or_else(overflow)?;
                *current = next.to_string();
                Ok(Reply::Int(next))
            }
            Command::LPush { key, value } => {
                let list = self
                    .live_or_insert(key, || Entry::List(VecDeque::new()))
                    .entry
                    .as_list_mut()?;
                list.push_front(value.clone());
                Ok(Reply::Int(list.len() as i64))
            }
            Command::LRem { key, value } => {
                let Some(slot) = self.live(key) else {
                    return Ok(Reply::Int(0));
                };
                let list = slot.entry.as_list_mut()?;
                let before = list.len();
                list.retain(|item| item != value);
                let removed = before - list.len();
                self.remove_if_empty(key);
                Ok(Reply::Int(removed as i64))
            }
            Command::SAdd { key, value } => {
                let set = self
                    .live_or_insert(key, || Entry::Set(HashSet::new()))
                    .entry
                    .as_set_mut()?;
                Ok(Reply::Int(i64::from(set.insert(value.clone()))))
            }
            Command::SRem { key, value } => {
                let Some(slot) = self.live(key) else {
                    return Ok(Reply::Int(0));
                };
                let removed = slot.entry.as_set_mut()?.remove(value);
                self.remove_if_empty(key);
                Ok(Reply::Int(i64::from(removed)))
            }
            Command::SIsMember { key, value } => match self.live(key) {
                Some(slot) => Ok(Reply::Bool(slot.entry.as_set()?.contains(value))),
                None => Ok(Reply::Bool(false)),
            },
            Command::SMembers { key } => match self.live(key) {
                Some(slot) => Ok(Reply::Members(slot.entry.as_set()?.clone())),
                None => Ok(Reply::Members(HashSet::new())),
            },
            Command::ZAdd { key, score, value } => {
                if score.is_nan() {
                    return Err(not_a_float());
                }
                let zset = self
                    .live_or_insert(key, || Entry::ZSet(HashMap::new()))
                    .entry
                    .as_zset_mut()?;
                let added = zset.insert(value.clone(), *score).is_none();
                Ok(Reply::Int(i64::from(added)))
            }
            Command::ZCard { key } => match self.live(key) {
                Some(slot) => Ok(Reply::Int(slot.entry.as_zset()?.len() as i64)),
                None => Ok(Reply::Int(0)),
            },
            Command::HSet { key, field, value } => {
                let hash = self
                    .live_or_insert(key, || Entry::Hash(HashMap::new()))
                    .entry
                    .as_hash_mut()?;
                let added = hash.insert(field.clone(), value.clone()).is_none();
                Ok(Reply::Int(i64::from(added)))
            }
            Command::HGet { key, field } => match self.live(key) {
                Some(slot) => Ok(Reply::Value(slot.entry.as_hash()?.get(field).cloned())),
                None => Ok(Reply::Value(None)),
            },
            Command::HGetAll { key } => match self.live(key) {
                Some(slot) => Ok(Reply::Fields(slot.entry.as_hash()?.clone())),
                None => Ok(Reply::Fields(HashMap::new())),
            },
            Command::Del { key } => {
                let existed = self.live(key).is_some();
                if existed {
                    self.slots.remove(key);
                }
                Ok(Reply::Int(i64::from(existed)))
            }
            Command::Expire { key, seconds } => {
                // Out-of-range values fail even when the key is missing.
                let deadline = match u64::try_from(*seconds) {
                    Ok(secs) if secs > 0 => Some(
                        Instant::now()
                            .checked_add(Duration::from_secs(secs))
                            .ok_or_else(invalid_expire)?,
                    ),
                    _ => None,
                };
                if self.live(key).is_none() {
                    return Ok(Reply::Bool(false));
                }
                match deadline {
                    Some(at) => {
                        if let Some(slot) = self.slots.get_mut(key) {
                            slot.expires_at = Some(at);
                        }
                    }
                    None => {
                        self.slots.remove(key);
                    }
                }
                Ok(Reply::Bool(true))
            }
        }
    }
}

fn wrong_type() -> RedisError {
    RedisError::from((
        ErrorKind::ResponseError,
        "WRONGTYPE Operation against a key holding the wrong kind of value",
    ))
}

fn not_an_integer() -> RedisError {
    RedisError::from((
        ErrorKind::ResponseError,
        "ERR value is not an integer or out of range",
    ))
}

fn not_a_float() -> RedisError {
    RedisError::from((ErrorKind::ResponseError, "ERR value is not a valid float"))
}

fn invalid_expire() -> RedisError {
    RedisError::from((
        ErrorKind::ResponseError,
        "ERR invalid expire time in 'expire' command",
    ))
}

fn overflow() -> RedisError {
    RedisError::from((
        ErrorKind::ResponseError,
        "ERR increment or decrement would overflow",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(key: &str, value: &str) -> Command {
        Command::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    #[tokio::test]
    async fn wrong_type_is_rejected() {
        let store = InMemoryStore::new();
        store
            .execute(Command::LPush {
                key: "l".into(),
                value: "a".into(),
            })
            .await
            .unwrap();

        let err = store
            .execute(Command::SAdd {
                key: "l".into(),
                value: "a".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseError);
        assert!(err.to_string().contains("WRONGTYPE"));
    }

    #[tokio::test]
    async fn incr_requires_integer() {
        let store = InMemoryStore::new();
        store.execute(set("n", "abc")).await.unwrap();
        let err = store
            .execute(Command::IncrBy {
                key: "n".into(),
                by: 1,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not an integer"));

        store.execute(set("n", &i64::MAX.to_string())).await.unwrap();
        let err = store
            .execute(Command::IncrBy {
                key: "n".into(),
                by: 1,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("overflow"));
    }

    #[tokio::test]
    async fn emptied_collections_disappear() {
        let store = InMemoryStore::new();
        store
            .execute(Command::SAdd {
                key: "s".into(),
                value: "a".into(),
            })
            .await
            .unwrap();
        store
            .execute(Command::SRem {
                key: "s".into(),
                value: "a".into(),
            })
            .await
            .unwrap();

        let reply = store.execute(Command::Del { key: "s".into() }).await.unwrap();
        assert_eq!(reply, Reply::Int(0));
    }

    #[tokio::test]
    async fn non_positive_expire_deletes() {
        let store = InMemoryStore::new();
        store.execute(set("k", "v")).await.unwrap();
        let reply = store
            .execute(Command::Expire {
                key: "k".into(),
                seconds: 0,
            })
            .await
            .unwrap();
        assert_eq!(reply, Reply::Bool(true));

        let reply = store.execute(Command::Get { key: "k".into() }).await.unwrap();
        assert_eq!(reply, Reply::Value(None));
    }

    #[tokio::test]
    async fn huge_expire_is_rejected() {
        let store = InMemoryStore::new();
        store.execute(set("k", "v")).await.unwrap();

        let err = store
            .execute(Command::Expire {
                key: "k".into(),
                seconds: i64::MAX,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseError);
        assert!(err.to_string().contains("invalid expire time"));

        let err = store
            .execute(Command::Expire {
                key: "missing".into(),
                seconds: i64::MAX,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid expire time"));

        // The key and its lack of TTL are untouched.
        let reply = store.execute(Command::Get { key: "k".into() }).await.unwrap();
        assert_eq!(reply, Reply::Value(Some("v".into())));
        assert!(store.state.lock().slots["k"].expires_at.is_none());
    }

    #[tokio::test]
    async fn nan_score_is_rejected() {
        let store = InMemoryStore::new();
        let err = store
            .execute(Command::ZAdd {
                key: "z".into(),
                score: f64::NAN,
                value: "a".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseError);
        assert!(err.to_string().contains("not a valid float"));

        let reply = store.execute(Command::ZCard { key: "z".into() }).await.unwrap();
        assert_eq!(reply, Reply::Int(0));
    }

    #[tokio::test]
    async fn set_clears_ttl() {
        let store = InMemoryStore::new();
        store.execute(set("k", "v")).await.unwrap();
        store
            .execute(Command::Expire {
                key: "k".into(),
                seconds: 100,
            })
            .await
            .unwrap();
        store.execute(set("k", "w")).await.unwrap();

        let state = store.state.lock();
        assert!(state.slots["k"].expires_at.is_none());
    }

    #[test]
    fn expired_slot_is_evicted_on_access() {
        let mut state = State::default();
        state.slots.insert(
            "k".into(),
            Slot {
                entry: Entry::Str("v".into()),
                expires_at: Some(Instant::now() - Duration::from_millis(1)),
            },
        );

        assert!(state.live("k").is_none());
        assert!(state.slots.is_empty());
    }

    #[tokio::test]
    async fn batch_runs_every_command_and_reports_first_error() {
        let store = InMemoryStore::new();
        store
            .execute(Command::HSet {
                key: "h".into(),
                field: "f".into(),
                value: "v".into(),
            })
            .await
            .unwrap();

        let result = store
            .execute_batch(vec![Command::Get { key: "h".into() }, set("after", "ran")])
            .await;
        assert!(result.is_err());

        let reply = store
            .execute(Command::Get {
                key: "after".into(),
            })
            .await
            .unwrap();
        assert_eq!(reply, Reply::Value(Some("ran".into())));
        assert_eq!(store.history().len(), 4);
    }
}
