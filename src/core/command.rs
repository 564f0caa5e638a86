//! Primitive store operations and their replies.
//!
//! A [`Command`] always carries the effective (already namespaced) key. It
//! knows how to become a `redis::Cmd` and how to read the raw server value
//! back into a typed [`Reply`].

use std::collections::{HashMap, HashSet};

use redis::{Cmd, ErrorKind, RedisError, RedisResult, Value};

/// A single store operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set { key: String, value: String },
    SetNx { key: String, value: String },
    Get { key: String },
    IncrBy { key: String, by: i64 },
    LPush { key: String, value: String },
    /// Removes every occurrence of `value` (`LREM key 0 value`).
    LRem { key: String, value: String },
    SAdd { key: String, value: String },
    SRem { key: String, value: String },
    SIsMember { key: String, value: String },
    SMembers { key: String },
    ZAdd { key: String, score: f64, value: String },
    ZCard { key: String },
    HSet { key: String, field: String, value: String },
    HGet { key: String, field: String },
    HGetAll { key: String },
    Del { key: String },
    Expire { key: String, seconds: i64 },
}

impl Command {
    /// Redis command name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Set { .. } => "SET",
            Self::SetNx { .. } => "SETNX",
            Self::Get { .. } => "GET",
            Self::IncrBy { .. } => "INCRBY",
            Self::LPush { .. } => "LPUSH",
            Self::LRem { .. } => "LREM",
            Self::SAdd { .. } => "SADD",
            Self::SRem { .. } => "SREM",
            Self::SIsMember { .. } => "SISMEMBER",
            Self::SMembers { .. } => "SMEMBERS",
            Self::ZAdd { .. } => "ZADD",
            Self::ZCard { .. } => "ZCARD",
            Self::HSet { .. } => "HSET",
            Self::HGet { .. } => "HGET",
            Self::HGetAll { .. } => "HGETALL",
            Self::Del { .. } => "DEL",
            Self::Expire { .. } => "EXPIRE",
        }
    }

    /// The effective key this command touches
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. }
            | Self::SetNx { key, .. }
            | Self::Get { key }
            | Self::IncrBy { key, .. }
            | Self::LPush { key, .. }
            | Self::LRem { key, .. }
            | Self::SAdd { key, .. }
            | Self::SRem { key, .. }
            | Self::SIsMember { key, .. }
            | Self::SMembers { key }
            | Self::ZAdd { key, .. }
            | Self::ZCard { key }
            | Self::HSet { key, .. }
            | Self::HGet { key, .. }
            | Self::HGetAll { key }
            | Self::Del { key }
            | Self::Expire { key, .. } => key,
        }
    }

    /// Build the wire command.
    pub fn to_cmd(&self) -> Cmd {
        let mut cmd = redis::cmd(self.name());
        match self {
            Self::Set { key, value }
            | Self::SetNx { key, value }
            | Self::LPush { key, value }
            | Self::SAdd { key, value }
            | Self::SRem { key, value }
            | Self::SIsMember { key, value } => {
                cmd.arg(key).arg(value);
            }
            Self::LRem { key, value } => {
                cmd.arg(key).arg(0).arg(value);
            }
            Self::Get { key }
            | Self::SMembers { key }
            | Self::ZCard { key }
            | Self::HGetAll { key }
            | Self::Del { key } => {
                cmd.arg(key);
            }
            Self::IncrBy { key, by } => {
                cmd.arg(key).arg(*by);
            }
            Self::ZAdd { key, score, value } => {
                cmd.arg(key).arg(*score).arg(value);
            }
            Self::HSet { key, field, value } => {
                cmd.arg(key).arg(field).arg(value);
            }
            Self::HGet { key, field } => {
                cmd.arg(key).arg(field);
            }
            Self::Expire { key, seconds } => {
                cmd.arg(key).arg(*seconds);
            }
        }
        cmd
    }

    /// Interpret the raw server value returned for this command.
    pub fn decode(&self, value: &Value) -> RedisResult<Reply> {
        let reply = match self {
            Self::Set { .. } => {
                let () = redis::from_redis_value(value)?;
                Reply::Ok
            }
            Self::SetNx { .. } | Self::SIsMember { .. } | Self::Expire { .. } => {
                Reply::Bool(redis::from_redis_value(value)?)
            }
            Self::Get { .. } | Self::HGet { .. } => Reply::Value(redis::from_redis_value(value)?),
            Self::IncrBy { .. }
            | Self::LPush { .. }
            | Self::LRem { .. }
            | Self::SAdd { .. }
            | Self::SRem { .. }
            | Self::ZAdd { .. }
            | Self::ZCard { .. }
            | Self::HSet { .. }
            | Self::Del { .. } => Reply::Int(redis::from_redis_value(value)?),
            Self::SMembers { .. } => Reply::Members(redis::from_redis_value(value)?),
            Self::HGetAll { .. } => Reply::Fields(redis::from_redis_value(value)?),
        };
        Ok(reply)
    }
}

/// Typed result of a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok,
    Bool(bool),
    Int(i64),
    Value(Option<String>),
    Members(HashSet<String>),
    Fields(HashMap<String, String>),
}

impl Reply {
    fn kind(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Value(_) => "value",
            Self::Members(_) => "members",
            Self::Fields(_) => "fields",
        }
    }

    fn mismatch(self, expected: &'static str) -> RedisError {
        RedisError::from((
            ErrorKind::TypeError,
            "Unexpected reply type",
            format!("expected {}, got {}", expected, self.kind()),
        ))
    }

    pub fn into_unit(self) -> RedisResult<()> {
        match self {
            Self::Ok => Ok(()),
            other => Err(other.mismatch("ok")),
        }
    }

    pub fn into_bool(self) -> RedisResult<bool> {
        match self {
            Self::Bool(flag) => Ok(flag),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn into_int(self) -> RedisResult<i64> {
        match self {
            Self::Int(n) => Ok(n),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn into_value(self) -> RedisResult<Option<String>> {
        match self {
            Self::Value(value) => Ok(value),
            other => Err(other.mismatch("value")),
        }
    }

    pub fn into_members(self) -> RedisResult<HashSet<String>> {
        match self {
            Self::Members(members) => Ok(members),
            other => Err(other.mismatch("members")),
        }
    }

    pub fn into_fields(self) -> RedisResult<HashMap<String, String>> {
        match self {
            Self::Fields(fields) => Ok(fields),
            other => Err(other.mismatch("fields")),
        }
    }
}
