//! Redis Streams implementations of the Frontdesk storage traits.
//!
//! This crate provides the production [`LogStore`], [`RuntimeQueue`] and
//! [`Presence`] implementations on top of Redis:
//!
//! - Streams (`XADD`/`XRANGE`/`XGROUP CREATE`/`XREADGROUP`/`XACK`) back the
//!   append-only logs and consumer-group delivery
//! - `INCR` backs the atomic per-counter sequence numbers
//! - Lists (`RPUSH`/`LPOP`/`LRANGE`/`LLEN`) back the runtime per-counter
//!   queues
//! - `SETEX` markers back counter presence
//!
//! # Why Redis Streams?
//!
//! - **Atomic ordered appends per key**: concurrent ticket issuance from
//!   multiple reception points serializes in the store, not in the app
//! - **Consumer groups**: each assignment entry is delivered to exactly one
//!   member consumer, so replicas scale out without double notification
//! - **Explicit acknowledgment**: unacked entries stay pending and are
//!   redeliverable after a crash
//!
//! # Delivery Semantics
//!
//! At-least-once: the consumer acknowledges an entry only after its handler
//! completed, so a crash between delivery and ack redelivers. Handlers must
//! tolerate duplicates (queue mutations are idempotent re-appends that
//! projection supersedes).
//!
//! # Example
//!
//! ```no_run
//! use frontdesk_redis::RedisLogStore;
//! use frontdesk_core::{LogStore, Record, StreamKey};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisLogStore::connect("redis://localhost:6379").await?;
//!
//! let id = store
//!     .append(
//!         StreamKey::new("counter:c-1:queue"),
//!         Record::new().with("status", "WAITING"),
//!     )
//!     .await?;
//! println!("appended {id}");
//! # Ok(())
//! # }
//! ```

use frontdesk_core::log_store::{GroupStart, LogStore, LogStoreError};
use frontdesk_core::presence::{Presence, PresenceError};
use frontdesk_core::record::Record;
use frontdesk_core::runtime_queue::{RuntimeQueue, RuntimeQueueError};
use frontdesk_core::stream::{ConsumerName, EntryId, GroupName, StreamKey};
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply, StreamRangeReply};
use redis::AsyncCommands;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Open a managed connection to Redis.
///
/// The returned [`ConnectionManager`] multiplexes one TCP connection and
/// reconnects automatically; it is cheap to clone, so all three store types
/// can share it.
///
/// # Errors
///
/// Returns [`LogStoreError::Store`] if the URL is invalid or the initial
/// connection fails.
pub async fn connection_manager(url: &str) -> Result<ConnectionManager, LogStoreError> {
    let client = redis::Client::open(url)
        .map_err(|e| LogStoreError::Store(format!("invalid redis url: {e}")))?;
    let manager = ConnectionManager::new(client)
        .await
        .map_err(|e| LogStoreError::Store(format!("redis connection failed: {e}")))?;
    tracing::info!(url = %url, "Redis connection established");
    Ok(manager)
}

fn store_err(e: &redis::RedisError) -> LogStoreError {
    LogStoreError::Store(e.to_string())
}

fn decode_field(value: &redis::Value) -> Result<String, LogStoreError> {
    redis::from_redis_value(value)
        .map_err(|e| LogStoreError::Encoding(format!("non-string stream field: {e}")))
}

fn decode_stream_ids(
    ids: Vec<redis::streams::StreamId>,
) -> Result<Vec<(EntryId, Record)>, LogStoreError> {
    ids.into_iter()
        .map(|entry| {
            let record = entry
                .map
                .iter()
                .map(|(field, value)| Ok((field.clone(), decode_field(value)?)))
                .collect::<Result<Vec<_>, LogStoreError>>()?;
            Ok((EntryId::new(entry.id), Record::from(record)))
        })
        .collect()
}

fn sequence_key(scope: &str) -> String {
    format!("counter:seq:{scope}")
}

// ============================================================================
// Log store
// ============================================================================

/// Redis Streams [`LogStore`].
#[derive(Clone)]
pub struct RedisLogStore {
    conn: ConnectionManager,
}

impl RedisLogStore {
    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to Redis and build a store.
    ///
    /// # Errors
    ///
    /// Returns [`LogStoreError::Store`] if the connection cannot be opened.
    pub async fn connect(url: &str) -> Result<Self, LogStoreError> {
        Ok(Self::new(connection_manager(url).await?))
    }
}

impl LogStore for RedisLogStore {
    fn append(
        &self,
        key: StreamKey,
        record: Record,
    ) -> Pin<Box<dyn Future<Output = Result<EntryId, LogStoreError>> + Send + '_>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let pairs: Vec<(String, String)> = record
                .fields()
                .map(|(f, v)| (f.to_string(), v.to_string()))
                .collect();
            let id: String = conn
                .xadd(key.as_str(), "*", pairs.as_slice())
                .await
                .map_err(|e| store_err(&e))?;
            tracing::trace!(key = %key, entry = %id, "Entry appended");
            Ok(EntryId::new(id))
        })
    }

    fn range(
        &self,
        key: StreamKey,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<(EntryId, Record)>, LogStoreError>> + Send + '_>>
    {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let reply: StreamRangeReply = conn
                .xrange_all(key.as_str())
                .await
                .map_err(|e| store_err(&e))?;
            decode_stream_ids(reply.ids)
        })
    }

    fn create_group(
        &self,
        key: StreamKey,
        group: GroupName,
        start: GroupStart,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogStoreError>> + Send + '_>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let start_id = match start {
                GroupStart::Beginning => "0",
                GroupStart::End => "$",
            };
            let created: Result<(), redis::RedisError> = conn
                .xgroup_create_mkstream(key.as_str(), group.as_str(), start_id)
                .await;
            match created {
                Ok(()) => {
                    tracing::info!(key = %key, group = %group, "Consumer group created");
                    Ok(())
                }
                // Group already exists: fine, every replica creates at startup.
                Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
                Err(e) => Err(store_err(&e)),
            }
        })
    }

    fn read_group(
        &self,
        key: StreamKey,
        group: GroupName,
        consumer: ConsumerName,
        count: usize,
        block: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<(EntryId, Record)>, LogStoreError>> + Send + '_>>
    {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let block_ms =
                usize::try_from(block.as_millis()).unwrap_or(usize::MAX);
            let options = StreamReadOptions::default()
                .group(group.as_str(), consumer.as_str())
                .count(count)
                .block(block_ms);
            let reply: StreamReadReply = conn
                .xread_options(&[key.as_str()], &[">"], &options)
                .await
                .map_err(|e| {
                    if e.to_string().contains("NOGROUP") {
                        LogStoreError::GroupNotFound {
                            key: key.clone(),
                            group: group.clone(),
                        }
                    } else {
                        store_err(&e)
                    }
                })?;

            let mut entries = Vec::new();
            for stream in reply.keys {
                entries.extend(decode_stream_ids(stream.ids)?);
            }
            Ok(entries)
        })
    }

    fn ack(
        &self,
        key: StreamKey,
        group: GroupName,
        id: EntryId,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogStoreError>> + Send + '_>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let _acked: u64 = conn
                .xack(key.as_str(), group.as_str(), &[id.as_str()])
                .await
                .map_err(|e| store_err(&e))?;
            Ok(())
        })
    }

    fn next_sequence(
        &self,
        scope: String,
    ) -> Pin<Box<dyn Future<Output = Result<u64, LogStoreError>> + Send + '_>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            conn.incr(sequence_key(&scope), 1_u64)
                .await
                .map_err(|e| store_err(&e))
        })
    }

    fn reset_sequence(
        &self,
        scope: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), LogStoreError>> + Send + '_>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let _removed: u64 = conn
                .del(sequence_key(&scope))
                .await
                .map_err(|e| store_err(&e))?;
            Ok(())
        })
    }
}

// ============================================================================
// Runtime queue
// ============================================================================

fn queue_key(counter_id: &str) -> String {
    format!("counter:queue:{counter_id}")
}

/// Redis list-backed [`RuntimeQueue`].
///
/// Items are JSON documents serialized to one list element per ticket, so
/// "what's enqueued at counter X" is a single `LRANGE`.
#[derive(Clone)]
pub struct RedisRuntimeQueue {
    conn: ConnectionManager,
}

impl RedisRuntimeQueue {
    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

fn queue_err(e: &redis::RedisError) -> RuntimeQueueError {
    RuntimeQueueError::Store(e.to_string())
}

fn parse_item(counter_id: &str, raw: &str) -> Result<serde_json::Value, RuntimeQueueError> {
    serde_json::from_str(raw).map_err(|e| RuntimeQueueError::Corrupt {
        counter_id: counter_id.to_string(),
        reason: e.to_string(),
    })
}

impl RuntimeQueue for RedisRuntimeQueue {
    fn push(
        &self,
        counter_id: String,
        item: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), RuntimeQueueError>> + Send + '_>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let _len: u64 = conn
                .rpush(queue_key(&counter_id), item.to_string())
                .await
                .map_err(|e| queue_err(&e))?;
            Ok(())
        })
    }

    fn pop(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<Option<serde_json::Value>, RuntimeQueueError>> + Send + '_>>
    {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let raw: Option<String> = conn
                .lpop(queue_key(&counter_id), None)
                .await
                .map_err(|e| queue_err(&e))?;
            raw.map(|r| parse_item(&counter_id, &r)).transpose()
        })
    }

    fn list(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<serde_json::Value>, RuntimeQueueError>> + Send + '_>>
    {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let raw: Vec<String> = conn
                .lrange(queue_key(&counter_id), 0, -1)
                .await
                .map_err(|e| queue_err(&e))?;
            raw.iter().map(|r| parse_item(&counter_id, r)).collect()
        })
    }

    fn clear(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), RuntimeQueueError>> + Send + '_>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let _removed: u64 = conn
                .del(queue_key(&counter_id))
                .await
                .map_err(|e| queue_err(&e))?;
            Ok(())
        })
    }

    fn len(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<usize, RuntimeQueueError>> + Send + '_>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            conn.llen(queue_key(&counter_id))
                .await
                .map_err(|e| queue_err(&e))
        })
    }
}

// ============================================================================
// Presence
// ============================================================================

fn presence_key(counter_id: &str) -> String {
    format!("counter:online:{counter_id}")
}

/// Redis `SETEX`-backed [`Presence`].
#[derive(Clone)]
pub struct RedisPresence {
    conn: ConnectionManager,
}

impl RedisPresence {
    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

fn presence_err(e: &redis::RedisError) -> PresenceError {
    PresenceError(e.to_string())
}

impl Presence for RedisPresence {
    fn mark_online(
        &self,
        counter_id: String,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let ttl_secs = ttl.as_secs().max(1);
            let _ok: () = conn
                .set_ex(presence_key(&counter_id), "1", ttl_secs)
                .await
                .map_err(|e| presence_err(&e))?;
            Ok(())
        })
    }

    fn mark_offline(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), PresenceError>> + Send + '_>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let _removed: u64 = conn
                .del(presence_key(&counter_id))
                .await
                .map_err(|e| presence_err(&e))?;
            Ok(())
        })
    }

    fn is_online(
        &self,
        counter_id: String,
    ) -> Pin<Box<dyn Future<Output = Result<bool, PresenceError>> + Send + '_>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            conn.exists(presence_key(&counter_id))
                .await
                .map_err(|e| presence_err(&e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_namespaces_do_not_collide() {
        assert_eq!(sequence_key("c-1"), "counter:seq:c-1");
        assert_eq!(queue_key("c-1"), "counter:queue:c-1");
        assert_eq!(presence_key("c-1"), "counter:online:c-1");
    }

    #[test]
    fn stores_are_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedisLogStore>();
        assert_sync::<RedisLogStore>();
        assert_send::<RedisRuntimeQueue>();
        assert_sync::<RedisPresence>();
    }
}
