//! Redis Streams backend
//!
//! One Redis stream per logical stream. Payloads live under [`DATA_FIELD`];
//! groups are created with `$` so they start at "new messages only".

use crate::error::StreamResult;
use crate::log::{EventLog, GroupCreation, MessageId, RawEntry};
use async_trait::async_trait;
use event_schema::DATA_FIELD;
use redis::aio::ConnectionManager;
use redis::streams::{StreamPendingReply, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

/// Event log backed by Redis Streams.
///
/// The connection manager is cheap to clone and reconnects on its own, so every
/// worker in the process shares one instance.
#[derive(Clone)]
pub struct RedisEventLog {
    conn: ConnectionManager,
}

impl RedisEventLog {
    pub async fn connect(redis_url: &str) -> StreamResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected event log to Redis");
        Ok(Self { conn })
    }
}

fn is_busy_group(err: &redis::RedisError) -> bool {
    err.code() == Some("BUSYGROUP") || err.to_string().contains("BUSYGROUP")
}

#[async_trait]
impl EventLog for RedisEventLog {
    async fn append(&self, stream: &str, payload: String) -> StreamResult<MessageId> {
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd::<_, _, _, _, String>(stream, "*", &[(DATA_FIELD, payload.as_str())])
            .await?;
        Ok(MessageId::new(id))
    }

    async fn create_group(&self, stream: &str, group: &str) -> StreamResult<GroupCreation> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => Ok(GroupCreation::Created),
            Err(err) if is_busy_group(&err) => Ok(GroupCreation::AlreadyExists),
            Err(err) => Err(err.into()),
        }
    }

    async fn read_new(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
    ) -> StreamResult<Option<RawEntry>> {
        let mut conn = self.conn.clone();
        let options = StreamReadOptions::default().group(group, consumer).count(1);

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[stream], &[">"], &options)
            .await?;

        let entry = reply
            .into_iter()
            .flat_map(|reply| reply.keys)
            .flat_map(|key| key.ids)
            .next();

        Ok(entry.map(|entry| {
            let data = entry.get::<String>(DATA_FIELD);
            debug!(stream, group, message_id = %entry.id, "Claimed stream entry");
            RawEntry {
                id: MessageId::new(entry.id),
                data,
            }
        }))
    }

    async fn acknowledge(&self, stream: &str, group: &str, id: &MessageId) -> StreamResult<bool> {
        let mut conn = self.conn.clone();
        let acked: i64 = conn.xack(stream, group, &[id.as_str()]).await?;
        Ok(acked > 0)
    }

    async fn pending_count(&self, stream: &str, group: &str) -> StreamResult<usize> {
        let mut conn = self.conn.clone();
        let reply: StreamPendingReply = conn.xpending(stream, group).await?;
        Ok(reply.count())
    }
}
