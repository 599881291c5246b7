//! Postgres-backed chat store

use async_trait::async_trait;
use huntroom_shared::ChatMessage;
use sqlx::PgPool;

use super::{ChatStore, StorageError};

#[derive(Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    text: String,
    name: String,
    sent_at: i64,
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn append(&self, room: &str, key: &str, message: &ChatMessage) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (room_key, message_key, text, name, sent_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(room)
        .bind(key)
        .bind(&message.text)
        .bind(&message.name)
        .bind(message.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_log(&self, room: &str) -> Result<Vec<ChatMessage>, StorageError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT text, name, sent_at
            FROM chat_messages
            WHERE room_key = $1
            ORDER BY message_key COLLATE "C" ASC
            "#,
        )
        .bind(room)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ChatMessage {
                text: r.text,
                name: r.name,
                timestamp: r.sent_at,
            })
            .collect())
    }

    async fn last_key(&self, room: &str) -> Result<Option<String>, StorageError> {
        let key = sqlx::query_scalar::<_, String>(
            r#"
            SELECT message_key
            FROM chat_messages
            WHERE room_key = $1
            ORDER BY message_key COLLATE "C" DESC
            LIMIT 1
            "#,
        )
        .bind(room)
        .fetch_optional(&self.pool)
        .await?;

        Ok(key)
    }

    async fn delete_log(&self, room: &str) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE room_key = $1")
            .bind(room)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn set_alarm(&self, room: &str, fire_at_ms: i64) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO chat_alarms (room_key, fire_at)
            VALUES ($1, $2)
            ON CONFLICT (room_key) DO UPDATE SET fire_at = EXCLUDED.fire_at
            "#,
        )
        .bind(room)
        .bind(fire_at_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn alarm(&self, room: &str) -> Result<Option<i64>, StorageError> {
        let fire_at = sqlx::query_scalar::<_, i64>("SELECT fire_at FROM chat_alarms WHERE room_key = $1")
            .bind(room)
            .fetch_optional(&self.pool)
            .await?;

        Ok(fire_at)
    }

    async fn clear_alarm(&self, room: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM chat_alarms WHERE room_key = $1")
            .bind(room)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn due_alarms(&self, now_ms: i64) -> Result<Vec<String>, StorageError> {
        let rooms = sqlx::query_scalar::<_, String>(
            r#"
            SELECT room_key
            FROM chat_alarms
            WHERE fire_at <= $1
            ORDER BY fire_at ASC
            LIMIT 500
            "#,
        )
        .bind(now_ms)
        .fetch_all(&self.pool)
        .await?;

        Ok(rooms)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
