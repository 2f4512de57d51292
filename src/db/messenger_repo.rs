// src/db/messenger_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::social::{Conversation, MessageDirection, MessengerMessage},
};

const CONVERSATION_COLUMNS: &str = "id, page_id, participant_id, last_message_at, created_at";
const MESSAGE_COLUMNS: &str =
    "id, conversation_id, direction, external_message_id, body, sent_at, created_at";

#[derive(Clone)]
pub struct MessengerRepository {
    pool: PgPool,
}

impl MessengerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Chave (página, participante). O horário só avança.
    pub async fn upsert_conversation<'e, E>(
        &self,
        executor: E,
        page_id: Uuid,
        participant_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Conversation, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO messenger_conversations (page_id, participant_id, last_message_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (page_id, participant_id) DO UPDATE SET
                last_message_at = GREATEST(messenger_conversations.last_message_at, EXCLUDED.last_message_at)
            RETURNING {}
            "#,
            CONVERSATION_COLUMNS
        );

        let conversation = sqlx::query_as::<_, Conversation>(&sql)
            .bind(page_id)
            .bind(participant_id)
            .bind(at)
            .fetch_one(executor)
            .await?;

        Ok(conversation)
    }

    /// `None` = mensagem já registrada (reentrega do webhook).
    pub async fn insert_message<'e, E>(
        &self,
        executor: E,
        conversation_id: Uuid,
        direction: MessageDirection,
        external_message_id: Option<&str>,
        body: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<MessengerMessage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO messenger_messages (conversation_id, direction, external_message_id, body, sent_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_message_id) DO NOTHING
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        );

        let message = sqlx::query_as::<_, MessengerMessage>(&sql)
            .bind(conversation_id)
            .bind(direction)
            .bind(external_message_id)
            .bind(body)
            .bind(sent_at)
            .fetch_optional(executor)
            .await?;

        Ok(message)
    }

    // Escopo via cliente dono da página
    pub async fn list_conversations(
        &self,
        client_filter: Option<Vec<Uuid>>,
        page_id: Option<Uuid>,
    ) -> Result<Vec<Conversation>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM messenger_conversations mc
            WHERE EXISTS (
                SELECT 1 FROM social_pages pg
                WHERE pg.id = mc.page_id
                  AND ($1::uuid[] IS NULL OR pg.client_id = ANY($1))
            )
              AND ($2::uuid IS NULL OR mc.page_id = $2)
            ORDER BY mc.last_message_at DESC
            "#,
            CONVERSATION_COLUMNS
        );

        let conversations = sqlx::query_as::<_, Conversation>(&sql)
            .bind(client_filter)
            .bind(page_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(conversations)
    }

    pub async fn find_conversation<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<Conversation>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {} FROM messenger_conversations WHERE id = $1",
            CONVERSATION_COLUMNS
        );

        let conversation = sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(conversation)
    }

    pub async fn messages<'e, E>(
        &self,
        executor: E,
        conversation_id: Uuid,
    ) -> Result<Vec<MessengerMessage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {} FROM messenger_messages WHERE conversation_id = $1 ORDER BY sent_at ASC, created_at ASC",
            MESSAGE_COLUMNS
        );

        let messages = sqlx::query_as::<_, MessengerMessage>(&sql)
            .bind(conversation_id)
            .fetch_all(executor)
            .await?;

        Ok(messages)
    }
}
