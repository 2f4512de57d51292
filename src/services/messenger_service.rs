// src/services/messenger_service.rs
//
// Relay de mensagens do Messenger: webhook de entrada e respostas da equipe.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{MessengerRepository, SocialRepository},
    integrations::SocialPublisher,
    models::{
        scope::AccessScope,
        social::{Conversation, MessageDirection, MessengerMessage, SocialPage},
    },
    services::social_service::page_credential,
};

const ATTACHMENT_PLACEHOLDER: &str = "[attachment]";

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub page_external_id: String,
    pub participant_id: String,
    pub external_message_id: Option<String>,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub received: usize,
    pub stored: usize,
    // Página desconhecida ou reentrega
    pub ignored: usize,
    // Erro ao gravar; os demais eventos seguem
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    Stored,
    UnknownPage,
    Duplicate,
}

/// Gravação de uma mensagem recebida (conversa + mensagem).
#[async_trait]
pub trait InboxStore: Send + Sync {
    async fn store_inbound(&self, event: &InboundMessage) -> Result<InboundOutcome, AppError>;
}

/// Cada evento é gravado por conta própria; falha de um não derruba o lote.
pub async fn ingest_events(store: &dyn InboxStore, events: &[InboundMessage]) -> IngestSummary {
    let mut summary = IngestSummary { received: events.len(), ..Default::default() };

    for event in events {
        match store.store_inbound(event).await {
            Ok(InboundOutcome::Stored) => summary.stored += 1,
            Ok(InboundOutcome::UnknownPage) => {
                tracing::debug!(page = %event.page_external_id, "Mensagem para página desconhecida ignorada");
                summary.ignored += 1;
            }
            Ok(InboundOutcome::Duplicate) => summary.ignored += 1,
            Err(e) => {
                tracing::error!(
                    page = %event.page_external_id,
                    message_id = ?event.external_message_id,
                    "Falha ao gravar mensagem recebida: {}",
                    e
                );
                summary.failed += 1;
            }
        }
    }

    summary
}

fn text_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn timestamp_ms(value: Option<&Value>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    value
        .and_then(Value::as_i64)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or(fallback)
}

fn parse_messaging(page_id: &str, event: &Value, received_at: DateTime<Utc>) -> Option<InboundMessage> {
    let message = event.get("message")?;
    // Eco das mensagens enviadas pela própria página
    if message.get("is_echo").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }

    let participant_id = text_at(event, "/sender/id")?;
    let body = match text_at(message, "/text") {
        Some(text) => text.to_string(),
        None if message.get("attachments").is_some() => ATTACHMENT_PLACEHOLDER.to_string(),
        None => return None,
    };

    Some(InboundMessage {
        page_external_id: page_id.to_string(),
        participant_id: participant_id.to_string(),
        external_message_id: text_at(message, "/mid").map(str::to_string),
        body,
        sent_at: timestamp_ms(event.get("timestamp"), received_at),
    })
}

/// Extrai as mensagens recebidas do payload do webhook.
/// Formatos desconhecidos não geram erro: são simplesmente ignorados.
pub fn parse_events(payload: &Value, received_at: DateTime<Utc>) -> Vec<InboundMessage> {
    if payload.get("object").and_then(Value::as_str).is_some_and(|o| o != "page") {
        return Vec::new();
    }
    let Some(entries) = payload.get("entry").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let page_id = text_at(entry, "/id")?;
            let events = entry.get("messaging").and_then(Value::as_array)?;
            Some(events.iter().filter_map(move |event| parse_messaging(page_id, event, received_at)))
        })
        .flatten()
        .collect()
}

/// Handshake `hub.*` da assinatura do webhook. Devolve o desafio se o token confere.
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    configured_token: Option<&str>,
) -> Option<String> {
    let configured = configured_token.filter(|t| !t.is_empty())?;
    if mode != Some("subscribe") {
        return None;
    }
    let token = token?;
    if !bool::from(token.as_bytes().ct_eq(configured.as_bytes())) {
        return None;
    }
    challenge.map(str::to_string)
}

#[derive(Clone)]
pub struct MessengerService {
    repo: MessengerRepository,
    social_repo: SocialRepository,
    publisher: Arc<dyn SocialPublisher>,
    pool: PgPool,
}

impl MessengerService {
    pub fn new(
        repo: MessengerRepository,
        social_repo: SocialRepository,
        publisher: Arc<dyn SocialPublisher>,
        pool: PgPool,
    ) -> Self {
        Self { repo, social_repo, publisher, pool }
    }

    /// Grava cada mensagem recebida. Página desconhecida é ignorada em silêncio;
    /// reentregas não duplicam (id externo único).
    pub async fn ingest(&self, payload: &Value, received_at: DateTime<Utc>) -> IngestSummary {
        let events = parse_events(payload, received_at);
        ingest_events(self, &events).await
    }

    async fn load_conversation(
        &self,
        scope: &AccessScope,
        id: Uuid,
    ) -> Result<(Conversation, SocialPage), AppError> {
        let conversation = self
            .repo
            .find_conversation(&self.pool, id)
            .await?
            .ok_or(AppError::NotFound("entity.conversation"))?;
        let page = self
            .social_repo
            .find_page(&self.pool, conversation.page_id)
            .await?
            .ok_or(AppError::NotFound("entity.conversation"))?;
        scope.ensure_client(page.client_id, "entity.conversation")?;
        Ok((conversation, page))
    }

    pub async fn list_conversations(
        &self,
        scope: &AccessScope,
        page_id: Option<Uuid>,
    ) -> Result<Vec<Conversation>, AppError> {
        self.repo.list_conversations(scope.client_filter(), page_id).await
    }

    pub async fn messages(&self, scope: &AccessScope, conversation_id: Uuid) -> Result<Vec<MessengerMessage>, AppError> {
        self.load_conversation(scope, conversation_id).await?;
        self.repo.messages(&self.pool, conversation_id).await
    }

    /// Responde ao participante pela página e registra a mensagem como enviada.
    pub async fn reply(
        &self,
        scope: &AccessScope,
        conversation_id: Uuid,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<MessengerMessage, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::InvalidInput("message_required"));
        }

        let (conversation, page) = self.load_conversation(scope, conversation_id).await?;
        let credential = page_credential(&page)?;

        let external_id = self
            .publisher
            .send_direct_message(&page.external_page_id, &credential, &conversation.participant_id, text)
            .await?;

        let mut tx = self.pool.begin().await?;
        self.repo
            .upsert_conversation(&mut *tx, page.id, &conversation.participant_id, now)
            .await?;
        let message = self
            .repo
            .insert_message(
                &mut *tx,
                conversation.id,
                MessageDirection::Outbound,
                external_id.as_deref(),
                text,
                now,
            )
            .await?
            .ok_or_else(|| anyhow::anyhow!("mensagem enviada já registrada: {:?}", external_id))?;
        tx.commit().await?;

        tracing::info!(conversation_id = %conversation.id, message_id = %message.id, "Resposta enviada");
        Ok(message)
    }
}

#[async_trait]
impl InboxStore for MessengerService {
    async fn store_inbound(&self, event: &InboundMessage) -> Result<InboundOutcome, AppError> {
        let Some(page) = self
            .social_repo
            .find_page_by_external_id(&self.pool, &event.page_external_id)
            .await?
        else {
            return Ok(InboundOutcome::UnknownPage);
        };

        let mut tx = self.pool.begin().await?;
        let conversation = self
            .repo
            .upsert_conversation(&mut *tx, page.id, &event.participant_id, event.sent_at)
            .await?;
        let inserted = self
            .repo
            .insert_message(
                &mut *tx,
                conversation.id,
                MessageDirection::Inbound,
                event.external_message_id.as_deref(),
                &event.body,
                event.sent_at,
            )
            .await?;
        tx.commit().await?;

        match inserted {
            Some(message) => {
                tracing::info!(conversation_id = %conversation.id, message_id = %message.id, "Mensagem recebida");
                Ok(InboundOutcome::Stored)
            }
            None => Ok(InboundOutcome::Duplicate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Páginas conhecidas em memória; `broken` simula erro de banco.
    #[derive(Default)]
    struct FakeInbox {
        pages: HashSet<String>,
        broken: HashSet<String>,
        seen: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl InboxStore for FakeInbox {
        async fn store_inbound(&self, event: &InboundMessage) -> Result<InboundOutcome, AppError> {
            if !self.pages.contains(&event.page_external_id) {
                return Ok(InboundOutcome::UnknownPage);
            }
            let mid = event.external_message_id.clone().unwrap_or_default();
            if self.broken.contains(&mid) {
                return Err(AppError::InternalServerError(anyhow::anyhow!("connection reset")));
            }
            if self.seen.lock().unwrap().insert(mid) {
                Ok(InboundOutcome::Stored)
            } else {
                Ok(InboundOutcome::Duplicate)
            }
        }
    }

    fn inbound(page: &str, mid: &str) -> InboundMessage {
        InboundMessage {
            page_external_id: page.into(),
            participant_id: "USER9".into(),
            external_message_id: Some(mid.into()),
            body: "oi".into(),
            sent_at: now(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_text_messages_per_page() {
        let payload = json!({
            "object": "page",
            "entry": [{
                "id": "PAGE1",
                "time": 1717243200000_i64,
                "messaging": [{
                    "sender": {"id": "USER9"},
                    "recipient": {"id": "PAGE1"},
                    "timestamp": 1717243200000_i64,
                    "message": {"mid": "m_1", "text": "Vocês abrem domingo?"}
                }]
            }]
        });

        let events = parse_events(&payload, now());
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.page_external_id, "PAGE1");
        assert_eq!(event.participant_id, "USER9");
        assert_eq!(event.external_message_id.as_deref(), Some("m_1"));
        assert_eq!(event.body, "Vocês abrem domingo?");
        assert_eq!(event.sent_at, Utc.timestamp_millis_opt(1717243200000).unwrap());
    }

    #[test]
    fn echoes_and_unknown_shapes_are_ignored() {
        let payload = json!({
            "object": "page",
            "entry": [
                {"id": "PAGE1", "messaging": [
                    {"sender": {"id": "PAGE1"}, "message": {"mid": "m_2", "text": "eco", "is_echo": true}},
                    {"sender": {"id": "USER9"}, "delivery": {"mids": ["m_1"]}},
                    {"sender": {"id": "USER9"}, "message": {"mid": "m_3", "attachments": [{"type": "image"}]}}
                ]},
                {"id": "PAGE2", "changes": []},
                "garbage"
            ]
        });

        let events = parse_events(&payload, now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].body, ATTACHMENT_PLACEHOLDER);
        assert_eq!(events[0].sent_at, now());

        assert!(parse_events(&json!({"object": "instagram", "entry": []}), now()).is_empty());
        assert!(parse_events(&json!([1, 2, 3]), now()).is_empty());
    }

    #[test]
    fn subscription_handshake_requires_matching_token() {
        let ok = verify_subscription(Some("subscribe"), Some("s3cret"), Some("42"), Some("s3cret"));
        assert_eq!(ok.as_deref(), Some("42"));

        assert_eq!(verify_subscription(Some("subscribe"), Some("nope"), Some("42"), Some("s3cret")), None);
        assert_eq!(verify_subscription(Some("unsubscribe"), Some("s3cret"), Some("42"), Some("s3cret")), None);
        assert_eq!(verify_subscription(Some("subscribe"), Some(""), Some("42"), None), None);
    }

    #[tokio::test]
    async fn one_store_error_does_not_drop_the_rest_of_the_batch() {
        let store = FakeInbox {
            pages: HashSet::from(["PAGE1".to_string()]),
            broken: HashSet::from(["m_2".to_string()]),
            ..Default::default()
        };
        let events = [
            inbound("PAGE1", "m_1"),
            inbound("PAGE1", "m_2"),
            inbound("PAGE1", "m_3"),
            inbound("PAGE1", "m_1"),
            inbound("OTHER", "m_4"),
        ];

        let summary = ingest_events(&store, &events).await;

        assert_eq!(summary.received, 5);
        assert_eq!(summary.stored, 2);
        assert_eq!(summary.failed, 1);
        // Reentrega de m_1 e página desconhecida
        assert_eq!(summary.ignored, 2);
    }
}
