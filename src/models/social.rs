// src/models/social.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

pub const PLATFORM_FACEBOOK: &str = "facebook";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "post_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Processing, // Reivindicado por uma execução do worker
    Published,
    Failed,
    Cancelled,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Processing => "processing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
            PostStatus::Cancelled => "cancelled",
        }
    }

    /// Só avança. Falha não volta para `scheduled` sozinha.
    pub fn can_transition_to(self, next: PostStatus) -> bool {
        use PostStatus::*;
        matches!(
            (self, next),
            (Draft, Scheduled)
                | (Scheduled, Draft)
                | (Scheduled, Processing)
                | (Scheduled, Failed)
                | (Processing, Published)
                | (Processing, Failed)
                | (Draft, Cancelled)
                | (Scheduled, Cancelled)
        )
    }

    pub fn ensure_transition(self, next: PostStatus) -> Result<(), AppError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }

    // Legenda e agenda só podem mudar antes da reivindicação
    pub fn is_editable(self) -> bool {
        matches!(self, PostStatus::Draft | PostStatus::Scheduled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "message_direction", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SocialPage {
    pub id: Uuid,
    pub client_id: Uuid,
    #[schema(example = "facebook")]
    pub platform: String,
    #[schema(example = "104857600000001")]
    pub external_page_id: String,
    #[schema(example = "Padaria Central")]
    pub name: Option<String>,
    pub picture_url: Option<String>,

    #[serde(skip_serializing)] // Credencial nunca sai pela API
    #[schema(ignore)]
    pub access_token: Option<String>,

    pub connected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SocialPost {
    pub id: Uuid,
    pub client_id: Uuid,
    pub page_id: Option<Uuid>,
    #[schema(example = "Pão quentinho saindo agora!")]
    pub caption: String,
    // Nulo = rascunho
    pub scheduled_for: Option<DateTime<Utc>>,
    pub status: PostStatus,
    pub external_post_id: Option<String>,
    pub permalink: Option<String>,
    pub last_error: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Linha do worker: post vencido + dados da página (LEFT JOIN)
#[derive(Debug, Clone, FromRow)]
pub struct DuePost {
    pub id: Uuid,
    pub client_id: Uuid,
    pub caption: String,
    pub page_id: Option<Uuid>,
    pub external_page_id: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub page_id: Uuid,
    #[schema(example = "6543210987654321")]
    pub participant_id: String,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessengerMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub direction: MessageDirection,
    pub external_message_id: Option<String>,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use PostStatus::*;

    #[test]
    fn failed_posts_are_not_requeued() {
        assert!(Processing.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Scheduled));
        assert!(!Failed.can_transition_to(Processing));
    }

    #[test]
    fn cancellation_only_before_claim() {
        assert!(Draft.can_transition_to(Cancelled));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(Processing.ensure_transition(Cancelled).is_err());
        assert!(Published.ensure_transition(Cancelled).is_err());
    }

    #[test]
    fn published_is_reached_only_through_processing() {
        assert!(!Scheduled.can_transition_to(Published));
        assert!(Processing.can_transition_to(Published));
    }
}
