// src/models/jobs.rs
//
// Resumos devolvidos pelos workers periódicos.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    DueSoon,
    Overdue,
}

// Erro isolado de uma entidade; não aborta a execução
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    pub entity_id: Uuid,
    #[schema(example = "Invoice number INV-0042 already exists.")]
    pub message: String,
    // Conflito de numeração: a próxima execução tende a resolver
    pub retryable: bool,
}

impl JobError {
    pub fn new(entity_id: Uuid, message: impl Into<String>) -> Self {
        Self { entity_id, message: message.into(), retryable: false }
    }

    pub fn retryable(entity_id: Uuid, message: impl Into<String>) -> Self {
        Self { entity_id, message: message.into(), retryable: true }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedInvoice {
    pub client_id: Uuid,
    pub invoice_id: Uuid,
    #[schema(example = "INV-0043")]
    pub number: String,
}

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecurringInvoiceRun {
    pub clients_checked: usize,
    pub created: Vec<GeneratedInvoice>,
    pub errors: Vec<JobError>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SentReminder {
    pub kind: ReminderKind,
    pub invoice_id: Uuid,
    pub number: String,
}

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRun {
    pub sent: usize,
    pub reminders: Vec<SentReminder>,
    pub errors: Vec<JobError>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishRun {
    pub attempted: usize,
    pub published: Vec<Uuid>,
    // Reivindicado por outra execução no meio do caminho
    pub skipped: usize,
    pub failed: Vec<JobError>,
}
