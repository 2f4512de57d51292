// src/models/invoices.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

pub const SOURCE_MANUAL: &str = "manual";
pub const SOURCE_RECURRING: &str = "recurring";

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue, // Derivado: enviado e vencido (ver varredura)
    Void,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Void => "void",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Void)
    }

    // Em aberto = elegível a lembrete e a atraso
    pub fn is_open(self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }

    /// Máquina de estados completa (inclui a transição derivada sent -> overdue).
    /// Nada volta para draft.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        match (self, next) {
            (Draft, Sent) | (Draft, Void) => true,
            (Sent, Paid) | (Sent, Overdue) | (Sent, Void) => true,
            (Overdue, Paid) | (Overdue, Void) => true,
            _ => false,
        }
    }

    /// Transição pedida pelo usuário. `overdue` não é alvo manual.
    pub fn check_manual_transition(self, next: InvoiceStatus) -> Result<(), AppError> {
        if next == InvoiceStatus::Overdue {
            return Err(AppError::InvalidInput("overdue_is_derived"));
        }
        if !self.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        Ok(())
    }

    pub fn accepts_payment(self) -> bool {
        self != InvoiceStatus::Void
    }
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub client_id: Uuid,

    #[schema(example = "INV-0042")]
    pub number: String,

    #[schema(value_type = String, format = Date, example = "2024-02-01")]
    pub issue_date: NaiveDate,
    #[schema(value_type = String, format = Date, example = "2024-03-01")]
    pub due_date: NaiveDate,

    pub status: InvoiceStatus,

    #[schema(example = "recurring")]
    pub source: String,

    // Valores
    #[schema(example = "8500.00")]
    pub subtotal: Decimal,
    #[schema(example = "0.00")]
    pub tax: Decimal,
    #[schema(example = "8500.00")]
    pub total: Decimal,

    pub notes: Option<String>,

    // Token do portal público (gerado no primeiro envio)
    pub portal_token: Option<String>,

    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
    pub last_reminder_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceListItem {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub invoice: Invoice,
    #[schema(example = "Padaria Central")]
    pub client_name: String,
    #[schema(example = "600.00")]
    pub amount_paid: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLineItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    #[schema(example = 1)]
    pub position: i32,
    #[schema(example = "Gestão de redes sociais")]
    pub description: String,
    #[schema(example = "1")]
    pub quantity: Decimal,
    #[schema(example = "8500.00")]
    pub unit_price: Decimal,
    #[schema(example = "8500.00")]
    pub line_total: Decimal,
}

// Item como chega da API: valores aceitam número ou texto numérico
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItemInput {
    #[schema(example = "Gestão de redes sociais")]
    pub description: String,
    #[schema(value_type = String, example = "1")]
    pub quantity: serde_json::Value,
    #[schema(value_type = String, example = "8500.00")]
    pub unit_price: serde_json::Value,
}

// Item ainda não persistido (já validado e convertido)
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemDraft {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub invoice_id: Option<Uuid>,
    #[schema(example = "600.00")]
    pub amount: Decimal,
    #[schema(example = "bank_transfer")]
    pub method: String,
    #[schema(value_type = String, format = Date, example = "2024-02-10")]
    pub paid_at: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Dados de inserção (totais já calculados a partir dos itens)
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub client_id: Uuid,
    pub number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub source: &'static str,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub client_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: String,
    pub paid_at: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

// Linha do agendador de lembretes
#[derive(Debug, Clone, FromRow)]
pub struct ReminderCandidate {
    pub id: Uuid,
    pub number: String,
    pub client_id: Uuid,
    pub client_name: String,
    pub client_email: String,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub portal_token: Option<String>,
    pub last_reminder_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub client_name: String,
    pub line_items: Vec<InvoiceLineItem>,
    pub payments: Vec<Payment>,
    #[schema(example = "600.00")]
    pub amount_paid: Decimal,
    #[schema(example = "400.00")]
    pub remaining: Decimal,
    // Pagamento a maior é aceito, mas sinalizado
    pub overpaid_by: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub invoice_status: Option<InvoiceStatus>,
    pub amount_paid: Option<Decimal>,
    pub remaining: Option<Decimal>,
    pub overpaid_by: Option<Decimal>,
    // true quando este pagamento quitou a fatura
    pub marked_paid: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub invoice: Invoice,
    pub email_sent: bool,
    // Sucesso parcial: o status mudou, mas o e-mail falhou
    pub warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use InvoiceStatus::*;

    #[test]
    fn lifecycle_moves_forward_only() {
        assert!(Draft.can_transition_to(Sent));
        assert!(Sent.can_transition_to(Overdue));
        assert!(Overdue.can_transition_to(Paid));
        assert!(Sent.can_transition_to(Void));

        for from in [Sent, Paid, Overdue, Void] {
            assert!(!from.can_transition_to(Draft), "{:?} -> draft", from);
        }
        assert!(!Paid.can_transition_to(Void));
        assert!(!Void.can_transition_to(Paid));
    }

    #[test]
    fn overdue_is_not_a_manual_target() {
        assert!(matches!(
            Sent.check_manual_transition(Overdue),
            Err(AppError::InvalidInput("overdue_is_derived"))
        ));
        assert!(matches!(
            Paid.check_manual_transition(Sent),
            Err(AppError::InvalidTransition { .. })
        ));
        assert!(Draft.check_manual_transition(Sent).is_ok());
    }

    #[test]
    fn void_invoices_reject_payments() {
        assert!(!Void.accepts_payment());
        assert!(Overdue.accepts_payment());
        assert!(Draft.accepts_payment());
    }
}
