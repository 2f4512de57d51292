// src/models/clients.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "client_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Lead,
    Active,
    Paused,
    Churned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "billing_frequency", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingFrequency {
    Monthly,
    Quarterly,
    Annual,
    Custom, // Sem geração automática
}

impl BillingFrequency {
    pub fn months_per_cycle(self) -> Option<u32> {
        match self {
            BillingFrequency::Monthly => Some(1),
            BillingFrequency::Quarterly => Some(3),
            BillingFrequency::Annual => Some(12),
            BillingFrequency::Custom => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BillingFrequency::Monthly => "Monthly",
            BillingFrequency::Quarterly => "Quarterly",
            BillingFrequency::Annual => "Annual",
            BillingFrequency::Custom => "Custom",
        }
    }
}

// O tenant: unidade de isolamento dos dados
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    #[schema(example = "Padaria Central")]
    pub name: String,
    #[schema(example = "financeiro@padariacentral.com")]
    pub email: Option<String>,
    pub status: ClientStatus,

    // Condições de cobrança
    pub billing_frequency: Option<BillingFrequency>,
    #[schema(example = "8500.00")]
    pub retainer_amount: Option<Decimal>,
    #[schema(value_type = Option<String>, format = Date, example = "2024-01-01")]
    pub renewal_date: Option<NaiveDate>,

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Linha do gerador de faturas recorrentes
#[derive(Debug, Clone, FromRow)]
pub struct BillableClient {
    pub id: Uuid,
    pub name: String,
    pub billing_frequency: BillingFrequency,
    pub retainer_amount: Decimal,
    pub renewal_date: Option<NaiveDate>,
    pub last_issue_date: Option<NaiveDate>, // Fatura mais recente (qualquer origem)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Padaria Central")]
    pub name: String,

    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,

    pub status: Option<ClientStatus>,
    pub billing_frequency: Option<BillingFrequency>,

    #[schema(example = "8500.00")]
    pub retainer_amount: Option<Decimal>,

    #[schema(value_type = Option<String>, format = Date, example = "2024-01-01")]
    pub renewal_date: Option<NaiveDate>,

    pub notes: Option<String>,
}

// Campos ausentes não mudam
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientRequest {
    #[validate(length(min = 1, message = "required"))]
    pub name: Option<String>,

    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,

    pub status: Option<ClientStatus>,
    pub billing_frequency: Option<BillingFrequency>,
    pub retainer_amount: Option<Decimal>,

    #[schema(value_type = Option<String>, format = Date)]
    pub renewal_date: Option<NaiveDate>,

    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_fixed_frequencies_have_a_cycle() {
        assert_eq!(BillingFrequency::Monthly.months_per_cycle(), Some(1));
        assert_eq!(BillingFrequency::Quarterly.months_per_cycle(), Some(3));
        assert_eq!(BillingFrequency::Annual.months_per_cycle(), Some(12));
        assert_eq!(BillingFrequency::Custom.months_per_cycle(), None);
    }
}
