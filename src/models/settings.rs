// src/models/settings.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::ledger::NumberingFormat;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgencySettings {
    #[schema(example = "Estúdio Aurora")]
    pub company_name: Option<String>,

    #[schema(example = "financeiro@aurora.studio")]
    pub reply_to_email: Option<String>,

    #[schema(example = "Av. Paulista, 1000")]
    pub address: Option<String>,

    #[schema(example = "USD")]
    pub currency: String,

    #[schema(example = "INV-")]
    pub invoice_prefix: String,

    #[schema(example = 4)]
    pub invoice_number_width: i32,

    pub updated_at: DateTime<Utc>,
}

impl AgencySettings {
    pub fn numbering(&self) -> NumberingFormat {
        let width = usize::try_from(self.invoice_number_width).unwrap_or(4);
        NumberingFormat::new(self.invoice_prefix.clone(), width)
    }

    pub fn sender_name(&self) -> &str {
        self.company_name.as_deref().unwrap_or("Billing")
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[schema(example = "Estúdio Aurora")]
    pub company_name: Option<String>,

    #[validate(email(message = "invalid_email"))]
    #[schema(example = "financeiro@aurora.studio")]
    pub reply_to_email: Option<String>,

    pub address: Option<String>,

    #[validate(length(equal = 3, message = "invalid_currency"))]
    #[schema(example = "BRL")]
    pub currency: Option<String>,

    #[validate(length(max = 16, message = "prefix_too_long"))]
    #[schema(example = "AUR-")]
    pub invoice_prefix: Option<String>,

    #[validate(range(min = 1, max = 12, message = "invalid_number_width"))]
    #[schema(example = 5)]
    pub invoice_number_width: Option<i32>,
}
