// src/db/settings_repo.rs

use chrono::Utc;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::settings::{AgencySettings, UpdateSettingsRequest},
};

const SETTINGS_COLUMNS: &str = "company_name, reply_to_email, address, currency, \
    invoice_prefix, invoice_number_width, updated_at";

#[derive(Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Linha única criada pela migration; se não existir, valem os padrões
    pub async fn get_settings<'e, E>(&self, executor: E) -> Result<AgencySettings, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM agency_settings WHERE id", SETTINGS_COLUMNS);

        let settings = sqlx::query_as::<_, AgencySettings>(&sql)
            .fetch_optional(executor)
            .await?;

        Ok(settings.unwrap_or_else(|| AgencySettings {
            company_name: None,
            reply_to_email: None,
            address: None,
            currency: "USD".to_string(),
            invoice_prefix: "INV-".to_string(),
            invoice_number_width: 4,
            updated_at: Utc::now(),
        }))
    }

    pub async fn current(&self) -> Result<AgencySettings, AppError> {
        self.get_settings(&self.pool).await
    }

    pub async fn update_settings<'e, E>(
        &self,
        executor: E,
        input: &UpdateSettingsRequest,
    ) -> Result<AgencySettings, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // UPSERT (Insert or Update); campos ausentes ficam como estão
        let sql = format!(
            r#"
            INSERT INTO agency_settings (id) VALUES (TRUE)
            ON CONFLICT (id) DO UPDATE SET
                company_name = COALESCE($1, agency_settings.company_name),
                reply_to_email = COALESCE($2, agency_settings.reply_to_email),
                address = COALESCE($3, agency_settings.address),
                currency = COALESCE($4, agency_settings.currency),
                invoice_prefix = COALESCE($5, agency_settings.invoice_prefix),
                invoice_number_width = COALESCE($6, agency_settings.invoice_number_width),
                updated_at = NOW()
            RETURNING {}
            "#,
            SETTINGS_COLUMNS
        );

        let settings = sqlx::query_as::<_, AgencySettings>(&sql)
            .bind(&input.company_name)
            .bind(&input.reply_to_email)
            .bind(&input.address)
            .bind(&input.currency)
            .bind(&input.invoice_prefix)
            .bind(input.invoice_number_width)
            .fetch_one(executor)
            .await?;

        Ok(settings)
    }
}
