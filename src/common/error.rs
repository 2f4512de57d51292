// src/common/error.rs

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::common::i18n::I18nStore;
use crate::integrations::IntegrationError;
use crate::middleware::i18n::Locale;

// Erro interno da aplicação (serviços e repositórios).
// As variantes com `&'static str` carregam uma CHAVE de mensagem do catálogo i18n.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Entrada inválida: {0}")]
    InvalidInput(&'static str),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Acesso negado")]
    Forbidden,

    // Entidade fora do escopo também cai aqui (não vazamos existência)
    #[error("Registro não encontrado: {0}")]
    NotFound(&'static str),

    #[error("Transição inválida de {from} para {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Operação não permitida: {0}")]
    InvariantViolation(&'static str),

    // Colisão de numeração: o chamador pode tentar de novo
    #[error("Número de fatura já utilizado: {0}")]
    InvoiceNumberConflict(String),

    #[error("Segredo do agendador ausente ou inválido")]
    CronUnauthorized,

    #[error("Segredo do agendador não configurado")]
    CronNotConfigured,

    #[error("Falha na integração externa: {0}")]
    Integration(#[from] IntegrationError),

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

// O erro que sai pela API (já traduzido)
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::EmailAlreadyExists => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::InvalidToken | AppError::CronUnauthorized => {
                StatusCode::UNAUTHORIZED
            }
            AppError::UserNotFound | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::InvalidTransition { .. }
            | AppError::InvariantViolation(_)
            | AppError::InvoiceNumberConflict(_) => StatusCode::CONFLICT,
            AppError::CronNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Integration(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converte para a resposta da API no idioma do cliente.
    pub fn to_api_error(&self, locale: &Locale, i18n: &I18nStore) -> ApiError {
        let lang = locale.0.as_str();
        let status = self.status_code();

        let (error, details) = match self {
            AppError::ValidationError(errors) => {
                // BTreeMap para a "primeira" mensagem ser determinística
                let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages = field_errors
                        .iter()
                        .map(|e| {
                            let key = e.message.as_deref().unwrap_or(e.code.as_ref());
                            i18n.translate(lang, key)
                        })
                        .collect();
                    fields.insert(field.to_string(), messages);
                }

                let first = fields
                    .iter()
                    .find_map(|(field, msgs)| msgs.first().map(|m| format!("{}: {}", field, m)))
                    .unwrap_or_else(|| i18n.translate(lang, "validation_failed"));

                (first, Some(json!(fields)))
            }
            AppError::InvalidInput(key) | AppError::InvariantViolation(key) => {
                (i18n.translate(lang, key), None)
            }
            AppError::EmailAlreadyExists => (i18n.translate(lang, "email_already_exists"), None),
            AppError::InvalidCredentials => (i18n.translate(lang, "invalid_credentials"), None),
            AppError::InvalidToken => (i18n.translate(lang, "invalid_token"), None),
            AppError::UserNotFound => (i18n.translate(lang, "user_not_found"), None),
            AppError::Forbidden => (i18n.translate(lang, "forbidden"), None),
            AppError::NotFound(entity) => {
                let entity_name = i18n.translate(lang, entity);
                (i18n.format(lang, "not_found", &[entity_name.as_str()]), None)
            }
            AppError::InvalidTransition { from, to } => {
                (i18n.format(lang, "invalid_transition", &[from.as_str(), to.as_str()]), None)
            }
            AppError::InvoiceNumberConflict(number) => (
                i18n.format(lang, "invoice_number_conflict", &[number.as_str()]),
                Some(json!({ "retryable": true })),
            ),
            AppError::CronUnauthorized => (i18n.translate(lang, "cron_unauthorized"), None),
            AppError::CronNotConfigured => (i18n.translate(lang, "cron_not_configured"), None),
            AppError::Integration(e) => {
                tracing::warn!("Falha em integração externa: {}", e);
                (i18n.format(lang, "integration_failed", &[e.to_string().as_str()]), None)
            }
            e => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                (i18n.translate(lang, "internal_error"), None)
            }
        };

        ApiError { status, error, details }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Form {
        #[validate(length(min = 1, message = "required"))]
        name: String,
        #[validate(length(min = 1, message = "required"))]
        caption: String,
    }

    fn en() -> Locale {
        Locale("en".to_string())
    }

    #[test]
    fn validation_error_surfaces_first_field_as_plain_text() {
        let store = I18nStore::new();
        let errors = Form { name: String::new(), caption: String::new() }
            .validate()
            .unwrap_err();

        let api = AppError::ValidationError(errors).to_api_error(&en(), &store);

        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.error, "caption: This field is required.");
        assert!(api.details.unwrap().get("name").is_some());
    }

    #[test]
    fn not_found_names_the_entity_in_the_callers_language() {
        let store = I18nStore::new();
        let api = AppError::NotFound("entity.invoice")
            .to_api_error(&Locale("pt".to_string()), &store);

        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.error, "Fatura não encontrado(a).");
    }

    #[test]
    fn numbering_conflict_is_flagged_retryable() {
        let store = I18nStore::new();
        let api = AppError::InvoiceNumberConflict("INV-0007".into()).to_api_error(&en(), &store);

        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.details, Some(json!({ "retryable": true })));
        assert!(api.error.contains("INV-0007"));
    }

    #[test]
    fn cron_errors_map_to_unauthorized_and_unavailable() {
        assert_eq!(AppError::CronUnauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::CronNotConfigured.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
