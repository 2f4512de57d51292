// src/middleware/cron.rs
//
// Guarda dos gatilhos "rodar agora" dos workers: segredo compartilhado no
// cabeçalho Authorization (Bearer).

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use subtle::ConstantTimeEq;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
};

/// Sem segredo configurado: 503 em produção (falha fechada), liberado em dev/test.
pub fn verify_cron_secret(
    provided: Option<&str>,
    configured: Option<&str>,
    production: bool,
) -> Result<(), AppError> {
    let Some(configured) = configured.filter(|s| !s.is_empty()) else {
        if production {
            return Err(AppError::CronNotConfigured);
        }
        tracing::warn!("CRON_SECRET ausente: gatilho liberado fora de produção");
        return Ok(());
    };

    let provided = provided.ok_or(AppError::CronUnauthorized)?;
    if bool::from(provided.as_bytes().ct_eq(configured.as_bytes())) {
        Ok(())
    } else {
        Err(AppError::CronUnauthorized)
    }
}

pub struct CronAuth;

impl FromRequestParts<AppState> for CronAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Ok(locale) = Locale::from_request_parts(parts, state).await;

        let bearer = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .ok();
        let provided = bearer.as_ref().map(|TypedHeader(auth)| auth.token());

        verify_cron_secret(
            provided,
            state.config.cron_secret.as_deref(),
            state.config.is_production(),
        )
        .map_err(|e| {
            tracing::warn!("Gatilho de job recusado: {}", e);
            e.to_api_error(&locale, &state.i18n_store)
        })?;

        Ok(CronAuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_secret_is_accepted() {
        assert!(verify_cron_secret(Some("s3cret"), Some("s3cret"), true).is_ok());
    }

    #[test]
    fn missing_or_wrong_secret_is_unauthorized() {
        assert!(matches!(
            verify_cron_secret(None, Some("s3cret"), true),
            Err(AppError::CronUnauthorized)
        ));
        assert!(matches!(
            verify_cron_secret(Some("guess"), Some("s3cret"), false),
            Err(AppError::CronUnauthorized)
        ));
    }

    #[test]
    fn unconfigured_secret_fails_closed_in_production_only() {
        assert!(matches!(
            verify_cron_secret(Some("anything"), None, true),
            Err(AppError::CronNotConfigured)
        ));
        assert!(verify_cron_secret(None, None, false).is_ok());
        assert!(matches!(
            verify_cron_secret(None, Some(""), true),
            Err(AppError::CronNotConfigured)
        ));
    }
}
