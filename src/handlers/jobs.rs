// src/handlers/jobs.rs
//
// Gatilhos "rodar agora" dos workers, chamados pelo agendador externo.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{cron::CronAuth, i18n::Locale},
    models::jobs::{PublishRun, RecurringInvoiceRun, ReminderRun},
};

// POST /api/jobs/recurring-invoices
#[utoipa::path(
    post,
    path = "/api/jobs/recurring-invoices",
    tag = "Jobs",
    responses(
        (status = 200, description = "Faturas recorrentes geradas", body = RecurringInvoiceRun),
        (status = 401, description = "Segredo ausente ou incorreto"),
        (status = 503, description = "Segredo não configurado")
    ),
    security(("cron_secret" = []))
)]
pub async fn run_recurring_invoices(
    State(app_state): State<AppState>,
    locale: Locale,
    _auth: CronAuth,
) -> Result<impl IntoResponse, ApiError> {
    let run = app_state
        .billing_service
        .run(Utc::now().date_naive())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(run)))
}

// POST /api/jobs/payment-reminders
#[utoipa::path(
    post,
    path = "/api/jobs/payment-reminders",
    tag = "Jobs",
    responses(
        (status = 200, description = "Lembretes enviados", body = ReminderRun),
        (status = 401, description = "Segredo ausente ou incorreto"),
        (status = 503, description = "Segredo não configurado")
    ),
    security(("cron_secret" = []))
)]
pub async fn run_payment_reminders(
    State(app_state): State<AppState>,
    locale: Locale,
    _auth: CronAuth,
) -> Result<impl IntoResponse, ApiError> {
    let run = app_state
        .reminder_service
        .run(Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(run)))
}

// POST /api/jobs/publish-posts
#[utoipa::path(
    post,
    path = "/api/jobs/publish-posts",
    tag = "Jobs",
    responses(
        (status = 200, description = "Postagens vencidas processadas", body = PublishRun),
        (status = 401, description = "Segredo ausente ou incorreto"),
        (status = 503, description = "Segredo não configurado")
    ),
    security(("cron_secret" = []))
)]
pub async fn run_publish_posts(
    State(app_state): State<AppState>,
    locale: Locale,
    _auth: CronAuth,
) -> Result<impl IntoResponse, ApiError> {
    let run = app_state
        .social_service
        .run_publisher(Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(run)))
}
