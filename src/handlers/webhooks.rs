// src/handlers/webhooks.rs
//
// Webhook do Messenger. Público: a verificação usa o token de assinatura e a
// entrega de eventos é sempre reconhecida para a plataforma não reenviar lixo.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;

use crate::{
    config::AppState,
    services::messenger_service::{self, IngestSummary},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubscriptionQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,

    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,

    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

// GET /api/webhooks/messenger
#[utoipa::path(
    get,
    path = "/api/webhooks/messenger",
    tag = "Webhooks",
    params(SubscriptionQuery),
    responses(
        (status = 200, description = "Desafio devolvido em texto puro", body = String),
        (status = 403, description = "Token de verificação não confere")
    )
)]
pub async fn verify_messenger(
    State(app_state): State<AppState>,
    Query(query): Query<SubscriptionQuery>,
) -> Response {
    match messenger_service::verify_subscription(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
        app_state.config.messenger_verify_token.as_deref(),
    ) {
        Some(challenge) => (StatusCode::OK, challenge).into_response(),
        None => {
            tracing::warn!("Verificação do webhook do Messenger recusada");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

// POST /api/webhooks/messenger
#[utoipa::path(
    post,
    path = "/api/webhooks/messenger",
    tag = "Webhooks",
    request_body(content = Object, description = "Evento bruto da plataforma"),
    responses(
        (status = 200, description = "Evento reconhecido", body = IngestSummary)
    )
)]
pub async fn receive_messenger(
    State(app_state): State<AppState>,
    body: Bytes,
) -> Json<IngestSummary> {
    // Corpo que nem é JSON: reconhece e descarta
    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        tracing::warn!(bytes = body.len(), "Webhook do Messenger com corpo inválido ignorado");
        return Json(IngestSummary::default());
    };

    Json(app_state.messenger_service.ingest(&payload, Utc::now()).await)
}
