// src/handlers/portal.rs
//
// Rotas públicas do portal do cliente: o token da fatura é a credencial.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::i18n::Locale,
    models::invoices::InvoiceDetail,
};

// GET /api/portal/invoices/{token}
#[utoipa::path(
    get,
    path = "/api/portal/invoices/{token}",
    tag = "Portal",
    params(("token" = String, Path, description = "Token público da fatura")),
    responses(
        (status = 200, description = "Fatura enviada ao cliente", body = InvoiceDetail),
        (status = 404, description = "Token desconhecido")
    )
)]
pub async fn get_portal_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = app_state
        .invoice_service
        .portal_view(&token)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(detail)))
}
