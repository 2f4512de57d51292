// src/handlers/invoices.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    ledger::InvoiceTotals,
    middleware::{i18n::Locale, scope::Scope},
    models::invoices::{InvoiceDetail, InvoiceListItem, InvoiceStatus, LineItemInput, PaymentReceipt, StatusChange},
    services::invoice_service::{self, CreateInvoiceInput, RecordPaymentInput},
};

// --- Payloads ---

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct InvoiceListQuery {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoicePayload {
    pub client_id: Uuid,

    #[schema(value_type = String, format = Date, example = "2024-02-01")]
    pub issue_date: NaiveDate,

    #[schema(value_type = String, format = Date, example = "2024-03-01")]
    pub due_date: NaiveDate,

    #[schema(value_type = Option<String>, example = "0.00")]
    pub tax: Option<Value>,

    pub notes: Option<String>,

    #[validate(length(min = 1, message = "line_items_required"))]
    pub line_items: Vec<LineItemInput>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceLineItemsPayload {
    #[validate(length(min = 1, message = "line_items_required"))]
    pub line_items: Vec<LineItemInput>,

    // Ausente: mantém o imposto atual
    #[schema(value_type = Option<String>, example = "150.00")]
    pub tax: Option<Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewTotalsPayload {
    pub line_items: Vec<LineItemInput>,
    #[schema(value_type = Option<String>, example = "0.00")]
    pub tax: Option<Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusPayload {
    pub status: InvoiceStatus,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentPayload {
    // Obrigatório quando não há fatura
    pub client_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,

    #[schema(value_type = String, example = "600.00")]
    pub amount: Value,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "bank_transfer")]
    pub method: String,

    #[schema(value_type = String, format = Date, example = "2024-02-10")]
    pub paid_at: NaiveDate,

    pub reference: Option<String>,
    pub notes: Option<String>,
}

// GET /api/invoices
#[utoipa::path(
    get,
    path = "/api/invoices",
    tag = "Invoices",
    params(InvoiceListQuery),
    responses(
        (status = 200, description = "Faturas visíveis, com o total já pago", body = Vec<InvoiceListItem>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_invoices(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Query(query): Query<InvoiceListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let invoices = app_state
        .invoice_service
        .list(&scope, query.status, query.client_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(invoices)))
}

// GET /api/invoices/{id}
#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "ID da fatura")),
    responses(
        (status = 200, description = "Fatura com itens, pagamentos e saldo", body = InvoiceDetail),
        (status = 404, description = "Não encontrada ou fora do escopo")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = app_state
        .invoice_service
        .detail(&scope, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(detail)))
}

// POST /api/invoices
#[utoipa::path(
    post,
    path = "/api/invoices",
    tag = "Invoices",
    request_body = CreateInvoicePayload,
    responses(
        (status = 201, description = "Rascunho criado com número sequencial", body = InvoiceDetail),
        (status = 400, description = "Itens ou datas inválidos"),
        (status = 409, description = "Conflito de numeração")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Json(payload): Json<CreateInvoicePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let input = CreateInvoiceInput {
        client_id: payload.client_id,
        issue_date: payload.issue_date,
        due_date: payload.due_date,
        tax: payload.tax,
        notes: payload.notes,
        line_items: payload.line_items,
    };

    let detail = app_state
        .invoice_service
        .create(&scope, input)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(detail)))
}

// PUT /api/invoices/{id}/line-items
#[utoipa::path(
    put,
    path = "/api/invoices/{id}/line-items",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "ID da fatura")),
    request_body = ReplaceLineItemsPayload,
    responses(
        (status = 200, description = "Itens substituídos e totais recalculados", body = InvoiceDetail),
        (status = 422, description = "Fatura não está em rascunho")
    ),
    security(("api_jwt" = []))
)]
pub async fn replace_line_items(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReplaceLineItemsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let detail = app_state
        .invoice_service
        .replace_line_items(&scope, id, &payload.line_items, payload.tax.as_ref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(detail)))
}

// POST /api/invoices/{id}/status
#[utoipa::path(
    post,
    path = "/api/invoices/{id}/status",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "ID da fatura")),
    request_body = SetStatusPayload,
    responses(
        (status = 200, description = "Status alterado; falha no e-mail volta como aviso", body = StatusChange),
        (status = 409, description = "Transição inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_invoice_status(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let change = app_state
        .invoice_service
        .set_status(&scope, id, payload.status)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(change)))
}

// POST /api/invoices/preview
#[utoipa::path(
    post,
    path = "/api/invoices/preview",
    tag = "Invoices",
    request_body = PreviewTotalsPayload,
    responses(
        (status = 200, description = "Totais calculados sem gravar nada", body = InvoiceTotals)
    ),
    security(("api_jwt" = []))
)]
pub async fn preview_totals(Json(payload): Json<PreviewTotalsPayload>) -> Json<InvoiceTotals> {
    Json(invoice_service::preview_totals(&payload.line_items, payload.tax.as_ref()))
}

// POST /api/payments
#[utoipa::path(
    post,
    path = "/api/payments",
    tag = "Invoices",
    request_body = RecordPaymentPayload,
    responses(
        (status = 201, description = "Pagamento registrado e fatura conciliada", body = PaymentReceipt),
        (status = 400, description = "Valor inválido"),
        (status = 422, description = "Fatura anulada")
    ),
    security(("api_jwt" = []))
)]
pub async fn record_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Json(payload): Json<RecordPaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let input = RecordPaymentInput {
        client_id: payload.client_id,
        invoice_id: payload.invoice_id,
        amount: payload.amount,
        method: payload.method,
        paid_at: payload.paid_at,
        reference: payload.reference,
        notes: payload.notes,
    };

    let receipt = app_state
        .invoice_service
        .record_payment(&scope, input)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(receipt)))
}
