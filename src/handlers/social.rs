// src/handlers/social.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale, scope::Scope},
    models::social::{Conversation, MessengerMessage, PostStatus, SocialPage, SocialPost},
    services::social_service::{ConnectPageInput, CreatePostInput},
};

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectPagePayload {
    pub client_id: Uuid,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "104729384756")]
    pub external_page_id: String,

    #[validate(length(min = 1, message = "required"))]
    pub access_token: String,

    #[schema(example = "Padaria Central")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageImagePayload {
    #[validate(url(message = "invalid_url"))]
    #[schema(example = "https://cdn.exemplo.com/logo.png")]
    pub image_url: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostPayload {
    pub client_id: Uuid,
    pub page_id: Uuid,

    #[validate(length(min = 1, message = "caption_required"))]
    #[schema(example = "Promoção de pães de fermentação natural!")]
    pub caption: String,

    // Presente: já nasce agendado
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCaptionPayload {
    #[validate(length(min = 1, message = "caption_required"))]
    pub caption: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePostPayload {
    // Ausente: volta para rascunho
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPayload {
    #[validate(length(min = 1, message = "message_required"))]
    #[schema(example = "Olá! Já verificamos seu pedido.")]
    pub text: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PostListQuery {
    pub client_id: Option<Uuid>,
    pub status: Option<PostStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ConversationListQuery {
    pub page_id: Option<Uuid>,
}

// =============================================================================
//  PÁGINAS
// =============================================================================

// POST /api/social/pages
#[utoipa::path(
    post,
    path = "/api/social/pages",
    tag = "Social",
    request_body = ConnectPagePayload,
    responses(
        (status = 201, description = "Página conectada ao cliente", body = SocialPage),
        (status = 409, description = "Página já conectada a outro cliente")
    ),
    security(("api_jwt" = []))
)]
pub async fn connect_page(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Json(payload): Json<ConnectPagePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let input = ConnectPageInput {
        client_id: payload.client_id,
        external_page_id: payload.external_page_id,
        access_token: payload.access_token,
        name: payload.name,
    };

    let page = app_state
        .social_service
        .connect_page(&scope, input)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(page)))
}

// GET /api/social/pages
#[utoipa::path(
    get,
    path = "/api/social/pages",
    tag = "Social",
    responses(
        (status = 200, description = "Páginas visíveis", body = Vec<SocialPage>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_pages(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
) -> Result<impl IntoResponse, ApiError> {
    let pages = app_state
        .social_service
        .list_pages(&scope)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(pages)))
}

// POST /api/social/pages/{id}/refresh
#[utoipa::path(
    post,
    path = "/api/social/pages/{id}/refresh",
    tag = "Social",
    params(("id" = Uuid, Path, description = "ID da página")),
    responses(
        (status = 200, description = "Perfil sincronizado com a plataforma", body = SocialPage),
        (status = 502, description = "Falha na plataforma")
    ),
    security(("api_jwt" = []))
)]
pub async fn refresh_page_profile(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let page = app_state
        .social_service
        .refresh_profile(&scope, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(page)))
}

// POST /api/social/pages/{id}/profile-image
#[utoipa::path(
    post,
    path = "/api/social/pages/{id}/profile-image",
    tag = "Social",
    params(("id" = Uuid, Path, description = "ID da página")),
    request_body = PageImagePayload,
    responses(
        (status = 200, description = "Foto de perfil trocada", body = SocialPage),
        (status = 502, description = "Falha na plataforma")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_profile_image(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
    Json(payload): Json<PageImagePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let page = app_state
        .social_service
        .update_profile_image(&scope, id, &payload.image_url)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(page)))
}

// POST /api/social/pages/{id}/cover-image
#[utoipa::path(
    post,
    path = "/api/social/pages/{id}/cover-image",
    tag = "Social",
    params(("id" = Uuid, Path, description = "ID da página")),
    request_body = PageImagePayload,
    responses(
        (status = 200, description = "Capa trocada", body = SocialPage),
        (status = 502, description = "Falha na plataforma")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_cover_image(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
    Json(payload): Json<PageImagePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let page = app_state
        .social_service
        .update_cover_image(&scope, id, &payload.image_url)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(page)))
}

// =============================================================================
//  POSTAGENS
// =============================================================================

// POST /api/social/posts
#[utoipa::path(
    post,
    path = "/api/social/posts",
    tag = "Social",
    request_body = CreatePostPayload,
    responses(
        (status = 201, description = "Postagem criada (rascunho ou agendada)", body = SocialPost),
        (status = 400, description = "Legenda vazia ou data no passado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_post(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Scope(scope): Scope,
    Json(payload): Json<CreatePostPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let input = CreatePostInput {
        client_id: payload.client_id,
        page_id: payload.page_id,
        caption: payload.caption,
        scheduled_for: payload.scheduled_for,
    };

    let post = app_state
        .social_service
        .create_post(&scope, user.id, input, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(post)))
}

// GET /api/social/posts
#[utoipa::path(
    get,
    path = "/api/social/posts",
    tag = "Social",
    params(PostListQuery),
    responses(
        (status = 200, description = "Postagens visíveis", body = Vec<SocialPost>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_posts(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Query(query): Query<PostListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let posts = app_state
        .social_service
        .list_posts(&scope, query.client_id, query.status)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(posts)))
}

// GET /api/social/posts/{id}
#[utoipa::path(
    get,
    path = "/api/social/posts/{id}",
    tag = "Social",
    params(("id" = Uuid, Path, description = "ID da postagem")),
    responses(
        (status = 200, description = "Postagem", body = SocialPost),
        (status = 404, description = "Não encontrada ou fora do escopo")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_post(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let post = app_state
        .social_service
        .get_post(&scope, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(post)))
}

// PATCH /api/social/posts/{id}/caption
#[utoipa::path(
    patch,
    path = "/api/social/posts/{id}/caption",
    tag = "Social",
    params(("id" = Uuid, Path, description = "ID da postagem")),
    request_body = UpdateCaptionPayload,
    responses(
        (status = 200, description = "Legenda atualizada", body = SocialPost),
        (status = 409, description = "Postagem não é mais editável")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_caption(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCaptionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let post = app_state
        .social_service
        .update_caption(&scope, id, &payload.caption)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(post)))
}

// POST /api/social/posts/{id}/schedule
#[utoipa::path(
    post,
    path = "/api/social/posts/{id}/schedule",
    tag = "Social",
    params(("id" = Uuid, Path, description = "ID da postagem")),
    request_body = SchedulePostPayload,
    responses(
        (status = 200, description = "Agendamento definido ou removido", body = SocialPost),
        (status = 409, description = "Transição inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn schedule_post(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
    Json(payload): Json<SchedulePostPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let post = app_state
        .social_service
        .schedule(&scope, id, payload.scheduled_for, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(post)))
}

// POST /api/social/posts/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/social/posts/{id}/cancel",
    tag = "Social",
    params(("id" = Uuid, Path, description = "ID da postagem")),
    responses(
        (status = 200, description = "Postagem cancelada", body = SocialPost),
        (status = 409, description = "Transição inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_post(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let post = app_state
        .social_service
        .cancel(&scope, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(post)))
}

// =============================================================================
//  CAIXA DE ENTRADA
// =============================================================================

// GET /api/social/conversations
#[utoipa::path(
    get,
    path = "/api/social/conversations",
    tag = "Social",
    params(ConversationListQuery),
    responses(
        (status = 200, description = "Conversas mais recentes primeiro", body = Vec<Conversation>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_conversations(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Query(query): Query<ConversationListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let conversations = app_state
        .messenger_service
        .list_conversations(&scope, query.page_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(conversations)))
}

// GET /api/social/conversations/{id}/messages
#[utoipa::path(
    get,
    path = "/api/social/conversations/{id}/messages",
    tag = "Social",
    params(("id" = Uuid, Path, description = "ID da conversa")),
    responses(
        (status = 200, description = "Mensagens em ordem cronológica", body = Vec<MessengerMessage>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_messages(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = app_state
        .messenger_service
        .messages(&scope, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(messages)))
}

// POST /api/social/conversations/{id}/messages
#[utoipa::path(
    post,
    path = "/api/social/conversations/{id}/messages",
    tag = "Social",
    params(("id" = Uuid, Path, description = "ID da conversa")),
    request_body = ReplyPayload,
    responses(
        (status = 201, description = "Resposta enviada pela página", body = MessengerMessage),
        (status = 502, description = "Falha na plataforma")
    ),
    security(("api_jwt" = []))
)]
pub async fn reply_to_conversation(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReplyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let message = app_state
        .messenger_service
        .reply(&scope, id, &payload.text, Utc::now())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(message)))
}
