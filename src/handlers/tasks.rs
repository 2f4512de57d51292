// src/handlers/tasks.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale, scope::Scope},
    models::tasks::{CompletionOutcome, Task, TaskOccurrence, TaskRecurrence, TaskStatus, TaskWithOccurrences},
    services::task_service::CreateTaskInput,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub client_id: Option<Uuid>,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Relatório mensal de desempenho")]
    pub title: String,

    pub description: Option<String>,

    // Padrão: sem recorrência
    pub recurrence: Option<TaskRecurrence>,

    #[schema(example = 1)]
    pub recurrence_interval: Option<i32>,

    #[schema(value_type = Option<String>, format = Date, example = "2024-01-31")]
    pub due_date: Option<NaiveDate>,

    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TaskListQuery {
    pub client_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskStatusPayload {
    pub status: TaskStatus,
}

// POST /api/tasks
#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "Tasks",
    request_body = CreateTaskPayload,
    responses(
        (status = 201, description = "Tarefa criada com as ocorrências iniciais", body = TaskWithOccurrences),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_task(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Scope(scope): Scope,
    Json(payload): Json<CreateTaskPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let input = CreateTaskInput {
        client_id: payload.client_id,
        title: payload.title,
        description: payload.description,
        recurrence: payload.recurrence.unwrap_or(TaskRecurrence::None),
        recurrence_interval: payload.recurrence_interval,
        due_date: payload.due_date,
        assignee_id: payload.assignee_id,
    };

    let created = app_state
        .task_service
        .create(&scope, user.id, input)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/tasks
#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "Tasks",
    params(TaskListQuery),
    responses(
        (status = 200, description = "Tarefas visíveis", body = Vec<Task>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_tasks(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Query(query): Query<TaskListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tasks = app_state
        .task_service
        .list(&scope, query.client_id, query.status)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(tasks)))
}

// GET /api/tasks/{id}
#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "ID da tarefa")),
    responses(
        (status = 200, description = "Tarefa e ocorrências", body = TaskWithOccurrences),
        (status = 404, description = "Não encontrada ou fora do escopo")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_task(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = app_state
        .task_service
        .get(&scope, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(task)))
}

// PATCH /api/tasks/{id}/status
#[utoipa::path(
    patch,
    path = "/api/tasks/{id}/status",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "ID da tarefa")),
    request_body = UpdateTaskStatusPayload,
    responses(
        (status = 200, description = "Status atualizado", body = Task)
    ),
    security(("api_jwt" = []))
)]
pub async fn update_task_status(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let task = app_state
        .task_service
        .update_status(&scope, id, payload.status)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(task)))
}

// GET /api/tasks/{id}/occurrences
#[utoipa::path(
    get,
    path = "/api/tasks/{id}/occurrences",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "ID da tarefa")),
    responses(
        (status = 200, description = "Ocorrências em ordem de vencimento", body = Vec<TaskOccurrence>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_occurrences(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let occurrences = app_state
        .task_service
        .occurrences(&scope, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(occurrences)))
}

// POST /api/tasks/{id}/occurrences/{occurrence_id}/complete
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/occurrences/{occurrence_id}/complete",
    tag = "Tasks",
    params(
        ("id" = Uuid, Path, description = "ID da tarefa"),
        ("occurrence_id" = Uuid, Path, description = "ID da ocorrência")
    ),
    responses(
        (status = 200, description = "Ocorrência concluída; a próxima é gerada se faltar", body = CompletionOutcome),
        (status = 409, description = "Ocorrência já resolvida")
    ),
    security(("api_jwt" = []))
)]
pub async fn complete_occurrence(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Scope(scope): Scope,
    Path((id, occurrence_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = app_state
        .task_service
        .complete_occurrence(&scope, id, occurrence_id, user.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(outcome)))
}

// POST /api/tasks/{id}/occurrences/{occurrence_id}/skip
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/occurrences/{occurrence_id}/skip",
    tag = "Tasks",
    params(
        ("id" = Uuid, Path, description = "ID da tarefa"),
        ("occurrence_id" = Uuid, Path, description = "ID da ocorrência")
    ),
    responses(
        (status = 200, description = "Ocorrência pulada", body = TaskOccurrence),
        (status = 409, description = "Ocorrência já resolvida")
    ),
    security(("api_jwt" = []))
)]
pub async fn skip_occurrence(
    State(app_state): State<AppState>,
    locale: Locale,
    Scope(scope): Scope,
    Path((id, occurrence_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let occurrence = app_state
        .task_service
        .skip_occurrence(&scope, id, occurrence_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(occurrence)))
}
