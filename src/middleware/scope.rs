// src/middleware/scope.rs

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    common::error::{ApiError, AppError},
    models::scope::AccessScope,
};

// Escopo resolvido pelo auth_guard. Sem ele a rota não passou pelo guard.
pub struct Scope(pub AccessScope);

impl<S> FromRequestParts<S> for Scope
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccessScope>()
            .cloned()
            .map(Scope)
            .ok_or_else(|| ApiError {
                status: AppError::InvalidToken.status_code(),
                error: "Missing or invalid authentication token.".to_string(),
                details: None,
            })
    }
}
