// src/services/scope_service.rs

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::{
        auth::{User, UserRole},
        scope::AccessScope,
    },
};

// Resolve o escopo uma única vez, na borda (middleware); daí em diante ele é
// passado explicitamente para cada operação.
#[derive(Clone)]
pub struct ScopeService {
    user_repo: UserRepository,
}

impl ScopeService {
    pub fn new(user_repo: UserRepository) -> Self {
        Self { user_repo }
    }

    pub async fn resolve(&self, user: &User) -> Result<AccessScope, AppError> {
        match user.role {
            UserRole::Admin => Ok(AccessScope::Unrestricted),
            UserRole::Member => {
                let ids = self.user_repo.member_client_ids(user.id).await?;
                Ok(AccessScope::clients(ids))
            }
        }
    }
}
