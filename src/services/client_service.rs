// src/services/client_service.rs

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClientRepository, UserRepository},
    ledger::money::fit_retainer,
    models::{
        clients::{Client, CreateClientRequest, UpdateClientRequest},
        scope::AccessScope,
    },
};

#[derive(Clone)]
pub struct ClientService {
    repo: ClientRepository,
    user_repo: UserRepository,
    pool: PgPool,
}

fn check_retainer(amount: Option<Decimal>) -> Result<(), AppError> {
    match amount {
        Some(value) if value < Decimal::ZERO => Err(AppError::InvalidInput("amount_not_positive")),
        Some(value) => fit_retainer(value).map(|_| ()),
        None => Ok(()),
    }
}

impl ClientService {
    pub fn new(repo: ClientRepository, user_repo: UserRepository, pool: PgPool) -> Self {
        Self { repo, user_repo, pool }
    }

    // Criar cliente é ação de topo: só escopo irrestrito
    pub async fn create(&self, scope: &AccessScope, input: &CreateClientRequest) -> Result<Client, AppError> {
        scope.require_unrestricted()?;
        check_retainer(input.retainer_amount)?;

        let client = self.repo.create(&self.pool, input).await?;
        tracing::info!(client_id = %client.id, "Cliente criado");
        Ok(client)
    }

    pub async fn list(&self, scope: &AccessScope) -> Result<Vec<Client>, AppError> {
        self.repo.list(scope.client_filter()).await
    }

    pub async fn get(&self, scope: &AccessScope, id: Uuid) -> Result<Client, AppError> {
        scope.ensure_client(id, "entity.client")?;
        self.repo
            .find_by_id(&self.pool, id)
            .await?
            .ok_or(AppError::NotFound("entity.client"))
    }

    pub async fn update(
        &self,
        scope: &AccessScope,
        id: Uuid,
        input: &UpdateClientRequest,
    ) -> Result<Client, AppError> {
        scope.ensure_client(id, "entity.client")?;
        check_retainer(input.retainer_amount)?;

        self.repo
            .update(&self.pool, id, input)
            .await?
            .ok_or(AppError::NotFound("entity.client"))
    }

    pub async fn add_member(
        &self,
        scope: &AccessScope,
        client_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        scope.require_unrestricted()?;

        let mut tx = self.pool.begin().await?;
        self.repo
            .find_by_id(&mut *tx, client_id)
            .await?
            .ok_or(AppError::NotFound("entity.client"))?;
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;
        self.user_repo.add_membership(&mut *tx, user_id, client_id).await?;
        tx.commit().await?;

        tracing::info!(client_id = %client_id, user_id = %user_id, "Membro vinculado ao cliente");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn negative_retainer_is_rejected() {
        assert!(check_retainer(None).is_ok());
        assert!(check_retainer(Some(Decimal::ZERO)).is_ok());
        assert!(matches!(
            check_retainer(Some(Decimal::from_str("-1").unwrap())),
            Err(AppError::InvalidInput("amount_not_positive"))
        ));
        assert!(matches!(
            check_retainer(Some(Decimal::from_str("8500.505").unwrap())),
            Err(AppError::InvalidInput("amount_too_precise"))
        ));
        assert!(matches!(
            check_retainer(Some(Decimal::from_str("10000000000").unwrap())),
            Err(AppError::InvalidInput("amount_out_of_range"))
        ));
    }
}
