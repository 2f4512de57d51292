// src/db/client_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::clients::{BillableClient, Client, CreateClientRequest, UpdateClientRequest},
};

const CLIENT_COLUMNS: &str = "id, name, email, status, billing_frequency, retainer_amount, \
                              renewal_date, notes, created_at, updated_at";

#[derive(Clone)]
pub struct ClientRepository {
    pool: PgPool,
}

impl ClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        input: &CreateClientRequest,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO clients (name, email, status, billing_frequency, retainer_amount, renewal_date, notes)
            VALUES ($1, $2, COALESCE($3, 'lead'::client_status), $4, $5, $6, $7)
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        );

        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(&input.name)
            .bind(&input.email)
            .bind(input.status)
            .bind(input.billing_frequency)
            .bind(input.retainer_amount)
            .bind(input.renewal_date)
            .bind(&input.notes)
            .fetch_one(executor)
            .await?;

        Ok(client)
    }

    // Lista filtrada pelo escopo (None = todos)
    pub async fn list(&self, client_filter: Option<Vec<Uuid>>) -> Result<Vec<Client>, AppError> {
        let sql = format!(
            "SELECT {} FROM clients WHERE ($1::uuid[] IS NULL OR id = ANY($1)) ORDER BY name ASC",
            CLIENT_COLUMNS
        );

        let clients = sqlx::query_as::<_, Client>(&sql)
            .bind(client_filter)
            .fetch_all(&self.pool)
            .await?;

        Ok(clients)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM clients WHERE id = $1", CLIENT_COLUMNS);

        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(client)
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        input: &UpdateClientRequest,
    ) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE clients SET
                name              = COALESCE($2, name),
                email             = COALESCE($3, email),
                status            = COALESCE($4, status),
                billing_frequency = COALESCE($5, billing_frequency),
                retainer_amount   = COALESCE($6, retainer_amount),
                renewal_date      = COALESCE($7, renewal_date),
                notes             = COALESCE($8, notes),
                updated_at        = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        );

        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .bind(&input.name)
            .bind(&input.email)
            .bind(input.status)
            .bind(input.billing_frequency)
            .bind(input.retainer_amount)
            .bind(input.renewal_date)
            .bind(&input.notes)
            .fetch_optional(executor)
            .await?;

        Ok(client)
    }

    // Clientes elegíveis à cobrança recorrente, com a data da última fatura
    pub async fn billable_clients(&self) -> Result<Vec<BillableClient>, AppError> {
        let clients = sqlx::query_as::<_, BillableClient>(
            r#"
            SELECT
                c.id, c.name, c.billing_frequency, c.retainer_amount, c.renewal_date,
                (SELECT MAX(i.issue_date) FROM invoices i WHERE i.client_id = c.id) AS last_issue_date
            FROM clients c
            WHERE c.status = 'active'
              AND c.retainer_amount > 0
              AND c.billing_frequency IN ('monthly', 'quarterly', 'annual')
            ORDER BY c.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }
}
