// src/db/task_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::tasks::{NewTask, Task, TaskOccurrence, TaskStatus},
};

const TASK_COLUMNS: &str = "id, client_id, title, description, status, recurrence, \
    recurrence_interval, due_date, assignee_id, created_by, created_at, updated_at";

const OCCURRENCE_COLUMNS: &str =
    "id, task_id, due_date, status, completed_at, completed_by, created_at";

#[derive(Clone)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  TAREFAS
    // =========================================================================

    pub async fn create<'e, E>(&self, executor: E, input: &NewTask) -> Result<Task, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO tasks (client_id, title, description, recurrence, recurrence_interval, due_date, assignee_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(input.client_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.recurrence)
            .bind(input.recurrence_interval)
            .bind(input.due_date)
            .bind(input.assignee_id)
            .bind(input.created_by)
            .fetch_one(executor)
            .await?;

        Ok(task)
    }

    // Tarefas "gerais" (sem cliente) aparecem para qualquer escopo
    pub async fn list(
        &self,
        client_filter: Option<Vec<Uuid>>,
        client_id: Option<Uuid>,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM tasks
            WHERE (client_id IS NULL OR $1::uuid[] IS NULL OR client_id = ANY($1))
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::task_status IS NULL OR status = $3)
            ORDER BY due_date ASC NULLS LAST, created_at DESC
            "#,
            TASK_COLUMNS
        );

        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(client_filter)
            .bind(client_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(tasks)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Task>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);

        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(task)
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Task>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE tasks SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            TASK_COLUMNS
        );

        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(executor)
            .await?;

        Ok(task)
    }

    // =========================================================================
    //  OCORRÊNCIAS
    // =========================================================================

    /// Insere várias datas de uma vez; datas repetidas são ignoradas pela constraint.
    pub async fn insert_occurrences<'e, E>(
        &self,
        executor: E,
        task_id: Uuid,
        due_dates: &[NaiveDate],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO task_occurrences (task_id, due_date)
            SELECT $1, d FROM UNNEST($2::date[]) AS d
            ON CONFLICT (task_id, due_date) DO NOTHING
            "#,
        )
        .bind(task_id)
        .bind(due_dates)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn insert_occurrence<'e, E>(
        &self,
        executor: E,
        task_id: Uuid,
        due_date: NaiveDate,
    ) -> Result<Option<TaskOccurrence>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO task_occurrences (task_id, due_date)
            VALUES ($1, $2)
            ON CONFLICT (task_id, due_date) DO NOTHING
            RETURNING {}
            "#,
            OCCURRENCE_COLUMNS
        );

        let occurrence = sqlx::query_as::<_, TaskOccurrence>(&sql)
            .bind(task_id)
            .bind(due_date)
            .fetch_optional(executor)
            .await?;

        Ok(occurrence)
    }

    pub async fn occurrences<'e, E>(
        &self,
        executor: E,
        task_id: Uuid,
    ) -> Result<Vec<TaskOccurrence>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {} FROM task_occurrences WHERE task_id = $1 ORDER BY due_date ASC",
            OCCURRENCE_COLUMNS
        );

        let occurrences = sqlx::query_as::<_, TaskOccurrence>(&sql)
            .bind(task_id)
            .fetch_all(executor)
            .await?;

        Ok(occurrences)
    }

    pub async fn find_occurrence<'e, E>(
        &self,
        executor: E,
        task_id: Uuid,
        occurrence_id: Uuid,
    ) -> Result<Option<TaskOccurrence>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {} FROM task_occurrences WHERE id = $1 AND task_id = $2",
            OCCURRENCE_COLUMNS
        );

        let occurrence = sqlx::query_as::<_, TaskOccurrence>(&sql)
            .bind(occurrence_id)
            .bind(task_id)
            .fetch_optional(executor)
            .await?;

        Ok(occurrence)
    }

    // Condicional: só ocorrências pendentes. `None` = já concluída/pulada.
    pub async fn complete_occurrence<'e, E>(
        &self,
        executor: E,
        occurrence_id: Uuid,
        completed_by: Uuid,
    ) -> Result<Option<TaskOccurrence>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE task_occurrences
            SET status = 'completed', completed_at = NOW(), completed_by = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            OCCURRENCE_COLUMNS
        );

        let occurrence = sqlx::query_as::<_, TaskOccurrence>(&sql)
            .bind(occurrence_id)
            .bind(completed_by)
            .fetch_optional(executor)
            .await?;

        Ok(occurrence)
    }

    pub async fn skip_occurrence<'e, E>(
        &self,
        executor: E,
        occurrence_id: Uuid,
    ) -> Result<Option<TaskOccurrence>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE task_occurrences
            SET status = 'skipped'
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            OCCURRENCE_COLUMNS
        );

        let occurrence = sqlx::query_as::<_, TaskOccurrence>(&sql)
            .bind(occurrence_id)
            .fetch_optional(executor)
            .await?;

        Ok(occurrence)
    }

    // Data da ocorrência mais distante já criada para a tarefa
    pub async fn latest_due_date<'e, E>(
        &self,
        executor: E,
        task_id: Uuid,
    ) -> Result<Option<NaiveDate>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let latest = sqlx::query_scalar::<_, Option<NaiveDate>>(
            "SELECT MAX(due_date) FROM task_occurrences WHERE task_id = $1",
        )
        .bind(task_id)
        .fetch_one(executor)
        .await?;

        Ok(latest)
    }
}
