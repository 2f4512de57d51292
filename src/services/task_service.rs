// src/services/task_service.rs

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClientRepository, TaskRepository},
    ledger::DateStep,
    models::{
        scope::AccessScope,
        tasks::{
            CompletionOutcome, NewTask, Task, TaskOccurrence, TaskRecurrence, TaskStatus,
            TaskWithOccurrences,
        },
    },
};

// Quantas ocorrências futuras são criadas junto com a tarefa recorrente
pub const PREMATERIALIZED_OCCURRENCES: u32 = 12;
const MAX_INTERVAL: i32 = 365;

pub struct CreateTaskInput {
    pub client_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub recurrence: TaskRecurrence,
    pub recurrence_interval: Option<i32>,
    pub due_date: Option<NaiveDate>,
    pub assignee_id: Option<Uuid>,
}

/// Primeira ocorrência na âncora e mais `count` passos a partir dela.
/// Cada data é calculada a partir da âncora, então fim de mês não deriva.
pub fn occurrence_schedule(anchor: NaiveDate, step: Option<DateStep>, count: u32) -> Vec<NaiveDate> {
    let Some(step) = step else {
        return vec![anchor];
    };

    std::iter::once(anchor)
        .chain((1..=count).map_while(|i| step.apply_times(anchor, i)))
        .collect()
}

/// Próxima ocorrência a criar depois de concluir a de `completed_due`.
/// Nada é criado se já existe ocorrência nessa data ou depois dela.
pub fn plan_next_occurrence(
    completed_due: NaiveDate,
    step: Option<DateStep>,
    latest_existing: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let next = step?.apply(completed_due)?;
    match latest_existing {
        Some(latest) if latest >= next => None,
        _ => Some(next),
    }
}

fn validate_new_task(input: &CreateTaskInput) -> Result<i32, AppError> {
    if input.title.trim().is_empty() {
        return Err(AppError::InvalidInput("required"));
    }

    let interval = input.recurrence_interval.unwrap_or(1);
    if !(1..=MAX_INTERVAL).contains(&interval) {
        return Err(AppError::InvalidInput("interval_out_of_range"));
    }
    if input.recurrence.is_recurring() && input.due_date.is_none() {
        return Err(AppError::InvalidInput("recurring_task_needs_due_date"));
    }
    Ok(interval)
}

#[derive(Clone)]
pub struct TaskService {
    repo: TaskRepository,
    client_repo: ClientRepository,
    pool: PgPool,
}

impl TaskService {
    pub fn new(repo: TaskRepository, client_repo: ClientRepository, pool: PgPool) -> Self {
        Self { repo, client_repo, pool }
    }

    fn ensure_visible(scope: &AccessScope, task: &Task) -> Result<(), AppError> {
        if scope.allows_optional(task.client_id) {
            Ok(())
        } else {
            Err(AppError::NotFound("entity.task"))
        }
    }

    async fn load(&self, scope: &AccessScope, id: Uuid) -> Result<Task, AppError> {
        let task = self
            .repo
            .find_by_id(&self.pool, id)
            .await?
            .ok_or(AppError::NotFound("entity.task"))?;
        Self::ensure_visible(scope, &task)?;
        Ok(task)
    }

    pub async fn create(
        &self,
        scope: &AccessScope,
        created_by: Uuid,
        input: CreateTaskInput,
    ) -> Result<TaskWithOccurrences, AppError> {
        let interval = validate_new_task(&input)?;
        if let Some(client_id) = input.client_id {
            scope.ensure_client(client_id, "entity.client")?;
        }

        let mut tx = self.pool.begin().await?;

        if let Some(client_id) = input.client_id {
            self.client_repo
                .find_by_id(&mut *tx, client_id)
                .await?
                .ok_or(AppError::NotFound("entity.client"))?;
        }

        let task = self
            .repo
            .create(
                &mut *tx,
                &NewTask {
                    client_id: input.client_id,
                    title: input.title.trim().to_string(),
                    description: input.description,
                    recurrence: input.recurrence,
                    recurrence_interval: interval,
                    due_date: input.due_date,
                    assignee_id: input.assignee_id,
                    created_by,
                },
            )
            .await?;

        if let Some(anchor) = task.due_date {
            let dates = occurrence_schedule(anchor, task.recurrence_step(), PREMATERIALIZED_OCCURRENCES);
            self.repo.insert_occurrences(&mut *tx, task.id, &dates).await?;
        }

        let occurrences = self.repo.occurrences(&mut *tx, task.id).await?;
        tx.commit().await?;

        tracing::info!(
            task_id = %task.id,
            recurrence = ?task.recurrence,
            occurrences = occurrences.len(),
            "Tarefa criada"
        );
        Ok(TaskWithOccurrences { task, occurrences })
    }

    pub async fn list(
        &self,
        scope: &AccessScope,
        client_id: Option<Uuid>,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, AppError> {
        self.repo.list(scope.client_filter(), client_id, status).await
    }

    pub async fn get(&self, scope: &AccessScope, id: Uuid) -> Result<TaskWithOccurrences, AppError> {
        let task = self.load(scope, id).await?;
        let occurrences = self.repo.occurrences(&self.pool, id).await?;
        Ok(TaskWithOccurrences { task, occurrences })
    }

    pub async fn occurrences(&self, scope: &AccessScope, id: Uuid) -> Result<Vec<TaskOccurrence>, AppError> {
        self.load(scope, id).await?;
        self.repo.occurrences(&self.pool, id).await
    }

    pub async fn update_status(
        &self,
        scope: &AccessScope,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Task, AppError> {
        self.load(scope, id).await?;
        self.repo
            .update_status(&self.pool, id, status)
            .await?
            .ok_or(AppError::NotFound("entity.task"))
    }

    /// Conclui a ocorrência (só se pendente) e, se a tarefa for recorrente,
    /// cria a próxima a partir da data da concluída. Tarefa avulsa vira `done`.
    pub async fn complete_occurrence(
        &self,
        scope: &AccessScope,
        task_id: Uuid,
        occurrence_id: Uuid,
        user_id: Uuid,
    ) -> Result<CompletionOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let task = self
            .repo
            .find_by_id(&mut *tx, task_id)
            .await?
            .ok_or(AppError::NotFound("entity.task"))?;
        Self::ensure_visible(scope, &task)?;

        self.repo
            .find_occurrence(&mut *tx, task_id, occurrence_id)
            .await?
            .ok_or(AppError::NotFound("entity.occurrence"))?;

        let occurrence = self
            .repo
            .complete_occurrence(&mut *tx, occurrence_id, user_id)
            .await?
            .ok_or(AppError::InvariantViolation("occurrence_not_pending"))?;

        let mut task_status = task.status;
        let mut next_occurrence = None;

        match task.recurrence_step() {
            Some(step) => {
                let latest = self.repo.latest_due_date(&mut *tx, task_id).await?;
                if let Some(next_due) = plan_next_occurrence(occurrence.due_date, Some(step), latest) {
                    // ON CONFLICT cobre conclusões concorrentes
                    next_occurrence = self.repo.insert_occurrence(&mut *tx, task_id, next_due).await?;
                }
            }
            None => {
                if let Some(updated) = self.repo.update_status(&mut *tx, task_id, TaskStatus::Done).await? {
                    task_status = updated.status;
                }
            }
        }

        tx.commit().await?;

        tracing::info!(
            task_id = %task_id,
            occurrence_id = %occurrence_id,
            next_due = ?next_occurrence.as_ref().map(|o| o.due_date),
            "Ocorrência concluída"
        );
        Ok(CompletionOutcome { occurrence, next_occurrence, task_status })
    }

    // Pular é terminal e não gera substituta
    pub async fn skip_occurrence(
        &self,
        scope: &AccessScope,
        task_id: Uuid,
        occurrence_id: Uuid,
    ) -> Result<TaskOccurrence, AppError> {
        self.load(scope, task_id).await?;

        self.repo
            .find_occurrence(&self.pool, task_id, occurrence_id)
            .await?
            .ok_or(AppError::NotFound("entity.occurrence"))?;

        self.repo
            .skip_occurrence(&self.pool, occurrence_id)
            .await?
            .ok_or(AppError::InvariantViolation("occurrence_not_pending"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input(recurrence: TaskRecurrence, interval: Option<i32>, due: Option<NaiveDate>) -> CreateTaskInput {
        CreateTaskInput {
            client_id: None,
            title: "Relatório mensal".into(),
            description: None,
            recurrence,
            recurrence_interval: interval,
            due_date: due,
            assignee_id: None,
        }
    }

    #[test]
    fn creation_materializes_a_bounded_run() {
        let dates = occurrence_schedule(date(2024, 1, 31), Some(DateStep::Months(1)), 12);
        assert_eq!(dates.len(), 13);
        assert_eq!(dates[0], date(2024, 1, 31));
        assert_eq!(dates[1], date(2024, 2, 29));
        assert_eq!(dates[2], date(2024, 3, 31));
        assert_eq!(dates[12], date(2025, 1, 31));
    }

    #[test]
    fn one_off_task_gets_a_single_occurrence() {
        assert_eq!(occurrence_schedule(date(2024, 5, 2), None, 12), vec![date(2024, 5, 2)]);
    }

    #[test]
    fn completion_creates_the_next_occurrence_once() {
        let step = TaskRecurrence::Weekly.step(2);
        let due = date(2024, 1, 1);

        let next = plan_next_occurrence(due, step, Some(due));
        assert_eq!(next, Some(date(2024, 1, 15)));

        // Repetir a conclusão não duplica
        assert_eq!(plan_next_occurrence(due, step, next), None);
    }

    #[test]
    fn non_recurring_completion_creates_nothing() {
        assert_eq!(plan_next_occurrence(date(2024, 1, 1), None, None), None);
    }

    #[test]
    fn creation_validation() {
        assert!(matches!(
            validate_new_task(&input(TaskRecurrence::Weekly, Some(2), None)),
            Err(AppError::InvalidInput("recurring_task_needs_due_date"))
        ));
        assert!(matches!(
            validate_new_task(&input(TaskRecurrence::Daily, Some(0), Some(date(2024, 1, 1)))),
            Err(AppError::InvalidInput("interval_out_of_range"))
        ));
        let mut blank = input(TaskRecurrence::None, None, None);
        blank.title = "   ".into();
        assert!(matches!(validate_new_task(&blank), Err(AppError::InvalidInput("required"))));
        assert_eq!(validate_new_task(&input(TaskRecurrence::None, None, None)).unwrap(), 1);
    }
}
