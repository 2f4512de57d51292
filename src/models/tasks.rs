// src/models/tasks.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::ledger::DateStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "task_recurrence", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskRecurrence {
    None,
    Daily,
    Weekly,
    Monthly,
}

impl TaskRecurrence {
    // Passo entre ocorrências; `None` para tarefas avulsas
    pub fn step(self, interval: u32) -> Option<DateStep> {
        let interval = interval.max(1);
        match self {
            TaskRecurrence::None => None,
            TaskRecurrence::Daily => Some(DateStep::Days(interval)),
            TaskRecurrence::Weekly => Some(DateStep::Weeks(interval)),
            TaskRecurrence::Monthly => Some(DateStep::Months(interval)),
        }
    }

    pub fn is_recurring(self) -> bool {
        self != TaskRecurrence::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "occurrence_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    Pending,
    Completed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    // Sem cliente = tarefa "geral", visível para todos
    pub client_id: Option<Uuid>,
    #[schema(example = "Relatório mensal de métricas")]
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub recurrence: TaskRecurrence,
    #[schema(example = 2)]
    pub recurrence_interval: i32,
    #[schema(value_type = Option<String>, format = Date, example = "2024-01-01")]
    pub due_date: Option<NaiveDate>,
    pub assignee_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn recurrence_step(&self) -> Option<DateStep> {
        let interval = u32::try_from(self.recurrence_interval).unwrap_or(1);
        self.recurrence.step(interval)
    }
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub client_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub recurrence: TaskRecurrence,
    pub recurrence_interval: i32,
    pub due_date: Option<NaiveDate>,
    pub assignee_id: Option<Uuid>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskOccurrence {
    pub id: Uuid,
    pub task_id: Uuid,
    #[schema(value_type = String, format = Date, example = "2024-01-15")]
    pub due_date: NaiveDate,
    pub status: OccurrenceStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskWithOccurrences {
    #[serde(flatten)]
    pub task: Task,
    pub occurrences: Vec<TaskOccurrence>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
    pub occurrence: TaskOccurrence,
    // Próxima ocorrência criada por esta conclusão (se houver)
    pub next_occurrence: Option<TaskOccurrence>,
    pub task_status: TaskStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recurrence_maps_to_calendar_steps() {
        assert_eq!(TaskRecurrence::None.step(3), None);
        assert_eq!(TaskRecurrence::Daily.step(1), Some(DateStep::Days(1)));
        assert_eq!(TaskRecurrence::Weekly.step(2), Some(DateStep::Weeks(2)));
        assert_eq!(TaskRecurrence::Monthly.step(0), Some(DateStep::Months(1)));
    }
}
