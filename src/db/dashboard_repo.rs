// src/db/dashboard_repo.rs

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{common::error::AppError, models::dashboard::DashboardSummary};

#[derive(Clone)]
pub struct DashboardRepository {
    pool: PgPool,
}

impl DashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Resumo geral em uma única leitura (snapshot consistente)
    pub async fn get_summary(
        &self,
        client_filter: Option<Vec<Uuid>>,
        month_start: NaiveDate,
        today: NaiveDate,
        week_end: NaiveDate,
    ) -> Result<DashboardSummary, AppError> {
        let summary = sqlx::query_as::<_, DashboardSummary>(
            r#"
            WITH open_invoices AS (
                SELECT i.status,
                       i.total - COALESCE((SELECT SUM(p.amount) FROM payments p WHERE p.invoice_id = i.id), 0) AS balance
                FROM invoices i
                WHERE i.status IN ('sent', 'overdue')
                  AND ($1::uuid[] IS NULL OR i.client_id = ANY($1))
            )
            SELECT
                COALESCE((SELECT SUM(GREATEST(balance, 0)) FROM open_invoices), 0) AS outstanding_total,
                COALESCE((SELECT SUM(GREATEST(balance, 0)) FROM open_invoices WHERE status = 'overdue'), 0) AS overdue_total,
                (SELECT COUNT(*) FROM open_invoices WHERE status = 'overdue') AS overdue_count,
                (SELECT COUNT(*) FROM invoices
                  WHERE status = 'draft' AND ($1::uuid[] IS NULL OR client_id = ANY($1))) AS draft_count,
                COALESCE((SELECT SUM(amount) FROM payments
                  WHERE paid_at >= $2 AND paid_at <= $3
                    AND ($1::uuid[] IS NULL OR client_id = ANY($1))), 0) AS collected_this_month,
                (SELECT COUNT(*) FROM social_posts
                  WHERE status = 'scheduled' AND ($1::uuid[] IS NULL OR client_id = ANY($1))) AS scheduled_posts,
                (SELECT COUNT(*) FROM social_posts
                  WHERE status = 'failed' AND ($1::uuid[] IS NULL OR client_id = ANY($1))) AS failed_posts,
                (SELECT COUNT(*) FROM task_occurrences o
                  JOIN tasks t ON t.id = o.task_id
                  WHERE o.status = 'pending' AND o.due_date <= $4
                    AND (t.client_id IS NULL OR $1::uuid[] IS NULL OR t.client_id = ANY($1))) AS open_occurrences_this_week
            "#,
        )
        .bind(client_filter)
        .bind(month_start)
        .bind(today)
        .bind(week_end)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }
}
