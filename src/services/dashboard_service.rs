// src/services/dashboard_service.rs

use chrono::{Days, NaiveDate};
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    db::{DashboardRepository, InvoiceRepository},
    ledger::dates::start_of_month,
    models::{dashboard::DashboardSummary, scope::AccessScope},
};

const WEEK_DAYS: u64 = 7;

#[derive(Clone)]
pub struct DashboardService {
    repo: DashboardRepository,
    invoice_repo: InvoiceRepository,
    pool: PgPool,
}

impl DashboardService {
    pub fn new(repo: DashboardRepository, invoice_repo: InvoiceRepository, pool: PgPool) -> Self {
        Self { repo, invoice_repo, pool }
    }

    // Varre os atrasos do escopo antes de somar
    pub async fn get_summary(&self, scope: &AccessScope, today: NaiveDate) -> Result<DashboardSummary, AppError> {
        self.invoice_repo
            .sweep_overdue(&self.pool, today, scope.client_filter())
            .await?;

        let week_end = today.checked_add_days(Days::new(WEEK_DAYS)).unwrap_or(today);
        self.repo
            .get_summary(scope.client_filter(), start_of_month(today), today, week_end)
            .await
    }
}
