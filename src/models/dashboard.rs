// src/models/dashboard.rs

use serde::Serialize;
use rust_decimal::Decimal;
use sqlx::FromRow;
use utoipa::ToSchema;

// Os cards do topo, já filtrados pelo escopo do usuário
#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub outstanding_total: Decimal,    // Enviadas + vencidas, ainda sem baixa
    pub overdue_total: Decimal,
    pub overdue_count: i64,
    pub draft_count: i64,
    pub collected_this_month: Decimal, // Pagamentos com data no mês corrente
    pub scheduled_posts: i64,
    pub failed_posts: i64,
    pub open_occurrences_this_week: i64,
}
