// src/db/invoice_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::unique_violation, error::AppError},
    ledger::InvoiceTotals,
    models::invoices::{
        Invoice, InvoiceLineItem, InvoiceListItem, InvoiceStatus, LineItemDraft, NewInvoice,
        NewPayment, Payment, ReminderCandidate,
    },
};

const INVOICE_COLUMNS: &str = "id, client_id, number, issue_date, due_date, status, source, \
    subtotal, tax, total, notes, portal_token, sent_at, paid_at, voided_at, last_reminder_at, \
    created_at, updated_at";

const INVOICE_COLUMNS_I: &str = "i.id, i.client_id, i.number, i.issue_date, i.due_date, \
    i.status, i.source, i.subtotal, i.tax, i.total, i.notes, i.portal_token, i.sent_at, \
    i.paid_at, i.voided_at, i.last_reminder_at, i.created_at, i.updated_at";

const PAYMENT_COLUMNS: &str =
    "id, client_id, invoice_id, amount, method, paid_at, reference, notes, created_at";

#[derive(Clone)]
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  VARREDURA DE ATRASO (sent -> overdue)
    // =========================================================================

    /// Idempotente: só toca faturas ainda em `sent`. Retorna quantas mudaram.
    pub async fn sweep_overdue<'e, E>(
        &self,
        executor: E,
        today: NaiveDate,
        client_filter: Option<Vec<Uuid>>,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'overdue', updated_at = NOW()
            WHERE status = 'sent'
              AND due_date < $1
              AND ($2::uuid[] IS NULL OR client_id = ANY($2))
            "#,
        )
        .bind(today)
        .bind(client_filter)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn list(
        &self,
        client_filter: Option<Vec<Uuid>>,
        status: Option<InvoiceStatus>,
        client_id: Option<Uuid>,
    ) -> Result<Vec<InvoiceListItem>, AppError> {
        let sql = format!(
            r#"
            SELECT {},
                c.name AS client_name,
                COALESCE((SELECT SUM(p.amount) FROM payments p WHERE p.invoice_id = i.id), 0) AS amount_paid
            FROM invoices i
            JOIN clients c ON c.id = i.client_id
            WHERE ($1::uuid[] IS NULL OR i.client_id = ANY($1))
              AND ($2::invoice_status IS NULL OR i.status = $2)
              AND ($3::uuid IS NULL OR i.client_id = $3)
            ORDER BY i.issue_date DESC, i.number DESC
            "#,
            INVOICE_COLUMNS_I
        );

        let invoices = sqlx::query_as::<_, InvoiceListItem>(&sql)
            .bind(client_filter)
            .bind(status)
            .bind(client_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(invoices)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM invoices WHERE id = $1", INVOICE_COLUMNS);

        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(invoice)
    }

    // Trava a linha até o fim da transação (pagamentos e troca de itens)
    pub async fn find_for_update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM invoices WHERE id = $1 FOR UPDATE", INVOICE_COLUMNS);

        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(invoice)
    }

    pub async fn find_by_portal_token(&self, token: &str) -> Result<Option<Invoice>, AppError> {
        let sql = format!("SELECT {} FROM invoices WHERE portal_token = $1", INVOICE_COLUMNS);

        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice)
    }

    pub async fn line_items<'e, E>(
        &self,
        executor: E,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceLineItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, InvoiceLineItem>(
            r#"
            SELECT id, invoice_id, position, description, quantity, unit_price, line_total
            FROM invoice_line_items
            WHERE invoice_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    pub async fn payments<'e, E>(
        &self,
        executor: E,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {} FROM payments WHERE invoice_id = $1 ORDER BY paid_at ASC, created_at ASC",
            PAYMENT_COLUMNS
        );

        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(invoice_id)
            .fetch_all(executor)
            .await?;

        Ok(payments)
    }

    pub async fn sum_payments<'e, E>(&self, executor: E, invoice_id: Uuid) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_one(executor)
        .await?;

        Ok(total)
    }

    // =========================================================================
    //  NUMERAÇÃO
    // =========================================================================

    pub async fn all_numbers<'e, E>(&self, executor: E) -> Result<Vec<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let numbers = sqlx::query_scalar::<_, String>("SELECT number FROM invoices")
            .fetch_all(executor)
            .await?;

        Ok(numbers)
    }

    // =========================================================================
    //  ESCRITA
    // =========================================================================

    /// Insere a fatura em rascunho.
    /// `None` = o ciclo recorrente desse cliente já foi faturado (outra execução chegou antes).
    /// Número repetido vira `InvoiceNumberConflict` (o chamador pode tentar de novo).
    pub async fn insert<'e, E>(
        &self,
        executor: E,
        input: &NewInvoice,
        totals: InvoiceTotals,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO invoices (client_id, number, issue_date, due_date, status, source, subtotal, tax, total, notes)
            VALUES ($1, $2, $3, $4, 'draft', $5, $6, $7, $8, $9)
            ON CONFLICT (client_id, issue_date) WHERE source = 'recurring' DO NOTHING
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );

        sqlx::query_as::<_, Invoice>(&sql)
            .bind(input.client_id)
            .bind(&input.number)
            .bind(input.issue_date)
            .bind(input.due_date)
            .bind(input.source)
            .bind(totals.subtotal)
            .bind(totals.tax)
            .bind(totals.total)
            .bind(&input.notes)
            .fetch_optional(executor)
            .await
            .map_err(|e| match unique_violation(&e) {
                Some("invoices_number_key") => AppError::InvoiceNumberConflict(input.number.clone()),
                _ => e.into(),
            })
    }

    pub async fn insert_line_items<'e, E>(
        &self,
        executor: E,
        invoice_id: Uuid,
        items: &[LineItemDraft],
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let positions: Vec<i32> = (1..).take(items.len()).collect();
        let descriptions: Vec<&str> = items.iter().map(|i| i.description.as_str()).collect();
        let quantities: Vec<Decimal> = items.iter().map(|i| i.quantity).collect();
        let unit_prices: Vec<Decimal> = items.iter().map(|i| i.unit_price).collect();
        let line_totals = items
            .iter()
            .map(|i| crate::ledger::money::line_total(i.quantity, i.unit_price))
            .collect::<Result<Vec<Decimal>, AppError>>()?;

        sqlx::query(
            r#"
            INSERT INTO invoice_line_items (invoice_id, position, description, quantity, unit_price, line_total)
            SELECT $1, * FROM UNNEST($2::int4[], $3::text[], $4::numeric[], $5::numeric[], $6::numeric[])
            "#,
        )
        .bind(invoice_id)
        .bind(positions)
        .bind(descriptions)
        .bind(quantities)
        .bind(unit_prices)
        .bind(line_totals)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn delete_line_items<'e, E>(&self, executor: E, invoice_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM invoice_line_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    // Só rascunhos têm os valores recalculados
    pub async fn update_totals<'e, E>(
        &self,
        executor: E,
        invoice_id: Uuid,
        totals: InvoiceTotals,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE invoices
            SET subtotal = $2, tax = $3, total = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'draft'
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );

        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice_id)
            .bind(totals.subtotal)
            .bind(totals.tax)
            .bind(totals.total)
            .fetch_optional(executor)
            .await?;

        Ok(invoice)
    }

    // --- Transições condicionais: `None` = o status mudou no meio do caminho ---

    pub async fn mark_sent<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        portal_token: &str,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE invoices
            SET status = 'sent', sent_at = NOW(), updated_at = NOW(),
                portal_token = COALESCE(portal_token, $2)
            WHERE id = $1 AND status = 'draft'
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );

        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .bind(portal_token)
            .fetch_optional(executor)
            .await?;

        Ok(invoice)
    }

    pub async fn mark_void<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE invoices
            SET status = 'void', voided_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status IN ('draft', 'sent', 'overdue')
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );

        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(invoice)
    }

    // Conciliação também quita rascunhos; a regra manual fica no serviço
    pub async fn mark_paid<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE invoices
            SET status = 'paid', paid_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status IN ('draft', 'sent', 'overdue')
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );

        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(invoice)
    }

    pub async fn insert_payment<'e, E>(&self, executor: E, input: &NewPayment) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO payments (client_id, invoice_id, amount, method, paid_at, reference, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );

        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(input.client_id)
            .bind(input.invoice_id)
            .bind(input.amount)
            .bind(&input.method)
            .bind(input.paid_at)
            .bind(&input.reference)
            .bind(&input.notes)
            .fetch_one(executor)
            .await?;

        Ok(payment)
    }

    // =========================================================================
    //  LEMBRETES
    // =========================================================================

    pub async fn reminder_candidates(&self, horizon: NaiveDate) -> Result<Vec<ReminderCandidate>, AppError> {
        let candidates = sqlx::query_as::<_, ReminderCandidate>(
            r#"
            SELECT
                i.id, i.number, i.client_id, c.name AS client_name, c.email AS client_email,
                i.due_date, i.status, i.total,
                COALESCE((SELECT SUM(p.amount) FROM payments p WHERE p.invoice_id = i.id), 0) AS amount_paid,
                i.portal_token, i.last_reminder_at
            FROM invoices i
            JOIN clients c ON c.id = i.client_id
            WHERE i.status IN ('sent', 'overdue')
              AND c.email IS NOT NULL AND c.email <> ''
              AND i.due_date <= $1
            ORDER BY i.due_date ASC
            "#,
        )
        .bind(horizon)
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates)
    }

    /// Reivindica o lembrete do dia: grava `now` só se ninguém lembrou hoje.
    /// Retorna o valor anterior (para restaurar se o envio falhar); `None` = já reivindicado.
    pub async fn claim_reminder<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        day_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<Option<DateTime<Utc>>>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let previous = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"
            WITH prev AS (
                SELECT id, last_reminder_at FROM invoices WHERE id = $1 FOR UPDATE
            )
            UPDATE invoices i
            SET last_reminder_at = $3
            FROM prev
            WHERE i.id = prev.id
              AND i.status IN ('sent', 'overdue')
              AND (prev.last_reminder_at IS NULL OR prev.last_reminder_at < $2)
            RETURNING prev.last_reminder_at
            "#,
        )
        .bind(id)
        .bind(day_start)
        .bind(now)
        .fetch_optional(executor)
        .await?;

        Ok(previous)
    }

    // Desfaz a reivindicação, desde que ninguém tenha gravado por cima
    pub async fn release_reminder<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        claimed_at: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE invoices SET last_reminder_at = $3 WHERE id = $1 AND last_reminder_at = $2",
        )
        .bind(id)
        .bind(claimed_at)
        .bind(previous)
        .execute(executor)
        .await?;

        Ok(())
    }
}
