// src/services/invoice_service.rs

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClientRepository, InvoiceRepository, SettingsRepository},
    integrations::EmailSender,
    ledger::{
        money::{self, coerce_amount, parse_amount, parse_positive_amount, parse_quantity},
        InvoiceTotals,
    },
    models::{
        invoices::{
            Invoice, InvoiceDetail, InvoiceListItem, InvoiceStatus, LineItemDraft, LineItemInput,
            NewInvoice, NewPayment, PaymentReceipt, StatusChange, SOURCE_MANUAL,
        },
        scope::AccessScope,
    },
    services::notifications::{self, InvoiceMailData},
};

// --- Entradas já desserializadas pelos handlers ---

pub struct CreateInvoiceInput {
    pub client_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tax: Option<Value>,
    pub notes: Option<String>,
    pub line_items: Vec<LineItemInput>,
}

pub struct RecordPaymentInput {
    pub client_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub amount: Value,
    pub method: String,
    pub paid_at: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Caminho que altera o livro: valores não numéricos são rejeitados.
pub fn parse_line_items(items: &[LineItemInput]) -> Result<Vec<LineItemDraft>, AppError> {
    if items.is_empty() {
        return Err(AppError::InvalidInput("line_items_required"));
    }

    items
        .iter()
        .map(|item| {
            let description = item.description.trim();
            if description.is_empty() {
                return Err(AppError::InvalidInput("required"));
            }
            let quantity = parse_quantity(&item.quantity)?;
            if quantity <= Decimal::ZERO {
                return Err(AppError::InvalidInput("amount_not_positive"));
            }
            let unit_price = parse_amount(&item.unit_price)?;

            Ok(LineItemDraft { description: description.to_string(), quantity, unit_price })
        })
        .collect()
}

fn parse_tax(tax: Option<&Value>) -> Result<Decimal, AppError> {
    match tax {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(value) => {
            let tax = parse_amount(value)?;
            if tax < Decimal::ZERO {
                return Err(AppError::InvalidInput("amount_not_positive"));
            }
            Ok(tax)
        }
    }
}

pub fn totals_for(items: &[LineItemDraft], tax: Decimal) -> Result<InvoiceTotals, AppError> {
    InvoiceTotals::from_lines(items.iter().map(|i| (i.quantity, i.unit_price)), tax)
}

/// Caminho de exibição: nulo/texto inválido contam como zero, nunca falha.
pub fn preview_totals(items: &[LineItemInput], tax: Option<&Value>) -> InvoiceTotals {
    InvoiceTotals::lenient(
        items
            .iter()
            .map(|i| (coerce_amount(Some(&i.quantity)), coerce_amount(Some(&i.unit_price)))),
        coerce_amount(tax),
    )
}

fn check_dates(issue_date: NaiveDate, due_date: NaiveDate) -> Result<(), AppError> {
    if due_date < issue_date {
        return Err(AppError::InvalidInput("due_before_issue"));
    }
    Ok(())
}

fn new_portal_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Clone)]
pub struct InvoiceService {
    repo: InvoiceRepository,
    client_repo: ClientRepository,
    settings_repo: SettingsRepository,
    email: Arc<dyn EmailSender>,
    public_app_url: Option<String>,
    pool: PgPool,
}

impl InvoiceService {
    pub fn new(
        repo: InvoiceRepository,
        client_repo: ClientRepository,
        settings_repo: SettingsRepository,
        email: Arc<dyn EmailSender>,
        public_app_url: Option<String>,
        pool: PgPool,
    ) -> Self {
        Self { repo, client_repo, settings_repo, email, public_app_url, pool }
    }

    // =========================================================================
    //  LEITURA (sempre varre os atrasos antes)
    // =========================================================================

    pub async fn sweep_overdue(&self, scope: &AccessScope, today: NaiveDate) -> Result<u64, AppError> {
        let changed = self.repo.sweep_overdue(&self.pool, today, scope.client_filter()).await?;
        if changed > 0 {
            tracing::info!(count = changed, "Faturas marcadas como vencidas");
        }
        Ok(changed)
    }

    pub async fn list(
        &self,
        scope: &AccessScope,
        status: Option<InvoiceStatus>,
        client_id: Option<Uuid>,
    ) -> Result<Vec<InvoiceListItem>, AppError> {
        self.sweep_overdue(scope, Utc::now().date_naive()).await?;
        self.repo.list(scope.client_filter(), status, client_id).await
    }

    pub async fn detail(&self, scope: &AccessScope, id: Uuid) -> Result<InvoiceDetail, AppError> {
        self.sweep_overdue(scope, Utc::now().date_naive()).await?;

        let invoice = self
            .repo
            .find_by_id(&self.pool, id)
            .await?
            .ok_or(AppError::NotFound("entity.invoice"))?;
        scope.ensure_client(invoice.client_id, "entity.invoice")?;

        self.assemble_detail(invoice).await
    }

    // Visualização pública (portal): o token é a credencial
    pub async fn portal_view(&self, token: &str) -> Result<InvoiceDetail, AppError> {
        let invoice = self
            .repo
            .find_by_portal_token(token)
            .await?
            .ok_or(AppError::NotFound("entity.invoice"))?;

        let scope = AccessScope::clients([invoice.client_id]);
        if self.sweep_overdue(&scope, Utc::now().date_naive()).await? > 0 {
            let refreshed = self
                .repo
                .find_by_id(&self.pool, invoice.id)
                .await?
                .ok_or(AppError::NotFound("entity.invoice"))?;
            return self.assemble_detail(refreshed).await;
        }

        self.assemble_detail(invoice).await
    }

    async fn assemble_detail(&self, invoice: Invoice) -> Result<InvoiceDetail, AppError> {
        let client = self
            .client_repo
            .find_by_id(&self.pool, invoice.client_id)
            .await?
            .ok_or(AppError::NotFound("entity.client"))?;
        let line_items = self.repo.line_items(&self.pool, invoice.id).await?;
        let payments = self.repo.payments(&self.pool, invoice.id).await?;

        let amount_paid: Decimal = payments.iter().map(|p| p.amount).sum();

        Ok(InvoiceDetail {
            remaining: money::remaining_balance(invoice.total, amount_paid),
            overpaid_by: money::overpayment(invoice.total, amount_paid),
            client_name: client.name,
            amount_paid,
            line_items,
            payments,
            invoice,
        })
    }

    // =========================================================================
    //  CRIAÇÃO E ITENS (somente rascunho)
    // =========================================================================

    pub async fn create(&self, scope: &AccessScope, input: CreateInvoiceInput) -> Result<InvoiceDetail, AppError> {
        scope.ensure_client(input.client_id, "entity.client")?;
        check_dates(input.issue_date, input.due_date)?;
        let items = parse_line_items(&input.line_items)?;
        let totals = totals_for(&items, parse_tax(input.tax.as_ref())?)?;

        let mut tx = self.pool.begin().await?;

        self.client_repo
            .find_by_id(&mut *tx, input.client_id)
            .await?
            .ok_or(AppError::NotFound("entity.client"))?;

        let settings = self.settings_repo.get_settings(&mut *tx).await?;
        let existing = self.repo.all_numbers(&mut *tx).await?;
        let number = settings.numbering().next_number(existing.iter().map(String::as_str));

        let new_invoice = NewInvoice {
            client_id: input.client_id,
            number: number.clone(),
            issue_date: input.issue_date,
            due_date: input.due_date,
            source: SOURCE_MANUAL,
            notes: input.notes,
        };

        // Manual nunca cai no ON CONFLICT do ciclo recorrente
        let invoice = self
            .repo
            .insert(&mut *tx, &new_invoice, totals)
            .await?
            .ok_or(AppError::InvoiceNumberConflict(number))?;
        self.repo.insert_line_items(&mut *tx, invoice.id, &items).await?;

        tx.commit().await?;

        tracing::info!(invoice_id = %invoice.id, number = %invoice.number, "Fatura criada");
        self.assemble_detail(invoice).await
    }

    /// Troca todos os itens e recalcula os totais numa única transação.
    pub async fn replace_line_items(
        &self,
        scope: &AccessScope,
        id: Uuid,
        line_items: &[LineItemInput],
        tax: Option<&Value>,
    ) -> Result<InvoiceDetail, AppError> {
        let items = parse_line_items(line_items)?;

        let mut tx = self.pool.begin().await?;

        let invoice = self
            .repo
            .find_for_update(&mut *tx, id)
            .await?
            .ok_or(AppError::NotFound("entity.invoice"))?;
        scope.ensure_client(invoice.client_id, "entity.invoice")?;

        if invoice.status != InvoiceStatus::Draft {
            return Err(AppError::InvariantViolation("invoice_not_draft"));
        }

        let tax = match tax {
            Some(value) => parse_tax(Some(value))?,
            None => invoice.tax,
        };
        let totals = totals_for(&items, tax)?;

        self.repo.delete_line_items(&mut *tx, id).await?;
        self.repo.insert_line_items(&mut *tx, id, &items).await?;
        let updated = self
            .repo
            .update_totals(&mut *tx, id, totals)
            .await?
            .ok_or(AppError::InvariantViolation("invoice_not_draft"))?;

        tx.commit().await?;

        self.assemble_detail(updated).await
    }

    // =========================================================================
    //  MÁQUINA DE ESTADOS
    // =========================================================================

    /// Transição manual. Ao enviar, o e-mail é tentado depois da gravação:
    /// falha no envio não desfaz o status e volta como aviso.
    pub async fn set_status(
        &self,
        scope: &AccessScope,
        id: Uuid,
        target: InvoiceStatus,
    ) -> Result<StatusChange, AppError> {
        let invoice = self
            .repo
            .find_by_id(&self.pool, id)
            .await?
            .ok_or(AppError::NotFound("entity.invoice"))?;
        scope.ensure_client(invoice.client_id, "entity.invoice")?;

        invoice.status.check_manual_transition(target)?;

        let updated = match target {
            InvoiceStatus::Sent => {
                self.repo.mark_sent(&self.pool, id, &new_portal_token()).await?
            }
            InvoiceStatus::Void => self.repo.mark_void(&self.pool, id).await?,
            InvoiceStatus::Paid => self.repo.mark_paid(&self.pool, id).await?,
            // Rascunho e atraso são barrados por check_manual_transition
            InvoiceStatus::Draft | InvoiceStatus::Overdue => None,
        };

        // Status mudou entre a leitura e a escrita
        let updated = updated.ok_or_else(|| AppError::InvalidTransition {
            from: invoice.status.as_str().to_string(),
            to: target.as_str().to_string(),
        })?;

        tracing::info!(
            invoice_id = %id,
            from = invoice.status.as_str(),
            to = target.as_str(),
            "Status da fatura alterado"
        );

        if target != InvoiceStatus::Sent {
            return Ok(StatusChange { invoice: updated, email_sent: false, warning: None });
        }

        match self.send_invoice_email(&updated).await {
            Ok(()) => Ok(StatusChange { invoice: updated, email_sent: true, warning: None }),
            Err(warning) => {
                tracing::warn!(invoice_id = %id, "Fatura enviada, mas o e-mail falhou: {}", warning);
                Ok(StatusChange { invoice: updated, email_sent: false, warning: Some(warning) })
            }
        }
    }

    async fn send_invoice_email(&self, invoice: &Invoice) -> Result<(), String> {
        let client = self
            .client_repo
            .find_by_id(&self.pool, invoice.client_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "client not found".to_string())?;
        let to = client
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| "client has no e-mail address".to_string())?;
        let settings = self.settings_repo.current().await.map_err(|e| e.to_string())?;

        let portal_url =
            notifications::portal_url(self.public_app_url.as_deref(), invoice.portal_token.as_deref());
        let email = notifications::invoice_sent_email(
            &settings,
            &to,
            &InvoiceMailData {
                number: &invoice.number,
                client_name: &client.name,
                due_date: invoice.due_date,
                amount_due: invoice.total,
                portal_url: portal_url.as_deref(),
            },
        );

        self.email.send(&email).await.map_err(|e| e.to_string())
    }

    // =========================================================================
    //  PAGAMENTOS E CONCILIAÇÃO
    // =========================================================================

    /// Registra o pagamento e, se a soma cobrir o total, quita a fatura
    /// (qualquer status anterior exceto `void`). Tudo na mesma transação.
    pub async fn record_payment(
        &self,
        scope: &AccessScope,
        input: RecordPaymentInput,
    ) -> Result<PaymentReceipt, AppError> {
        let amount = parse_positive_amount(&input.amount)?;
        let method = input.method.trim();
        if method.is_empty() {
            return Err(AppError::InvalidInput("required"));
        }

        let mut tx = self.pool.begin().await?;

        let invoice = match input.invoice_id {
            Some(invoice_id) => {
                let invoice = self
                    .repo
                    .find_for_update(&mut *tx, invoice_id)
                    .await?
                    .ok_or(AppError::NotFound("entity.invoice"))?;
                scope.ensure_client(invoice.client_id, "entity.invoice")?;

                if input.client_id.is_some_and(|c| c != invoice.client_id) {
                    return Err(AppError::InvalidInput("payment_client_mismatch"));
                }
                if !invoice.status.accepts_payment() {
                    return Err(AppError::InvariantViolation("invoice_void"));
                }
                Some(invoice)
            }
            None => None,
        };

        let client_id = match (&invoice, input.client_id) {
            (Some(invoice), _) => invoice.client_id,
            (None, Some(client_id)) => {
                scope.ensure_client(client_id, "entity.client")?;
                self.client_repo
                    .find_by_id(&mut *tx, client_id)
                    .await?
                    .ok_or(AppError::NotFound("entity.client"))?;
                client_id
            }
            (None, None) => return Err(AppError::InvalidInput("required")),
        };

        let payment = self
            .repo
            .insert_payment(
                &mut *tx,
                &NewPayment {
                    client_id,
                    invoice_id: invoice.as_ref().map(|i| i.id),
                    amount,
                    method: method.to_string(),
                    paid_at: input.paid_at,
                    reference: input.reference,
                    notes: input.notes,
                },
            )
            .await?;

        let Some(invoice) = invoice else {
            tx.commit().await?;
            tracing::info!(payment_id = %payment.id, client_id = %client_id, "Pagamento avulso registrado");
            return Ok(PaymentReceipt {
                payment,
                invoice_status: None,
                amount_paid: None,
                remaining: None,
                overpaid_by: None,
                marked_paid: false,
            });
        };

        let paid = self.repo.sum_payments(&mut *tx, invoice.id).await?;

        let mut status = invoice.status;
        let mut marked_paid = false;
        if status != InvoiceStatus::Paid && money::is_settled(invoice.total, paid) {
            // Catraca: quitada não volta, mesmo se um pagamento sumir depois
            if let Some(updated) = self.repo.mark_paid(&mut *tx, invoice.id).await? {
                status = updated.status;
                marked_paid = true;
            }
        }

        tx.commit().await?;

        let overpaid_by = money::overpayment(invoice.total, paid);
        if let Some(excess) = overpaid_by {
            // Aceito de propósito; fica registrado para conferência
            tracing::warn!(invoice_id = %invoice.id, excess = %excess, "Pagamento acima do total da fatura");
        }
        tracing::info!(
            invoice_id = %invoice.id,
            payment_id = %payment.id,
            marked_paid,
            "Pagamento registrado"
        );

        Ok(PaymentReceipt {
            payment,
            invoice_status: Some(status),
            amount_paid: Some(paid),
            remaining: Some(money::remaining_balance(invoice.total, paid)),
            overpaid_by,
            marked_paid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn d(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    fn item(description: &str, quantity: Value, unit_price: Value) -> LineItemInput {
        LineItemInput { description: description.into(), quantity, unit_price }
    }

    #[test]
    fn subtotal_is_sum_of_lines_and_total_adds_tax() {
        let items = parse_line_items(&[
            item("Retainer", json!(1), json!("8500.00")),
            item("Ads", json!("3"), json!(250)),
        ])
        .unwrap();

        let totals = totals_for(&items, d("0")).unwrap();
        assert_eq!(totals.subtotal, d("9250.00"));
        assert_eq!(totals.total, totals.subtotal + totals.tax);
    }

    #[test]
    fn ledger_paths_reject_bad_numbers() {
        assert!(matches!(
            parse_line_items(&[]),
            Err(AppError::InvalidInput("line_items_required"))
        ));
        assert!(matches!(
            parse_line_items(&[item("x", json!("two"), json!(1))]),
            Err(AppError::InvalidInput("quantity_not_numeric"))
        ));
        assert!(matches!(
            parse_line_items(&[item("x", json!(1), json!(null))]),
            Err(AppError::InvalidInput("amount_not_numeric"))
        ));
        assert!(matches!(
            parse_tax(Some(&json!("-1"))),
            Err(AppError::InvalidInput("amount_not_positive"))
        ));
    }

    #[test]
    fn preview_coerces_instead_of_failing() {
        let totals = preview_totals(
            &[item("x", json!("2"), json!("abc")), item("y", json!(1), json!("10"))],
            Some(&json!(null)),
        );
        assert_eq!(totals.subtotal, d("10.00"));
        assert_eq!(totals.total, d("10.00"));
    }

    #[test]
    fn stored_line_total_matches_quantity_times_stored_price() {
        // 3 × 0.333 daria 1.00, mas a coluna guardaria 0.33
        assert!(matches!(
            parse_line_items(&[item("x", json!(3), json!("0.333"))]),
            Err(AppError::InvalidInput("amount_too_precise"))
        ));
        assert!(matches!(
            parse_line_items(&[item("x", json!("1.00001"), json!("10"))]),
            Err(AppError::InvalidInput("quantity_too_precise"))
        ));

        let items = parse_line_items(&[item("x", json!("1.5"), json!("0.33"))]).unwrap();
        let totals = totals_for(&items, Decimal::ZERO).unwrap();
        assert_eq!(totals.subtotal, d("0.50"));
    }

    #[test]
    fn oversized_invoice_is_a_validation_error() {
        let items = parse_line_items(&[
            item("a", json!(10_000_000), json!("999999999.00")),
        ])
        .unwrap();
        assert!(matches!(
            totals_for(&items, Decimal::ZERO),
            Err(AppError::InvalidInput("amount_out_of_range"))
        ));
        assert!(matches!(
            parse_line_items(&[item("a", json!("1e15"), json!("1e15"))]),
            Err(AppError::InvalidInput("amount_out_of_range"))
        ));
    }

    #[test]
    fn preview_never_fails_on_oversized_input() {
        let totals = preview_totals(
            &[item("a", json!("1e15"), json!("1e15")), item("b", json!(2), json!("5"))],
            Some(&json!("1e30")),
        );
        assert_eq!(totals.subtotal, d("10.00"));
        assert_eq!(totals.total, d("10.00"));
    }

    #[test]
    fn due_date_cannot_precede_issue_date() {
        let issue = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(check_dates(issue, issue).is_ok());
        assert!(matches!(
            check_dates(issue, issue.pred_opt().unwrap()),
            Err(AppError::InvalidInput("due_before_issue"))
        ));
    }

    #[test]
    fn portal_tokens_are_unique_and_url_safe() {
        let a = new_portal_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, new_portal_token());
    }
}
