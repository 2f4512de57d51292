// src/services/billing_service.rs
//
// Gerador de faturas recorrentes (retainers mensais, trimestrais e anuais).

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    db::{ClientRepository, InvoiceRepository, SettingsRepository},
    ledger::dates::{add_months, start_of_month},
    models::{
        clients::BillableClient,
        invoices::{LineItemDraft, NewInvoice, SOURCE_RECURRING},
        jobs::{GeneratedInvoice, JobError, RecurringInvoiceRun},
    },
    services::invoice_service::totals_for,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedInvoice {
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
}

/// Decide se o cliente tem um ciclo a faturar hoje.
/// A data de emissão é derivada do histórico, então rodar de novo no mesmo
/// dia encontra a fatura recém-criada e não gera outra.
pub fn plan_next_invoice(client: &BillableClient, today: NaiveDate) -> Option<PlannedInvoice> {
    if client.retainer_amount <= Decimal::ZERO {
        return None;
    }
    let months = client.billing_frequency.months_per_cycle()?;

    let base = client
        .last_issue_date
        .or(client.renewal_date)
        .unwrap_or(today);
    let issue_date = add_months(start_of_month(base), months)?;

    if issue_date > start_of_month(today) {
        return None;
    }

    Some(PlannedInvoice {
        issue_date,
        due_date: add_months(issue_date, 1)?,
        description: format!("{} - {} retainer", client.name, client.billing_frequency.label()),
        amount: client.retainer_amount,
    })
}

/// Passos por cliente usados pelo gerador.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn billable_clients(&self) -> Result<Vec<BillableClient>, AppError>;

    /// `None` quando outra execução já faturou o ciclo.
    async fn create_invoice(
        &self,
        client: &BillableClient,
        plan: &PlannedInvoice,
    ) -> Result<Option<GeneratedInvoice>, AppError>;
}

/// Uma passada por todos os clientes faturáveis. Falha de um cliente é
/// registrada no resumo e a execução segue; só erro de infraestrutura
/// na listagem inicial interrompe.
pub async fn generate_recurring_invoices(
    store: &dyn BillingStore,
    today: NaiveDate,
) -> Result<RecurringInvoiceRun, AppError> {
    let clients = store.billable_clients().await?;
    let mut run = RecurringInvoiceRun { clients_checked: clients.len(), ..Default::default() };

    for client in &clients {
        let Some(plan) = plan_next_invoice(client, today) else {
            continue;
        };

        match store.create_invoice(client, &plan).await {
            Ok(Some(generated)) => {
                tracing::info!(
                    client_id = %client.id,
                    invoice_id = %generated.invoice_id,
                    number = %generated.number,
                    issue_date = %plan.issue_date,
                    "Fatura recorrente gerada"
                );
                run.created.push(generated);
            }
            // Outra execução faturou o ciclo primeiro
            Ok(None) => {
                tracing::debug!(client_id = %client.id, "Ciclo já faturado");
            }
            Err(AppError::InvoiceNumberConflict(number)) => {
                tracing::warn!(client_id = %client.id, number = %number, "Conflito de numeração");
                run.errors.push(JobError::retryable(
                    client.id,
                    format!("Invoice number {} already exists.", number),
                ));
            }
            Err(e) => {
                tracing::error!(client_id = %client.id, "Falha ao gerar fatura recorrente: {}", e);
                run.errors.push(JobError::new(client.id, e.to_string()));
            }
        }
    }

    tracing::info!(
        clients_checked = run.clients_checked,
        created = run.created.len(),
        errors = run.errors.len(),
        "Geração de faturas recorrentes concluída"
    );
    Ok(run)
}

#[derive(Clone)]
pub struct BillingService {
    client_repo: ClientRepository,
    invoice_repo: InvoiceRepository,
    settings_repo: SettingsRepository,
    pool: PgPool,
}

impl BillingService {
    pub fn new(
        client_repo: ClientRepository,
        invoice_repo: InvoiceRepository,
        settings_repo: SettingsRepository,
        pool: PgPool,
    ) -> Self {
        Self { client_repo, invoice_repo, settings_repo, pool }
    }

    pub async fn run(&self, today: NaiveDate) -> Result<RecurringInvoiceRun, AppError> {
        generate_recurring_invoices(self, today).await
    }
}

#[async_trait]
impl BillingStore for BillingService {
    async fn billable_clients(&self) -> Result<Vec<BillableClient>, AppError> {
        self.client_repo.billable_clients().await
    }

    // Numeração e inserção na mesma transação, por cliente
    async fn create_invoice(
        &self,
        client: &BillableClient,
        plan: &PlannedInvoice,
    ) -> Result<Option<GeneratedInvoice>, AppError> {
        let items = vec![LineItemDraft {
            description: plan.description.clone(),
            quantity: Decimal::ONE,
            unit_price: plan.amount,
        }];
        let totals = totals_for(&items, Decimal::ZERO)?;

        let mut tx = self.pool.begin().await?;

        let settings = self.settings_repo.get_settings(&mut *tx).await?;
        let existing = self.invoice_repo.all_numbers(&mut *tx).await?;
        let number = settings.numbering().next_number(existing.iter().map(String::as_str));

        let new_invoice = NewInvoice {
            client_id: client.id,
            number,
            issue_date: plan.issue_date,
            due_date: plan.due_date,
            source: SOURCE_RECURRING,
            notes: None,
        };

        let Some(invoice) = self.invoice_repo.insert(&mut *tx, &new_invoice, totals).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        self.invoice_repo.insert_line_items(&mut *tx, invoice.id, &items).await?;

        tx.commit().await?;

        Ok(Some(GeneratedInvoice {
            client_id: client.id,
            invoice_id: invoice.id,
            number: invoice.number,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::clients::BillingFrequency;
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Clientes em memória; a última emissão vem das faturas já criadas.
    #[derive(Default)]
    struct FakeBillingStore {
        clients: Vec<BillableClient>,
        conflicting: Vec<Uuid>,
        broken: Vec<Uuid>,
        billed_elsewhere: Vec<Uuid>,
        issued: Mutex<HashMap<Uuid, NaiveDate>>,
    }

    #[async_trait]
    impl BillingStore for FakeBillingStore {
        async fn billable_clients(&self) -> Result<Vec<BillableClient>, AppError> {
            let issued = self.issued.lock().unwrap();
            Ok(self
                .clients
                .iter()
                .cloned()
                .map(|mut c| {
                    if let Some(date) = issued.get(&c.id) {
                        c.last_issue_date = Some(*date);
                    }
                    c
                })
                .collect())
        }

        async fn create_invoice(
            &self,
            client: &BillableClient,
            plan: &PlannedInvoice,
        ) -> Result<Option<GeneratedInvoice>, AppError> {
            if self.conflicting.contains(&client.id) {
                return Err(AppError::InvoiceNumberConflict("INV-0042".into()));
            }
            if self.broken.contains(&client.id) {
                return Err(AppError::InternalServerError(anyhow::anyhow!("connection reset")));
            }
            if self.billed_elsewhere.contains(&client.id) {
                return Ok(None);
            }

            let mut issued = self.issued.lock().unwrap();
            issued.insert(client.id, plan.issue_date);
            Ok(Some(GeneratedInvoice {
                client_id: client.id,
                invoice_id: Uuid::new_v4(),
                number: format!("INV-{:04}", issued.len()),
            }))
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn client(frequency: BillingFrequency, last: Option<NaiveDate>, renewal: Option<NaiveDate>) -> BillableClient {
        BillableClient {
            id: Uuid::new_v4(),
            name: "Padaria Central".into(),
            billing_frequency: frequency,
            retainer_amount: Decimal::from_str("8500").unwrap(),
            renewal_date: renewal,
            last_issue_date: last,
        }
    }

    #[test]
    fn monthly_retainer_creates_one_invoice_per_cycle() {
        let mut c = client(BillingFrequency::Monthly, Some(date(2024, 1, 1)), None);
        let today = date(2024, 2, 1);

        let plan = plan_next_invoice(&c, today).expect("cycle due");
        assert_eq!(plan.issue_date, date(2024, 2, 1));
        assert_eq!(plan.due_date, date(2024, 3, 1));
        assert_eq!(plan.amount, Decimal::from_str("8500").unwrap());
        assert_eq!(plan.description, "Padaria Central - Monthly retainer");

        // Segunda execução no mesmo dia enxerga a fatura recém-criada
        c.last_issue_date = Some(plan.issue_date);
        assert_eq!(plan_next_invoice(&c, today), None);
    }

    #[test]
    fn cycle_is_not_due_before_its_month() {
        let c = client(BillingFrequency::Quarterly, Some(date(2024, 1, 15)), None);
        assert_eq!(plan_next_invoice(&c, date(2024, 3, 31)), None);
        let plan = plan_next_invoice(&c, date(2024, 4, 2)).unwrap();
        assert_eq!(plan.issue_date, date(2024, 4, 1));
    }

    #[test]
    fn renewal_date_is_the_fallback_base() {
        let c = client(BillingFrequency::Annual, None, Some(date(2023, 6, 20)));
        let plan = plan_next_invoice(&c, date(2024, 6, 3)).unwrap();
        assert_eq!(plan.issue_date, date(2024, 6, 1));
        assert_eq!(plan.description, "Padaria Central - Annual retainer");
    }

    #[test]
    fn brand_new_client_waits_for_next_month() {
        let c = client(BillingFrequency::Monthly, None, None);
        assert_eq!(plan_next_invoice(&c, date(2024, 5, 10)), None);
    }

    #[test]
    fn custom_frequency_and_zero_retainer_are_skipped() {
        let c = client(BillingFrequency::Custom, Some(date(2023, 1, 1)), None);
        assert_eq!(plan_next_invoice(&c, date(2024, 5, 10)), None);

        let mut c = client(BillingFrequency::Monthly, Some(date(2023, 1, 1)), None);
        c.retainer_amount = Decimal::ZERO;
        assert_eq!(plan_next_invoice(&c, date(2024, 5, 10)), None);
    }

    #[tokio::test]
    async fn one_failing_client_does_not_stop_the_run() {
        let last = Some(date(2024, 1, 1));
        let ok = client(BillingFrequency::Monthly, last, None);
        let broken = client(BillingFrequency::Monthly, last, None);
        let conflicting = client(BillingFrequency::Monthly, last, None);
        let elsewhere = client(BillingFrequency::Monthly, last, None);

        let store = FakeBillingStore {
            broken: vec![broken.id],
            conflicting: vec![conflicting.id],
            billed_elsewhere: vec![elsewhere.id],
            clients: vec![broken.clone(), conflicting.clone(), ok.clone(), elsewhere],
            ..Default::default()
        };

        let run = generate_recurring_invoices(&store, date(2024, 2, 1)).await.unwrap();

        assert_eq!(run.clients_checked, 4);
        assert_eq!(run.created.len(), 1);
        assert_eq!(run.created[0].client_id, ok.id);

        assert_eq!(run.errors.len(), 2);
        let broken_err = run.errors.iter().find(|e| e.entity_id == broken.id).unwrap();
        assert!(!broken_err.retryable);
        let conflict_err = run.errors.iter().find(|e| e.entity_id == conflicting.id).unwrap();
        assert!(conflict_err.retryable);
        assert!(conflict_err.message.contains("INV-0042"));
    }

    #[tokio::test]
    async fn second_run_on_the_same_day_creates_nothing() {
        let c = client(BillingFrequency::Monthly, Some(date(2024, 1, 1)), None);
        let store = FakeBillingStore { clients: vec![c], ..Default::default() };
        let today = date(2024, 2, 1);

        let first = generate_recurring_invoices(&store, today).await.unwrap();
        assert_eq!(first.created.len(), 1);

        let second = generate_recurring_invoices(&store, today).await.unwrap();
        assert!(second.created.is_empty());
        assert!(second.errors.is_empty());
    }
}
