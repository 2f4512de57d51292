// src/services/reminder_service.rs
//
// Lembretes de pagamento: no máximo um por fatura por dia.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{InvoiceRepository, SettingsRepository},
    integrations::{EmailSender, OutgoingEmail},
    ledger::{dates::start_of_day, money},
    models::{
        invoices::ReminderCandidate,
        jobs::{JobError, ReminderKind, ReminderRun, SentReminder},
        settings::AgencySettings,
    },
    services::notifications::{self, InvoiceMailData},
};

const CANDIDATE_HORIZON_DAYS: u64 = 7;
const DUE_SOON_DAYS: u64 = 3;

/// Vencida antes de hoje => overdue; vence em até 3 dias => due_soon.
pub fn classify(due_date: NaiveDate, today: NaiveDate) -> Option<ReminderKind> {
    if due_date < today {
        return Some(ReminderKind::Overdue);
    }
    let soon = today.checked_add_days(Days::new(DUE_SOON_DAYS))?;
    (due_date <= soon).then_some(ReminderKind::DueSoon)
}

pub fn already_reminded_today(last_reminder_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    last_reminder_at.is_some_and(|last| last >= start_of_day(now))
}

pub fn reminder_for(
    settings: &AgencySettings,
    candidate: &ReminderCandidate,
    kind: ReminderKind,
    public_app_url: Option<&str>,
) -> OutgoingEmail {
    let portal_url = notifications::portal_url(public_app_url, candidate.portal_token.as_deref());
    notifications::reminder_email(
        settings,
        &candidate.client_email,
        kind,
        &InvoiceMailData {
            number: &candidate.number,
            client_name: &candidate.client_name,
            due_date: candidate.due_date,
            amount_due: money::remaining_balance(candidate.total, candidate.amount_paid),
            portal_url: portal_url.as_deref(),
        },
    )
}

/// Leitura dos candidatos e a marca diária de cada fatura.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn sweep_overdue(&self, today: NaiveDate) -> Result<u64, AppError>;

    async fn reminder_candidates(&self, horizon: NaiveDate) -> Result<Vec<ReminderCandidate>, AppError>;

    async fn settings(&self) -> Result<AgencySettings, AppError>;

    /// Grava `now` se a fatura ainda não foi lembrada no dia. Devolve a marca
    /// anterior, ou `None` quando outra execução reivindicou primeiro.
    async fn claim_reminder(
        &self,
        invoice_id: Uuid,
        day_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<Option<DateTime<Utc>>>, AppError>;

    /// Restaura a marca anterior, desde que ainda seja a nossa.
    async fn release_reminder(
        &self,
        invoice_id: Uuid,
        claimed_at: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;
}

/// Reivindica o dia da fatura antes de enviar; se o envio falhar, a marca
/// anterior é restaurada e o erro entra no resumo.
pub async fn send_due_reminders(
    store: &dyn ReminderStore,
    email: &dyn EmailSender,
    public_app_url: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ReminderRun, AppError> {
    let today = now.date_naive();

    // Status atualizado antes de classificar
    store.sweep_overdue(today).await?;

    let horizon = today
        .checked_add_days(Days::new(CANDIDATE_HORIZON_DAYS))
        .unwrap_or(today);
    let candidates = store.reminder_candidates(horizon).await?;
    let settings = store.settings().await?;
    let day_start = start_of_day(now);

    let mut run = ReminderRun::default();

    for candidate in &candidates {
        let Some(kind) = classify(candidate.due_date, today) else {
            continue;
        };
        if already_reminded_today(candidate.last_reminder_at, now) {
            continue;
        }

        let previous = match store.claim_reminder(candidate.id, day_start, now).await {
            Ok(Some(previous)) => previous,
            // Outra execução lembrou primeiro
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(invoice_id = %candidate.id, "Falha ao reivindicar lembrete: {}", e);
                run.errors.push(JobError::new(candidate.id, e.to_string()));
                continue;
            }
        };

        let message = reminder_for(&settings, candidate, kind, public_app_url);
        match email.send(&message).await {
            Ok(()) => {
                tracing::info!(invoice_id = %candidate.id, kind = ?kind, "Lembrete enviado");
                run.sent += 1;
                run.reminders.push(SentReminder {
                    kind,
                    invoice_id: candidate.id,
                    number: candidate.number.clone(),
                });
            }
            Err(e) => {
                tracing::warn!(invoice_id = %candidate.id, "Falha ao enviar lembrete: {}", e);
                if let Err(release_err) = store.release_reminder(candidate.id, now, previous).await {
                    tracing::error!(invoice_id = %candidate.id, "Falha ao liberar lembrete: {}", release_err);
                }
                run.errors.push(JobError::new(candidate.id, e.to_string()));
            }
        }
    }

    tracing::info!(
        candidates = candidates.len(),
        sent = run.sent,
        errors = run.errors.len(),
        "Lembretes de pagamento concluídos"
    );
    Ok(run)
}

#[derive(Clone)]
pub struct ReminderService {
    invoice_repo: InvoiceRepository,
    settings_repo: SettingsRepository,
    email: Arc<dyn EmailSender>,
    public_app_url: Option<String>,
    pool: PgPool,
}

impl ReminderService {
    pub fn new(
        invoice_repo: InvoiceRepository,
        settings_repo: SettingsRepository,
        email: Arc<dyn EmailSender>,
        public_app_url: Option<String>,
        pool: PgPool,
    ) -> Self {
        Self { invoice_repo, settings_repo, email, public_app_url, pool }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<ReminderRun, AppError> {
        send_due_reminders(self, self.email.as_ref(), self.public_app_url.as_deref(), now).await
    }
}

#[async_trait]
impl ReminderStore for ReminderService {
    async fn sweep_overdue(&self, today: NaiveDate) -> Result<u64, AppError> {
        self.invoice_repo.sweep_overdue(&self.pool, today, None).await
    }

    async fn reminder_candidates(&self, horizon: NaiveDate) -> Result<Vec<ReminderCandidate>, AppError> {
        self.invoice_repo.reminder_candidates(horizon).await
    }

    async fn settings(&self) -> Result<AgencySettings, AppError> {
        self.settings_repo.current().await
    }

    async fn claim_reminder(
        &self,
        invoice_id: Uuid,
        day_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<Option<DateTime<Utc>>>, AppError> {
        self.invoice_repo.claim_reminder(&self.pool, invoice_id, day_start, now).await
    }

    async fn release_reminder(
        &self,
        invoice_id: Uuid,
        claimed_at: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        self.invoice_repo.release_reminder(&self.pool, invoice_id, claimed_at, previous).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::email::fakes::RecordingEmailSender;
    use crate::models::invoices::InvoiceStatus;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use std::collections::{HashMap, HashSet};
    use std::str::FromStr;
    use std::sync::Mutex;

    /// Faturas em memória; a marca diária fica em `marks`.
    #[derive(Default)]
    struct FakeReminderStore {
        candidates: Vec<ReminderCandidate>,
        marks: Mutex<HashMap<Uuid, Option<DateTime<Utc>>>>,
        // Outra execução ganha a reivindicação
        raced: HashSet<Uuid>,
    }

    impl FakeReminderStore {
        fn with(candidates: Vec<ReminderCandidate>) -> Self {
            let marks = candidates.iter().map(|c| (c.id, c.last_reminder_at)).collect();
            Self { candidates, marks: Mutex::new(marks), ..Default::default() }
        }

        fn mark(&self, id: Uuid) -> Option<DateTime<Utc>> {
            self.marks.lock().unwrap().get(&id).copied().flatten()
        }
    }

    #[async_trait]
    impl ReminderStore for FakeReminderStore {
        async fn sweep_overdue(&self, _today: NaiveDate) -> Result<u64, AppError> {
            Ok(0)
        }

        async fn reminder_candidates(&self, horizon: NaiveDate) -> Result<Vec<ReminderCandidate>, AppError> {
            let marks = self.marks.lock().unwrap();
            Ok(self
                .candidates
                .iter()
                .filter(|c| c.due_date <= horizon)
                .cloned()
                .map(|mut c| {
                    c.last_reminder_at = marks.get(&c.id).copied().flatten();
                    c
                })
                .collect())
        }

        async fn settings(&self) -> Result<AgencySettings, AppError> {
            Ok(settings())
        }

        async fn claim_reminder(
            &self,
            invoice_id: Uuid,
            day_start: DateTime<Utc>,
            now: DateTime<Utc>,
        ) -> Result<Option<Option<DateTime<Utc>>>, AppError> {
            let mut marks = self.marks.lock().unwrap();
            let previous = marks.get(&invoice_id).copied().flatten();
            if self.raced.contains(&invoice_id) || previous.is_some_and(|p| p >= day_start) {
                return Ok(None);
            }
            marks.insert(invoice_id, Some(now));
            Ok(Some(previous))
        }

        async fn release_reminder(
            &self,
            invoice_id: Uuid,
            claimed_at: DateTime<Utc>,
            previous: Option<DateTime<Utc>>,
        ) -> Result<(), AppError> {
            let mut marks = self.marks.lock().unwrap();
            if marks.get(&invoice_id).copied().flatten() == Some(claimed_at) {
                marks.insert(invoice_id, previous);
            }
            Ok(())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn settings() -> AgencySettings {
        AgencySettings {
            company_name: Some("Aurora".into()),
            reply_to_email: None,
            address: None,
            currency: "USD".into(),
            invoice_prefix: "INV-".into(),
            invoice_number_width: 4,
            updated_at: Utc::now(),
        }
    }

    fn candidate(email: &str, due_date: NaiveDate) -> ReminderCandidate {
        ReminderCandidate {
            id: Uuid::new_v4(),
            number: "INV-0007".into(),
            client_id: Uuid::new_v4(),
            client_name: "Padaria Central".into(),
            client_email: email.into(),
            due_date,
            status: InvoiceStatus::Sent,
            total: Decimal::from_str("1000").unwrap(),
            amount_paid: Decimal::from_str("600").unwrap(),
            portal_token: Some("tok".into()),
            last_reminder_at: None,
        }
    }

    #[test]
    fn classification_by_due_date() {
        let today = date(2024, 3, 10);
        assert_eq!(classify(date(2024, 3, 9), today), Some(ReminderKind::Overdue));
        assert_eq!(classify(date(2024, 3, 10), today), Some(ReminderKind::DueSoon));
        assert_eq!(classify(date(2024, 3, 13), today), Some(ReminderKind::DueSoon));
        assert_eq!(classify(date(2024, 3, 14), today), None);
    }

    #[test]
    fn one_reminder_per_calendar_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        assert!(!already_reminded_today(None, now));
        assert!(already_reminded_today(Some(Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 1).unwrap()), now));
        assert!(!already_reminded_today(Some(Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap()), now));
    }

    #[test]
    fn reminder_charges_the_remaining_balance() {
        let c = candidate("ap@padaria.test", date(2024, 3, 1));
        let email = reminder_for(&settings(), &c, ReminderKind::Overdue, Some("https://app.test"));

        assert_eq!(email.to, "ap@padaria.test");
        assert!(email.html.contains("USD 400"));
        assert!(email.html.contains("https://app.test/portal/invoices/tok"));
    }

    #[tokio::test]
    async fn failed_delivery_releases_the_day_and_the_run_continues() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let broken = candidate("broken@client.test", date(2024, 3, 1));
        let ok = candidate("ok@client.test", date(2024, 3, 11));
        let store = FakeReminderStore::with(vec![broken.clone(), ok.clone()]);
        let sender = RecordingEmailSender::failing_for("broken@client.test");

        let run = send_due_reminders(&store, &sender, None, now).await.unwrap();

        assert_eq!(run.sent, 1);
        assert_eq!(run.reminders[0].invoice_id, ok.id);
        assert_eq!(run.reminders[0].kind, ReminderKind::DueSoon);
        assert_eq!(run.errors.len(), 1);
        assert_eq!(run.errors[0].entity_id, broken.id);

        assert_eq!(store.mark(ok.id), Some(now));
        assert_eq!(store.mark(broken.id), None);
        assert_eq!(sender.sent_to(), vec!["ok@client.test".to_string()]);
    }

    #[tokio::test]
    async fn released_invoice_is_retried_later_the_same_day() {
        let morning = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let broken = candidate("ap@client.test", date(2024, 3, 1));
        let ok = candidate("ok@client.test", date(2024, 3, 1));
        let store = FakeReminderStore::with(vec![broken.clone(), ok.clone()]);

        let failing = RecordingEmailSender::failing_for("ap@client.test");
        send_due_reminders(&store, &failing, None, morning).await.unwrap();

        let afternoon = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        let working = RecordingEmailSender::default();
        let run = send_due_reminders(&store, &working, None, afternoon).await.unwrap();

        // Só a que falhou; a outra já foi lembrada hoje
        assert_eq!(run.sent, 1);
        assert_eq!(run.reminders[0].invoice_id, broken.id);
        assert_eq!(working.sent_to(), vec!["ap@client.test".to_string()]);
    }

    #[tokio::test]
    async fn lost_claim_sends_nothing() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let c = candidate("ok@client.test", date(2024, 3, 1));
        let mut store = FakeReminderStore::with(vec![c.clone()]);
        store.raced.insert(c.id);
        let sender = RecordingEmailSender::default();

        let run = send_due_reminders(&store, &sender, None, now).await.unwrap();

        assert_eq!(run.sent, 0);
        assert!(run.errors.is_empty());
        assert!(sender.sent_to().is_empty());
    }
}
