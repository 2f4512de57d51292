// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    db::{
        ClientRepository, DashboardRepository, InvoiceRepository, MessengerRepository,
        SettingsRepository, SocialRepository, TaskRepository, UserRepository,
    },
    integrations::{DisabledEmailSender, EmailSender, GraphApiClient, HttpEmailSender, SocialPublisher},
    services::{
        auth::AuthService, billing_service::BillingService, client_service::ClientService,
        dashboard_service::DashboardService, document_service::DocumentService,
        invoice_service::InvoiceService, messenger_service::MessengerService,
        reminder_service::ReminderService, scope_service::ScopeService,
        social_service::SocialService, task_service::TaskService,
    },
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";
const DEFAULT_GRAPH_VERSION: &str = "v19.0";
const HTTP_TIMEOUT_SECS: u64 = 15;

// Variáveis de ambiente lidas uma única vez na inicialização
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub app_env: String,
    pub bind_addr: String,
    pub cron_secret: Option<String>,
    pub public_app_url: Option<String>,
    pub email_api_url: String,
    pub email_api_key: Option<String>,
    pub email_from: Option<String>,
    pub meta_graph_version: String,
    pub messenger_verify_token: Option<String>,
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?,
            app_env: optional_var("APP_ENV").unwrap_or_else(|| "production".to_string()),
            bind_addr: optional_var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            cron_secret: optional_var("CRON_SECRET"),
            public_app_url: optional_var("PUBLIC_APP_URL"),
            email_api_url: optional_var("EMAIL_API_URL").unwrap_or_else(|| DEFAULT_EMAIL_API_URL.to_string()),
            email_api_key: optional_var("EMAIL_API_KEY"),
            email_from: optional_var("EMAIL_FROM"),
            meta_graph_version: optional_var("META_GRAPH_VERSION")
                .unwrap_or_else(|| DEFAULT_GRAPH_VERSION.to_string()),
            messenger_verify_token: optional_var("MESSENGER_VERIFY_TOKEN"),
        })
    }

    // Só development/test liberam o gatilho sem segredo configurado
    pub fn is_production(&self) -> bool {
        !matches!(self.app_env.as_str(), "development" | "test")
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<AppConfig>,
    pub i18n_store: Arc<I18nStore>,

    pub settings_repo: SettingsRepository,

    pub auth_service: AuthService,
    pub scope_service: ScopeService,
    pub client_service: ClientService,
    pub invoice_service: InvoiceService,
    pub billing_service: BillingService,
    pub reminder_service: ReminderService,
    pub task_service: TaskService,
    pub social_service: SocialService,
    pub messenger_service: MessengerService,
    pub dashboard_service: DashboardService,
    pub document_service: DocumentService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = AppConfig::from_env()?;

        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Colaboradores externos ---
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("Falha ao criar o cliente HTTP")?;

        let email: Arc<dyn EmailSender> = match (&config.email_api_key, &config.email_from) {
            (Some(key), Some(from)) => Arc::new(HttpEmailSender::new(
                http_client.clone(),
                config.email_api_url.clone(),
                key.clone(),
                from.clone(),
            )),
            _ => {
                tracing::warn!("EMAIL_API_KEY/EMAIL_FROM ausentes: envio de e-mails desativado");
                Arc::new(DisabledEmailSender)
            }
        };
        let publisher: Arc<dyn SocialPublisher> =
            Arc::new(GraphApiClient::new(http_client, config.meta_graph_version.clone()));

        if config.cron_secret.is_none() && config.is_production() {
            tracing::warn!("CRON_SECRET ausente: os gatilhos de jobs responderão 503");
        }

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let client_repo = ClientRepository::new(db_pool.clone());
        let invoice_repo = InvoiceRepository::new(db_pool.clone());
        let task_repo = TaskRepository::new(db_pool.clone());
        let social_repo = SocialRepository::new(db_pool.clone());
        let messenger_repo = MessengerRepository::new(db_pool.clone());
        let dashboard_repo = DashboardRepository::new(db_pool.clone());
        let settings_repo = SettingsRepository::new(db_pool.clone());

        let public_app_url = config.public_app_url.clone();

        let invoice_service = InvoiceService::new(
            invoice_repo.clone(),
            client_repo.clone(),
            settings_repo.clone(),
            email.clone(),
            public_app_url.clone(),
            db_pool.clone(),
        );

        Ok(Self {
            auth_service: AuthService::new(user_repo.clone(), config.jwt_secret.clone(), db_pool.clone()),
            scope_service: ScopeService::new(user_repo.clone()),
            client_service: ClientService::new(client_repo.clone(), user_repo, db_pool.clone()),
            billing_service: BillingService::new(
                client_repo.clone(),
                invoice_repo.clone(),
                settings_repo.clone(),
                db_pool.clone(),
            ),
            reminder_service: ReminderService::new(
                invoice_repo.clone(),
                settings_repo.clone(),
                email,
                public_app_url.clone(),
                db_pool.clone(),
            ),
            task_service: TaskService::new(task_repo, client_repo.clone(), db_pool.clone()),
            social_service: SocialService::new(
                social_repo.clone(),
                client_repo,
                publisher.clone(),
                db_pool.clone(),
            ),
            messenger_service: MessengerService::new(messenger_repo, social_repo, publisher, db_pool.clone()),
            dashboard_service: DashboardService::new(dashboard_repo, invoice_repo, db_pool.clone()),
            document_service: DocumentService::new(invoice_service.clone(), settings_repo.clone(), public_app_url),
            invoice_service,
            settings_repo,
            i18n_store: Arc::new(I18nStore::new()),
            config: Arc::new(config),
            db_pool,
        })
    }
}
