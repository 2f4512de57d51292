// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::ledger;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Settings ---
        handlers::settings::get_settings,
        handlers::settings::update_settings,

        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,

        // --- Clients ---
        handlers::clients::create_client,
        handlers::clients::list_clients,
        handlers::clients::get_client,
        handlers::clients::update_client,
        handlers::clients::add_member,

        // --- Invoices ---
        handlers::invoices::list_invoices,
        handlers::invoices::get_invoice,
        handlers::invoices::create_invoice,
        handlers::invoices::replace_line_items,
        handlers::invoices::set_invoice_status,
        handlers::invoices::preview_totals,
        handlers::invoices::record_payment,
        handlers::documents::download_invoice_pdf,

        // --- Portal ---
        handlers::portal::get_portal_invoice,

        // --- Tasks ---
        handlers::tasks::create_task,
        handlers::tasks::list_tasks,
        handlers::tasks::get_task,
        handlers::tasks::update_task_status,
        handlers::tasks::list_occurrences,
        handlers::tasks::complete_occurrence,
        handlers::tasks::skip_occurrence,

        // --- Social ---
        handlers::social::connect_page,
        handlers::social::list_pages,
        handlers::social::refresh_page_profile,
        handlers::social::update_profile_image,
        handlers::social::update_cover_image,
        handlers::social::create_post,
        handlers::social::list_posts,
        handlers::social::get_post,
        handlers::social::update_caption,
        handlers::social::schedule_post,
        handlers::social::cancel_post,
        handlers::social::list_conversations,
        handlers::social::list_messages,
        handlers::social::reply_to_conversation,

        // --- Webhooks ---
        handlers::webhooks::verify_messenger,
        handlers::webhooks::receive_messenger,

        // --- Jobs ---
        handlers::jobs::run_recurring_invoices,
        handlers::jobs::run_payment_reminders,
        handlers::jobs::run_publish_posts,

        // --- Dashboard ---
        handlers::dashboard::get_summary,
    ),
    components(
        schemas(
            // --- DASHBOARD ---
            models::dashboard::DashboardSummary,

            // --- Settings ---
            models::settings::AgencySettings,
            models::settings::UpdateSettingsRequest,

            // --- Auth ---
            models::auth::UserRole,
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Clients ---
            models::clients::ClientStatus,
            models::clients::BillingFrequency,
            models::clients::Client,
            models::clients::CreateClientRequest,
            models::clients::UpdateClientRequest,
            models::clients::AddMemberRequest,

            // --- Invoices ---
            models::invoices::InvoiceStatus,
            models::invoices::Invoice,
            models::invoices::InvoiceListItem,
            models::invoices::InvoiceLineItem,
            models::invoices::LineItemInput,
            models::invoices::Payment,
            models::invoices::InvoiceDetail,
            models::invoices::PaymentReceipt,
            models::invoices::StatusChange,
            ledger::InvoiceTotals,

            // --- Tasks ---
            models::tasks::TaskRecurrence,
            models::tasks::TaskStatus,
            models::tasks::OccurrenceStatus,
            models::tasks::Task,
            models::tasks::TaskOccurrence,
            models::tasks::TaskWithOccurrences,
            models::tasks::CompletionOutcome,

            // --- Social ---
            models::social::PostStatus,
            models::social::MessageDirection,
            models::social::SocialPage,
            models::social::SocialPost,
            models::social::Conversation,
            models::social::MessengerMessage,
            services::messenger_service::IngestSummary,

            // --- Jobs ---
            models::jobs::ReminderKind,
            models::jobs::JobError,
            models::jobs::GeneratedInvoice,
            models::jobs::RecurringInvoiceRun,
            models::jobs::SentReminder,
            models::jobs::ReminderRun,
            models::jobs::PublishRun,

            // --- Payloads ---
            handlers::invoices::CreateInvoicePayload,
            handlers::invoices::ReplaceLineItemsPayload,
            handlers::invoices::PreviewTotalsPayload,
            handlers::invoices::SetStatusPayload,
            handlers::invoices::RecordPaymentPayload,
            handlers::tasks::CreateTaskPayload,
            handlers::tasks::UpdateTaskStatusPayload,
            handlers::social::ConnectPagePayload,
            handlers::social::PageImagePayload,
            handlers::social::CreatePostPayload,
            handlers::social::UpdateCaptionPayload,
            handlers::social::SchedulePostPayload,
            handlers::social::ReplyPayload,
        )
    ),
    tags(
        (name = "Settings", description = "Configurações da Agência"),
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário e Perfil"),
        (name = "Clients", description = "Clientes e Condições de Cobrança"),
        (name = "Invoices", description = "Faturas, Pagamentos e Conciliação"),
        (name = "Portal", description = "Visualização Pública da Fatura"),
        (name = "Tasks", description = "Tarefas e Ocorrências Recorrentes"),
        (name = "Social", description = "Páginas, Postagens e Caixa de Entrada"),
        (name = "Webhooks", description = "Eventos da Plataforma Social"),
        (name = "Jobs", description = "Gatilhos dos Workers Agendados"),
        (name = "Dashboard", description = "Indicadores Gerenciais")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
        // Segredo compartilhado do agendador externo
        components.add_security_scheme(
            "cron_secret",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
