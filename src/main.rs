//src/main.rs

use anyhow::Context;
use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod integrations;
mod ledger;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controla o nível; padrão "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .context("Falha ao inicializar o estado da aplicação.")?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados.")?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // --- Rotas públicas ---
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let portal_routes = Router::new()
        .route("/invoices/{token}", get(handlers::portal::get_portal_invoice));

    let webhook_routes = Router::new().route(
        "/messenger",
        get(handlers::webhooks::verify_messenger).post(handlers::webhooks::receive_messenger),
    );

    // Protegidas pelo segredo do agendador (extrator CronAuth)
    let job_routes = Router::new()
        .route("/recurring-invoices", post(handlers::jobs::run_recurring_invoices))
        .route("/payment-reminders", post(handlers::jobs::run_payment_reminders))
        .route("/publish-posts", post(handlers::jobs::run_publish_posts));

    // --- Rotas protegidas (JWT + escopo) ---
    let user_routes = Router::new().route("/me", get(handlers::auth::get_me));

    let client_routes = Router::new()
        .route(
            "/",
            post(handlers::clients::create_client).get(handlers::clients::list_clients),
        )
        .route(
            "/{id}",
            get(handlers::clients::get_client).put(handlers::clients::update_client),
        )
        .route("/{id}/members", post(handlers::clients::add_member));

    let invoice_routes = Router::new()
        .route(
            "/",
            post(handlers::invoices::create_invoice).get(handlers::invoices::list_invoices),
        )
        .route("/preview", post(handlers::invoices::preview_totals))
        .route("/{id}", get(handlers::invoices::get_invoice))
        .route("/{id}/line-items", put(handlers::invoices::replace_line_items))
        .route("/{id}/status", post(handlers::invoices::set_invoice_status))
        .route("/{id}/pdf", get(handlers::documents::download_invoice_pdf));

    let payment_routes = Router::new().route("/", post(handlers::invoices::record_payment));

    let task_routes = Router::new()
        .route(
            "/",
            post(handlers::tasks::create_task).get(handlers::tasks::list_tasks),
        )
        .route("/{id}", get(handlers::tasks::get_task))
        .route("/{id}/status", patch(handlers::tasks::update_task_status))
        .route("/{id}/occurrences", get(handlers::tasks::list_occurrences))
        .route(
            "/{id}/occurrences/{occurrence_id}/complete",
            post(handlers::tasks::complete_occurrence),
        )
        .route(
            "/{id}/occurrences/{occurrence_id}/skip",
            post(handlers::tasks::skip_occurrence),
        );

    let social_routes = Router::new()
        // Páginas
        .route(
            "/pages",
            post(handlers::social::connect_page).get(handlers::social::list_pages),
        )
        .route("/pages/{id}/refresh", post(handlers::social::refresh_page_profile))
        .route("/pages/{id}/profile-image", post(handlers::social::update_profile_image))
        .route("/pages/{id}/cover-image", post(handlers::social::update_cover_image))
        // Postagens
        .route(
            "/posts",
            post(handlers::social::create_post).get(handlers::social::list_posts),
        )
        .route("/posts/{id}", get(handlers::social::get_post))
        .route("/posts/{id}/caption", patch(handlers::social::update_caption))
        .route("/posts/{id}/schedule", post(handlers::social::schedule_post))
        .route("/posts/{id}/cancel", post(handlers::social::cancel_post))
        // Caixa de entrada
        .route("/conversations", get(handlers::social::list_conversations))
        .route(
            "/conversations/{id}/messages",
            get(handlers::social::list_messages).post(handlers::social::reply_to_conversation),
        );

    let protected_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/clients", client_routes)
        .nest("/invoices", invoice_routes)
        .nest("/payments", payment_routes)
        .nest("/tasks", task_routes)
        .nest("/social", social_routes)
        .route("/dashboard/summary", get(handlers::dashboard::get_summary))
        .route(
            "/settings",
            get(handlers::settings::get_settings).put(handlers::settings::update_settings),
        )
        // Aplica o middleware de Auth + Escopo em tudo
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/portal", portal_routes)
        .nest("/webhooks", webhook_routes)
        .nest("/jobs", job_routes)
        .merge(protected_routes);

    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api", api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state.clone());

    // Inicia o servidor
    let listener = TcpListener::bind(&app_state.config.bind_addr)
        .await
        .context("Falha ao iniciar o listener TCP")?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("Erro no servidor Axum")?;
    Ok(())
}
