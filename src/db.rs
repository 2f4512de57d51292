pub mod user_repo;
pub use user_repo::UserRepository;
pub mod client_repo;
pub use client_repo::ClientRepository;
pub mod invoice_repo;
pub use invoice_repo::InvoiceRepository;
pub mod task_repo;
pub use task_repo::TaskRepository;
pub mod social_repo;
pub use social_repo::SocialRepository;
pub mod messenger_repo;
pub use messenger_repo::MessengerRepository;
pub mod dashboard_repo;
pub use dashboard_repo::DashboardRepository;
pub mod settings_repo;
pub use settings_repo::SettingsRepository;
