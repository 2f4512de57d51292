// src/services.rs

pub mod auth;
pub mod billing_service;
pub mod client_service;
pub mod dashboard_service;
pub mod document_service;
pub mod invoice_service;
pub mod messenger_service;
pub mod notifications;
pub mod reminder_service;
pub mod scope_service;
pub mod social_service;
pub mod task_service;
