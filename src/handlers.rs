// src/handlers.rs

pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod documents;
pub mod invoices;
pub mod jobs;
pub mod portal;
pub mod settings;
pub mod social;
pub mod tasks;
pub mod webhooks;
