// src/models.rs

pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod invoices;
pub mod jobs;
pub mod scope;
pub mod settings;
pub mod social;
pub mod tasks;
