// src/middleware.rs

pub mod auth;
pub mod cron;
pub mod i18n;
pub mod scope;
