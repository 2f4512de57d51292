// src/integrations.rs
//
// Colaboradores externos (e-mail e Graph API da Meta) atrás de traits assíncronos,
// para que serviços e workers possam ser testados com implementações falsas.

pub mod email;
pub mod meta;

pub use email::{DisabledEmailSender, EmailSender, HttpEmailSender, OutgoingEmail};
pub use meta::{GraphApiClient, PageCredential, PageProfile, PublishedPost, SocialPublisher};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("falha de comunicação: {0}")]
    Transport(#[from] reqwest::Error),

    // Texto de erro devolvido pelo provedor, preservado para o registro da entidade
    #[error("{service} HTTP {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{0} não configurado")]
    NotConfigured(&'static str),

    #[error("resposta inesperada de {0}")]
    UnexpectedPayload(&'static str),
}

impl IntegrationError {
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        // Graph API: {"error": {"message": "..."}}; Resend: {"message": "..."}
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .or_else(|| v.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);

        IntegrationError::Api { service, status, message }
    }
}
