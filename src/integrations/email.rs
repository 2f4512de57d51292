// src/integrations/email.rs

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::IntegrationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub reply_to: Option<String>,
}

/// `send(to, subject, html)`: sucesso ou erro definido. Nunca bloqueia uma transição.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), IntegrationError>;
}

// Provedor HTTP no formato da API do Resend
pub struct HttpEmailSender {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpEmailSender {
    pub fn new(client: Client, api_url: String, api_key: String, from: String) -> Self {
        Self { client, api_url, api_key, from }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), IntegrationError> {
        let mut payload = json!({
            "from": self.from,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html,
        });
        if let Some(reply_to) = &email.reply_to {
            payload["reply_to"] = json!(reply_to);
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IntegrationError::from_response("email", response).await);
        }

        tracing::debug!(to = %email.to, subject = %email.subject, "E-mail enviado");
        Ok(())
    }
}

// Usado quando EMAIL_API_KEY não está definida: toda tentativa falha de forma explícita
pub struct DisabledEmailSender;

#[async_trait]
impl EmailSender for DisabledEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), IntegrationError> {
        tracing::warn!(to = %email.to, "Envio de e-mail desativado (EMAIL_API_KEY ausente)");
        Err(IntegrationError::NotConfigured("email"))
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::Mutex;

    use super::*;

    /// Guarda os e-mails enviados; falha para destinatários em `failing`.
    #[derive(Default)]
    pub struct RecordingEmailSender {
        pub sent: Mutex<Vec<OutgoingEmail>>,
        pub failing: Vec<String>,
    }

    impl RecordingEmailSender {
        pub fn failing_for(to: &str) -> Self {
            Self { sent: Mutex::new(Vec::new()), failing: vec![to.to_string()] }
        }

        pub fn sent_to(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|e| e.to.clone()).collect()
        }
    }

    #[async_trait]
    impl EmailSender for RecordingEmailSender {
        async fn send(&self, email: &OutgoingEmail) -> Result<(), IntegrationError> {
            if self.failing.contains(&email.to) {
                return Err(IntegrationError::Api {
                    service: "email",
                    status: 422,
                    message: "mailbox unavailable".into(),
                });
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_sender_reports_not_configured() {
        let email = OutgoingEmail {
            to: "a@b.com".into(),
            subject: "s".into(),
            html: "<p>x</p>".into(),
            reply_to: None,
        };
        let err = DisabledEmailSender.send(&email).await.unwrap_err();
        assert!(matches!(err, IntegrationError::NotConfigured("email")));
    }
}
