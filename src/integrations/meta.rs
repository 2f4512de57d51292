// src/integrations/meta.rs

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::IntegrationError;

const GRAPH_BASE_URL: &str = "https://graph.facebook.com";
const SERVICE: &str = "graph_api";

/// Token de acesso da página. Opaco: não aparece em logs nem em `Debug`.
#[derive(Clone)]
pub struct PageCredential(String);

impl PageCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PageCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PageCredential(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub post_id: String,
    pub permalink: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageProfile {
    pub name: Option<String>,
    pub picture_url: Option<String>,
}

#[async_trait]
pub trait SocialPublisher: Send + Sync {
    async fn publish_post(
        &self,
        page_id: &str,
        credential: &PageCredential,
        text: &str,
    ) -> Result<PublishedPost, IntegrationError>;

    async fn fetch_profile(
        &self,
        page_id: &str,
        credential: &PageCredential,
    ) -> Result<PageProfile, IntegrationError>;

    async fn update_profile_image(
        &self,
        page_id: &str,
        credential: &PageCredential,
        image_url: &str,
    ) -> Result<(), IntegrationError>;

    async fn update_cover_image(
        &self,
        page_id: &str,
        credential: &PageCredential,
        image_url: &str,
    ) -> Result<(), IntegrationError>;

    /// Retorna o id externo da mensagem, quando a plataforma informa.
    async fn send_direct_message(
        &self,
        page_id: &str,
        credential: &PageCredential,
        recipient_id: &str,
        text: &str,
    ) -> Result<Option<String>, IntegrationError>;
}

pub struct GraphApiClient {
    client: Client,
    version: String,
}

impl GraphApiClient {
    pub fn new(client: Client, version: impl Into<String>) -> Self {
        Self { client, version: version.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", GRAPH_BASE_URL, self.version, path)
    }

    async fn post(
        &self,
        path: &str,
        credential: &PageCredential,
        body: Value,
    ) -> Result<Value, IntegrationError> {
        let response = self
            .client
            .post(self.url(path))
            .query(&[("access_token", credential.expose())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IntegrationError::from_response(SERVICE, response).await);
        }
        Ok(response.json::<Value>().await?)
    }

    async fn get(
        &self,
        path: &str,
        credential: &PageCredential,
        fields: &str,
    ) -> Result<Value, IntegrationError> {
        let response = self
            .client
            .get(self.url(path))
            .query(&[("access_token", credential.expose()), ("fields", fields)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IntegrationError::from_response(SERVICE, response).await);
        }
        Ok(response.json::<Value>().await?)
    }
}

fn required_id(body: &Value) -> Result<String, IntegrationError> {
    body.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(IntegrationError::UnexpectedPayload(SERVICE))
}

fn parse_profile(body: &Value) -> PageProfile {
    PageProfile {
        name: body.get("name").and_then(Value::as_str).map(str::to_string),
        picture_url: body
            .pointer("/picture/data/url")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

#[async_trait]
impl SocialPublisher for GraphApiClient {
    async fn publish_post(
        &self,
        page_id: &str,
        credential: &PageCredential,
        text: &str,
    ) -> Result<PublishedPost, IntegrationError> {
        let created = self
            .post(&format!("{}/feed", page_id), credential, json!({ "message": text }))
            .await?;
        let post_id = required_id(&created)?;

        // O post já existe: falha ao buscar o link não desfaz a publicação
        let permalink = match self.get(&post_id, credential, "permalink_url").await {
            Ok(body) => body.get("permalink_url").and_then(Value::as_str).map(str::to_string),
            Err(e) => {
                tracing::warn!(post_id = %post_id, "Não foi possível obter o permalink: {}", e);
                None
            }
        };

        Ok(PublishedPost { post_id, permalink })
    }

    async fn fetch_profile(
        &self,
        page_id: &str,
        credential: &PageCredential,
    ) -> Result<PageProfile, IntegrationError> {
        let body = self.get(page_id, credential, "name,picture{url}").await?;
        Ok(parse_profile(&body))
    }

    async fn update_profile_image(
        &self,
        page_id: &str,
        credential: &PageCredential,
        image_url: &str,
    ) -> Result<(), IntegrationError> {
        self.post(&format!("{}/picture", page_id), credential, json!({ "picture": image_url }))
            .await?;
        Ok(())
    }

    async fn update_cover_image(
        &self,
        page_id: &str,
        credential: &PageCredential,
        image_url: &str,
    ) -> Result<(), IntegrationError> {
        // Capa = foto não publicada + referência no campo `cover` da página
        let photo = self
            .post(
                &format!("{}/photos", page_id),
                credential,
                json!({ "url": image_url, "published": false }),
            )
            .await?;
        let photo_id = required_id(&photo)?;

        self.post(page_id, credential, json!({ "cover": photo_id })).await?;
        Ok(())
    }

    async fn send_direct_message(
        &self,
        page_id: &str,
        credential: &PageCredential,
        recipient_id: &str,
        text: &str,
    ) -> Result<Option<String>, IntegrationError> {
        let body = self
            .post(
                &format!("{}/messages", page_id),
                credential,
                json!({
                    "recipient": { "id": recipient_id },
                    "message": { "text": text },
                    "messaging_type": "RESPONSE",
                }),
            )
            .await?;

        Ok(body.get("message_id").and_then(Value::as_str).map(str::to_string))
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Publicador em memória. Páginas em `failing` devolvem o erro configurado.
    #[derive(Default)]
    pub struct FakePublisher {
        pub published: Mutex<Vec<(String, String)>>,
        pub messages: Mutex<Vec<(String, String, String)>>,
        pub failing: HashMap<String, String>,
    }

    impl FakePublisher {
        pub fn failing_for(page_id: &str, message: &str) -> Self {
            let mut failing = HashMap::new();
            failing.insert(page_id.to_string(), message.to_string());
            Self { failing, ..Default::default() }
        }

        fn check(&self, page_id: &str) -> Result<(), IntegrationError> {
            match self.failing.get(page_id) {
                Some(message) => Err(IntegrationError::Api {
                    service: SERVICE,
                    status: 400,
                    message: message.clone(),
                }),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl SocialPublisher for FakePublisher {
        async fn publish_post(
            &self,
            page_id: &str,
            _credential: &PageCredential,
            text: &str,
        ) -> Result<PublishedPost, IntegrationError> {
            self.check(page_id)?;
            let mut published = self.published.lock().unwrap();
            published.push((page_id.to_string(), text.to_string()));
            let post_id = format!("{}_{}", page_id, published.len());
            Ok(PublishedPost {
                permalink: Some(format!("https://facebook.com/{}", post_id)),
                post_id,
            })
        }

        async fn fetch_profile(
            &self,
            page_id: &str,
            _credential: &PageCredential,
        ) -> Result<PageProfile, IntegrationError> {
            self.check(page_id)?;
            Ok(PageProfile {
                name: Some(format!("Page {}", page_id)),
                picture_url: Some(format!("https://cdn.test/{}.png", page_id)),
            })
        }

        async fn update_profile_image(
            &self,
            page_id: &str,
            _credential: &PageCredential,
            _image_url: &str,
        ) -> Result<(), IntegrationError> {
            self.check(page_id)
        }

        async fn update_cover_image(
            &self,
            page_id: &str,
            _credential: &PageCredential,
            _image_url: &str,
        ) -> Result<(), IntegrationError> {
            self.check(page_id)
        }

        async fn send_direct_message(
            &self,
            page_id: &str,
            _credential: &PageCredential,
            recipient_id: &str,
            text: &str,
        ) -> Result<Option<String>, IntegrationError> {
            self.check(page_id)?;
            let mut messages = self.messages.lock().unwrap();
            messages.push((page_id.to_string(), recipient_id.to_string(), text.to_string()));
            Ok(Some(format!("m_{}", messages.len())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_is_redacted_in_debug_output() {
        let credential = PageCredential::new("EAAB-secret-token");
        assert_eq!(format!("{:?}", credential), "PageCredential(***)");
    }

    #[test]
    fn profile_reads_nested_picture_url() {
        let body = json!({
            "name": "Padaria Central",
            "picture": { "data": { "url": "https://cdn/pic.png", "is_silhouette": false } },
            "id": "1001"
        });
        let profile = parse_profile(&body);
        assert_eq!(profile.name.as_deref(), Some("Padaria Central"));
        assert_eq!(profile.picture_url.as_deref(), Some("https://cdn/pic.png"));
        assert_eq!(parse_profile(&json!({})), PageProfile::default());
    }

    #[test]
    fn created_object_must_carry_an_id() {
        assert_eq!(required_id(&json!({ "id": "1001_77" })).unwrap(), "1001_77");
        assert!(matches!(
            required_id(&json!({ "success": true })),
            Err(IntegrationError::UnexpectedPayload(_))
        ));
    }
}
