// src/services/social_service.rs
//
// Páginas conectadas, posts agendados e o worker de publicação.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClientRepository, SocialRepository},
    integrations::{PageCredential, PublishedPost, SocialPublisher},
    models::{
        jobs::{JobError, PublishRun},
        scope::AccessScope,
        social::{DuePost, PostStatus, SocialPage, SocialPost},
    },
};

const UNKNOWN_ERROR: &str = "unknown error";

pub struct ConnectPageInput {
    pub client_id: Uuid,
    pub external_page_id: String,
    pub access_token: String,
    pub name: Option<String>,
}

pub struct CreatePostInput {
    pub client_id: Uuid,
    pub page_id: Uuid,
    pub caption: String,
    pub scheduled_for: Option<DateTime<Utc>>,
}

fn validate_caption(caption: &str) -> Result<&str, AppError> {
    let caption = caption.trim();
    if caption.is_empty() {
        return Err(AppError::InvalidInput("caption_required"));
    }
    Ok(caption)
}

fn check_schedule(scheduled_for: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<(), AppError> {
    match scheduled_for {
        Some(at) if at <= now => Err(AppError::InvalidInput("schedule_in_past")),
        _ => Ok(()),
    }
}

fn check_image_url(url: &str) -> Result<&str, AppError> {
    let url = url.trim();
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(url)
    } else {
        Err(AppError::InvalidInput("invalid_url"))
    }
}

/// Token opaco da página, buscado explicitamente antes de cada chamada externa.
pub fn page_credential(page: &SocialPage) -> Result<PageCredential, AppError> {
    page.access_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(PageCredential::new)
        .ok_or(AppError::InvariantViolation("page_not_connected"))
}

/// Para o worker: página externa + credencial, ou o motivo da falha.
pub fn credential_for(post: &DuePost) -> Result<(&str, PageCredential), String> {
    let Some(external_page_id) = post.external_page_id.as_deref() else {
        return Err("No social page is connected to this post.".to_string());
    };
    match post.access_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => Ok((external_page_id, PageCredential::new(token))),
        None => Err("The social page has no stored access token.".to_string()),
    }
}

#[derive(Debug)]
pub enum PublishOutcome {
    Published(PublishedPost),
    Failed(String),
}

/// Chama o publicador e normaliza o resultado. Falha sempre carrega texto.
pub async fn execute_publish(
    publisher: &dyn SocialPublisher,
    external_page_id: &str,
    credential: &PageCredential,
    caption: &str,
) -> PublishOutcome {
    match publisher.publish_post(external_page_id, credential, caption).await {
        Ok(published) => PublishOutcome::Published(published),
        Err(e) => {
            let message = e.to_string();
            if message.trim().is_empty() {
                PublishOutcome::Failed(UNKNOWN_ERROR.to_string())
            } else {
                PublishOutcome::Failed(message)
            }
        }
    }
}

/// Transições de status usadas pelo worker de publicação.
#[async_trait]
pub trait PublishStore: Send + Sync {
    async fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<DuePost>, AppError>;

    /// scheduled -> processing; `false` se outra execução pegou antes.
    async fn claim_post(&self, id: Uuid) -> Result<bool, AppError>;

    async fn mark_published(&self, id: Uuid, published: &PublishedPost) -> Result<bool, AppError>;

    async fn mark_failed(&self, id: Uuid, from: PostStatus, error: &str) -> Result<bool, AppError>;
}

/// Cada post é independente: reivindicado (processing) antes da chamada
/// externa e sempre resolvido para published ou failed na mesma execução.
pub async fn publish_due_posts(
    store: &dyn PublishStore,
    publisher: &dyn SocialPublisher,
    now: DateTime<Utc>,
) -> Result<PublishRun, AppError> {
    let due = store.due_posts(now).await?;
    let mut run = PublishRun::default();

    for post in &due {
        run.attempted += 1;
        if let Err(e) = publish_one(store, publisher, post, &mut run).await {
            tracing::error!(post_id = %post.id, "Erro de infraestrutura ao publicar: {}", e);
            run.failed.push(JobError::new(post.id, e.to_string()));
        }
    }

    tracing::info!(
        attempted = run.attempted,
        published = run.published.len(),
        skipped = run.skipped,
        failed = run.failed.len(),
        "Publicação de posts concluída"
    );
    Ok(run)
}

async fn publish_one(
    store: &dyn PublishStore,
    publisher: &dyn SocialPublisher,
    post: &DuePost,
    run: &mut PublishRun,
) -> Result<(), AppError> {
    let (external_page_id, credential) = match credential_for(post) {
        Ok(found) => found,
        Err(reason) => {
            if store.mark_failed(post.id, PostStatus::Scheduled, &reason).await? {
                tracing::warn!(post_id = %post.id, "Post sem página ou credencial: {}", reason);
                run.failed.push(JobError::new(post.id, reason));
            } else {
                run.skipped += 1;
            }
            return Ok(());
        }
    };

    if !store.claim_post(post.id).await? {
        run.skipped += 1;
        return Ok(());
    }

    match execute_publish(publisher, external_page_id, &credential, &post.caption).await {
        PublishOutcome::Published(published) => match store.mark_published(post.id, &published).await {
            Ok(_) => {
                tracing::info!(post_id = %post.id, external_post_id = %published.post_id, "Post publicado");
                run.published.push(post.id);
            }
            // Já está na plataforma; o id externo permite conciliar à mão
            Err(e) => {
                tracing::error!(
                    post_id = %post.id,
                    external_post_id = %published.post_id,
                    "Post publicado, mas o status não foi gravado: {}",
                    e
                );
                run.failed.push(JobError::new(
                    post.id,
                    format!(
                        "Published as {} but the status update failed: {}",
                        published.post_id, e
                    ),
                ));
            }
        },
        PublishOutcome::Failed(message) => {
            store.mark_failed(post.id, PostStatus::Processing, &message).await?;
            tracing::warn!(post_id = %post.id, "Falha ao publicar post: {}", message);
            run.failed.push(JobError::new(post.id, message));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct SocialService {
    repo: SocialRepository,
    client_repo: ClientRepository,
    publisher: Arc<dyn SocialPublisher>,
    pool: PgPool,
}

impl SocialService {
    pub fn new(
        repo: SocialRepository,
        client_repo: ClientRepository,
        publisher: Arc<dyn SocialPublisher>,
        pool: PgPool,
    ) -> Self {
        Self { repo, client_repo, publisher, pool }
    }

    // =========================================================================
    //  PÁGINAS
    // =========================================================================

    async fn load_page(&self, scope: &AccessScope, id: Uuid) -> Result<SocialPage, AppError> {
        let page = self
            .repo
            .find_page(&self.pool, id)
            .await?
            .ok_or(AppError::NotFound("entity.page"))?;
        scope.ensure_client(page.client_id, "entity.page")?;
        Ok(page)
    }

    pub async fn list_pages(&self, scope: &AccessScope) -> Result<Vec<SocialPage>, AppError> {
        self.repo.list_pages(scope.client_filter()).await
    }

    /// Conecta a página ao cliente. O perfil é buscado em seguida, mas uma
    /// falha nessa busca não desfaz a conexão.
    pub async fn connect_page(&self, scope: &AccessScope, input: ConnectPageInput) -> Result<SocialPage, AppError> {
        scope.ensure_client(input.client_id, "entity.client")?;
        let external_page_id = input.external_page_id.trim();
        let access_token = input.access_token.trim();
        if external_page_id.is_empty() || access_token.is_empty() {
            return Err(AppError::InvalidInput("required"));
        }

        let mut tx = self.pool.begin().await?;
        self.client_repo
            .find_by_id(&mut *tx, input.client_id)
            .await?
            .ok_or(AppError::NotFound("entity.client"))?;
        let page = self
            .repo
            .upsert_page(&mut *tx, input.client_id, external_page_id, input.name.as_deref(), access_token)
            .await?
            .ok_or(AppError::InvariantViolation("page_connected_elsewhere"))?;
        tx.commit().await?;

        tracing::info!(page_id = %page.id, client_id = %page.client_id, "Página conectada");

        match self.sync_profile(&page).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                tracing::warn!(page_id = %page.id, "Não foi possível buscar o perfil da página: {}", e);
                Ok(page)
            }
        }
    }

    async fn sync_profile(&self, page: &SocialPage) -> Result<SocialPage, AppError> {
        let credential = page_credential(page)?;
        let profile = self.publisher.fetch_profile(&page.external_page_id, &credential).await?;

        self.repo
            .update_page_profile(&self.pool, page.id, profile.name.as_deref(), profile.picture_url.as_deref())
            .await?
            .ok_or(AppError::NotFound("entity.page"))
    }

    pub async fn refresh_profile(&self, scope: &AccessScope, page_id: Uuid) -> Result<SocialPage, AppError> {
        let page = self.load_page(scope, page_id).await?;
        self.sync_profile(&page).await
    }

    pub async fn update_profile_image(
        &self,
        scope: &AccessScope,
        page_id: Uuid,
        image_url: &str,
    ) -> Result<SocialPage, AppError> {
        let image_url = check_image_url(image_url)?;
        let page = self.load_page(scope, page_id).await?;
        let credential = page_credential(&page)?;

        self.publisher
            .update_profile_image(&page.external_page_id, &credential, image_url)
            .await?;
        tracing::info!(page_id = %page.id, "Foto de perfil atualizada");

        // A URL final da foto vem da plataforma
        match self.sync_profile(&page).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                tracing::warn!(page_id = %page.id, "Perfil não sincronizado após troca de foto: {}", e);
                Ok(page)
            }
        }
    }

    pub async fn update_cover_image(
        &self,
        scope: &AccessScope,
        page_id: Uuid,
        image_url: &str,
    ) -> Result<SocialPage, AppError> {
        let image_url = check_image_url(image_url)?;
        let page = self.load_page(scope, page_id).await?;
        let credential = page_credential(&page)?;

        self.publisher
            .update_cover_image(&page.external_page_id, &credential, image_url)
            .await?;
        tracing::info!(page_id = %page.id, "Capa atualizada");
        Ok(page)
    }

    // =========================================================================
    //  POSTS
    // =========================================================================

    async fn load_post(&self, scope: &AccessScope, id: Uuid) -> Result<SocialPost, AppError> {
        let post = self
            .repo
            .find_post(&self.pool, id)
            .await?
            .ok_or(AppError::NotFound("entity.post"))?;
        scope.ensure_client(post.client_id, "entity.post")?;
        Ok(post)
    }

    pub async fn list_posts(
        &self,
        scope: &AccessScope,
        client_id: Option<Uuid>,
        status: Option<PostStatus>,
    ) -> Result<Vec<SocialPost>, AppError> {
        self.repo.list_posts(scope.client_filter(), client_id, status).await
    }

    pub async fn get_post(&self, scope: &AccessScope, id: Uuid) -> Result<SocialPost, AppError> {
        self.load_post(scope, id).await
    }

    pub async fn create_post(
        &self,
        scope: &AccessScope,
        created_by: Uuid,
        input: CreatePostInput,
        now: DateTime<Utc>,
    ) -> Result<SocialPost, AppError> {
        scope.ensure_client(input.client_id, "entity.client")?;
        let caption = validate_caption(&input.caption)?;
        check_schedule(input.scheduled_for, now)?;

        let page = self.load_page(scope, input.page_id).await?;
        if page.client_id != input.client_id {
            return Err(AppError::NotFound("entity.page"));
        }

        let post = self
            .repo
            .create_post(&self.pool, input.client_id, page.id, caption, input.scheduled_for, created_by)
            .await?;

        tracing::info!(post_id = %post.id, status = post.status.as_str(), "Post criado");
        Ok(post)
    }

    pub async fn update_caption(&self, scope: &AccessScope, id: Uuid, caption: &str) -> Result<SocialPost, AppError> {
        let caption = validate_caption(caption)?;
        let post = self.load_post(scope, id).await?;
        if !post.status.is_editable() {
            return Err(AppError::InvariantViolation("post_not_editable"));
        }

        self.repo
            .update_caption(&self.pool, id, caption)
            .await?
            .ok_or(AppError::InvariantViolation("post_not_editable"))
    }

    /// Agenda o post; `None` devolve para rascunho.
    pub async fn schedule(
        &self,
        scope: &AccessScope,
        id: Uuid,
        scheduled_for: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<SocialPost, AppError> {
        check_schedule(scheduled_for, now)?;
        let post = self.load_post(scope, id).await?;

        let target = if scheduled_for.is_some() { PostStatus::Scheduled } else { PostStatus::Draft };
        if post.status != target {
            post.status.ensure_transition(target)?;
        } else if !post.status.is_editable() {
            return Err(AppError::InvariantViolation("post_not_editable"));
        }

        self.repo
            .set_schedule(&self.pool, id, scheduled_for)
            .await?
            .ok_or(AppError::InvariantViolation("post_not_editable"))
    }

    pub async fn cancel(&self, scope: &AccessScope, id: Uuid) -> Result<SocialPost, AppError> {
        let post = self.load_post(scope, id).await?;
        post.status.ensure_transition(PostStatus::Cancelled)?;

        self.repo
            .cancel_post(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::InvalidTransition {
                from: post.status.as_str().to_string(),
                to: PostStatus::Cancelled.as_str().to_string(),
            })
    }

    // =========================================================================
    //  WORKER
    // =========================================================================

    pub async fn run_publisher(&self, now: DateTime<Utc>) -> Result<PublishRun, AppError> {
        publish_due_posts(self, self.publisher.as_ref(), now).await
    }
}

#[async_trait]
impl PublishStore for SocialService {
    async fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<DuePost>, AppError> {
        self.repo.due_posts(now).await
    }

    async fn claim_post(&self, id: Uuid) -> Result<bool, AppError> {
        self.repo.claim_post(&self.pool, id).await
    }

    async fn mark_published(&self, id: Uuid, published: &PublishedPost) -> Result<bool, AppError> {
        self.repo
            .mark_published(&self.pool, id, &published.post_id, published.permalink.as_deref())
            .await
    }

    async fn mark_failed(&self, id: Uuid, from: PostStatus, error: &str) -> Result<bool, AppError> {
        self.repo.mark_failed(&self.pool, id, from, error).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::meta::fakes::FakePublisher;
    use chrono::{Duration, TimeZone};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// Posts em memória com o status de cada um.
    #[derive(Default)]
    struct FakePublishStore {
        posts: Vec<DuePost>,
        status: Mutex<HashMap<Uuid, PostStatus>>,
        errors: Mutex<HashMap<Uuid, String>>,
        // Reivindicados por outra execução entre a leitura e o claim
        raced: HashSet<Uuid>,
        // Gravação de published falha no banco
        broken_writes: HashSet<Uuid>,
    }

    impl FakePublishStore {
        fn with(posts: Vec<DuePost>) -> Self {
            let status = posts.iter().map(|p| (p.id, PostStatus::Scheduled)).collect();
            Self { posts, status: Mutex::new(status), ..Default::default() }
        }

        fn status_of(&self, id: Uuid) -> PostStatus {
            self.status.lock().unwrap()[&id]
        }
    }

    #[async_trait]
    impl PublishStore for FakePublishStore {
        async fn due_posts(&self, _now: DateTime<Utc>) -> Result<Vec<DuePost>, AppError> {
            let status = self.status.lock().unwrap();
            Ok(self
                .posts
                .iter()
                .filter(|p| status[&p.id] == PostStatus::Scheduled)
                .cloned()
                .collect())
        }

        async fn claim_post(&self, id: Uuid) -> Result<bool, AppError> {
            let mut status = self.status.lock().unwrap();
            if self.raced.contains(&id) {
                status.insert(id, PostStatus::Processing);
                return Ok(false);
            }
            if status[&id] != PostStatus::Scheduled {
                return Ok(false);
            }
            status.insert(id, PostStatus::Processing);
            Ok(true)
        }

        async fn mark_published(&self, id: Uuid, _published: &PublishedPost) -> Result<bool, AppError> {
            if self.broken_writes.contains(&id) {
                return Err(AppError::InternalServerError(anyhow::anyhow!("connection reset")));
            }
            let mut status = self.status.lock().unwrap();
            if status[&id] != PostStatus::Processing {
                return Ok(false);
            }
            status.insert(id, PostStatus::Published);
            Ok(true)
        }

        async fn mark_failed(&self, id: Uuid, from: PostStatus, error: &str) -> Result<bool, AppError> {
            let mut status = self.status.lock().unwrap();
            if status[&id] != from {
                return Ok(false);
            }
            status.insert(id, PostStatus::Failed);
            self.errors.lock().unwrap().insert(id, error.to_string());
            Ok(true)
        }
    }

    fn due_post(external: Option<&str>, token: Option<&str>) -> DuePost {
        DuePost {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            caption: "Pão quentinho saindo agora!".into(),
            page_id: external.map(|_| Uuid::new_v4()),
            external_page_id: external.map(str::to_string),
            access_token: token.map(str::to_string),
        }
    }

    #[test]
    fn missing_page_or_token_is_a_described_failure() {
        let err = credential_for(&due_post(None, None)).unwrap_err();
        assert!(err.contains("No social page"));

        let err = credential_for(&due_post(Some("123"), Some(""))).unwrap_err();
        assert!(err.contains("access token"));

        let post = due_post(Some("123"), Some("tok"));
        let (page, _credential) = credential_for(&post).unwrap();
        assert_eq!(page, "123");
    }

    #[tokio::test]
    async fn publisher_success_carries_post_id_and_permalink() {
        let publisher = FakePublisher::default();
        let outcome = execute_publish(&publisher, "123", &PageCredential::new("tok"), "hello").await;

        match outcome {
            PublishOutcome::Published(post) => {
                assert_eq!(post.post_id, "123_1");
                assert!(post.permalink.is_some());
            }
            PublishOutcome::Failed(e) => panic!("unexpected failure: {}", e),
        }
    }

    #[tokio::test]
    async fn publisher_failure_keeps_a_non_empty_error() {
        let publisher = FakePublisher::failing_for("123", "(#200) Permissions error");
        let outcome = execute_publish(&publisher, "123", &PageCredential::new("tok"), "hello").await;

        match outcome {
            PublishOutcome::Failed(message) => assert!(message.contains("Permissions error")),
            PublishOutcome::Published(_) => panic!("should have failed"),
        }
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[test]
    fn schedule_must_be_in_the_future() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert!(check_schedule(None, now).is_ok());
        assert!(check_schedule(Some(now + Duration::minutes(5)), now).is_ok());
        assert!(matches!(
            check_schedule(Some(now), now),
            Err(AppError::InvalidInput("schedule_in_past"))
        ));
    }

    #[test]
    fn caption_and_image_url_validation() {
        assert!(matches!(validate_caption("  "), Err(AppError::InvalidInput("caption_required"))));
        assert_eq!(validate_caption("  oi ").unwrap(), "oi");
        assert!(check_image_url("https://cdn.test/a.png").is_ok());
        assert!(matches!(check_image_url("ftp://x"), Err(AppError::InvalidInput("invalid_url"))));
    }

    #[tokio::test]
    async fn each_post_ends_published_or_failed() {
        let good = due_post(Some("111"), Some("tok"));
        let rejected = due_post(Some("222"), Some("tok"));
        let orphan = due_post(None, None);
        let store = FakePublishStore::with(vec![good.clone(), rejected.clone(), orphan.clone()]);
        let publisher = FakePublisher::failing_for("222", "(#200) Permissions error");
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let run = publish_due_posts(&store, &publisher, now).await.unwrap();

        assert_eq!(run.attempted, 3);
        assert_eq!(run.published, vec![good.id]);
        assert_eq!(run.failed.len(), 2);
        assert_eq!(store.status_of(good.id), PostStatus::Published);
        assert_eq!(store.status_of(rejected.id), PostStatus::Failed);
        assert_eq!(store.status_of(orphan.id), PostStatus::Failed);
        assert!(store.errors.lock().unwrap()[&rejected.id].contains("Permissions error"));

        // Falhou fica falho: a próxima execução não tenta de novo
        let again = publish_due_posts(&store, &publisher, now).await.unwrap();
        assert_eq!(again.attempted, 0);
        assert_eq!(store.status_of(rejected.id), PostStatus::Failed);
    }

    #[tokio::test]
    async fn post_claimed_elsewhere_is_skipped_without_publishing() {
        let post = due_post(Some("111"), Some("tok"));
        let mut store = FakePublishStore::with(vec![post.clone()]);
        store.raced.insert(post.id);
        let publisher = FakePublisher::default();

        let run = publish_due_posts(&store, &publisher, Utc::now()).await.unwrap();

        assert_eq!(run.skipped, 1);
        assert!(run.published.is_empty());
        assert!(run.failed.is_empty());
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn lost_status_write_reports_the_external_post_id() {
        let post = due_post(Some("111"), Some("tok"));
        let mut store = FakePublishStore::with(vec![post.clone()]);
        store.broken_writes.insert(post.id);
        let publisher = FakePublisher::default();

        let run = publish_due_posts(&store, &publisher, Utc::now()).await.unwrap();

        assert!(run.published.is_empty());
        assert_eq!(run.failed.len(), 1);
        assert_eq!(run.failed[0].entity_id, post.id);
        assert!(run.failed[0].message.contains("111_1"));
        assert_eq!(store.status_of(post.id), PostStatus::Processing);
    }
}
