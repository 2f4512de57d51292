// src/db/social_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::social::{DuePost, PostStatus, SocialPage, SocialPost, PLATFORM_FACEBOOK},
};

const PAGE_COLUMNS: &str = "id, client_id, platform, external_page_id, name, picture_url, \
    access_token, connected_at, updated_at";

const POST_COLUMNS: &str = "id, client_id, page_id, caption, scheduled_for, status, \
    external_post_id, permalink, last_error, published_at, created_by, created_at, updated_at";

#[derive(Clone)]
pub struct SocialRepository {
    pool: PgPool,
}

impl SocialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  PÁGINAS
    // =========================================================================

    /// Conecta (ou reconecta) a página. `None` = a página pertence a outro cliente.
    pub async fn upsert_page<'e, E>(
        &self,
        executor: E,
        client_id: Uuid,
        external_page_id: &str,
        name: Option<&str>,
        access_token: &str,
    ) -> Result<Option<SocialPage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO social_pages (client_id, platform, external_page_id, name, access_token)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (platform, external_page_id) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                name = COALESCE(EXCLUDED.name, social_pages.name),
                updated_at = NOW()
            WHERE social_pages.client_id = EXCLUDED.client_id
            RETURNING {}
            "#,
            PAGE_COLUMNS
        );

        let page = sqlx::query_as::<_, SocialPage>(&sql)
            .bind(client_id)
            .bind(PLATFORM_FACEBOOK)
            .bind(external_page_id)
            .bind(name)
            .bind(access_token)
            .fetch_optional(executor)
            .await?;

        Ok(page)
    }

    pub async fn list_pages(&self, client_filter: Option<Vec<Uuid>>) -> Result<Vec<SocialPage>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM social_pages
            WHERE ($1::uuid[] IS NULL OR client_id = ANY($1))
            ORDER BY name ASC NULLS LAST
            "#,
            PAGE_COLUMNS
        );

        let pages = sqlx::query_as::<_, SocialPage>(&sql)
            .bind(client_filter)
            .fetch_all(&self.pool)
            .await?;

        Ok(pages)
    }

    pub async fn find_page<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<SocialPage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM social_pages WHERE id = $1", PAGE_COLUMNS);

        let page = sqlx::query_as::<_, SocialPage>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(page)
    }

    pub async fn find_page_by_external_id<'e, E>(
        &self,
        executor: E,
        external_page_id: &str,
    ) -> Result<Option<SocialPage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {} FROM social_pages WHERE platform = $1 AND external_page_id = $2",
            PAGE_COLUMNS
        );

        let page = sqlx::query_as::<_, SocialPage>(&sql)
            .bind(PLATFORM_FACEBOOK)
            .bind(external_page_id)
            .fetch_optional(executor)
            .await?;

        Ok(page)
    }

    pub async fn update_page_profile<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        name: Option<&str>,
        picture_url: Option<&str>,
    ) -> Result<Option<SocialPage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE social_pages
            SET name = COALESCE($2, name), picture_url = COALESCE($3, picture_url), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PAGE_COLUMNS
        );

        let page = sqlx::query_as::<_, SocialPage>(&sql)
            .bind(id)
            .bind(name)
            .bind(picture_url)
            .fetch_optional(executor)
            .await?;

        Ok(page)
    }

    // =========================================================================
    //  POSTS
    // =========================================================================

    pub async fn create_post<'e, E>(
        &self,
        executor: E,
        client_id: Uuid,
        page_id: Uuid,
        caption: &str,
        scheduled_for: Option<DateTime<Utc>>,
        created_by: Uuid,
    ) -> Result<SocialPost, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO social_posts (client_id, page_id, caption, scheduled_for, status, created_by)
            VALUES (
                $1, $2, $3, $4,
                CASE WHEN $4::timestamptz IS NULL THEN 'draft'::post_status ELSE 'scheduled'::post_status END,
                $5
            )
            RETURNING {}
            "#,
            POST_COLUMNS
        );

        let post = sqlx::query_as::<_, SocialPost>(&sql)
            .bind(client_id)
            .bind(page_id)
            .bind(caption)
            .bind(scheduled_for)
            .bind(created_by)
            .fetch_one(executor)
            .await?;

        Ok(post)
    }

    pub async fn list_posts(
        &self,
        client_filter: Option<Vec<Uuid>>,
        client_id: Option<Uuid>,
        status: Option<PostStatus>,
    ) -> Result<Vec<SocialPost>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM social_posts
            WHERE ($1::uuid[] IS NULL OR client_id = ANY($1))
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::post_status IS NULL OR status = $3)
            ORDER BY scheduled_for DESC NULLS FIRST, created_at DESC
            "#,
            POST_COLUMNS
        );

        let posts = sqlx::query_as::<_, SocialPost>(&sql)
            .bind(client_filter)
            .bind(client_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    pub async fn find_post<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<SocialPost>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM social_posts WHERE id = $1", POST_COLUMNS);

        let post = sqlx::query_as::<_, SocialPost>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(post)
    }

    // --- Edição: só antes da reivindicação pelo worker ---

    pub async fn update_caption<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        caption: &str,
    ) -> Result<Option<SocialPost>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE social_posts SET caption = $2, updated_at = NOW()
            WHERE id = $1 AND status IN ('draft', 'scheduled')
            RETURNING {}
            "#,
            POST_COLUMNS
        );

        let post = sqlx::query_as::<_, SocialPost>(&sql)
            .bind(id)
            .bind(caption)
            .fetch_optional(executor)
            .await?;

        Ok(post)
    }

    // Agenda (ou volta a rascunho com `None`)
    pub async fn set_schedule<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<Option<SocialPost>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE social_posts SET
                scheduled_for = $2,
                status = CASE WHEN $2::timestamptz IS NULL THEN 'draft'::post_status ELSE 'scheduled'::post_status END,
                last_error = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status IN ('draft', 'scheduled')
            RETURNING {}
            "#,
            POST_COLUMNS
        );

        let post = sqlx::query_as::<_, SocialPost>(&sql)
            .bind(id)
            .bind(scheduled_for)
            .fetch_optional(executor)
            .await?;

        Ok(post)
    }

    pub async fn cancel_post<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<SocialPost>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE social_posts SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status IN ('draft', 'scheduled')
            RETURNING {}
            "#,
            POST_COLUMNS
        );

        let post = sqlx::query_as::<_, SocialPost>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(post)
    }

    // =========================================================================
    //  WORKER DE PUBLICAÇÃO
    // =========================================================================

    /// Posts agendados e vencidos, com a página (se houver) da plataforma suportada.
    pub async fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<DuePost>, AppError> {
        let posts = sqlx::query_as::<_, DuePost>(
            r#"
            SELECT p.id, p.client_id, p.caption, p.page_id, pg.external_page_id, pg.access_token
            FROM social_posts p
            LEFT JOIN social_pages pg ON pg.id = p.page_id
            WHERE p.status = 'scheduled'
              AND p.scheduled_for <= $1
              AND (pg.id IS NULL OR pg.platform = $2)
            ORDER BY p.scheduled_for ASC
            "#,
        )
        .bind(now)
        .bind(PLATFORM_FACEBOOK)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// Reivindica o post (scheduled -> processing) antes da chamada externa.
    /// `false` = outra execução chegou antes.
    pub async fn claim_post<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE social_posts SET status = 'processing', updated_at = NOW()
            WHERE id = $1 AND status = 'scheduled'
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_published<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        external_post_id: &str,
        permalink: Option<&str>,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE social_posts SET
                status = 'published', published_at = NOW(),
                external_post_id = $2, permalink = $3, last_error = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(external_post_id)
        .bind(permalink)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // `from` = status esperado (scheduled quando falta página/token, processing após a chamada)
    pub async fn mark_failed<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        from: PostStatus,
        error: &str,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE social_posts SET status = 'failed', last_error = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(error)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
