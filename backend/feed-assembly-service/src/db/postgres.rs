//! PostgreSQL-backed document store gateway.
//!
//! Collections map to tables `posts`, `users`, `comments`, `votes_log` and
//! `view_log` (see `schema/document_store.sql`). Image list columns are
//! nullable arrays; normalization happens in the materializer.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::{DocumentStore, PostQuery, PostSort};
use crate::error::StoreError;
use crate::models::{InteractionEvent, InteractionKind, PostDocument, UserDocument};

const POST_COLUMNS: &str = "p.id, p.openid, p.title, p.content, p.image_url, p.image_urls, \
     p.original_image_url, p.original_image_urls, p.created_at, p.votes, p.tags, \
     p.is_poem, p.is_original, p.poem_bg_image";

pub struct PgDocumentStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    async fn timed<F, T>(&self, op: &str, future: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match resilience::with_timeout(self.query_timeout, future).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(e) => Err(StoreError::Timeout(format!("{}: {}", op, e))),
        }
    }
}

fn post_from_row(row: &PgRow) -> Result<PostDocument, sqlx::Error> {
    Ok(PostDocument {
        id: row.try_get("id")?,
        openid: row.try_get("openid")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        image_url: row.try_get("image_url")?,
        image_urls: row
            .try_get::<Option<Vec<String>>, _>("image_urls")?
            .unwrap_or_default(),
        original_image_url: row.try_get("original_image_url")?,
        original_image_urls: row
            .try_get::<Option<Vec<String>>, _>("original_image_urls")?
            .unwrap_or_default(),
        create_time: row.try_get("created_at")?,
        votes: row.try_get::<Option<i64>, _>("votes")?.unwrap_or(0),
        tags: row
            .try_get::<Option<Vec<String>>, _>("tags")?
            .unwrap_or_default(),
        is_poem: row.try_get::<Option<bool>, _>("is_poem")?.unwrap_or(false),
        is_original: row
            .try_get::<Option<bool>, _>("is_original")?
            .unwrap_or(false),
        poem_bg_image: row.try_get("poem_bg_image")?,
    })
}

/// Escape LIKE metacharacters so the keyword matches literally
fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Build the `posts` query for a filter/sort/skip/limit request
fn build_post_query(query: &PostQuery) -> QueryBuilder<'_, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM posts p WHERE TRUE", POST_COLUMNS));
    let filter = &query.filter;

    if let Some(is_original) = filter.is_original {
        qb.push(" AND p.is_original = ").push_bind(is_original);
    }
    if let Some(is_poem) = filter.is_poem {
        qb.push(" AND p.is_poem = ").push_bind(is_poem);
    }
    if !filter.exclude_ids.is_empty() {
        qb.push(" AND NOT (p.id = ANY(")
            .push_bind(filter.exclude_ids.clone())
            .push("))");
    }
    if let Some(affinity) = &filter.affinity {
        qb.push(" AND (p.openid = ANY(")
            .push_bind(affinity.authors.clone())
            .push(") OR p.tags && ")
            .push_bind(affinity.tags.clone())
            .push(")");
    }
    if let Some(keyword) = &filter.keyword {
        let pattern = like_pattern(keyword);
        qb.push(" AND (p.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.content ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM unnest(p.tags) AS t(tag) WHERE t.tag ILIKE ")
            .push_bind(pattern)
            .push("))");
    }

    match query.sort {
        PostSort::Newest => {
            qb.push(" ORDER BY p.created_at DESC");
        }
        PostSort::Engagement {
            like_weight,
            comment_weight,
        } => {
            qb.push(" ORDER BY (")
                .push_bind(like_weight)
                .push(" * COALESCE(p.votes, 0) + ")
                .push_bind(comment_weight)
                .push(" * (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id)) DESC, p.created_at DESC");
        }
    }

    qb.push(" OFFSET ")
        .push_bind(query.skip as i64)
        .push(" LIMIT ")
        .push_bind(query.limit as i64);
    qb
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find_posts(&self, query: &PostQuery) -> Result<Vec<PostDocument>, StoreError> {
        let mut qb = build_post_query(query);
        debug!(sql = qb.sql(), "find_posts");

        let rows = self
            .timed("find_posts", qb.build().fetch_all(&self.pool))
            .await?;
        rows.iter()
            .map(post_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    async fn find_posts_by_ids(
        &self,
        ids: &[String],
        limit: usize,
    ) -> Result<Vec<PostDocument>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM posts p WHERE p.id = ANY($1) LIMIT $2",
            POST_COLUMNS
        );
        let rows = self
            .timed(
                "find_posts_by_ids",
                sqlx::query(&sql)
                    .bind(ids)
                    .bind(limit as i64)
                    .fetch_all(&self.pool),
            )
            .await?;
        rows.iter()
            .map(post_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    async fn find_users(&self, openids: &[String]) -> Result<Vec<UserDocument>, StoreError> {
        if openids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .timed(
                "find_users",
                sqlx::query("SELECT openid, nick_name, avatar_url FROM users WHERE openid = ANY($1)")
                    .bind(openids)
                    .fetch_all(&self.pool),
            )
            .await?;

        rows.iter()
            .map(|row| {
                Ok(UserDocument {
                    openid: row.try_get("openid")?,
                    nick_name: row.try_get("nick_name")?,
                    avatar_url: row.try_get("avatar_url")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::from)
    }

    async fn count_comments(
        &self,
        post_ids: &[String],
    ) -> Result<HashMap<String, u64>, StoreError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = self
            .timed(
                "count_comments",
                sqlx::query(
                    r#"
                    SELECT post_id, COUNT(*) AS count
                    FROM comments
                    WHERE post_id = ANY($1)
                    GROUP BY post_id
                    "#,
                )
                .bind(post_ids)
                .fetch_all(&self.pool),
            )
            .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let post_id: String = row.try_get("post_id")?;
            let count: i64 = row.try_get("count")?;
            counts.insert(post_id, count.max(0) as u64);
        }
        Ok(counts)
    }

    async fn find_voted_posts(
        &self,
        viewer_id: &str,
        post_ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = self
            .timed(
                "find_voted_posts",
                sqlx::query(
                    r#"
                    SELECT DISTINCT post_id
                    FROM votes_log
                    WHERE openid = $1 AND target_type = 'post' AND post_id = ANY($2)
                    "#,
                )
                .bind(viewer_id)
                .bind(post_ids)
                .fetch_all(&self.pool),
            )
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("post_id"))
            .collect::<Result<HashSet<_>, _>>()
            .map_err(StoreError::from)
    }

    async fn recent_interactions(
        &self,
        viewer_id: &str,
        kind: InteractionKind,
        limit: usize,
    ) -> Result<Vec<InteractionEvent>, StoreError> {
        let sql = match kind {
            InteractionKind::Vote => {
                r#"
                SELECT openid, post_id, created_at
                FROM votes_log
                WHERE openid = $1 AND target_type = 'post'
                ORDER BY created_at DESC
                LIMIT $2
                "#
            }
            InteractionKind::View => {
                r#"
                SELECT openid, post_id, created_at
                FROM view_log
                WHERE openid = $1
                ORDER BY created_at DESC
                LIMIT $2
                "#
            }
        };

        let rows = self
            .timed(
                "recent_interactions",
                sqlx::query(sql)
                    .bind(viewer_id)
                    .bind(limit as i64)
                    .fetch_all(&self.pool),
            )
            .await?;

        rows.iter()
            .map(|row| {
                Ok(InteractionEvent {
                    kind,
                    openid: row.try_get("openid")?,
                    post_id: row.try_get("post_id")?,
                    create_time: row.try_get("created_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::from)
    }
}
