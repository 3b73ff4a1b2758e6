//! Posts, stored in each tenant's own store

use chrono::{DateTime, Utc};
use inscribe_core::{Error, Result};
use inscribe_log::debug;
use inscribe_tenancy::{Statement, StorageError, StorageGateway, params};
use serde::{Deserialize, Serialize};

const POST_COLUMNS: &str = "id, title, slug, content, excerpt, status, seo_title, \
     seo_description, author, created_at, updated_at, published_at";

const MAX_SLUG_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
    Archived,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }
}

/// A stored post. Read from snake_case rows, rendered camelCase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub status: PostStatus,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Fields of a new post
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub seo_title: Option<String>,
    #[serde(default)]
    pub seo_description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

/// Partial update; absent fields are left alone. Status is changed through
/// publish/unpublish only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub author: Option<String>,
}

/// URL slug from a title
///
/// ```
/// assert_eq!(inscribe::posts::slugify("Hello, World! 2024"), "hello-world-2024");
/// assert_eq!(inscribe::posts::slugify("  --Rust--  "), "rust");
/// ```
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    slug.chars().take(MAX_SLUG_LEN).collect::<String>().trim_end_matches('-').to_string()
}

fn validate_slug(slug: &str) -> Result<()> {
    let valid = !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "slug '{}' must be lowercase letters, digits and '-'",
            slug
        )))
    }
}

impl PostInput {
    /// Trimmed title and the slug to store
    fn normalized(&self) -> Result<(String, String)> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::Validation("title is required".to_string()));
        }
        let slug = match self.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_ascii_lowercase(),
            _ => slugify(&title),
        };
        validate_slug(&slug)?;
        Ok((title, slug))
    }

    fn insert_statement(&self, now: &str) -> Result<Statement> {
        let (title, slug) = self.normalized()?;
        let status = self.status.unwrap_or(PostStatus::Draft);
        let published_at = (status == PostStatus::Published).then_some(now);

        Ok(Statement::new(
            "INSERT INTO posts (title, slug, content, excerpt, status, seo_title, seo_description, \
             author, created_at, updated_at, published_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                title,
                slug,
                &self.content,
                self.excerpt.clone(),
                status.as_str(),
                self.seo_title.clone(),
                self.seo_description.clone(),
                self.author.clone(),
                now,
                now,
                published_at
            ],
        ))
    }
}

fn decode(record: inscribe_tenancy::Record) -> Result<Post> {
    serde_json::from_value(serde_json::Value::Object(record))
        .map_err(|e| Error::Internal(format!("corrupt post row: {}", e)))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Posts of one tenant, newest first
pub async fn list(storage: &StorageGateway, tenant: &str, published_only: bool) -> Result<Vec<Post>> {
    let sql = if published_only {
        format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE status = 'published' \
             ORDER BY published_at DESC, id DESC"
        )
    } else {
        format!("SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC")
    };
    let records = storage.query(Some(tenant), &sql, &[]).await?;
    records.into_iter().map(decode).collect()
}

pub async fn find(
    storage: &StorageGateway,
    tenant: &str,
    slug: &str,
    published_only: bool,
) -> Result<Option<Post>> {
    let filter = if published_only {
        " AND status = 'published'"
    } else {
        ""
    };
    let record = storage
        .query_one(
            Some(tenant),
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = ?{filter}"),
            &params![slug],
        )
        .await?;
    record.map(decode).transpose()
}

async fn find_by_id(storage: &StorageGateway, tenant: &str, id: i64) -> Result<Post> {
    let record = storage
        .query_one(
            Some(tenant),
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"),
            &params![id],
        )
        .await?;
    record
        .map(decode)
        .transpose()?
        .ok_or_else(|| Error::NotFound(format!("post {}", id)))
}

fn slug_conflict(slug: &str) -> impl FnOnce(StorageError) -> Error + '_ {
    move |err| {
        if err.is_constraint() {
            Error::Conflict(format!("a post with slug '{}' already exists", slug))
        } else {
            err.into()
        }
    }
}

pub async fn create(storage: &StorageGateway, tenant: &str, input: &PostInput) -> Result<Post> {
    let statement = input.insert_statement(&now())?;
    let (_, slug) = input.normalized()?;

    let result = storage
        .run(Some(tenant), &statement.sql, &statement.params)
        .await
        .map_err(slug_conflict(&slug))?;

    debug!(tenant, slug = %slug, "Post created");
    find_by_id(storage, tenant, result.last_insert_id).await
}

pub async fn update(
    storage: &StorageGateway,
    tenant: &str,
    slug: &str,
    patch: &PostPatch,
) -> Result<Option<Post>> {
    let Some(existing) = find(storage, tenant, slug, false).await? else {
        return Ok(None);
    };

    let title = match &patch.title {
        Some(t) if t.trim().is_empty() => {
            return Err(Error::Validation("title is required".to_string()));
        }
        Some(t) => t.trim().to_string(),
        None => existing.title,
    };
    let new_slug = match &patch.slug {
        Some(s) => {
            let s = s.trim().to_ascii_lowercase();
            validate_slug(&s)?;
            s
        }
        None => existing.slug,
    };

    storage
        .run(
            Some(tenant),
            "UPDATE posts SET title = ?, slug = ?, content = ?, excerpt = ?, seo_title = ?, \
             seo_description = ?, author = ?, updated_at = ? WHERE id = ?",
            &params![
                title,
                &new_slug,
                patch.content.clone().unwrap_or(existing.content),
                patch.excerpt.clone().or(existing.excerpt),
                patch.seo_title.clone().or(existing.seo_title),
                patch.seo_description.clone().or(existing.seo_description),
                patch.author.clone().or(existing.author),
                now(),
                existing.id
            ],
        )
        .await
        .map_err(slug_conflict(&new_slug))?;

    find_by_id(storage, tenant, existing.id).await.map(Some)
}

pub async fn delete(storage: &StorageGateway, tenant: &str, slug: &str) -> Result<bool> {
    let result = storage
        .run(Some(tenant), "DELETE FROM posts WHERE slug = ?", &params![slug])
        .await?;
    Ok(result.rows_affected > 0)
}

/// Publish or unpublish without touching the content
pub async fn set_status(
    storage: &StorageGateway,
    tenant: &str,
    slug: &str,
    status: PostStatus,
) -> Result<Option<Post>> {
    let now = now();
    let sql = match status {
        PostStatus::Published => {
            "UPDATE posts SET status = ?, published_at = COALESCE(published_at, ?), updated_at = ? WHERE slug = ?"
        }
        PostStatus::Draft | PostStatus::Archived => {
            "UPDATE posts SET status = ?, published_at = NULL, updated_at = ? WHERE slug = ?"
        }
    };
    let params = match status {
        PostStatus::Published => params![status.as_str(), &now, &now, slug],
        _ => params![status.as_str(), &now, slug],
    };

    let result = storage.run(Some(tenant), sql, &params).await?;
    if result.rows_affected == 0 {
        return Ok(None);
    }
    find(storage, tenant, slug, false).await
}

/// Insert every post or none. Inputs are validated before anything is
/// written; a storage failure rolls the whole batch back.
pub async fn import(storage: &StorageGateway, tenant: &str, inputs: &[PostInput]) -> Result<usize> {
    let now = now();
    let statements = inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            input.insert_statement(&now).map_err(|e| match e {
                Error::Validation(msg) => Error::Validation(format!("record {}: {}", i + 1, msg)),
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    storage
        .transaction(Some(tenant), &statements)
        .await
        .map_err(|err| {
            if let StorageError::Statement { index, source } = &err {
                if source.is_constraint() {
                    return Error::Conflict(format!(
                        "import rolled back, record {} of {}: {}",
                        index + 1,
                        statements.len(),
                        source
                    ));
                }
            }
            err.into()
        })?;

    Ok(statements.len())
}
