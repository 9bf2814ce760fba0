//! Post catalog
//!
//! Posts are written from a template for a profile. Both references are
//! checked on the same transaction that writes the post.

use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::profiles::profile_is_live;
use super::publication::PublicationStatusAggregator;
use super::templates::template_is_live;
use super::validation;
use crate::db::now;
use crate::error::SynkError;
use crate::types::{NewPost, PostId, PostView, ProfileId, TemplateId, TenantId};
use crate::{Database, Result};

#[derive(Debug, Clone)]
pub struct PostCatalog {
    db: Arc<Database>,
    publication: PublicationStatusAggregator,
}

struct PostFields {
    name: String,
    content: String,
    template_id: TemplateId,
    profile_id: ProfileId,
}

impl PostFields {
    fn validate(input: &NewPost) -> Result<Self> {
        Ok(Self {
            name: validation::required("name", &input.name)?,
            content: validation::content("content", &input.content)?,
            template_id: input.template_id,
            profile_id: input.profile_id,
        })
    }

    /// Template first, then profile; the error names the first one missing
    async fn check_references(&self, conn: &mut SqliteConnection, tenant: TenantId) -> Result<()> {
        if !template_is_live(&mut *conn, tenant, self.template_id).await? {
            return Err(SynkError::validation(format!(
                "template with id {} not found",
                self.template_id
            )));
        }
        if !profile_is_live(conn, tenant, self.profile_id).await? {
            return Err(SynkError::validation(format!(
                "profile with id {} not found",
                self.profile_id
            )));
        }
        Ok(())
    }
}

/// A listed post before its status is attached
struct PostRow {
    id: PostId,
    name: String,
    content: String,
    template_id: TemplateId,
    template_name: String,
    profile_id: ProfileId,
    profile_name: String,
    created_at: i64,
    updated_at: Option<i64>,
}

fn post_from_row(row: &SqliteRow) -> std::result::Result<PostRow, sqlx::Error> {
    Ok(PostRow {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        content: row.try_get("content")?,
        template_id: row.try_get("template_id")?,
        template_name: row.try_get("template_name")?,
        profile_id: row.try_get("profile_id")?,
        profile_name: row.try_get("profile_name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl PostCatalog {
    pub fn new(db: Arc<Database>, publication: PublicationStatusAggregator) -> Self {
        Self { db, publication }
    }

    pub async fn add(&self, tenant: TenantId, input: NewPost) -> Result<PostId> {
        let fields = PostFields::validate(&input)?;
        let db = &self.db;

        db.run("posts.add", async {
            let mut tx = db.pool().begin().await?;

            let result = sqlx::query(
                r#"
                INSERT INTO post (name, content, template_id, profile_id, user_id, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&fields.name)
            .bind(&fields.content)
            .bind(fields.template_id)
            .bind(fields.profile_id)
            .bind(tenant)
            .bind(now())
            .execute(&mut *tx)
            .await?;
            let id = PostId(result.last_insert_rowid());

            fields.check_references(&mut tx, tenant).await?;
            tx.commit().await?;

            tracing::info!(
                "Created post {} for tenant {} (template {}, profile {})",
                id,
                tenant,
                fields.template_id,
                fields.profile_id
            );
            Ok(id)
        })
        .await
    }

    pub async fn update(&self, tenant: TenantId, id: PostId, input: NewPost) -> Result<u64> {
        let fields = PostFields::validate(&input)?;
        let db = &self.db;

        db.run("posts.update", async {
            let mut tx = db.pool().begin().await?;

            let result = sqlx::query(
                r#"
                UPDATE post
                SET name = ?, content = ?, template_id = ?, profile_id = ?, updated_at = ?
                WHERE id = ? AND user_id = ? AND deleted_at IS NULL
                "#,
            )
            .bind(&fields.name)
            .bind(&fields.content)
            .bind(fields.template_id)
            .bind(fields.profile_id)
            .bind(now())
            .bind(id)
            .bind(tenant)
            .execute(&mut *tx)
            .await?;

            fields.check_references(&mut tx, tenant).await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                tracing::debug!("Post {} not found for tenant {}", id, tenant);
                return Ok(0);
            }
            tx.commit().await?;

            tracing::info!("Updated post {} for tenant {}", id, tenant);
            Ok(result.rows_affected())
        })
        .await
    }

    /// Soft delete. Publication attempts of the post are left as recorded.
    pub async fn delete(&self, tenant: TenantId, id: PostId) -> Result<u64> {
        let db = &self.db;
        db.run("posts.delete", async {
            let result = sqlx::query(
                r#"
                UPDATE post
                SET deleted_at = ?
                WHERE id = ? AND user_id = ? AND deleted_at IS NULL
                "#,
            )
            .bind(now())
            .bind(id)
            .bind(tenant)
            .execute(db.pool())
            .await?;

            tracing::info!(
                "Deleted post {} for tenant {} ({} rows)",
                id,
                tenant,
                result.rows_affected()
            );
            Ok(result.rows_affected())
        })
        .await
    }

    pub async fn by_id(&self, tenant: TenantId, id: PostId) -> Result<Option<PostId>> {
        let db = &self.db;
        db.run("posts.by_id", async {
            let found = sqlx::query(
                "SELECT 1 FROM post WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
            )
            .bind(id)
            .bind(tenant)
            .fetch_optional(db.pool())
            .await?;
            Ok(found.map(|_| id))
        })
        .await
    }

    /// Live posts of `tenant`, newest first, each with its aggregate status
    ///
    /// Template and profile names come back empty when the referenced row is
    /// deleted or belongs to someone else. Content is empty unless
    /// `include_content` is set.
    pub async fn list(
        &self,
        tenant: TenantId,
        id: Option<PostId>,
        include_content: bool,
    ) -> Result<Vec<PostView>> {
        let db = &self.db;
        let rows = db
            .run("posts.list", async {
                let content_column = if include_content {
                    "p.content"
                } else {
                    "''"
                };
                let mut sql = format!(
                    "SELECT p.id, p.name, {content_column} AS content, \
                     p.template_id, COALESCE(t.name, '') AS template_name, \
                     p.profile_id, COALESCE(pr.name, '') AS profile_name, \
                     p.created_at, p.updated_at \
                     FROM post p \
                     LEFT JOIN template t \
                       ON t.id = p.template_id AND t.user_id = p.user_id AND t.deleted_at IS NULL \
                     LEFT JOIN profile pr \
                       ON pr.id = p.profile_id AND pr.user_id = p.user_id AND pr.deleted_at IS NULL \
                     WHERE p.user_id = ? AND p.deleted_at IS NULL"
                );
                if id.is_some() {
                    sql.push_str(" AND p.id = ?");
                }
                sql.push_str(" ORDER BY p.created_at DESC, p.id DESC");

                let mut query = sqlx::query(&sql).bind(tenant);
                if let Some(id) = id {
                    query = query.bind(id);
                }

                let rows = query.fetch_all(db.pool()).await?;
                Ok(rows
                    .iter()
                    .map(post_from_row)
                    .collect::<std::result::Result<Vec<_>, _>>()?)
            })
            .await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            let status = self.publication.status_of(row.id).await?;
            posts.push(PostView {
                id: row.id,
                name: row.name,
                content: row.content,
                template_id: row.template_id,
                template_name: row.template_name,
                profile_id: row.profile_id,
                profile_name: row.profile_name,
                created_at: row.created_at,
                updated_at: row.updated_at,
                status,
            });
        }

        tracing::debug!("Listed {} posts for tenant {}", posts.len(), tenant);
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::profiles::ProfileLinkReconciler;
    use crate::service::templates::TemplateStore;
    use crate::service::CredentialRegistry;
    use crate::types::{ColorId, NewProfile, NewTemplate, PublicationStatus};

    const TENANT: TenantId = TenantId(7);
    const OTHER: TenantId = TenantId(8);

    struct Fixture {
        db: Arc<Database>,
        templates: TemplateStore,
        profiles: ProfileLinkReconciler,
        posts: PostCatalog,
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let credentials = CredentialRegistry::new(db.clone());
        Fixture {
            templates: TemplateStore::new(db.clone()),
            profiles: ProfileLinkReconciler::new(db.clone(), credentials),
            posts: PostCatalog::new(db.clone(), PublicationStatusAggregator::new(db.clone())),
            db,
        }
    }

    async fn refs(fx: &Fixture, tenant: TenantId) -> (TemplateId, ProfileId) {
        let template = fx
            .templates
            .add(tenant, NewTemplate::new("Weekly", "body"))
            .await
            .unwrap();
        let profile = fx
            .profiles
            .add(tenant, NewProfile::new("Launch", ColorId(1), []))
            .await
            .unwrap();
        (template, profile)
    }

    async fn post_rows(fx: &Fixture) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM post")
            .fetch_one(fx.db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let fx = fixture().await;
        let (template, profile) = refs(&fx, TENANT).await;

        let id = fx
            .posts
            .add(TENANT, NewPost::new(" Spring ", " Hello ", template, profile))
            .await
            .unwrap();

        let listed = fx.posts.list(TENANT, Some(id), true).await.unwrap();
        assert_eq!(listed.len(), 1);
        let post = &listed[0];
        assert_eq!(post.name, "Spring");
        assert_eq!(post.content, "Hello");
        assert_eq!(post.template_name, "Weekly");
        assert_eq!(post.profile_name, "Launch");
        assert_eq!(post.status, PublicationStatus::Published);

        let without_content = fx.posts.list(TENANT, Some(id), false).await.unwrap();
        assert_eq!(without_content[0].content, "");
    }

    #[tokio::test]
    async fn test_add_names_missing_template_first() {
        let fx = fixture().await;
        let err = fx
            .posts
            .add(
                TENANT,
                NewPost::new("Spring", "Hello", TemplateId(9), ProfileId(10)),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: template with id 9 not found"
        );
        assert_eq!(post_rows(&fx).await, 0);
    }

    #[tokio::test]
    async fn test_add_rejects_missing_profile() {
        let fx = fixture().await;
        let (template, _) = refs(&fx, TENANT).await;

        let err = fx
            .posts
            .add(TENANT, NewPost::new("Spring", "Hello", template, ProfileId(77)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("profile with id 77 not found"));
        assert_eq!(post_rows(&fx).await, 0);
    }

    #[tokio::test]
    async fn test_add_rejects_foreign_references() {
        let fx = fixture().await;
        let (template, profile) = refs(&fx, OTHER).await;

        let result = fx
            .posts
            .add(TENANT, NewPost::new("Spring", "Hello", template, profile))
            .await;
        assert!(matches!(result, Err(SynkError::Validation(_))));
        assert_eq!(post_rows(&fx).await, 0);
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let fx = fixture().await;
        let (template, profile) = refs(&fx, TENANT).await;

        let first = fx
            .posts
            .add(TENANT, NewPost::new("First", "a", template, profile))
            .await
            .unwrap();
        let second = fx
            .posts
            .add(TENANT, NewPost::new("Second", "b", template, profile))
            .await
            .unwrap();

        let ids: Vec<PostId> = fx
            .posts
            .list(TENANT, None, false)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn test_deleted_reference_lists_with_empty_name() {
        let fx = fixture().await;
        let (template, profile) = refs(&fx, TENANT).await;
        let id = fx
            .posts
            .add(TENANT, NewPost::new("Spring", "Hello", template, profile))
            .await
            .unwrap();

        fx.templates.delete(TENANT, template).await.unwrap();

        let listed = fx.posts.list(TENANT, Some(id), false).await.unwrap();
        assert_eq!(listed[0].template_id, template);
        assert_eq!(listed[0].template_name, "");
        assert_eq!(listed[0].profile_name, "Launch");
    }

    #[tokio::test]
    async fn test_update_and_delete_contract() {
        let fx = fixture().await;
        let (template, profile) = refs(&fx, TENANT).await;
        let id = fx
            .posts
            .add(TENANT, NewPost::new("Spring", "Hello", template, profile))
            .await
            .unwrap();

        let rows = fx
            .posts
            .update(TENANT, id, NewPost::new("Summer", "Hi", template, profile))
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let bad = fx
            .posts
            .update(TENANT, id, NewPost::new("Summer", "Hi", TemplateId(999), profile))
            .await;
        assert!(matches!(bad, Err(SynkError::Validation(_))));
        let listed = fx.posts.list(TENANT, Some(id), true).await.unwrap();
        assert_eq!(listed[0].name, "Summer");
        assert_eq!(listed[0].template_id, template);

        let (other_template, other_profile) = refs(&fx, OTHER).await;
        assert_eq!(
            fx.posts
                .update(OTHER, id, NewPost::new("X", "Y", other_template, other_profile))
                .await
                .unwrap(),
            0
        );

        assert_eq!(fx.posts.delete(TENANT, id).await.unwrap(), 1);
        assert_eq!(fx.posts.delete(TENANT, id).await.unwrap(), 0);
        assert_eq!(fx.posts.by_id(TENANT, id).await.unwrap(), None);
        assert!(fx.posts.list(TENANT, None, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_of_missing_post_still_validates_references() {
        let fx = fixture().await;
        let (template, profile) = refs(&fx, TENANT).await;

        let result = fx
            .posts
            .update(TENANT, PostId(4242), NewPost::new("X", "Y", TemplateId(9), profile))
            .await;
        match result {
            Err(SynkError::Validation(message)) => {
                assert_eq!(message, "template with id 9 not found")
            }
            other => panic!("Expected validation error, got {:?}", other),
        }

        let result = fx
            .posts
            .update(TENANT, PostId(4242), NewPost::new("X", "Y", template, ProfileId(10)))
            .await;
        assert!(matches!(result, Err(SynkError::Validation(_))));

        // Valid references and no matching row
        let rows = fx
            .posts
            .update(TENANT, PostId(4242), NewPost::new("X", "Y", template, profile))
            .await
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(post_rows(&fx).await, 0);
    }
}
