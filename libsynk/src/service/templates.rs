//! Template store
//!
//! Reusable message bodies a post is written from. Tenant owned and soft
//! deleted like every other editable entity.

use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::validation;
use crate::db::now;
use crate::types::{NewTemplate, Template, TemplateId, TemplateSummary, TenantId};
use crate::{Database, Result};

#[derive(Debug, Clone)]
pub struct TemplateStore {
    db: Arc<Database>,
}

struct TemplateFields {
    name: String,
    content: String,
    url_import: Option<String>,
}

impl TemplateFields {
    fn validate(input: &NewTemplate) -> Result<Self> {
        Ok(Self {
            name: validation::required("name", &input.name)?,
            content: validation::content("content", &input.content)?,
            url_import: validation::optional(input.url_import.as_deref()),
        })
    }
}

fn template_from_row(row: &SqliteRow) -> std::result::Result<Template, sqlx::Error> {
    Ok(Template {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        content: row.try_get("content")?,
        url_import: row.try_get("url_import")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl TemplateStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn add(&self, tenant: TenantId, input: NewTemplate) -> Result<TemplateId> {
        let fields = TemplateFields::validate(&input)?;
        let db = &self.db;

        db.run("templates.add", async {
            let result = sqlx::query(
                r#"
                INSERT INTO template (name, content, url_import, user_id, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&fields.name)
            .bind(&fields.content)
            .bind(&fields.url_import)
            .bind(tenant)
            .bind(now())
            .execute(db.pool())
            .await?;

            let id = TemplateId(result.last_insert_rowid());
            tracing::info!("Created template {} for tenant {}", id, tenant);
            Ok(id)
        })
        .await
    }

    /// Live templates of `tenant`, ordered by id
    ///
    /// Content is left empty unless `include_content` is set.
    pub async fn list(
        &self,
        tenant: TenantId,
        id: Option<TemplateId>,
        include_content: bool,
    ) -> Result<Vec<Template>> {
        let db = &self.db;
        db.run("templates.list", async {
            let content_column = if include_content {
                "content"
            } else {
                "'' AS content"
            };
            let mut sql = format!(
                "SELECT id, name, {content_column}, url_import, created_at, updated_at \
                 FROM template WHERE user_id = ? AND deleted_at IS NULL"
            );
            if id.is_some() {
                sql.push_str(" AND id = ?");
            }
            sql.push_str(" ORDER BY id");

            let mut query = sqlx::query(&sql).bind(tenant);
            if let Some(id) = id {
                query = query.bind(id);
            }

            let rows = query.fetch_all(db.pool()).await?;
            Ok(rows
                .iter()
                .map(template_from_row)
                .collect::<std::result::Result<Vec<_>, _>>()?)
        })
        .await
    }

    /// Id and name only, ordered by name
    pub async fn basic_list(&self, tenant: TenantId) -> Result<Vec<TemplateSummary>> {
        let db = &self.db;
        db.run("templates.basic_list", async {
            let rows = sqlx::query(
                r#"
                SELECT id, name
                FROM template
                WHERE user_id = ? AND deleted_at IS NULL
                ORDER BY name, id
                "#,
            )
            .bind(tenant)
            .fetch_all(db.pool())
            .await?;

            let mut summaries = Vec::with_capacity(rows.len());
            for row in &rows {
                summaries.push(TemplateSummary {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                });
            }
            Ok(summaries)
        })
        .await
    }

    /// Existence check; `Some(id)` when the template is live for `tenant`
    pub async fn by_id(&self, tenant: TenantId, id: TemplateId) -> Result<Option<TemplateId>> {
        let db = &self.db;
        db.run("templates.by_id", async {
            let mut conn = db.pool().acquire().await?;
            Ok(template_is_live(&mut conn, tenant, id).await?.then_some(id))
        })
        .await
    }

    pub async fn update(&self, tenant: TenantId, id: TemplateId, input: NewTemplate) -> Result<u64> {
        let fields = TemplateFields::validate(&input)?;
        let db = &self.db;

        db.run("templates.update", async {
            let result = sqlx::query(
                r#"
                UPDATE template
                SET name = ?, content = ?, url_import = ?, updated_at = ?
                WHERE id = ? AND user_id = ? AND deleted_at IS NULL
                "#,
            )
            .bind(&fields.name)
            .bind(&fields.content)
            .bind(&fields.url_import)
            .bind(now())
            .bind(id)
            .bind(tenant)
            .execute(db.pool())
            .await?;

            tracing::info!(
                "Updated template {} for tenant {} ({} rows)",
                id,
                tenant,
                result.rows_affected()
            );
            Ok(result.rows_affected())
        })
        .await
    }

    /// Soft delete. Posts written from the template keep their reference and
    /// list with an empty template name.
    pub async fn delete(&self, tenant: TenantId, id: TemplateId) -> Result<u64> {
        let db = &self.db;
        db.run("templates.delete", async {
            let result = sqlx::query(
                r#"
                UPDATE template
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
                "Deleted template {} for tenant {} ({} rows)",
                id,
                tenant,
                result.rows_affected()
            );
            Ok(result.rows_affected())
        })
        .await
    }
}

pub(crate) async fn template_is_live(
    conn: &mut SqliteConnection,
    tenant: TenantId,
    id: TemplateId,
) -> Result<bool> {
    let found =
        sqlx::query("SELECT 1 FROM template WHERE id = ? AND user_id = ? AND deleted_at IS NULL")
            .bind(id)
            .bind(tenant)
            .fetch_optional(conn)
            .await?;
    Ok(found.is_some())
}
