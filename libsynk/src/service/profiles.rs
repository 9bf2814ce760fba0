//! Profiles and their credential links
//!
//! A profile groups the credentials a post is delivered through. Its link set
//! is always written as a whole: add and update replace every link inside the
//! same transaction that writes the profile row, so a reader sees either the
//! old set or the new one.

use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::colors::color_exists;
use super::credentials::{ensure_live_credentials, CredentialRegistry};
use super::validation;
use crate::db::now;
use crate::error::SynkError;
use crate::types::{
    Color, ColorId, CredentialId, NewProfile, ProfileId, ProfileSummary, ProfileView, TenantId,
};
use crate::{Database, Result};

#[derive(Debug, Clone)]
pub struct ProfileLinkReconciler {
    db: Arc<Database>,
    credentials: CredentialRegistry,
}

struct ProfileFields {
    name: String,
    color_id: ColorId,
    credential_ids: Vec<CredentialId>,
}

impl ProfileFields {
    fn validate(input: &NewProfile) -> Result<Self> {
        Ok(Self {
            name: validation::required("name", &input.name)?,
            color_id: input.color_id,
            credential_ids: validation::unique(&input.credential_ids),
        })
    }

    /// Reference checks, run on the transaction that writes the profile
    async fn check_references(&self, conn: &mut SqliteConnection, tenant: TenantId) -> Result<()> {
        if !color_exists(&mut *conn, self.color_id).await? {
            return Err(SynkError::validation(format!(
                "color with id {} not found",
                self.color_id
            )));
        }
        ensure_live_credentials(conn, tenant, &self.credential_ids).await
    }
}

async fn insert_links(
    conn: &mut SqliteConnection,
    profile_id: ProfileId,
    credential_ids: &[CredentialId],
) -> Result<()> {
    for credential_id in credential_ids {
        sqlx::query(
            "INSERT INTO profile_credential_link (profile_id, credential_id) VALUES (?, ?)",
        )
        .bind(profile_id)
        .bind(*credential_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn color_from_join(row: &SqliteRow) -> std::result::Result<Option<Color>, sqlx::Error> {
    let id: Option<ColorId> = row.try_get("color_id")?;
    let name: Option<String> = row.try_get("color_name")?;
    let hex: Option<String> = row.try_get("color_hex")?;

    Ok(match (id, name, hex) {
        (Some(id), Some(name), Some(hex)) => Some(Color { id, name, hex }),
        _ => None,
    })
}

impl ProfileLinkReconciler {
    pub fn new(db: Arc<Database>, credentials: CredentialRegistry) -> Self {
        Self { db, credentials }
    }

    /// Create a profile together with its link set
    ///
    /// Nothing persists when the color or any credential fails to resolve.
    /// Repeated credential ids produce one link.
    pub async fn add(&self, tenant: TenantId, input: NewProfile) -> Result<ProfileId> {
        let fields = ProfileFields::validate(&input)?;
        let db = &self.db;

        db.run("profiles.add", async {
            let mut tx = db.pool().begin().await?;

            let result = sqlx::query(
                r#"
                INSERT INTO profile (name, color_id, user_id, created_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&fields.name)
            .bind(fields.color_id)
            .bind(tenant)
            .bind(now())
            .execute(&mut *tx)
            .await?;
            let id = ProfileId(result.last_insert_rowid());

            fields.check_references(&mut tx, tenant).await?;
            insert_links(&mut tx, id, &fields.credential_ids).await?;

            tx.commit().await?;

            tracing::info!(
                "Created profile {} for tenant {} with {} credentials",
                id,
                tenant,
                fields.credential_ids.len()
            );
            Ok(id)
        })
        .await
    }

    /// Rewrite a profile and replace its whole link set
    ///
    /// The profile row is updated first so the transaction holds the write
    /// lock before any reference is read; concurrent updates of the same
    /// profile serialize on it. References are checked whether or not a row
    /// matched. When they are valid but the profile is not a live profile of
    /// `tenant` this returns 0 and leaves every link alone.
    pub async fn update(&self, tenant: TenantId, id: ProfileId, input: NewProfile) -> Result<u64> {
        let fields = ProfileFields::validate(&input)?;
        let db = &self.db;

        db.run("profiles.update", async {
            let mut tx = db.pool().begin().await?;

            let result = sqlx::query(
                r#"
                UPDATE profile
                SET name = ?, color_id = ?, updated_at = ?
                WHERE id = ? AND user_id = ? AND deleted_at IS NULL
                "#,
            )
            .bind(&fields.name)
            .bind(fields.color_id)
            .bind(now())
            .bind(id)
            .bind(tenant)
            .execute(&mut *tx)
            .await?;

            fields.check_references(&mut tx, tenant).await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                tracing::debug!("Profile {} not found for tenant {}", id, tenant);
                return Ok(0);
            }

            sqlx::query("DELETE FROM profile_credential_link WHERE profile_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_links(&mut tx, id, &fields.credential_ids).await?;

            tx.commit().await?;

            tracing::info!(
                "Updated profile {} for tenant {}, replaced links with {} credentials",
                id,
                tenant,
                fields.credential_ids.len()
            );
            Ok(result.rows_affected())
        })
        .await
    }

    /// Soft delete; link rows stay behind but are never read through a
    /// deleted profile
    pub async fn delete(&self, tenant: TenantId, id: ProfileId) -> Result<u64> {
        let db = &self.db;
        db.run("profiles.delete", async {
            let result = sqlx::query(
                r#"
                UPDATE profile
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
                "Deleted profile {} for tenant {} ({} rows)",
                id,
                tenant,
                result.rows_affected()
            );
            Ok(result.rows_affected())
        })
        .await
    }

    /// Live profiles with their color and linked credentials, ordered by id
    pub async fn list(&self, tenant: TenantId, id: Option<ProfileId>) -> Result<Vec<ProfileView>> {
        let db = &self.db;
        let rows = db
            .run("profiles.list", async {
                let mut sql = String::from(
                    "SELECT p.id, p.name, p.created_at, p.updated_at, \
                     c.id AS color_id, c.name AS color_name, c.hex AS color_hex \
                     FROM profile p LEFT JOIN color c ON c.id = p.color_id \
                     WHERE p.user_id = ? AND p.deleted_at IS NULL",
                );
                if id.is_some() {
                    sql.push_str(" AND p.id = ?");
                }
                sql.push_str(" ORDER BY p.id");

                let mut query = sqlx::query(&sql).bind(tenant);
                if let Some(id) = id {
                    query = query.bind(id);
                }
                Ok(query.fetch_all(db.pool()).await?)
            })
            .await?;

        let mut profiles = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: ProfileId = row.try_get("id")?;
            profiles.push(ProfileView {
                id,
                name: row.try_get("name")?,
                color: color_from_join(row)?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
                credentials: self.credentials.basic_list_by_profile(tenant, id).await?,
            });
        }

        tracing::debug!("Listed {} profiles for tenant {}", profiles.len(), tenant);
        Ok(profiles)
    }

    /// Id, name and color, ordered by name
    pub async fn basic_list(&self, tenant: TenantId) -> Result<Vec<ProfileSummary>> {
        let db = &self.db;
        db.run("profiles.basic_list", async {
            let rows = sqlx::query(
                r#"
                SELECT p.id, p.name, c.name AS color_name, c.hex AS color_hex
                FROM profile p
                LEFT JOIN color c ON c.id = p.color_id
                WHERE p.user_id = ? AND p.deleted_at IS NULL
                ORDER BY p.name, p.id
                "#,
            )
            .bind(tenant)
            .fetch_all(db.pool())
            .await?;

            let mut summaries = Vec::with_capacity(rows.len());
            for row in &rows {
                summaries.push(ProfileSummary {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    color_name: row.try_get("color_name")?,
                    color_hex: row.try_get("color_hex")?,
                });
            }
            Ok(summaries)
        })
        .await
    }

    pub async fn by_id(&self, tenant: TenantId, id: ProfileId) -> Result<Option<ProfileId>> {
        let db = &self.db;
        db.run("profiles.by_id", async {
            let mut conn = db.pool().acquire().await?;
            Ok(profile_is_live(&mut conn, tenant, id).await?.then_some(id))
        })
        .await
    }
}

pub(crate) async fn profile_is_live(
    conn: &mut SqliteConnection,
    tenant: TenantId,
    id: ProfileId,
) -> Result<bool> {
    let found =
        sqlx::query("SELECT 1 FROM profile WHERE id = ? AND user_id = ? AND deleted_at IS NULL")
            .bind(id)
            .bind(tenant)
            .fetch_optional(conn)
            .await?;
    Ok(found.is_some())
}
