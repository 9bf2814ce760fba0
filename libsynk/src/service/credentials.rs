//! Credential registry
//!
//! Channel credentials are tenant owned and soft deleted. The config blob is
//! opaque here; only the delivery side understands it.

use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::validation;
use crate::db::now;
use crate::error::SynkError;
use crate::types::{
    ChannelType, Credential, CredentialId, CredentialSummary, NewCredential, ProfileId, TenantId,
};
use crate::{Database, Result};

#[derive(Debug, Clone)]
pub struct CredentialRegistry {
    db: Arc<Database>,
}

/// Validated form of [`NewCredential`]; name trimmed, config untouched
struct CredentialFields {
    name: String,
    channel_type: ChannelType,
    config: String,
}

impl CredentialFields {
    fn validate(input: &NewCredential) -> Result<Self> {
        validation::required("config", &input.config)?;

        Ok(Self {
            name: validation::required("name", &input.name)?,
            channel_type: validation::channel_type(&input.channel_type)?,
            // Opaque to the store, kept byte for byte
            config: input.config.clone(),
        })
    }
}

fn channel_type_from_row(row: &SqliteRow) -> std::result::Result<ChannelType, sqlx::Error> {
    let raw: String = row.try_get("channel_type")?;
    raw.parse::<ChannelType>()
        .map_err(|e| sqlx::Error::Decode(e.into()))
}

fn credential_from_row(row: &SqliteRow) -> std::result::Result<Credential, sqlx::Error> {
    Ok(Credential {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        channel_type: channel_type_from_row(row)?,
        config: row.try_get("config")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn summary_from_row(row: &SqliteRow) -> std::result::Result<CredentialSummary, sqlx::Error> {
    Ok(CredentialSummary {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        channel_type: channel_type_from_row(row)?,
    })
}

fn summaries(rows: &[SqliteRow]) -> Result<Vec<CredentialSummary>> {
    Ok(rows
        .iter()
        .map(summary_from_row)
        .collect::<std::result::Result<Vec<_>, _>>()?)
}

impl CredentialRegistry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register a credential for `tenant`
    ///
    /// # Errors
    ///
    /// Validation error when the trimmed name or config is empty, or the
    /// channel type is not one of [`ChannelType::ALL`].
    pub async fn add(&self, tenant: TenantId, input: NewCredential) -> Result<CredentialId> {
        let fields = CredentialFields::validate(&input)?;
        let db = &self.db;

        db.run("credentials.add", async {
            let result = sqlx::query(
                r#"
                INSERT INTO credential (name, channel_type, config, user_id, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&fields.name)
            .bind(fields.channel_type.as_str())
            .bind(&fields.config)
            .bind(tenant)
            .bind(now())
            .execute(db.pool())
            .await?;

            let id = CredentialId(result.last_insert_rowid());
            tracing::info!(
                "Created {} credential {} for tenant {}",
                fields.channel_type,
                id,
                tenant
            );
            Ok(id)
        })
        .await
    }

    /// Live credentials of `tenant`, optionally narrowed to one id
    ///
    /// `config` is filled only when `include_config` is set; otherwise it is
    /// an empty string so the shape stays the same for callers.
    pub async fn list(
        &self,
        tenant: TenantId,
        id: Option<CredentialId>,
        include_config: bool,
    ) -> Result<Vec<Credential>> {
        let db = &self.db;
        db.run("credentials.list", async {
            let config_column = if include_config {
                "config"
            } else {
                "'' AS config"
            };
            let mut sql = format!(
                "SELECT id, name, channel_type, {config_column}, created_at, updated_at \
                 FROM credential WHERE user_id = ? AND deleted_at IS NULL"
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
            tracing::debug!("Listed {} credentials for tenant {}", rows.len(), tenant);
            Ok(rows
                .iter()
                .map(credential_from_row)
                .collect::<std::result::Result<Vec<_>, _>>()?)
        })
        .await
    }

    pub async fn by_id(
        &self,
        tenant: TenantId,
        id: CredentialId,
    ) -> Result<Option<CredentialSummary>> {
        let db = &self.db;
        db.run("credentials.by_id", async {
            let row = sqlx::query(
                r#"
                SELECT id, name, channel_type
                FROM credential
                WHERE id = ? AND user_id = ? AND deleted_at IS NULL
                "#,
            )
            .bind(id)
            .bind(tenant)
            .fetch_optional(db.pool())
            .await?;

            Ok(row.as_ref().map(summary_from_row).transpose()?)
        })
        .await
    }

    /// Abbreviated projection for selection lists, ordered by name
    pub async fn basic_list(&self, tenant: TenantId) -> Result<Vec<CredentialSummary>> {
        let db = &self.db;
        db.run("credentials.basic_list", async {
            let rows = sqlx::query(
                r#"
                SELECT id, name, channel_type
                FROM credential
                WHERE user_id = ? AND deleted_at IS NULL
                ORDER BY name, id
                "#,
            )
            .bind(tenant)
            .fetch_all(db.pool())
            .await?;

            summaries(&rows)
        })
        .await
    }

    /// Credentials linked to a profile, ordered by channel type then name
    ///
    /// Empty when the profile is deleted or owned by someone else. Deleted
    /// credentials drop out even though their link rows remain.
    pub async fn basic_list_by_profile(
        &self,
        tenant: TenantId,
        profile_id: ProfileId,
    ) -> Result<Vec<CredentialSummary>> {
        let db = &self.db;
        db.run("credentials.basic_list_by_profile", async {
            let rows = sqlx::query(
                r#"
                SELECT c.id, c.name, c.channel_type
                FROM profile_credential_link link
                JOIN credential c ON c.id = link.credential_id
                JOIN profile p ON p.id = link.profile_id
                WHERE link.profile_id = ?
                  AND p.user_id = ? AND p.deleted_at IS NULL
                  AND c.user_id = ? AND c.deleted_at IS NULL
                ORDER BY c.channel_type, c.name, c.id
                "#,
            )
            .bind(profile_id)
            .bind(tenant)
            .bind(tenant)
            .fetch_all(db.pool())
            .await?;

            summaries(&rows)
        })
        .await
    }

    /// Returns rows affected: 1 on success, 0 when the credential is not a
    /// live credential of `tenant`
    pub async fn update(
        &self,
        tenant: TenantId,
        id: CredentialId,
        input: NewCredential,
    ) -> Result<u64> {
        let fields = CredentialFields::validate(&input)?;
        let db = &self.db;

        db.run("credentials.update", async {
            let result = sqlx::query(
                r#"
                UPDATE credential
                SET name = ?, channel_type = ?, config = ?, updated_at = ?
                WHERE id = ? AND user_id = ? AND deleted_at IS NULL
                "#,
            )
            .bind(&fields.name)
            .bind(fields.channel_type.as_str())
            .bind(&fields.config)
            .bind(now())
            .bind(id)
            .bind(tenant)
            .execute(db.pool())
            .await?;

            tracing::info!(
                "Updated credential {} for tenant {} ({} rows)",
                id,
                tenant,
                result.rows_affected()
            );
            Ok(result.rows_affected())
        })
        .await
    }

    /// Soft delete; a second delete of the same id returns 0
    pub async fn delete(&self, tenant: TenantId, id: CredentialId) -> Result<u64> {
        let db = &self.db;
        db.run("credentials.delete", async {
            let result = sqlx::query(
                r#"
                UPDATE credential
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
                "Deleted credential {} for tenant {} ({} rows)",
                id,
                tenant,
                result.rows_affected()
            );
            Ok(result.rows_affected())
        })
        .await
    }
}

/// Fail with a validation error naming the first id that is not a live
/// credential of `tenant`
pub(crate) async fn ensure_live_credentials(
    conn: &mut SqliteConnection,
    tenant: TenantId,
    ids: &[CredentialId],
) -> Result<()> {
    for id in ids {
        let found = sqlx::query(
            "SELECT 1 FROM credential WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
        )
        .bind(*id)
        .bind(tenant)
        .fetch_optional(&mut *conn)
        .await?;

        if found.is_none() {
            return Err(SynkError::validation(format!(
                "credential with id {} not found",
                id
            )));
        }
    }
    Ok(())
}
