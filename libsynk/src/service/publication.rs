//! Publication status
//!
//! Attempts are recorded by the delivery side; this module only reads them and
//! folds them into one status per post.

use std::sync::Arc;

use sqlx::Row;

use crate::types::{PostId, PublicationStatus, StatusCounts};
use crate::{Database, Result};

#[derive(Debug, Clone)]
pub struct PublicationStatusAggregator {
    db: Arc<Database>,
}

impl PublicationStatusAggregator {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Attempts of `post_id` grouped by status
    ///
    /// Status text outside the known set is skipped with a warning.
    pub async fn count_by_post(&self, post_id: PostId) -> Result<StatusCounts> {
        let db = &self.db;
        db.run("publication.count_by_post", async {
            let rows = sqlx::query(
                r#"
                SELECT status, COUNT(*) AS count
                FROM publication_attempt
                WHERE post_id = ?
                GROUP BY status
                "#,
            )
            .bind(post_id)
            .fetch_all(db.pool())
            .await?;

            let mut counts = StatusCounts::default();
            for row in &rows {
                let status: String = row.try_get("status")?;
                let count: i64 = row.try_get("count")?;
                match status.parse::<PublicationStatus>() {
                    Ok(status) => counts.add(status, count.max(0) as u64),
                    Err(_) => {
                        tracing::warn!(
                            post_id = post_id.get(),
                            status = %status,
                            count,
                            "Skipping publication attempts with unknown status"
                        );
                    }
                }
            }

            tracing::debug!("Post {} attempt counts: {:?}", post_id, counts);
            Ok(counts)
        })
        .await
    }

    pub async fn status_of(&self, post_id: PostId) -> Result<PublicationStatus> {
        Ok(self.count_by_post(post_id).await?.aggregate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CredentialId;

    async fn aggregator() -> PublicationStatusAggregator {
        PublicationStatusAggregator::new(Arc::new(Database::in_memory().await.unwrap()))
    }

    async fn record(agg: &PublicationStatusAggregator, post: PostId, status: &str) {
        sqlx::query(
            "INSERT INTO publication_attempt (post_id, credential_id, status) VALUES (?, ?, ?)",
        )
        .bind(post)
        .bind(CredentialId(1))
        .bind(status)
        .execute(agg.db.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_no_attempts_reads_as_published() {
        let agg = aggregator().await;
        assert_eq!(
            agg.count_by_post(PostId(1)).await.unwrap(),
            StatusCounts::default()
        );
        assert_eq!(
            agg.status_of(PostId(1)).await.unwrap(),
            PublicationStatus::Published
        );
    }

    #[tokio::test]
    async fn test_counts_group_by_status() {
        let agg = aggregator().await;
        for status in ["published", "published", "pending", "failed", "failed"] {
            record(&agg, PostId(3), status).await;
        }
        record(&agg, PostId(4), "pending").await;

        let counts = agg.count_by_post(PostId(3)).await.unwrap();
        assert_eq!(counts, StatusCounts::new(1, 2, 2));
        assert_eq!(
            agg.status_of(PostId(3)).await.unwrap(),
            PublicationStatus::Failed
        );
        assert_eq!(
            agg.status_of(PostId(4)).await.unwrap(),
            PublicationStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_unknown_status_is_skipped() {
        let agg = aggregator().await;
        record(&agg, PostId(5), "cancelled").await;
        record(&agg, PostId(5), "published").await;

        let counts = agg.count_by_post(PostId(5)).await.unwrap();
        assert_eq!(counts, StatusCounts::new(0, 1, 0));
        assert_eq!(
            agg.status_of(PostId(5)).await.unwrap(),
            PublicationStatus::Published
        );
    }
}
