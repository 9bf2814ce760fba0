//! Color lookup
//!
//! Colors are a small shared palette seeded by migration. They carry no
//! tenant and are never written through this crate.

use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::types::{Color, ColorId};
use crate::{Database, Result};

#[derive(Debug, Clone)]
pub struct ColorCatalog {
    db: Arc<Database>,
}

fn color_from_row(row: &SqliteRow) -> std::result::Result<Color, sqlx::Error> {
    Ok(Color {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        hex: row.try_get("hex")?,
    })
}

impl ColorCatalog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// All colors, or only `id` when given, ordered by id
    pub async fn list(&self, id: Option<ColorId>) -> Result<Vec<Color>> {
        let db = &self.db;
        db.run("colors.list", async {
            let mut sql = String::from("SELECT id, name, hex FROM color");
            if id.is_some() {
                sql.push_str(" WHERE id = ?");
            }
            sql.push_str(" ORDER BY id");

            let mut query = sqlx::query(&sql);
            if let Some(id) = id {
                query = query.bind(id);
            }

            let rows = query.fetch_all(db.pool()).await?;
            let colors = rows
                .iter()
                .map(color_from_row)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(colors)
        })
        .await
    }

    pub async fn by_id(&self, id: ColorId) -> Result<Option<Color>> {
        Ok(self.list(Some(id)).await?.into_iter().next())
    }
}

pub(crate) async fn color_exists(conn: &mut SqliteConnection, id: ColorId) -> Result<bool> {
    let found = sqlx::query("SELECT 1 FROM color WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn catalog() -> ColorCatalog {
        ColorCatalog::new(Arc::new(Database::in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn test_list_returns_seeded_palette_in_id_order() {
        let colors = catalog().await.list(None).await.unwrap();
        assert!(!colors.is_empty());
        assert!(colors.windows(2).all(|w| w[0].id < w[1].id));
        assert!(colors.iter().all(|c| c.hex.starts_with('#')));
    }

    #[tokio::test]
    async fn test_by_id_present_and_absent() {
        let catalog = catalog().await;
        let first = catalog.by_id(ColorId(1)).await.unwrap().unwrap();
        assert_eq!(first.id, ColorId(1));

        assert!(catalog.by_id(ColorId(9_999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_color_exists() {
        let db = Database::in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        assert!(color_exists(&mut conn, ColorId(1)).await.unwrap());
        assert!(!color_exists(&mut conn, ColorId(0)).await.unwrap());
    }
}
