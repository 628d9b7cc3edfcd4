use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title)
    }
}

pub async fn get_by_slug(pool: &SqlitePool, slug: &str) -> Result<Group, AppError> {
    sqlx::query_as::<_, Group>("SELECT * FROM post_groups WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(AppError::database)?
        .ok_or(AppError::NotFound("Group not found".to_string()))
}

pub async fn exists(pool: &SqlitePool, id: i64) -> Result<bool, AppError> {
    Ok(sqlx::query("SELECT 1 FROM post_groups WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::database)?
        .is_some())
}

/// Groups offered as choices in the post form.
pub async fn all(pool: &SqlitePool) -> Result<Vec<Group>, AppError> {
    sqlx::query_as::<_, Group>("SELECT * FROM post_groups ORDER BY title ASC")
        .fetch_all(pool)
        .await
        .map_err(AppError::database)
}
