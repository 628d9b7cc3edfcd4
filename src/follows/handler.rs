use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    auth::{handler::get_user_by_username, CurrentUser},
    error::AppError,
    follows::{Follow, FollowContext},
    pagination::PageParams,
    posts::{handler::fetch_post_page, PostFilter},
    response::{templates, Page},
    urls::Route,
};

pub(crate) async fn is_following(
    pool: &SqlitePool,
    user_id: i64,
    author_id: i64,
) -> Result<bool, AppError> {
    Ok(
        sqlx::query("SELECT 1 FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(user_id)
            .bind(author_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::database)?
            .is_some(),
    )
}

/// Posts by the authors the current user follows
/// GET /follow/
pub async fn follow_index(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page_obj =
        fetch_post_page(&pool, PostFilter::FollowedBy(user.id), params.page.as_deref()).await?;

    Ok(Page::new(
        templates::FOLLOW,
        FollowContext {
            follow: true,
            page_obj,
        },
    ))
}

/// Follow an author; following yourself is silently ignored
/// GET|POST /profile/:username/follow/
pub async fn profile_follow(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let author = get_user_by_username(&pool, &username).await?;

    if author.id != user.id {
        // The unique (user_id, author_id) pair makes repeated follows a no-op
        let created = sqlx::query_as::<_, Follow>(
            r#"
            INSERT INTO follows (user_id, author_id, created)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id, author_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(author.id)
        .bind(chrono::Utc::now())
        .fetch_optional(&pool)
        .await
        .map_err(AppError::database)?;

        if let Some(follow) = created {
            info!(user_id = follow.user_id, author_id = follow.author_id, "author followed");
        }
    }

    Ok(Redirect::to(
        &Route::Profile {
            username: author.username,
        }
        .path(),
    ))
}

/// Unfollow an author; a missing edge is not an error
/// GET|POST /profile/:username/unfollow/
pub async fn profile_unfollow(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let author = get_user_by_username(&pool, &username).await?;

    let result = sqlx::query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
        .bind(user.id)
        .bind(author.id)
        .execute(&pool)
        .await
        .map_err(AppError::database)?;

    if result.rows_affected() > 0 {
        info!(user_id = user.id, author_id = author.id, "author unfollowed");
    }

    Ok(Redirect::to(
        &Route::Profile {
            username: author.username,
        }
        .path(),
    ))
}
