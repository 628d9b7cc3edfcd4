use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use sqlx::{FromRow, SqlitePool};
use tracing::info;
use validator::Validate;

use crate::{
    auth::{AuthorResponse, CurrentUser},
    comments::{CommentForm, CommentFormView, CommentResponse},
    error::AppError,
    forms::{FormData, FormErrors},
    posts::{
        handler::{get_post, post_detail_context},
        PostId,
    },
    response::{templates, Page},
    urls::Route,
};

/// Helper struct for fetching comments with author info from database
#[derive(FromRow)]
struct CommentFromDb {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    created: chrono::DateTime<chrono::Utc>,
    // Author fields
    username: String,
}

impl From<CommentFromDb> for CommentResponse {
    fn from(c: CommentFromDb) -> Self {
        CommentResponse {
            id: c.id,
            post_id: c.post_id,
            author: AuthorResponse {
                id: c.author_id,
                username: c.username,
            },
            text: c.text,
            created: c.created,
        }
    }
}

/// Add a comment to a post
/// POST /posts/:post_id/comment/
pub async fn add_comment(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    PostId(post_id): PostId,
    form: FormData,
) -> Result<Response, AppError> {
    // Resolve the post before looking at the form
    get_post(&pool, post_id).await?;

    let payload = CommentForm::from_form_data(&form);
    if let Err(e) = payload.validate() {
        let view = CommentFormView {
            text: payload.text,
            errors: FormErrors::from(e),
        };
        let context = post_detail_context(&pool, post_id, Some(&user), view).await?;
        return Ok(Page::new(templates::POST_DETAIL, context).into_response());
    }

    let comment_id: i64 = sqlx::query_scalar(
        "INSERT INTO comments (post_id, author_id, text, created) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(post_id)
    .bind(user.id)
    .bind(&payload.text)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(AppError::database)?;

    info!(comment_id, post_id, author_id = user.id, "comment added");

    Ok(Redirect::to(&Route::PostDetail { post_id }.path()).into_response())
}

/// Nothing is rendered for the comment endpoint itself
/// GET /posts/:post_id/comment/
pub async fn add_comment_page(
    State(pool): State<SqlitePool>,
    _user: CurrentUser,
    PostId(post_id): PostId,
) -> Result<impl IntoResponse, AppError> {
    get_post(&pool, post_id).await?;
    Ok(Redirect::to(&Route::PostDetail { post_id }.path()))
}

/// Comments on a post, newest first
pub(crate) async fn comments_for_post(
    pool: &SqlitePool,
    post_id: i64,
) -> Result<Vec<CommentResponse>, AppError> {
    let comments = sqlx::query_as::<_, CommentFromDb>(
        r#"
        SELECT c.id, c.post_id, c.author_id, c.text, c.created, u.username
        FROM comments c
        JOIN users u ON c.author_id = u.id
        WHERE c.post_id = ?
        ORDER BY c.created DESC, c.id DESC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::database)?;

    Ok(comments.into_iter().map(CommentResponse::from).collect())
}
