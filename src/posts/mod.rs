use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use serde::Serialize;
use sqlx::FromRow;
use validator::Validate;

use crate::{
    auth::AuthorResponse,
    comments::{CommentFormView, CommentResponse},
    error::AppError,
    forms::{FormData, FormErrors},
    groups::Group,
    pagination::PageObj,
};

pub mod handler;

/// Post id taken from the URL; anything that is not an integer is Not-Found.
#[derive(Debug, Clone, Copy)]
pub struct PostId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for PostId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound("Post not found".to_string()))?;
        raw.parse()
            .map(PostId)
            .map_err(|_| AppError::NotFound("Post not found".to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub text: String,
    pub created: chrono::DateTime<chrono::Utc>,
    pub author: AuthorResponse,
    pub group: Option<GroupSummary>,
    pub image: Option<String>,
}

impl std::fmt::Display for PostResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short: String = self.text.chars().take(15).collect();
        f.write_str(&short)
    }
}

#[derive(FromRow)]
pub(crate) struct PostFromDb {
    id: i64,
    text: String,
    image: Option<String>,
    created: chrono::DateTime<chrono::Utc>,
    // author fields
    author_id: i64,
    author_username: String,
    // group fields
    group_id: Option<i64>,
    group_title: Option<String>,
    group_slug: Option<String>,
}

impl From<PostFromDb> for PostResponse {
    fn from(p: PostFromDb) -> Self {
        let group = match (p.group_id, p.group_title, p.group_slug) {
            (Some(id), Some(title), Some(slug)) => Some(GroupSummary { id, title, slug }),
            _ => None,
        };
        PostResponse {
            id: p.id,
            text: p.text,
            created: p.created,
            author: AuthorResponse {
                id: p.author_id,
                username: p.author_username,
            },
            group,
            image: p.image,
        }
    }
}

/// Which posts a listing shows.
#[derive(Debug, Clone, Copy)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

impl PostFilter {
    fn where_clause(&self) -> &'static str {
        match self {
            PostFilter::All => "",
            PostFilter::Group(_) => "WHERE p.group_id = ?",
            PostFilter::Author(_) => "WHERE p.author_id = ?",
            PostFilter::FollowedBy(_) => {
                "WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ?)"
            }
        }
    }

    fn param(&self) -> Option<i64> {
        match *self {
            PostFilter::All => None,
            PostFilter::Group(id) | PostFilter::Author(id) | PostFilter::FollowedBy(id) => Some(id),
        }
    }
}

/// A post form submission, before the group choice and image are checked.
#[derive(Debug, Validate)]
pub struct PostForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
    pub group: Option<String>,
    pub clear_image: bool,
}

impl PostForm {
    pub fn from_form_data(form: &FormData) -> Self {
        Self {
            text: form.field("text").unwrap_or_default().trim().to_string(),
            group: form
                .field("group")
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string),
            clear_image: form.flag("image-clear"),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct PostFormView {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<String>,
    pub errors: FormErrors,
}

#[derive(Debug, Serialize)]
pub struct PostFormContext {
    pub form: PostFormView,
    pub groups: Vec<Group>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_edit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct IndexContext {
    pub index: bool,
    pub page_obj: PageObj<PostResponse>,
}

#[derive(Debug, Serialize)]
pub struct GroupContext {
    pub group: Group,
    pub page_obj: PageObj<PostResponse>,
}

#[derive(Debug, Serialize)]
pub struct ProfileAuthor {
    pub id: i64,
    pub username: String,
    pub posts_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ProfileContext {
    pub author: ProfileAuthor,
    pub following: bool,
    pub is_not_author: bool,
    pub page_obj: PageObj<PostResponse>,
}

#[derive(Debug, Serialize)]
pub struct PostDetailContext {
    pub post: PostResponse,
    pub author_posts_count: i64,
    pub is_author_of_post: bool,
    pub form: CommentFormView,
    pub comments: Vec<CommentResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(text: &str) -> PostResponse {
        PostResponse {
            id: 1,
            text: text.to_string(),
            created: Utc::now(),
            author: AuthorResponse {
                id: 1,
                username: "leo".into(),
            },
            group: None,
            image: None,
        }
    }

    #[test]
    fn post_displays_first_fifteen_chars() {
        assert_eq!(
            post("Тестовый текст поста больше 15-ти символов").to_string(),
            "Тестовый текст "
        );
        assert_eq!(post("short").to_string(), "short");
    }

    #[test]
    fn blank_text_is_invalid() {
        let form = PostForm {
            text: String::new(),
            group: None,
            clear_image: false,
        };
        let errors = FormErrors::from(form.validate().unwrap_err());
        assert_eq!(
            errors.get("text"),
            Some(&vec![crate::forms::REQUIRED.to_string()])
        );
    }
}
