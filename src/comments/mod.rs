use serde::Serialize;
use validator::Validate;

use crate::{
    auth::AuthorResponse,
    forms::{FormData, FormErrors},
};

pub mod handler;

/// Request payload for a new comment
#[derive(Debug, Validate)]
pub struct CommentForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
}

impl CommentForm {
    pub fn from_form_data(form: &FormData) -> Self {
        Self {
            text: form.field("text").unwrap_or_default().trim().to_string(),
        }
    }
}

/// Comment form as handed back to the post detail template
#[derive(Debug, Default, Serialize)]
pub struct CommentFormView {
    pub text: String,
    pub errors: FormErrors,
}

/// Response structure for a comment with author info
#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub author: AuthorResponse,
    pub text: String,
    pub created: chrono::DateTime<chrono::Utc>,
}
