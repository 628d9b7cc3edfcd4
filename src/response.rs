use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Template names handed to the renderer alongside each page context.
pub mod templates {
    pub const INDEX: &str = "posts/index.html";
    pub const GROUP_LIST: &str = "posts/group_list.html";
    pub const PROFILE: &str = "posts/profile.html";
    pub const POST_DETAIL: &str = "posts/post_detail.html";
    pub const CREATE_POST: &str = "posts/create_post.html";
    pub const FOLLOW: &str = "posts/follow.html";
    pub const SIGNUP: &str = "users/signup.html";
    pub const LOGIN: &str = "users/login.html";
    pub const LOGGED_OUT: &str = "users/logged_out.html";
}

/// A rendered page: the template to use and the context it is rendered with.
///
/// Serialized as `{"template": ..., "context": {...}}` so that any
/// renderer sitting in front of the service can pick it up unchanged.
#[derive(Serialize)]
pub struct Page<T> {
    pub template: &'static str,
    pub context: T,
}

impl<T> Page<T>
where
    T: Serialize,
{
    pub fn new(template: &'static str, context: T) -> Self {
        Self { template, context }
    }
}

impl<T> IntoResponse for Page<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
