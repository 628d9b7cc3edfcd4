use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{config::settings::Settings, forms::FormErrors};

pub mod handler;
pub mod jwt;
pub mod utils;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub date_joined: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupForm {
    #[validate(length(
        min = 1,
        max = 150,
        message = "Username must be between 1 and 150 characters"
    ))]
    #[serde(default)]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NextParam {
    pub next: Option<String>,
}

/// What the signup and login templates get back; never echoes the password.
#[derive(Debug, Default, Serialize)]
pub struct AuthFormView {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub errors: FormErrors,
}

#[derive(Debug, Serialize)]
pub struct AuthPageContext {
    pub form: AuthFormView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorResponse {
    pub id: i64,
    pub username: String,
}

/// The authenticated user behind the request.
///
/// Anonymous requests are rejected with a redirect to the login page, so a
/// handler taking a `CurrentUser` is a login-required handler. A valid token
/// whose user has since been deleted counts as anonymous.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    Settings: FromRef<S>,
    SqlitePool: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = jwt::Claims::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let pool = SqlitePool::from_ref(state);
        let user = handler::find_user_by_id(&pool, claims.sub)
            .await
            .map_err(IntoResponse::into_response)?;

        match user {
            Some(user) => Ok(CurrentUser {
                id: user.id,
                username: user.username,
            }),
            None => Err(jwt::LoginRedirect::from_parts(parts).into_response()),
        }
    }
}

/// Normalises optional text inputs: blank means absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
