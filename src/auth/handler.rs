use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use sqlx::SqlitePool;
use tracing::info;
use validator::Validate;

use crate::{
    auth::{
        jwt, non_blank, utils, AuthFormView, AuthPageContext, LoginForm, NextParam, SignupForm,
        User,
    },
    config::settings::Settings,
    error::AppError,
    forms::FormErrors,
    response::{templates, Page},
    urls,
};

pub(crate) async fn find_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::database)
}

/// Resolves a username or fails with Not-Found.
pub(crate) async fn get_user_by_username(pool: &SqlitePool, username: &str) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(AppError::database)?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((jwt::TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub async fn signup_page() -> impl IntoResponse {
    Page::new(
        templates::SIGNUP,
        AuthPageContext {
            form: AuthFormView::default(),
            next: None,
        },
    )
}

pub async fn signup(
    State(pool): State<SqlitePool>,
    State(settings): State<Settings>,
    jar: CookieJar,
    Form(mut payload): Form<SignupForm>,
) -> Result<Response, AppError> {
    payload.username = payload.username.trim().to_string();
    payload.email = non_blank(payload.email);

    let mut errors = match payload.validate() {
        Ok(()) => FormErrors::default(),
        Err(e) => FormErrors::from(e),
    };
    if !payload.username.is_empty() && !utils::is_valid_username(&payload.username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    if errors.is_empty() {
        let taken = sqlx::query("SELECT 1 FROM users WHERE username = ?")
            .bind(&payload.username)
            .fetch_optional(&pool)
            .await
            .map_err(AppError::database)?
            .is_some();
        if taken {
            errors.add("username", "A user with that username already exists.");
        }
    }

    if !errors.is_empty() {
        return Ok(Page::new(
            templates::SIGNUP,
            AuthPageContext {
                form: AuthFormView {
                    username: payload.username,
                    email: payload.email,
                    errors,
                },
                next: None,
            },
        )
        .into_response());
    }

    let password_hash =
        utils::hash_password(&payload.password).map_err(|_| AppError::InternalServerError)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, email, password_hash, date_joined) VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&password_hash)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(AppError::database)?;

    info!(user_id = user.id, username = %user.username, "user signed up");

    let token = jwt::create_token(user.id, &settings.jwt_secret, settings.token_ttl_hours)
        .map_err(|_| AppError::InternalServerError)?;

    Ok((
        jar.add(session_cookie(token)),
        Redirect::to(&urls::Route::Index.path()),
    )
        .into_response())
}

pub async fn login_page(Query(params): Query<NextParam>) -> impl IntoResponse {
    Page::new(
        templates::LOGIN,
        AuthPageContext {
            form: AuthFormView::default(),
            next: params.next,
        },
    )
}

pub async fn login(
    State(pool): State<SqlitePool>,
    State(settings): State<Settings>,
    jar: CookieJar,
    Form(payload): Form<LoginForm>,
) -> Result<Response, AppError> {
    let username = payload.username.trim().to_string();

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(&username)
        .fetch_optional(&pool)
        .await
        .map_err(AppError::database)?;

    let verified = user
        .filter(|user| utils::verify_password(&user.password_hash, &payload.password).is_ok());

    let Some(user) = verified else {
        let mut errors = FormErrors::default();
        errors.add(
            FormErrors::NON_FIELD,
            "Please enter a correct username and password.",
        );
        return Ok(Page::new(
            templates::LOGIN,
            AuthPageContext {
                form: AuthFormView {
                    username,
                    email: None,
                    errors,
                },
                next: payload.next,
            },
        )
        .into_response());
    };

    let token = jwt::create_token(user.id, &settings.jwt_secret, settings.token_ttl_hours)
        .map_err(|_| AppError::InternalServerError)?;

    info!(user_id = user.id, "user logged in");

    let next = urls::safe_next(payload.next.as_deref());
    Ok((jar.add(session_cookie(token)), Redirect::to(&next)).into_response())
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(Cookie::build(jwt::TOKEN_COOKIE).path("/")),
        Page::new(templates::LOGGED_OUT, serde_json::json!({})),
    )
}
