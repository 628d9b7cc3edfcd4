use std::str::FromStr;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware,
    routing::get,
    Router,
};
use dotenv::dotenv;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod auth;
mod cache;
mod comments;
mod config;
mod error;
mod follows;
mod forms;
mod groups;
mod media;
mod pagination;
mod posts;
mod response;
mod urls;

#[cfg(test)]
mod test_utils;

use cache::PageCache;
use config::settings::Settings;
use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    settings: Settings,
    page_cache: PageCache,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(app_state: &AppState) -> SqlitePool {
        app_state.pool.clone()
    }
}

impl FromRef<AppState> for Settings {
    fn from_ref(app_state: &AppState) -> Settings {
        app_state.settings.clone()
    }
}

impl FromRef<AppState> for PageCache {
    fn from_ref(app_state: &AppState) -> PageCache {
        app_state.page_cache.clone()
    }
}

fn app(state: AppState) -> Router {
    let auth_router = Router::new()
        .route(
            "/signup/",
            get(auth::handler::signup_page).post(auth::handler::signup),
        )
        .route(
            "/login/",
            get(auth::handler::login_page).post(auth::handler::login),
        )
        .route(
            "/logout/",
            get(auth::handler::logout).post(auth::handler::logout),
        );

    let index = get(posts::handler::index).layer(middleware::from_fn_with_state(
        state.page_cache.clone(),
        cache::cache_page,
    ));

    Router::new()
        .route("/", index)
        .route("/profile/:username/", get(posts::handler::profile))
        .route("/group/:slug/", get(posts::handler::group_posts))
        .route(
            "/posts/:post_id/edit/",
            get(posts::handler::edit_post_page).post(posts::handler::edit_post),
        )
        .route("/posts/:post_id/", get(posts::handler::post_detail))
        .route(
            "/create/",
            get(posts::handler::create_post_page).post(posts::handler::create_post),
        )
        .route(
            "/posts/:post_id/comment/",
            get(comments::handler::add_comment_page).post(comments::handler::add_comment),
        )
        .route("/follow/", get(follows::handler::follow_index))
        .route(
            "/profile/:username/follow/",
            get(follows::handler::profile_follow).post(follows::handler::profile_follow),
        )
        .route(
            "/profile/:username/unfollow/",
            get(follows::handler::profile_unfollow).post(follows::handler::profile_unfollow),
        )
        .nest("/auth", auth_router)
        .fallback(|| async { AppError::NotFound("Page not found".to_string()) })
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;

    let options = SqliteConnectOptions::from_str(&settings.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!().run(&pool).await?;

    info!("database connected");

    tokio::fs::create_dir_all(&settings.media_root).await?;

    let app_state = AppState {
        pool,
        page_cache: PageCache::new(settings.page_cache_ttl, settings.page_cache_max_entries),
        settings: settings.clone(),
    };

    let app = app(app_state);

    info!("Server running on http://localhost:{}", settings.port);

    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
