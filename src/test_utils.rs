use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, Method, Request, StatusCode,
    },
    Router,
};
use bytes::Bytes;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::{
    app,
    auth::{jwt, User},
    cache::PageCache,
    config::settings::Settings,
    groups::Group,
    response::templates,
    urls::Route,
    AppState,
};

const SECRET: &str = "test-secret";

/// A fresh in-memory database with the router wired on top of it.
pub struct TestApp {
    pub pool: SqlitePool,
    router: Router,
    page_cache: PageCache,
    media: TempDir,
}

pub struct Upload<'a> {
    field: &'a str,
    file_name: &'a str,
    bytes: &'a [u8],
}

impl<'a> Upload<'a> {
    pub fn new(field: &'a str, file_name: &'a str, bytes: &'a [u8]) -> Self {
        Self {
            field,
            file_name,
            bytes,
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn location(&self) -> &str {
        self.headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    pub fn set_cookie(&self) -> String {
        self.headers
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();

        let media = tempfile::tempdir().unwrap();
        let settings = Settings {
            port: 0,
            addr: ([127, 0, 0, 1], 0).into(),
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: SECRET.to_string(),
            token_ttl_hours: 1,
            media_root: media.path().to_path_buf(),
            page_cache_ttl: Duration::from_secs(20),
            page_cache_max_entries: 1000,
        };
        let page_cache = PageCache::new(settings.page_cache_ttl, settings.page_cache_max_entries);
        let state = AppState {
            pool: pool.clone(),
            settings,
            page_cache: page_cache.clone(),
        };

        Self {
            pool,
            router: app(state),
            page_cache,
            media,
        }
    }

    pub fn page_cache(&self) -> &PageCache {
        &self.page_cache
    }

    pub fn media_root(&self) -> &Path {
        self.media.path()
    }

    pub fn token(&self, user_id: i64) -> String {
        jwt::create_token(user_id, SECRET, 1).unwrap()
    }

    pub async fn create_user(&self, username: &str) -> User {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, password_hash, date_joined) VALUES (?, '!', ?) RETURNING *",
        )
        .bind(username)
        .bind(chrono::Utc::now())
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    pub async fn create_group(&self, title: &str, slug: &str) -> Group {
        sqlx::query_as::<_, Group>(
            "INSERT INTO post_groups (title, slug, description) VALUES (?, ?, 'Test description') RETURNING *",
        )
        .bind(title)
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    pub async fn create_post(&self, author_id: i64, text: &str, group_id: Option<i64>) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO posts (text, author_id, group_id, created) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(text)
        .bind(author_id)
        .bind(group_id)
        .bind(chrono::Utc::now())
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(&self.pool).await.unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let mut request = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn get_with_cookie(&self, uri: &str, token: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(COOKIE, format!("{}={token}", jwt::TOKEN_COOKIE))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_form(
        &self,
        uri: &str,
        token: Option<&str>,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let mut request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(request.body(Body::from(body)).unwrap()).await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        token: &str,
        fields: &[(&str, &str)],
        upload: Option<Upload<'_>>,
    ) -> TestResponse {
        const BOUNDARY: &str = "yatube-test-boundary";

        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(upload) = upload {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    upload.field, upload.file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(upload.bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// A routable page together with the template it renders.
#[derive(Debug, Clone)]
pub struct PageInfo {
    pub route: Route,
    pub template: &'static str,
}

/// The pages reachable for a given author, group and post.
pub fn pages_info(username: &str, slug: &str, post_id: i64) -> Vec<PageInfo> {
    vec![
        PageInfo {
            route: Route::Index,
            template: templates::INDEX,
        },
        PageInfo {
            route: Route::GroupPosts {
                slug: slug.to_string(),
            },
            template: templates::GROUP_LIST,
        },
        PageInfo {
            route: Route::Profile {
                username: username.to_string(),
            },
            template: templates::PROFILE,
        },
        PageInfo {
            route: Route::PostDetail { post_id },
            template: templates::POST_DETAIL,
        },
        PageInfo {
            route: Route::PostEdit { post_id },
            template: templates::CREATE_POST,
        },
        PageInfo {
            route: Route::PostCreate,
            template: templates::CREATE_POST,
        },
    ]
}

/// Maps each page's route name to its resolved URL.
pub fn reversed_names(pages: &[PageInfo]) -> HashMap<&'static str, String> {
    pages
        .iter()
        .map(|page| (page.route.name(), page.route.path()))
        .collect()
}
