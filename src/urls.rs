use axum::http::uri::PathAndQuery;

/// Every named route of the site, carrying its URL parameters.
#[cfg_attr(not(test), allow(dead_code))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Index,
    GroupPosts { slug: String },
    Profile { username: String },
    PostDetail { post_id: i64 },
    PostEdit { post_id: i64 },
    PostCreate,
    AddComment { post_id: i64 },
    FollowIndex,
    ProfileFollow { username: String },
    ProfileUnfollow { username: String },
    Login,
}

impl Route {
    #[cfg(test)]
    pub fn name(&self) -> &'static str {
        match self {
            Route::Index => "posts:index",
            Route::GroupPosts { .. } => "posts:group_posts",
            Route::Profile { .. } => "posts:profile",
            Route::PostDetail { .. } => "posts:post_detail",
            Route::PostEdit { .. } => "posts:post_edit",
            Route::PostCreate => "posts:post_create",
            Route::AddComment { .. } => "posts:add_comment",
            Route::FollowIndex => "posts:follow_index",
            Route::ProfileFollow { .. } => "posts:profile_follow",
            Route::ProfileUnfollow { .. } => "posts:profile_unfollow",
            Route::Login => "users:login",
        }
    }

    /// Resolves the route to its concrete URL path, percent-encoding the
    /// username and slug segments.
    pub fn path(&self) -> String {
        match self {
            Route::Index => "/".to_string(),
            Route::GroupPosts { slug } => format!("/group/{}/", urlencoding::encode(slug)),
            Route::Profile { username } => {
                format!("/profile/{}/", urlencoding::encode(username))
            }
            Route::PostDetail { post_id } => format!("/posts/{post_id}/"),
            Route::PostEdit { post_id } => format!("/posts/{post_id}/edit/"),
            Route::PostCreate => "/create/".to_string(),
            Route::AddComment { post_id } => format!("/posts/{post_id}/comment/"),
            Route::FollowIndex => "/follow/".to_string(),
            Route::ProfileFollow { username } => {
                format!("/profile/{}/follow/", urlencoding::encode(username))
            }
            Route::ProfileUnfollow { username } => {
                format!("/profile/{}/unfollow/", urlencoding::encode(username))
            }
            Route::Login => "/auth/login/".to_string(),
        }
    }
}

/// Login page URL that sends the user back to `next` afterwards.
pub fn login_url(next: &str) -> String {
    format!("{}?next={}", Route::Login.path(), urlencoding::encode(next))
}

/// Only same-site absolute paths that are valid as a `Location` header are
/// accepted as post-login targets; anything else falls back to the index.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(next) if is_local_path(next) => next.to_string(),
        _ => Route::Index.path(),
    }
}

fn is_local_path(next: &str) -> bool {
    next.starts_with('/')
        && !next.starts_with("//")
        && next.is_ascii()
        && !next.contains('\\')
        && !next.chars().any(|c| c.is_ascii_control())
        && next.parse::<PathAndQuery>().is_ok()
}
