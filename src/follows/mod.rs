use serde::{Deserialize, Serialize};

use crate::{pagination::PageObj, posts::PostResponse};

pub mod handler;

/// Database model for a follow relationship
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follow {
    pub id: i64,
    pub user_id: i64,
    pub author_id: i64,
    pub created: chrono::DateTime<chrono::Utc>,
}

/// Feed of posts by followed authors
#[derive(Debug, Serialize)]
pub struct FollowContext {
    pub follow: bool,
    pub page_obj: PageObj<PostResponse>,
}
