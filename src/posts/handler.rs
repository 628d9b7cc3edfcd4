use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use sqlx::SqlitePool;
use tracing::{error, info};
use validator::Validate;

use crate::{
    auth::{handler::get_user_by_username, CurrentUser},
    comments::{handler::comments_for_post, CommentFormView},
    config::settings::Settings,
    error::AppError,
    follows::handler::is_following,
    forms::{FormData, FormErrors, UploadedFile},
    groups, media,
    pagination::{PageObj, PageParams, Paginator, POSTS_PER_PAGE},
    posts::{
        GroupContext, IndexContext, PostDetailContext, PostFilter, PostForm, PostFormContext,
        PostFormView, PostFromDb, PostId, PostResponse, ProfileAuthor, ProfileContext,
    },
    response::{templates, Page},
    urls::Route,
};

const POST_SELECT: &str = r#"
    SELECT
        p.id, p.text, p.image, p.created,
        p.author_id, u.username AS author_username,
        p.group_id, g.title AS group_title, g.slug AS group_slug
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

pub async fn index(
    State(pool): State<SqlitePool>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page_obj = fetch_post_page(&pool, PostFilter::All, params.page.as_deref()).await?;

    Ok(Page::new(
        templates::INDEX,
        IndexContext {
            index: true,
            page_obj,
        },
    ))
}

pub async fn group_posts(
    State(pool): State<SqlitePool>,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let group = groups::get_by_slug(&pool, &slug).await?;
    let page_obj =
        fetch_post_page(&pool, PostFilter::Group(group.id), params.page.as_deref()).await?;

    Ok(Page::new(templates::GROUP_LIST, GroupContext { group, page_obj }))
}

pub async fn profile(
    State(pool): State<SqlitePool>,
    viewer: Option<CurrentUser>,
    Path(username): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let author = get_user_by_username(&pool, &username).await?;
    let page_obj =
        fetch_post_page(&pool, PostFilter::Author(author.id), params.page.as_deref()).await?;

    let following = match &viewer {
        Some(viewer) => is_following(&pool, viewer.id, author.id).await?,
        None => false,
    };
    let is_not_author = viewer.as_ref().map_or(true, |viewer| viewer.id != author.id);

    Ok(Page::new(
        templates::PROFILE,
        ProfileContext {
            author: ProfileAuthor {
                id: author.id,
                username: author.username,
                posts_count: page_obj.count,
            },
            following,
            is_not_author,
            page_obj,
        },
    ))
}

pub async fn post_detail(
    State(pool): State<SqlitePool>,
    viewer: Option<CurrentUser>,
    PostId(post_id): PostId,
) -> Result<impl IntoResponse, AppError> {
    let context =
        post_detail_context(&pool, post_id, viewer.as_ref(), CommentFormView::default()).await?;

    Ok(Page::new(templates::POST_DETAIL, context))
}

pub async fn create_post_page(
    State(pool): State<SqlitePool>,
    _user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    render_post_form(&pool, PostFormView::default(), None).await
}

pub async fn create_post(
    State(pool): State<SqlitePool>,
    State(settings): State<Settings>,
    user: CurrentUser,
    mut form: FormData,
) -> Result<Response, AppError> {
    let submission = PostForm::from_form_data(&form);
    let upload = form.take_file("image");

    let (errors, group_id) = validate_post_form(&pool, &submission, upload.as_ref()).await?;
    if !errors.is_empty() {
        let view = PostFormView {
            text: submission.text,
            group: submission.group,
            image: None,
            errors,
        };
        return Ok(render_post_form(&pool, view, None).await?.into_response());
    }

    let image = match &upload {
        Some(file) => Some(save_upload(&settings, file).await?),
        None => None,
    };

    let inserted = sqlx::query_scalar(
        "INSERT INTO posts (text, author_id, group_id, image, created) VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&submission.text)
    .bind(user.id)
    .bind(group_id)
    .bind(&image)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await;

    let post_id: i64 = match inserted {
        Ok(post_id) => post_id,
        Err(e) => {
            discard_upload(&settings, image.as_deref()).await;
            return Err(AppError::database(e));
        }
    };

    info!(post_id, author_id = user.id, "post created");

    Ok(Redirect::to(
        &Route::Profile {
            username: user.username,
        }
        .path(),
    )
    .into_response())
}

pub async fn edit_post_page(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    PostId(post_id): PostId,
) -> Result<Response, AppError> {
    let post = get_post(&pool, post_id).await?;
    if post.author.id != user.id {
        return Ok(redirect_to_detail(post_id));
    }

    let view = PostFormView {
        text: post.text,
        group: post.group.map(|g| g.id.to_string()),
        image: post.image,
        errors: FormErrors::default(),
    };
    Ok(render_post_form(&pool, view, Some(post_id))
        .await?
        .into_response())
}

pub async fn edit_post(
    State(pool): State<SqlitePool>,
    State(settings): State<Settings>,
    user: CurrentUser,
    PostId(post_id): PostId,
    mut form: FormData,
) -> Result<Response, AppError> {
    let post = get_post(&pool, post_id).await?;
    if post.author.id != user.id {
        return Ok(redirect_to_detail(post_id));
    }

    let submission = PostForm::from_form_data(&form);
    let upload = form.take_file("image");

    let (errors, group_id) = validate_post_form(&pool, &submission, upload.as_ref()).await?;
    if !errors.is_empty() {
        let view = PostFormView {
            text: submission.text,
            group: submission.group,
            image: post.image,
            errors,
        };
        return Ok(render_post_form(&pool, view, Some(post_id))
            .await?
            .into_response());
    }

    let uploaded = match &upload {
        Some(file) => Some(save_upload(&settings, file).await?),
        None => None,
    };
    let image = match &uploaded {
        Some(stored) => Some(stored.clone()),
        None if submission.clear_image => None,
        None => post.image,
    };

    let updated =
        sqlx::query("UPDATE posts SET text = ?, group_id = ?, image = ?, author_id = ? WHERE id = ?")
            .bind(&submission.text)
            .bind(group_id)
            .bind(&image)
            .bind(user.id)
            .bind(post_id)
            .execute(&pool)
            .await;

    if let Err(e) = updated {
        discard_upload(&settings, uploaded.as_deref()).await;
        return Err(AppError::database(e));
    }

    info!(post_id, "post updated");

    Ok(redirect_to_detail(post_id))
}

fn redirect_to_detail(post_id: i64) -> Response {
    Redirect::to(&Route::PostDetail { post_id }.path()).into_response()
}

async fn save_upload(settings: &Settings, file: &UploadedFile) -> Result<String, AppError> {
    media::store_image(&settings.media_root, file)
        .await
        .map_err(|e| {
            error!("Failed to store uploaded image: {:?}", e);
            AppError::InternalServerError
        })
}

/// Removes an upload whose post row was never written.
async fn discard_upload(settings: &Settings, stored: Option<&str>) {
    let Some(stored) = stored else {
        return;
    };
    if let Err(e) = media::remove_image(&settings.media_root, stored).await {
        error!("Failed to remove orphaned upload {}: {:?}", stored, e);
    }
}

/// Checks a post submission; returns the field errors and the chosen group id.
async fn validate_post_form(
    pool: &SqlitePool,
    form: &PostForm,
    upload: Option<&UploadedFile>,
) -> Result<(FormErrors, Option<i64>), AppError> {
    let mut errors = match form.validate() {
        Ok(()) => FormErrors::default(),
        Err(e) => FormErrors::from(e),
    };

    let mut group_id = None;
    if let Some(raw) = &form.group {
        match raw.parse::<i64>() {
            Ok(id) if groups::exists(pool, id).await? => group_id = Some(id),
            _ => errors.add(
                "group",
                "Select a valid choice. That choice is not one of the available choices.",
            ),
        }
    }

    if let Some(file) = upload {
        if !media::is_image(&file.bytes) {
            errors.add("image", media::INVALID_IMAGE);
        }
    }

    Ok((errors, group_id))
}

async fn render_post_form(
    pool: &SqlitePool,
    form: PostFormView,
    editing: Option<i64>,
) -> Result<Page<PostFormContext>, AppError> {
    let groups = groups::all(pool).await?;

    Ok(Page::new(
        templates::CREATE_POST,
        PostFormContext {
            form,
            groups,
            is_edit: editing.map(|_| true),
            post_id: editing,
        },
    ))
}

pub(crate) async fn get_post(pool: &SqlitePool, post_id: i64) -> Result<PostResponse, AppError> {
    let query_str = format!("{POST_SELECT} WHERE p.id = ?");

    let row = sqlx::query_as::<_, PostFromDb>(&query_str)
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::database)?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(PostResponse::from(row))
}

/// One page of posts, newest first.
pub(crate) async fn fetch_post_page(
    pool: &SqlitePool,
    filter: PostFilter,
    page: Option<&str>,
) -> Result<PageObj<PostResponse>, AppError> {
    let count_str = format!("SELECT COUNT(*) FROM posts p {}", filter.where_clause());
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_str);
    if let Some(param) = filter.param() {
        count_query = count_query.bind(param);
    }
    let count = count_query
        .fetch_one(pool)
        .await
        .map_err(AppError::database)?;

    let paginator = Paginator::new(count, POSTS_PER_PAGE);
    let number = paginator.page_number(page);

    let query_str = format!(
        "{POST_SELECT} {} ORDER BY p.created DESC, p.id DESC LIMIT ? OFFSET ?",
        filter.where_clause()
    );
    let mut query = sqlx::query_as::<_, PostFromDb>(&query_str);
    if let Some(param) = filter.param() {
        query = query.bind(param);
    }
    let rows = query
        .bind(paginator.limit())
        .bind(paginator.offset(number))
        .fetch_all(pool)
        .await
        .map_err(AppError::database)?;

    let posts = rows.into_iter().map(PostResponse::from).collect();
    Ok(paginator.page(number, posts))
}

pub(crate) async fn post_detail_context(
    pool: &SqlitePool,
    post_id: i64,
    viewer: Option<&CurrentUser>,
    form: CommentFormView,
) -> Result<PostDetailContext, AppError> {
    let post = get_post(pool, post_id).await?;

    let author_posts_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ?")
            .bind(post.author.id)
            .fetch_one(pool)
            .await
            .map_err(AppError::database)?;

    let comments = comments_for_post(pool, post_id).await?;
    let is_author_of_post = viewer.is_some_and(|viewer| viewer.id == post.author.id);

    Ok(PostDetailContext {
        post,
        author_posts_count,
        is_author_of_post,
        form,
        comments,
    })
}
