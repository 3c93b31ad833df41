use crate::{
    AppState,
    auth::{self, AuthUser, Viewer},
    blogs::{self, BlogFilter},
    comment_tree::CommentNode,
    error::AppResult,
    extract::Json,
    models::{
        BlogRequest, BlogView, Category, Comment, CreateCategoryRequest, CreateCommentRequest,
        CreatePhotoRequest, CreateUserRequest, LoginForm, Notification, Photo,
        PresignedUrlRequest, PresignedUrlResponse, TokenResponse, UpdateRoleRequest, UserView,
    },
    moderation, notifications, photos, users,
};
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
};

// --- Authentication & Users ---

/// login
///
/// [Public Route] OAuth2-style password login. The form's `username` field
/// carries the email address.
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Access token", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Json<TokenResponse>> {
    let token = auth::login(
        state.repo.as_ref(),
        &state.config,
        &form.username,
        &form.password,
    )
    .await?;
    Ok(Json(token))
}

/// register_user
///
/// [Public Route] Creates a guest account with a bcrypt-hashed password.
#[utoipa::path(
    post,
    path = "/user",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Registered", body = UserView),
        (status = 400, description = "Name or email taken"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    let user = users::register(state.repo.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/user/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<UserView>> {
    Ok(Json(users::show_user(state.repo.as_ref(), id).await?))
}

/// list_users
///
/// [Authenticated Route] Admin only.
#[utoipa::path(
    get,
    path = "/user",
    responses(
        (status = 200, description = "All users", body = [UserView]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<UserView>>> {
    Ok(Json(users::list_users(state.repo.as_ref(), &user).await?))
}

/// delete_user
///
/// [Authenticated Route] Self-service account removal, or any account for admins.
#[utoipa::path(
    delete,
    path = "/user/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not yourself and not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    users::delete_user(state.repo.as_ref(), &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// assign_role
///
/// [Admin Route] Changes a user's role. Unknown role names are rejected while
/// the body is deserialized.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated", body = UserView),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Unknown role")
    )
)]
pub async fn assign_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<Json<UserView>> {
    let updated = users::assign_role(state.repo.as_ref(), &user, id, payload.role).await?;
    Ok(Json(updated))
}

// --- Blogs ---

/// list_blogs
///
/// [Public Route] All blogs, optionally ordered by body length.
#[utoipa::path(
    get,
    path = "/blog",
    params(BlogFilter),
    responses(
        (status = 200, description = "Blogs", body = [BlogView]),
        (status = 400, description = "Invalid sort order")
    )
)]
pub async fn list_blogs(
    State(state): State<AppState>,
    Query(filter): Query<BlogFilter>,
) -> AppResult<Json<Vec<BlogView>>> {
    let order = filter.order()?;
    Ok(Json(blogs::list_blogs(state.repo.as_ref(), order).await?))
}

#[utoipa::path(
    get,
    path = "/blog/{id}",
    params(("id" = i64, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Found", body = BlogView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<BlogView>> {
    Ok(Json(blogs::show_blog(state.repo.as_ref(), id).await?))
}

/// create_blog
///
/// [Authenticated Route] The creator is always the authenticated user.
#[utoipa::path(
    post,
    path = "/blog",
    request_body = BlogRequest,
    responses(
        (status = 201, description = "Created", body = BlogView),
        (status = 403, description = "Photo owned by someone else"),
        (status = 404, description = "Photo not found"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn create_blog(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<BlogRequest>,
) -> AppResult<(StatusCode, Json<BlogView>)> {
    let blog = blogs::create_blog(state.repo.as_ref(), &user, payload).await?;
    Ok((StatusCode::CREATED, Json(blog)))
}

/// update_blog
///
/// [Authenticated Route] Owner or admin. Answers 202 Accepted.
#[utoipa::path(
    put,
    path = "/blog/{id}",
    params(("id" = i64, Path, description = "Blog ID")),
    request_body = BlogRequest,
    responses(
        (status = 202, description = "Updated", body = BlogView),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "A different photo is already attached")
    )
)]
pub async fn update_blog(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<BlogRequest>,
) -> AppResult<(StatusCode, Json<BlogView>)> {
    let blog = blogs::update_blog(state.repo.as_ref(), &user, id, payload).await?;
    Ok((StatusCode::ACCEPTED, Json(blog)))
}

/// delete_blog
///
/// [Authenticated Route] Owner or admin. Comments on the blog are removed too.
#[utoipa::path(
    delete,
    path = "/blog/{id}",
    params(("id" = i64, Path, description = "Blog ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_blog(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    blogs::delete_blog(state.repo.as_ref(), &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Categories ---

#[utoipa::path(
    get,
    path = "/category",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(blogs::list_categories(state.repo.as_ref()).await?))
}

#[utoipa::path(
    post,
    path = "/category",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 400, description = "Category already exists")
    )
)]
pub async fn create_category(
    _user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let category = blogs::create_category(state.repo.as_ref(), &payload.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    get,
    path = "/category/{name}/blogs",
    params(("name" = String, Path, description = "Category name")),
    responses(
        (status = 200, description = "Blogs in the category", body = [BlogView]),
        (status = 404, description = "Category not found")
    )
)]
pub async fn category_blogs(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<Vec<BlogView>>> {
    Ok(Json(blogs::blogs_by_category(state.repo.as_ref(), &name).await?))
}

// --- Photos ---

/// get_presigned_url
///
/// [Authenticated Route] Short-lived direct upload URL. The client PUTs the
/// file there, then registers `resource_key` through POST /photos.
#[utoipa::path(
    post,
    path = "/photos/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 422, description = "Not an image")
    )
)]
pub async fn get_presigned_url(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> AppResult<Json<PresignedUrlResponse>> {
    Ok(Json(
        photos::presign_upload(state.storage.as_ref(), &user, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/photos",
    request_body = CreatePhotoRequest,
    responses((status = 201, description = "Registered", body = Photo))
)]
pub async fn create_photo(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePhotoRequest>,
) -> AppResult<(StatusCode, Json<Photo>)> {
    let photo = photos::register_photo(state.repo.as_ref(), &user, &payload.filename).await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

#[utoipa::path(
    get,
    path = "/photos/{id}",
    params(("id" = i64, Path, description = "Photo ID")),
    responses(
        (status = 200, description = "Found", body = Photo),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Photo>> {
    Ok(Json(photos::show_photo(state.repo.as_ref(), id).await?))
}

// --- Comments ---

/// add_comment
///
/// [Authenticated Route] Posts a comment, or a reply when `parent_id` is set.
/// A reply notifies the parent's author in the same transaction.
#[utoipa::path(
    post,
    path = "/blog/{id}/comments",
    params(("id" = i64, Path, description = "Blog ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment Added", body = Comment),
        (status = 404, description = "Blog or parent comment not found"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(blog_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let comment = moderation::create_comment(state.repo.as_ref(), &user, blog_id, payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// get_comments
///
/// [Public Route] The threaded comments of a blog. Anonymous visitors and
/// guests only see moderated comments, and replies under a hidden comment are
/// hidden with it.
#[utoipa::path(
    get,
    path = "/blog/{id}/comments",
    params(("id" = i64, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Comment forest", body = [CommentNode]),
        (status = 404, description = "Blog not found")
    )
)]
pub async fn get_comments(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(blog_id): Path<i64>,
) -> AppResult<Json<Vec<CommentNode>>> {
    let forest = moderation::list_comments(state.repo.as_ref(), blog_id, viewer.role()).await?;
    Ok(Json(forest))
}

/// delete_comment
///
/// [Authenticated Route] Author, moderator or admin. Staff removals notify the
/// author.
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "insufficient permissions"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    moderation::delete_comment(state.repo.as_ref(), &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// moderate_comment
///
/// [Authenticated Route] Moderator or admin. One-way; a second call is a 409.
#[utoipa::path(
    patch,
    path = "/comments/{id}/moderate",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Moderated", body = Comment),
        (status = 403, description = "Not a moderator"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Already moderated")
    )
)]
pub async fn moderate_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Comment>> {
    Ok(Json(
        moderation::moderate_comment(state.repo.as_ref(), &user, id).await?,
    ))
}

// --- Notifications ---

/// get_notifications
///
/// [Authenticated Route] Every notification addressed to the caller, oldest
/// first. An empty inbox is an empty list.
#[utoipa::path(
    get,
    path = "/notifications",
    responses((status = 200, description = "My Notifications", body = [Notification]))
)]
pub async fn get_notifications(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Notification>>> {
    Ok(Json(
        notifications::list_for_user(state.repo.as_ref(), id).await?,
    ))
}
