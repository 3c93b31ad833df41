use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::roles::{Identity, Owned, Role};

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Canonical identity record from the `users` table. The password hash never
/// leaves the server: responses use `UserView` instead.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

impl User {
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

impl Owned for User {
    fn owner_id(&self) -> i64 {
        self.id
    }
}

impl Identity for User {
    fn id(&self) -> i64 {
        self.id
    }

    fn role(&self) -> Role {
        self.role
    }
}

/// UserView
///
/// Public projection of a user. Also used as the denormalized author carried by
/// every comment tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Blog
///
/// Raw row from the `blogs` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Blog {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub user_id: i64,
    pub photo_id: Option<i64>,
}

impl Owned for Blog {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

/// BlogView
///
/// A blog with its creator and categories resolved, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BlogView {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub photo_id: Option<i64>,
    pub creator: UserView,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, TS, ToSchema)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Photo
///
/// A reference to an uploaded object. The filename is the opaque storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, TS, ToSchema)]
#[ts(export)]
pub struct Photo {
    pub id: i64,
    pub filename: String,
    pub user_id: i64,
}

impl Owned for Photo {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

/// Comment
///
/// Raw row from the `comments` table. `parent_id` is a weak self-reference
/// resolved by id, never an embedded pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, TS, ToSchema)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub blog_id: i64,
    pub user_id: i64,
    pub is_moderated: bool,
    pub parent_id: Option<i64>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Owned for Comment {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

/// CommentRecord
///
/// A comment joined with its author, in store order. Input of the tree builder.
#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub comment: Comment,
    pub author: UserView,
}

/// Notification
///
/// Raw row from the `notifications` table. Never updated after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, TS, ToSchema)]
#[ts(export)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub comment_id: Option<i64>,
}

// --- Persistence Inputs ---

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewBlog {
    pub title: String,
    pub body: String,
    pub user_id: i64,
    pub photo_id: Option<i64>,
    pub category_names: Vec<String>,
}

/// Full replacement of a blog's editable fields.
#[derive(Debug, Clone)]
pub struct BlogChanges {
    pub title: String,
    pub body: String,
    pub photo_id: Option<i64>,
    pub category_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub blog_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub filename: String,
    pub user_id: i64,
}

// --- Request Payloads (Input Schemas) ---

/// CreateUserRequest
///
/// Input payload for public registration (POST /user).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// LoginForm
///
/// Form-encoded credentials for POST /login. `username` carries the email.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// UpdateRoleRequest
///
/// Admin-only role assignment. An unknown role string fails deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

/// BlogRequest
///
/// Input payload for creating (POST /blog) and replacing (PUT /blog/{id}) a blog.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BlogRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub category_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateCategoryRequest {
    pub name: String,
}

/// CreateCommentRequest
///
/// Input payload for posting a comment. `parent_id` makes it a reply.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatePhotoRequest {
    pub filename: String,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived photo upload URL (POST /photos/presigned).
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "cake.jpg")]
    pub filename: String,
    /// The MIME type the upload is constrained to.
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

/// PresignedUrlResponse
///
/// The temporary upload URL and the object key to register afterwards via POST /photos.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    pub resource_key: String,
}
