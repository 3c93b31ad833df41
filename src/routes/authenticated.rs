use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

/// Authenticated Router Module
///
/// Every mutation of the API. The `AuthUser` middleware layered on this
/// router rejects anonymous requests with 401 before a handler runs; whether
/// the caller may touch a particular blog, comment or user is decided by the
/// guard inside each operation.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Users ---
        // GET /user
        // Admin only.
        .route("/user", get(handlers::list_users))
        // DELETE /user/{id}
        // Yourself, or anyone for admins.
        .route("/user/{id}", delete(handlers::delete_user))
        // --- Blogs ---
        .route("/blog", post(handlers::create_blog))
        // PUT/DELETE /blog/{id}
        // Owner or admin.
        .route(
            "/blog/{id}",
            put(handlers::update_blog).delete(handlers::delete_blog),
        )
        .route("/category", post(handlers::create_category))
        // --- Photos ---
        // POST /photos/presigned
        // Issues a 10-minute upload URL; the file goes straight to object storage.
        .route("/photos/presigned", post(handlers::get_presigned_url))
        .route("/photos", post(handlers::create_photo))
        // --- Comments ---
        // POST /blog/{id}/comments
        // A reply (parent_id set) notifies the parent's author.
        .route("/blog/{id}/comments", post(handlers::add_comment))
        // DELETE /comments/{id}
        // Author, moderator or admin. Staff removals notify the author.
        .route("/comments/{id}", delete(handlers::delete_comment))
        // PATCH /comments/{id}/moderate
        // Moderator or admin; one-way.
        .route("/comments/{id}/moderate", patch(handlers::moderate_comment))
        // --- Notifications ---
        .route("/notifications", get(handlers::get_notifications))
}
