use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Registration, login and every read-only view of blogs, categories,
/// photos and comments.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // --- Identity ---
        .route("/login", post(handlers::login))
        .route("/user", post(handlers::register_user))
        .route("/user/{id}", get(handlers::get_user))
        // --- Blogs ---
        // GET /blog?sort=asc|desc
        // Lists blogs, optionally ordered by body length.
        .route("/blog", get(handlers::list_blogs))
        .route("/blog/{id}", get(handlers::get_blog))
        // GET /blog/{id}/comments
        // Threaded comments. Guests and anonymous visitors only see moderated ones.
        .route("/blog/{id}/comments", get(handlers::get_comments))
        // --- Categories ---
        .route("/category", get(handlers::list_categories))
        .route("/category/{name}/blogs", get(handlers::category_blogs))
        // --- Photos ---
        .route("/photos/{id}", get(handlers::get_photo))
}
