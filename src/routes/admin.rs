use crate::{AppState, handlers};
use axum::{Router, routing::put};

/// Admin Router Module
///
/// Nested under `/admin`. Handlers extract `AuthUser` themselves and the
/// guard refuses anyone who is not an admin.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // PUT /admin/users/{id}/role
        // Promotes or demotes a user. Unknown roles fail deserialization (422).
        .route("/users/{id}/role", put(handlers::assign_role))
}
