use axum::{
    extract::FromRequest,
    response::{IntoResponse, Response},
};

use crate::error::AppError;

/// Json
///
/// `axum::Json` with its rejection routed through `AppError`, so a body that
/// fails to deserialize answers with the same JSON error shape as every
/// other failure (422 with a `detail` list for data errors).
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T> IntoResponse for Json<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}
