use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{NewPhoto, Photo, PresignedUrlRequest, PresignedUrlResponse},
    repository::Repository,
    storage::{self, StorageService},
};

/// presign_upload
///
/// Issues a short-lived upload URL for a new photo of the actor. The returned
/// `resource_key` is what the client registers afterwards through
/// `register_photo`.
pub async fn presign_upload(
    storage: &dyn StorageService,
    actor: &AuthUser,
    request: PresignedUrlRequest,
) -> AppResult<PresignedUrlResponse> {
    if !request.file_type.starts_with("image/") {
        return Err(AppError::invalid("file_type", "Only image uploads are accepted."));
    }

    let key = storage::photo_object_key(actor.id, &request.filename);
    let upload_url = storage.presign_photo_upload(&key, &request.file_type).await?;

    tracing::debug!(user_id = actor.id, key = %key, "Presigned photo upload");
    Ok(PresignedUrlResponse {
        upload_url,
        resource_key: key,
    })
}

/// Records an uploaded photo as owned by the actor.
pub async fn register_photo(
    repo: &dyn Repository,
    actor: &AuthUser,
    filename: &str,
) -> AppResult<Photo> {
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(AppError::invalid("filename", "Filename is required."));
    }

    let photo = repo
        .create_photo(NewPhoto {
            filename: filename.to_string(),
            user_id: actor.id,
        })
        .await?;

    tracing::info!(photo_id = photo.id, user_id = actor.id, "Photo registered");
    Ok(photo)
}

pub async fn show_photo(repo: &dyn Repository, id: i64) -> AppResult<Photo> {
    repo.get_photo(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Photo with the id {id} is not available")))
}
