use crate::{
    error::{AppError, AppResult},
    models::Notification,
    repository::Repository,
};

/// Number of characters of a reply quoted in the notification sent to the
/// parent comment's author.
pub const PREVIEW_CHARS: usize = 50;

/// NotificationDraft
///
/// A notification that has been emitted but not yet written. The repository
/// persists it in the same transaction as the comment write that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub user_id: i64,
    pub content: String,
}

/// Creates a notification for `target_user_id`. Has no side effects of its own.
pub fn emit(target_user_id: i64, content: impl Into<String>) -> AppResult<NotificationDraft> {
    let content = content.into();
    if content.trim().is_empty() {
        return Err(AppError::Internal(
            "refusing to emit an empty notification".to_string(),
        ));
    }
    Ok(NotificationDraft {
        user_id: target_user_id,
        content,
    })
}

/// First `PREVIEW_CHARS` characters of a comment body.
pub fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

/// Notice for the author of a comment that just received a reply.
pub fn reply_notice(
    parent_author_id: i64,
    replier_name: &str,
    reply_content: &str,
    blog_title: &str,
) -> AppResult<NotificationDraft> {
    emit(
        parent_author_id,
        format!(
            "{} replied to your comment on \"{}\": {}",
            replier_name,
            blog_title,
            preview(reply_content)
        ),
    )
}

/// Notice for the author of a comment removed by a moderator or admin.
pub fn removal_notice(comment_author_id: i64, blog_title: &str) -> AppResult<NotificationDraft> {
    emit(
        comment_author_id,
        format!(
            "Your comment on \"{}\" was removed for violating the community guidelines.",
            blog_title
        ),
    )
}

/// All notifications addressed to `user_id`, oldest first.
pub async fn list_for_user(repo: &dyn Repository, user_id: i64) -> AppResult<Vec<Notification>> {
    repo.notifications_for_user(user_id).await
}
