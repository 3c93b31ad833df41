//! Comment lifecycle: creation, moderation and removal.
//!
//! A comment starts unmoderated and can only move to moderated. Every check
//! runs before the first write, so a rejected request never leaves a partial
//! comment or a dangling notification behind.

use crate::{
    auth::AuthUser,
    comment_tree::{self, CommentNode, MAX_REPLY_DEPTH},
    error::{AppError, AppResult},
    guard::{self, Operation},
    models::{Comment, CreateCommentRequest, NewComment},
    notifications,
    repository::Repository,
    roles::{Role, is_admin, is_moderator, is_owner},
};

pub const ALREADY_MODERATED: &str = "Comment is already moderated.";

fn blog_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Blog with the id {id} is not available"))
}

fn comment_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Comment with the id {id} is not available"))
}

/// Nesting level of `comment` (1 for a top-level comment). Stops counting at
/// `MAX_REPLY_DEPTH`, so a broken parent chain is never walked further.
async fn thread_depth(repo: &dyn Repository, comment: &Comment) -> AppResult<usize> {
    let mut depth = 1;
    let mut next = comment.parent_id;

    while let Some(parent_id) = next {
        if depth >= MAX_REPLY_DEPTH {
            break;
        }
        match repo.get_comment(parent_id).await? {
            Some(parent) => {
                depth += 1;
                next = parent.parent_id;
            }
            None => break,
        }
    }
    Ok(depth)
}

/// create_comment
///
/// Posts a comment on `blog_id`, optionally as a reply. A reply notifies the
/// parent's author with the replier's name, the blog title and a preview of
/// the reply. The notification is written together with the comment.
pub async fn create_comment(
    repo: &dyn Repository,
    actor: &AuthUser,
    blog_id: i64,
    request: CreateCommentRequest,
) -> AppResult<Comment> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(AppError::invalid("content", "Content is required."));
    }

    let blog = repo
        .get_blog(blog_id)
        .await?
        .ok_or_else(|| blog_not_found(blog_id))?;

    let notice = match request.parent_id {
        None => None,
        Some(parent_id) => {
            let parent = repo
                .get_comment(parent_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Parent comment not found.".to_string()))?;

            if parent.blog_id != blog.id {
                return Err(AppError::invalid(
                    "parent_id",
                    "Parent comment belongs to a different blog.",
                ));
            }

            if thread_depth(repo, &parent).await? >= MAX_REPLY_DEPTH {
                return Err(AppError::invalid(
                    "parent_id",
                    format!("Replies can be nested at most {MAX_REPLY_DEPTH} levels deep."),
                ));
            }

            Some(notifications::reply_notice(
                parent.user_id,
                &actor.name,
                content,
                &blog.title,
            )?)
        }
    };

    let comment = repo
        .create_comment(
            NewComment {
                content: content.to_string(),
                blog_id: blog.id,
                user_id: actor.id,
                parent_id: request.parent_id,
            },
            notice,
        )
        .await?;

    tracing::info!(
        comment_id = comment.id,
        blog_id = blog.id,
        parent_id = ?comment.parent_id,
        "Comment created"
    );
    Ok(comment)
}

/// list_comments
///
/// The threaded comment forest of a blog as seen by `viewer` (`None` is an
/// anonymous visitor, filtered like a guest).
pub async fn list_comments(
    repo: &dyn Repository,
    blog_id: i64,
    viewer: Option<Role>,
) -> AppResult<Vec<CommentNode>> {
    if repo.get_blog(blog_id).await?.is_none() {
        return Err(blog_not_found(blog_id));
    }

    let records = repo.comments_for_blog(blog_id).await?;
    let forest = comment_tree::build_tree(&records, viewer);

    tracing::debug!(
        blog_id,
        stored = records.len(),
        visible = comment_tree::count_nodes(&forest),
        "Built comment tree"
    );
    Ok(forest)
}

/// moderate_comment
///
/// unmoderated -> moderated. Only moderators and admins may do this; the
/// transition is terminal, so a second attempt is a conflict. The store-level
/// write is a compare-and-set, which makes two racing requests resolve to one
/// success and one conflict.
pub async fn moderate_comment(
    repo: &dyn Repository,
    actor: &AuthUser,
    comment_id: i64,
) -> AppResult<Comment> {
    guard::require(actor, Operation::ModerateComment)?;

    let comment = repo
        .get_comment(comment_id)
        .await?
        .ok_or_else(|| comment_not_found(comment_id))?;

    if comment.is_moderated {
        return Err(AppError::Conflict(ALREADY_MODERATED.to_string()));
    }

    let moderated = repo
        .mark_moderated(comment_id)
        .await?
        .ok_or_else(|| AppError::Conflict(ALREADY_MODERATED.to_string()))?;

    tracing::info!(comment_id, moderator_id = actor.id, "Comment moderated");
    Ok(moderated)
}

/// delete_comment
///
/// Removes a comment together with its replies and every notification that
/// points at them. When a moderator or admin removes someone else's comment,
/// the author is told why, referencing the blog title.
pub async fn delete_comment(
    repo: &dyn Repository,
    actor: &AuthUser,
    comment_id: i64,
) -> AppResult<()> {
    let comment = repo
        .get_comment(comment_id)
        .await?
        .ok_or_else(|| comment_not_found(comment_id))?;

    guard::authorize(actor, &comment, Operation::DeleteComment)?;

    let removed_by_staff = (is_admin(actor) || is_moderator(actor)) && !is_owner(actor, &comment);

    let notice = if removed_by_staff {
        let blog = repo
            .get_blog(comment.blog_id)
            .await?
            .ok_or_else(|| blog_not_found(comment.blog_id))?;
        Some(notifications::removal_notice(comment.user_id, &blog.title)?)
    } else {
        None
    };

    if !repo.delete_comment(comment_id, notice).await? {
        return Err(comment_not_found(comment_id));
    }

    tracing::info!(
        comment_id,
        actor_id = actor.id,
        removed_by_staff,
        "Comment deleted"
    );
    Ok(())
}
