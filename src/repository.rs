use crate::{
    error::{AppError, AppResult},
    models::{
        Blog, BlogChanges, Category, Comment, CommentRecord, NewBlog, NewComment, NewPhoto,
        NewUser, Notification, Photo, User, UserView,
    },
    notifications::NotificationDraft,
    roles::Role,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::sync::Arc;

/// Repository Trait
///
/// The persistence contract the core operations are written against. Handlers
/// receive it as an explicitly constructed `RepositoryState` and pass
/// `&dyn Repository` into each operation; there is no global handle.
///
/// Operations that write more than one row (a comment plus the notification it
/// triggers, a blog plus its categories) are single calls so an implementation
/// can run them in one transaction.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn get_user(&self, id: i64) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn find_user_by_name(&self, name: &str) -> AppResult<Option<User>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn set_user_role(&self, id: i64, role: Role) -> AppResult<Option<User>>;
    /// Removes the user and everything they own.
    async fn delete_user(&self, id: i64) -> AppResult<bool>;

    // --- Blogs ---
    /// Inserts the blog, creating any category names that do not exist yet.
    async fn create_blog(&self, blog: NewBlog) -> AppResult<Blog>;
    async fn get_blog(&self, id: i64) -> AppResult<Option<Blog>>;
    async fn list_blogs(&self) -> AppResult<Vec<Blog>>;
    async fn update_blog(&self, id: i64, changes: BlogChanges) -> AppResult<Option<Blog>>;
    /// Removes the blog with its comments and their notifications.
    async fn delete_blog(&self, id: i64) -> AppResult<bool>;
    async fn blog_categories(&self, blog_id: i64) -> AppResult<Vec<Category>>;

    // --- Categories ---
    async fn list_categories(&self) -> AppResult<Vec<Category>>;
    async fn find_category(&self, name: &str) -> AppResult<Option<Category>>;
    /// Fails with `AppError::Integrity` when the name is taken.
    async fn create_category(&self, name: &str) -> AppResult<Category>;
    async fn blogs_in_category(&self, category_id: i64) -> AppResult<Vec<Blog>>;

    // --- Photos ---
    async fn create_photo(&self, photo: NewPhoto) -> AppResult<Photo>;
    async fn get_photo(&self, id: i64) -> AppResult<Option<Photo>>;

    // --- Comments ---
    async fn get_comment(&self, id: i64) -> AppResult<Option<Comment>>;
    /// Every comment of a blog joined with its author, id ascending.
    async fn comments_for_blog(&self, blog_id: i64) -> AppResult<Vec<CommentRecord>>;
    /// Inserts the comment and, when given, a notification referencing it.
    async fn create_comment(
        &self,
        comment: NewComment,
        notice: Option<NotificationDraft>,
    ) -> AppResult<Comment>;
    /// Flips `is_moderated` from false to true. Returns `None` when the comment
    /// is missing or was already moderated.
    async fn mark_moderated(&self, id: i64) -> AppResult<Option<Comment>>;
    /// Writes the notice (not linked to the comment), then removes the comment,
    /// its replies, and every notification referencing any of them.
    async fn delete_comment(&self, id: i64, notice: Option<NotificationDraft>) -> AppResult<bool>;

    // --- Notifications ---
    /// Notifications addressed to `user_id`, oldest first.
    async fn notifications_for_user(&self, user_id: i64) -> AppResult<Vec<Notification>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Foreign keys carry the
/// cascades (see `migrations/`).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("migration failed: {e}")))
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role";
const BLOG_COLUMNS: &str = "id, title, body, user_id, photo_id";
const COMMENT_COLUMNS: &str = "id, content, blog_id, user_id, is_moderated, parent_id, created_at";

/// Maps a unique violation to `AppError::Integrity`, anything else to `Database`.
fn unique_or_db(err: sqlx::Error, message: impl FnOnce(Option<&str>) -> String) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::Integrity(message(db_err.constraint()));
        }
    }
    AppError::Database(err)
}

/// Maps a foreign key violation on a comment insert to the `NotFound` of the
/// row that disappeared, anything else to `Database`.
fn missing_comment_target(err: sqlx::Error, blog_id: i64) -> AppError {
    let constraint = match &err {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            Some(db_err.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    };
    let Some(constraint) = constraint else {
        return AppError::Database(err);
    };

    if constraint.contains("parent_id") {
        AppError::NotFound("Parent comment not found.".to_string())
    } else if constraint.contains("blog_id") {
        AppError::NotFound(format!("Blog with the id {blog_id} is not available"))
    } else {
        AppError::Database(err)
    }
}

#[derive(FromRow)]
struct CommentWithAuthorRow {
    id: i64,
    content: String,
    blog_id: i64,
    user_id: i64,
    is_moderated: bool,
    parent_id: Option<i64>,
    created_at: DateTime<Utc>,
    author_name: String,
    author_email: String,
    #[sqlx(try_from = "String")]
    author_role: Role,
}

impl From<CommentWithAuthorRow> for CommentRecord {
    fn from(row: CommentWithAuthorRow) -> Self {
        CommentRecord {
            author: UserView {
                id: row.user_id,
                name: row.author_name,
                email: row.author_email,
                role: row.author_role,
            },
            comment: Comment {
                id: row.id,
                content: row.content,
                blog_id: row.blog_id,
                user_id: row.user_id,
                is_moderated: row.is_moderated,
                parent_id: row.parent_id,
                created_at: row.created_at,
            },
        }
    }
}

/// Upserts every category name and links them to the blog.
async fn link_categories(
    tx: &mut Transaction<'_, Postgres>,
    blog_id: i64,
    names: &[String],
) -> AppResult<()> {
    for name in names {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name) VALUES ($1)
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
             RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO blog_categories (blog_id, category_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(blog_id)
        .bind(category.id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_notification(
    tx: &mut Transaction<'_, Postgres>,
    notice: &NotificationDraft,
    comment_id: Option<i64>,
) -> AppResult<()> {
    sqlx::query("INSERT INTO notifications (user_id, content, comment_id) VALUES ($1, $2, $3)")
        .bind(notice.user_id)
        .bind(&notice.content)
        .bind(comment_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash, role) VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            unique_or_db(e, |constraint| match constraint {
                Some(c) if c.contains("email") => "Email already registered".to_string(),
                _ => "The name is taken.".to_string(),
            })
        })
    }

    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_user_by_name(&self, name: &str) -> AppResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn set_user_role(&self, id: i64, role: Role) -> AppResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_user(&self, id: i64) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- BLOGS ---

    async fn create_blog(&self, blog: NewBlog) -> AppResult<Blog> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Blog>(&format!(
            "INSERT INTO blogs (title, body, user_id, photo_id) VALUES ($1, $2, $3, $4)
             RETURNING {BLOG_COLUMNS}"
        ))
        .bind(&blog.title)
        .bind(&blog.body)
        .bind(blog.user_id)
        .bind(blog.photo_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_or_db(e, |_| "Photo is already attached to another blog.".to_string()))?;

        link_categories(&mut tx, created.id, &blog.category_names).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn get_blog(&self, id: i64) -> AppResult<Option<Blog>> {
        Ok(
            sqlx::query_as::<_, Blog>(&format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_blogs(&self) -> AppResult<Vec<Blog>> {
        Ok(
            sqlx::query_as::<_, Blog>(&format!("SELECT {BLOG_COLUMNS} FROM blogs ORDER BY id"))
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn update_blog(&self, id: i64, changes: BlogChanges) -> AppResult<Option<Blog>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Blog>(&format!(
            "UPDATE blogs SET title = $2, body = $3, photo_id = COALESCE($4, photo_id)
             WHERE id = $1 RETURNING {BLOG_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.body)
        .bind(changes.photo_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| unique_or_db(e, |_| "Photo is already attached to another blog.".to_string()))?;

        let Some(updated) = updated else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM blog_categories WHERE blog_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        link_categories(&mut tx, id, &changes.category_names).await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn delete_blog(&self, id: i64) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM blogs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn blog_categories(&self, blog_id: i64) -> AppResult<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            "SELECT c.id, c.name FROM categories c
             JOIN blog_categories bc ON bc.category_id = c.id
             WHERE bc.blog_id = $1 ORDER BY c.id",
        )
        .bind(blog_id)
        .fetch_all(&self.pool)
        .await?)
    }

    // --- CATEGORIES ---

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        Ok(
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn find_category(&self, name: &str) -> AppResult<Option<Category>> {
        Ok(
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_category(&self, name: &str) -> AppResult<Category> {
        sqlx::query_as::<_, Category>("INSERT INTO categories (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_or_db(e, |_| "Category already exists.".to_string()))
    }

    async fn blogs_in_category(&self, category_id: i64) -> AppResult<Vec<Blog>> {
        Ok(sqlx::query_as::<_, Blog>(
            "SELECT b.id, b.title, b.body, b.user_id, b.photo_id FROM blogs b
             JOIN blog_categories bc ON bc.blog_id = b.id
             WHERE bc.category_id = $1 ORDER BY b.id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?)
    }

    // --- PHOTOS ---

    async fn create_photo(&self, photo: NewPhoto) -> AppResult<Photo> {
        Ok(sqlx::query_as::<_, Photo>(
            "INSERT INTO photos (filename, user_id) VALUES ($1, $2) RETURNING id, filename, user_id",
        )
        .bind(&photo.filename)
        .bind(photo.user_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_photo(&self, id: i64) -> AppResult<Option<Photo>> {
        Ok(
            sqlx::query_as::<_, Photo>("SELECT id, filename, user_id FROM photos WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    // --- COMMENTS ---

    async fn get_comment(&self, id: i64) -> AppResult<Option<Comment>> {
        Ok(sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn comments_for_blog(&self, blog_id: i64) -> AppResult<Vec<CommentRecord>> {
        let rows = sqlx::query_as::<_, CommentWithAuthorRow>(
            r#"
            SELECT
                c.id, c.content, c.blog_id, c.user_id, c.is_moderated, c.parent_id, c.created_at,
                u.name AS author_name, u.email AS author_email, u.role AS author_role
            FROM comments c
            JOIN users u ON c.user_id = u.id
            WHERE c.blog_id = $1
            ORDER BY c.id ASC
            "#,
        )
        .bind(blog_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn create_comment(
        &self,
        comment: NewComment,
        notice: Option<NotificationDraft>,
    ) -> AppResult<Comment> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (content, blog_id, user_id, parent_id) VALUES ($1, $2, $3, $4)
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(&comment.content)
        .bind(comment.blog_id)
        .bind(comment.user_id)
        .bind(comment.parent_id)
        .fetch_one(&mut *tx)
        .await
        // The parent may be deleted between the caller's check and this insert.
        .map_err(|e| missing_comment_target(e, comment.blog_id))?;

        if let Some(notice) = &notice {
            insert_notification(&mut tx, notice, Some(created.id)).await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn mark_moderated(&self, id: i64) -> AppResult<Option<Comment>> {
        // Compare-and-set: of two concurrent moderators only one gets a row back.
        Ok(sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET is_moderated = true
             WHERE id = $1 AND is_moderated = false
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_comment(&self, id: i64, notice: Option<NotificationDraft>) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        if let Some(notice) = &notice {
            insert_notification(&mut tx, notice, None).await?;
        }

        // Replies and linked notifications go with it via ON DELETE CASCADE.
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if res.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    // --- NOTIFICATIONS ---

    async fn notifications_for_user(&self, user_id: i64) -> AppResult<Vec<Notification>> {
        Ok(sqlx::query_as::<_, Notification>(
            "SELECT id, user_id, content, created_at, comment_id FROM notifications
             WHERE user_id = $1 ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
