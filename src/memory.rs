use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{
        Blog, BlogChanges, Category, Comment, CommentRecord, NewBlog, NewComment, NewPhoto,
        NewUser, Notification, Photo, User,
    },
    notifications::NotificationDraft,
    repository::Repository,
    roles::Role,
};

/// InMemoryRepository
///
/// A `Repository` over flat in-process tables with the same uniqueness rules
/// and cascades as the Postgres schema. Used by the test suites and for
/// running the API without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    last_id: i64,
    users: BTreeMap<i64, User>,
    blogs: BTreeMap<i64, Blog>,
    categories: BTreeMap<i64, Category>,
    blog_categories: Vec<(i64, i64)>,
    photos: BTreeMap<i64, Photo>,
    comments: BTreeMap<i64, Comment>,
    notifications: BTreeMap<i64, Notification>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn ensure_category(&mut self, name: &str) -> i64 {
        if let Some(existing) = self.categories.values().find(|c| c.name == name) {
            return existing.id;
        }
        let id = self.next_id();
        self.categories.insert(
            id,
            Category {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    fn link_categories(&mut self, blog_id: i64, names: &[String]) {
        for name in names {
            let category_id = self.ensure_category(name);
            if !self.blog_categories.contains(&(blog_id, category_id)) {
                self.blog_categories.push((blog_id, category_id));
            }
        }
    }

    fn photo_taken(&self, photo_id: i64, except_blog: Option<i64>) -> bool {
        self.blogs
            .values()
            .any(|b| b.photo_id == Some(photo_id) && Some(b.id) != except_blog)
    }

    fn push_notification(&mut self, notice: &NotificationDraft, comment_id: Option<i64>) {
        let id = self.next_id();
        self.notifications.insert(
            id,
            Notification {
                id,
                user_id: notice.user_id,
                content: notice.content.clone(),
                created_at: Utc::now(),
                comment_id,
            },
        );
    }

    /// Removes the given comments with all their replies and linked notifications.
    fn remove_comments(&mut self, roots: Vec<i64>) {
        let mut doomed: HashSet<i64> = HashSet::new();
        let mut frontier = roots;

        while let Some(id) = frontier.pop() {
            if !doomed.insert(id) {
                continue;
            }
            frontier.extend(
                self.comments
                    .values()
                    .filter(|c| c.parent_id == Some(id))
                    .map(|c| c.id),
            );
        }

        self.comments.retain(|id, _| !doomed.contains(id));
        self.notifications
            .retain(|_, n| n.comment_id.is_none_or(|cid| !doomed.contains(&cid)));
    }

    fn remove_blog(&mut self, blog_id: i64) {
        let comment_ids = self
            .comments
            .values()
            .filter(|c| c.blog_id == blog_id)
            .map(|c| c.id)
            .collect();
        self.remove_comments(comment_ids);
        self.blog_categories.retain(|(b, _)| *b != blog_id);
        self.blogs.remove(&blog_id);
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- USERS ---

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.name == user.name) {
            return Err(AppError::Integrity("The name is taken.".to_string()));
        }
        if t.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Integrity("Email already registered".to_string()));
        }
        let id = t.next_id();
        let created = User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
        };
        t.users.insert(id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_name(&self, name: &str) -> AppResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.name == name).cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn set_user_role(&self, id: i64, role: Role) -> AppResult<Option<User>> {
        let mut t = self.tables.write().await;
        Ok(t.users.get_mut(&id).map(|u| {
            u.role = role;
            u.clone()
        }))
    }

    async fn delete_user(&self, id: i64) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        if t.users.remove(&id).is_none() {
            return Ok(false);
        }

        let owned_blogs: Vec<i64> = t
            .blogs
            .values()
            .filter(|b| b.user_id == id)
            .map(|b| b.id)
            .collect();
        for blog_id in owned_blogs {
            t.remove_blog(blog_id);
        }

        let authored = t
            .comments
            .values()
            .filter(|c| c.user_id == id)
            .map(|c| c.id)
            .collect();
        t.remove_comments(authored);

        let owned_photos: HashSet<i64> = t
            .photos
            .values()
            .filter(|p| p.user_id == id)
            .map(|p| p.id)
            .collect();
        t.photos.retain(|pid, _| !owned_photos.contains(pid));
        for blog in t.blogs.values_mut() {
            if blog.photo_id.is_some_and(|pid| owned_photos.contains(&pid)) {
                blog.photo_id = None;
            }
        }

        t.notifications.retain(|_, n| n.user_id != id);
        Ok(true)
    }

    // --- BLOGS ---

    async fn create_blog(&self, blog: NewBlog) -> AppResult<Blog> {
        let mut t = self.tables.write().await;
        if let Some(photo_id) = blog.photo_id {
            if t.photo_taken(photo_id, None) {
                return Err(AppError::Integrity(
                    "Photo is already attached to another blog.".to_string(),
                ));
            }
        }
        let id = t.next_id();
        let created = Blog {
            id,
            title: blog.title,
            body: blog.body,
            user_id: blog.user_id,
            photo_id: blog.photo_id,
        };
        t.blogs.insert(id, created.clone());
        t.link_categories(id, &blog.category_names);
        Ok(created)
    }

    async fn get_blog(&self, id: i64) -> AppResult<Option<Blog>> {
        Ok(self.tables.read().await.blogs.get(&id).cloned())
    }

    async fn list_blogs(&self) -> AppResult<Vec<Blog>> {
        Ok(self.tables.read().await.blogs.values().cloned().collect())
    }

    async fn update_blog(&self, id: i64, changes: BlogChanges) -> AppResult<Option<Blog>> {
        let mut t = self.tables.write().await;
        if !t.blogs.contains_key(&id) {
            return Ok(None);
        }
        if let Some(photo_id) = changes.photo_id {
            if t.photo_taken(photo_id, Some(id)) {
                return Err(AppError::Integrity(
                    "Photo is already attached to another blog.".to_string(),
                ));
            }
        }

        let updated = match t.blogs.get_mut(&id) {
            Some(blog) => {
                blog.title = changes.title;
                blog.body = changes.body;
                if changes.photo_id.is_some() {
                    blog.photo_id = changes.photo_id;
                }
                blog.clone()
            }
            None => return Ok(None),
        };

        t.blog_categories.retain(|(b, _)| *b != id);
        t.link_categories(id, &changes.category_names);
        Ok(Some(updated))
    }

    async fn delete_blog(&self, id: i64) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        if !t.blogs.contains_key(&id) {
            return Ok(false);
        }
        t.remove_blog(id);
        Ok(true)
    }

    async fn blog_categories(&self, blog_id: i64) -> AppResult<Vec<Category>> {
        let t = self.tables.read().await;
        let mut linked: Vec<Category> = t
            .blog_categories
            .iter()
            .filter(|(b, _)| *b == blog_id)
            .filter_map(|(_, c)| t.categories.get(c).cloned())
            .collect();
        linked.sort_by_key(|c| c.id);
        Ok(linked)
    }

    // --- CATEGORIES ---

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        Ok(self.tables.read().await.categories.values().cloned().collect())
    }

    async fn find_category(&self, name: &str) -> AppResult<Option<Category>> {
        let t = self.tables.read().await;
        Ok(t.categories.values().find(|c| c.name == name).cloned())
    }

    async fn create_category(&self, name: &str) -> AppResult<Category> {
        let mut t = self.tables.write().await;
        if t.categories.values().any(|c| c.name == name) {
            return Err(AppError::Integrity("Category already exists.".to_string()));
        }
        let id = t.next_id();
        let created = Category {
            id,
            name: name.to_string(),
        };
        t.categories.insert(id, created.clone());
        Ok(created)
    }

    async fn blogs_in_category(&self, category_id: i64) -> AppResult<Vec<Blog>> {
        let t = self.tables.read().await;
        Ok(t.blogs
            .values()
            .filter(|b| t.blog_categories.contains(&(b.id, category_id)))
            .cloned()
            .collect())
    }

    // --- PHOTOS ---

    async fn create_photo(&self, photo: NewPhoto) -> AppResult<Photo> {
        let mut t = self.tables.write().await;
        let id = t.next_id();
        let created = Photo {
            id,
            filename: photo.filename,
            user_id: photo.user_id,
        };
        t.photos.insert(id, created.clone());
        Ok(created)
    }

    async fn get_photo(&self, id: i64) -> AppResult<Option<Photo>> {
        Ok(self.tables.read().await.photos.get(&id).cloned())
    }

    // --- COMMENTS ---

    async fn get_comment(&self, id: i64) -> AppResult<Option<Comment>> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn comments_for_blog(&self, blog_id: i64) -> AppResult<Vec<CommentRecord>> {
        let t = self.tables.read().await;
        Ok(t.comments
            .values()
            .filter(|c| c.blog_id == blog_id)
            .filter_map(|c| {
                t.users.get(&c.user_id).map(|author| CommentRecord {
                    comment: c.clone(),
                    author: author.view(),
                })
            })
            .collect())
    }

    async fn create_comment(
        &self,
        comment: NewComment,
        notice: Option<NotificationDraft>,
    ) -> AppResult<Comment> {
        let mut t = self.tables.write().await;
        if !t.blogs.contains_key(&comment.blog_id) {
            return Err(AppError::NotFound(format!(
                "Blog with the id {} is not available",
                comment.blog_id
            )));
        }
        if let Some(parent_id) = comment.parent_id {
            if !t.comments.contains_key(&parent_id) {
                return Err(AppError::NotFound("Parent comment not found.".to_string()));
            }
        }

        let id = t.next_id();
        let created = Comment {
            id,
            content: comment.content,
            blog_id: comment.blog_id,
            user_id: comment.user_id,
            is_moderated: false,
            parent_id: comment.parent_id,
            created_at: Utc::now(),
        };
        t.comments.insert(id, created.clone());

        if let Some(notice) = &notice {
            t.push_notification(notice, Some(id));
        }
        Ok(created)
    }

    async fn mark_moderated(&self, id: i64) -> AppResult<Option<Comment>> {
        let mut t = self.tables.write().await;
        Ok(match t.comments.get_mut(&id) {
            Some(comment) if !comment.is_moderated => {
                comment.is_moderated = true;
                Some(comment.clone())
            }
            _ => None,
        })
    }

    async fn delete_comment(&self, id: i64, notice: Option<NotificationDraft>) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        if !t.comments.contains_key(&id) {
            return Ok(false);
        }
        if let Some(notice) = &notice {
            t.push_notification(notice, None);
        }
        t.remove_comments(vec![id]);
        Ok(true)
    }

    // --- NOTIFICATIONS ---

    async fn notifications_for_user(&self, user_id: i64) -> AppResult<Vec<Notification>> {
        let t = self.tables.read().await;
        Ok(t.notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }
}
