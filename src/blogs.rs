use serde::Deserialize;
use std::{cmp::Reverse, str::FromStr};
use utoipa::IntoParams;

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult, FieldIssue},
    guard::{self, Operation},
    models::{Blog, BlogChanges, BlogRequest, BlogView, Category, NewBlog},
    repository::Repository,
};

/// A blog carries at most this many categories.
pub const MAX_CATEGORIES: usize = 5;

const INVALID_SORT: &str = "Invalid sort order. Use 'asc', 'desc', or omit it.";

/// BlogSort
///
/// Ordering of the blog listing by body length. Ties keep store order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlogSort {
    Asc,
    Desc,
}

impl FromStr for BlogSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(BlogSort::Asc),
            "desc" => Ok(BlogSort::Desc),
            _ => Err(AppError::BadRequest(INVALID_SORT.to_string())),
        }
    }
}

/// BlogFilter
///
/// Query parameters of GET /blog. `sort` is kept as a raw string so an
/// unknown value surfaces as a 400 with a readable message.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct BlogFilter {
    /// `asc` or `desc`, by body length.
    pub sort: Option<String>,
}

impl BlogFilter {
    pub fn order(&self) -> AppResult<Option<BlogSort>> {
        self.sort.as_deref().map(str::parse).transpose()
    }
}

fn blog_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Blog with the id {id} is not available"))
}

/// Trims, drops blanks and duplicates (first occurrence wins).
fn normalize_categories(names: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        if !seen.iter().any(|s: &String| s == name) {
            seen.push(name.to_string());
        }
    }
    seen
}

/// Checks title, body and categories together so the caller gets every
/// problem in one 422.
fn validate(request: &BlogRequest) -> AppResult<Vec<String>> {
    let mut issues = Vec::new();

    if request.title.trim().is_empty() {
        issues.push(FieldIssue::new("title", "Title is required."));
    }
    if request.body.trim().is_empty() {
        issues.push(FieldIssue::new("body", "Body is required."));
    }

    let categories = normalize_categories(&request.category_names);
    if categories.len() > MAX_CATEGORIES {
        issues.push(FieldIssue::new(
            "category_names",
            format!("A blog can have at most {MAX_CATEGORIES} categories."),
        ));
    }

    if issues.is_empty() {
        Ok(categories)
    } else {
        Err(AppError::Validation(issues))
    }
}

/// The photo must exist and belong to the actor before it can be attached.
async fn check_photo(repo: &dyn Repository, actor: &AuthUser, photo_id: i64) -> AppResult<()> {
    let photo = repo
        .get_photo(photo_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Photo with the id {photo_id} is not available")))?;
    guard::authorize(actor, &photo, Operation::AttachPhoto)
}

/// Resolves the creator and categories of a blog.
pub async fn view(repo: &dyn Repository, blog: Blog) -> AppResult<BlogView> {
    let creator = repo
        .get_user(blog.user_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("blog {} has no creator", blog.id)))?;
    let categories = repo.blog_categories(blog.id).await?;

    Ok(BlogView {
        id: blog.id,
        title: blog.title,
        body: blog.body,
        photo_id: blog.photo_id,
        creator: creator.view(),
        categories,
    })
}

async fn view_all(repo: &dyn Repository, blogs: Vec<Blog>) -> AppResult<Vec<BlogView>> {
    let mut views = Vec::with_capacity(blogs.len());
    for blog in blogs {
        views.push(view(repo, blog).await?);
    }
    Ok(views)
}

/// create_blog
///
/// Creates a blog owned by the actor. Unknown category names are created on
/// the fly.
pub async fn create_blog(
    repo: &dyn Repository,
    actor: &AuthUser,
    request: BlogRequest,
) -> AppResult<BlogView> {
    let category_names = validate(&request)?;

    if let Some(photo_id) = request.photo_id {
        check_photo(repo, actor, photo_id).await?;
    }

    let blog = repo
        .create_blog(NewBlog {
            title: request.title.trim().to_string(),
            body: request.body,
            user_id: actor.id,
            photo_id: request.photo_id,
            category_names,
        })
        .await?;

    tracing::info!(blog_id = blog.id, user_id = actor.id, "Blog created");
    view(repo, blog).await
}

pub async fn list_blogs(repo: &dyn Repository, sort: Option<BlogSort>) -> AppResult<Vec<BlogView>> {
    let mut blogs = repo.list_blogs().await?;

    match sort {
        Some(BlogSort::Asc) => blogs.sort_by_key(|b| b.body.chars().count()),
        Some(BlogSort::Desc) => blogs.sort_by_key(|b| Reverse(b.body.chars().count())),
        None => {}
    }

    view_all(repo, blogs).await
}

pub async fn show_blog(repo: &dyn Repository, id: i64) -> AppResult<BlogView> {
    let blog = repo.get_blog(id).await?.ok_or_else(|| blog_not_found(id))?;
    view(repo, blog).await
}

/// update_blog
///
/// Full replacement of title, body and categories. A photo can be attached
/// once; swapping it for a different one is a conflict, and omitting it
/// keeps the current one.
pub async fn update_blog(
    repo: &dyn Repository,
    actor: &AuthUser,
    id: i64,
    request: BlogRequest,
) -> AppResult<BlogView> {
    let blog = repo.get_blog(id).await?.ok_or_else(|| blog_not_found(id))?;
    guard::authorize(actor, &blog, Operation::UpdateBlog)?;

    let category_names = validate(&request)?;

    if let Some(photo_id) = request.photo_id {
        match blog.photo_id {
            Some(current) if current == photo_id => {}
            Some(_) => {
                return Err(AppError::Conflict(
                    "Blog already has a photo attached.".to_string(),
                ));
            }
            None => check_photo(repo, actor, photo_id).await?,
        }
    }

    let updated = repo
        .update_blog(
            id,
            BlogChanges {
                title: request.title.trim().to_string(),
                body: request.body,
                photo_id: request.photo_id,
                category_names,
            },
        )
        .await?
        .ok_or_else(|| blog_not_found(id))?;

    tracing::info!(blog_id = id, actor_id = actor.id, "Blog updated");
    view(repo, updated).await
}

/// delete_blog
///
/// Owner or admin only. Comments on the blog and their notifications go
/// with it.
pub async fn delete_blog(repo: &dyn Repository, actor: &AuthUser, id: i64) -> AppResult<()> {
    let blog = repo.get_blog(id).await?.ok_or_else(|| blog_not_found(id))?;
    guard::authorize(actor, &blog, Operation::DeleteBlog)?;

    if !repo.delete_blog(id).await? {
        return Err(blog_not_found(id));
    }

    tracing::info!(blog_id = id, actor_id = actor.id, "Blog deleted");
    Ok(())
}

// --- Categories ---

pub async fn list_categories(repo: &dyn Repository) -> AppResult<Vec<Category>> {
    repo.list_categories().await
}

/// Creates a category. A taken name is an integrity error.
pub async fn create_category(repo: &dyn Repository, name: &str) -> AppResult<Category> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::invalid("name", "Name is required."));
    }
    if repo.find_category(name).await?.is_some() {
        return Err(AppError::Integrity("Category already exists.".to_string()));
    }

    let category = repo.create_category(name).await?;
    tracing::info!(category_id = category.id, name = %category.name, "Category created");
    Ok(category)
}

pub async fn blogs_by_category(repo: &dyn Repository, name: &str) -> AppResult<Vec<BlogView>> {
    let category = repo
        .find_category(name)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    let blogs = repo.blogs_in_category(category.id).await?;
    view_all(repo, blogs).await
}
