use axum::{
    extract::FromRequestParts,
    http::{Method, Request, Uri, header, request::Parts},
};
use async_trait::async_trait;
use blog_backend::{
    AppState, InMemoryRepository,
    auth::{self, AuthUser, Claims, Viewer},
    config::{AppConfig, Env},
    error::{AppError, AppResult},
    models::{
        Blog, BlogChanges, Category, Comment, CommentRecord, NewBlog, NewComment, NewPhoto,
        NewUser, Notification, Photo, User,
    },
    notifications::NotificationDraft,
    repository::Repository,
    roles::Role,
    storage::MockStorageService,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_PASSWORD: &str = "Sup3rSecret";

fn create_token(sub: &str, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: sub.to_string(),
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

async fn seed_user(repo: &InMemoryRepository, role: Role) -> User {
    // Low cost keeps the suite fast; verification reads the cost from the hash.
    let password_hash = bcrypt::hash(TEST_PASSWORD, 4).unwrap();
    repo.create_user(NewUser {
        name: "tester".to_string(),
        email: "test@example.com".to_string(),
        password_hash,
        role,
    })
    .await
    .unwrap()
}

fn create_app_state(env: Env, repo: Arc<InMemoryRepository>) -> AppState {
    let mut config = AppConfig::default();
    config.env = env;
    config.jwt_secret = TEST_JWT_SECRET.to_string();

    AppState {
        repo,
        storage: Arc::new(MockStorageService::new()),
        config,
    }
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(token: &str) -> Parts {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    parts
}

// --- Extractor ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let repo = Arc::new(InMemoryRepository::default());
    let user = seed_user(&repo, Role::Moderator).await;
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = with_bearer(&create_token(&user.id.to_string(), 3600));
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(auth_user.id, user.id);
    assert_eq!(auth_user.role, Role::Moderator);
    assert_eq!(auth_user.email, "test@example.com");
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(Env::Production, Arc::new(InMemoryRepository::default()));

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let repo = Arc::new(InMemoryRepository::default());
    let user = seed_user(&repo, Role::User).await;
    let app_state = create_app_state(Env::Production, repo);

    // Well past the default leeway.
    let mut parts = with_bearer(&create_token(&user.id.to_string(), -3600));
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn test_auth_failure_with_foreign_signature() {
    let repo = Arc::new(InMemoryRepository::default());
    let user = seed_user(&repo, Role::User).await;
    let mut app_state = create_app_state(Env::Production, repo);
    app_state.config.jwt_secret = "a-different-secret".to_string();

    let mut parts = with_bearer(&create_token(&user.id.to_string(), 3600));
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn test_auth_failure_for_deleted_user() {
    let repo = Arc::new(InMemoryRepository::default());
    let user = seed_user(&repo, Role::User).await;
    repo.delete_user(user.id).await.unwrap();
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = with_bearer(&create_token(&user.id.to_string(), 3600));
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn test_auth_failure_with_non_numeric_subject() {
    let app_state = create_app_state(Env::Production, Arc::new(InMemoryRepository::default()));

    let mut parts = with_bearer(&create_token("not-an-id", 3600));
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn test_local_bypass_success() {
    let repo = Arc::new(InMemoryRepository::default());
    let user = seed_user(&repo, Role::Admin).await;
    let app_state = create_app_state(Env::Local, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(auth_user.id, user.id);
    assert_eq!(auth_user.role, Role::Admin);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let repo = Arc::new(InMemoryRepository::default());
    let user = seed_user(&repo, Role::Admin).await;
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(auth_user, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn test_viewer_is_anonymous_without_credentials() {
    let app_state = create_app_state(Env::Production, Arc::new(InMemoryRepository::default()));

    let mut parts = with_bearer("garbage");
    let viewer = Viewer::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert!(viewer.0.is_none());
    assert_eq!(viewer.role(), None);
}

#[tokio::test]
async fn test_viewer_resolves_valid_token() {
    let repo = Arc::new(InMemoryRepository::default());
    let user = seed_user(&repo, Role::Guest).await;
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = with_bearer(&create_token(&user.id.to_string(), 3600));
    let viewer = Viewer::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(viewer.role(), Some(Role::Guest));
}

/// A store whose every call fails, standing in for a database outage.
struct UnavailableRepository;

fn unavailable<T>() -> AppResult<T> {
    Err(AppError::Internal("database unavailable".to_string()))
}

#[async_trait]
impl Repository for UnavailableRepository {
    async fn create_user(&self, _: NewUser) -> AppResult<User> { unavailable() }
    async fn get_user(&self, _: i64) -> AppResult<Option<User>> { unavailable() }
    async fn find_user_by_email(&self, _: &str) -> AppResult<Option<User>> { unavailable() }
    async fn find_user_by_name(&self, _: &str) -> AppResult<Option<User>> { unavailable() }
    async fn list_users(&self) -> AppResult<Vec<User>> { unavailable() }
    async fn set_user_role(&self, _: i64, _: Role) -> AppResult<Option<User>> { unavailable() }
    async fn delete_user(&self, _: i64) -> AppResult<bool> { unavailable() }
    async fn create_blog(&self, _: NewBlog) -> AppResult<Blog> { unavailable() }
    async fn get_blog(&self, _: i64) -> AppResult<Option<Blog>> { unavailable() }
    async fn list_blogs(&self) -> AppResult<Vec<Blog>> { unavailable() }
    async fn update_blog(&self, _: i64, _: BlogChanges) -> AppResult<Option<Blog>> { unavailable() }
    async fn delete_blog(&self, _: i64) -> AppResult<bool> { unavailable() }
    async fn blog_categories(&self, _: i64) -> AppResult<Vec<Category>> { unavailable() }
    async fn list_categories(&self) -> AppResult<Vec<Category>> { unavailable() }
    async fn find_category(&self, _: &str) -> AppResult<Option<Category>> { unavailable() }
    async fn create_category(&self, _: &str) -> AppResult<Category> { unavailable() }
    async fn blogs_in_category(&self, _: i64) -> AppResult<Vec<Blog>> { unavailable() }
    async fn create_photo(&self, _: NewPhoto) -> AppResult<Photo> { unavailable() }
    async fn get_photo(&self, _: i64) -> AppResult<Option<Photo>> { unavailable() }
    async fn get_comment(&self, _: i64) -> AppResult<Option<Comment>> { unavailable() }
    async fn comments_for_blog(&self, _: i64) -> AppResult<Vec<CommentRecord>> { unavailable() }
    async fn create_comment(
        &self,
        _: NewComment,
        _: Option<NotificationDraft>,
    ) -> AppResult<Comment> {
        unavailable()
    }
    async fn mark_moderated(&self, _: i64) -> AppResult<Option<Comment>> { unavailable() }
    async fn delete_comment(&self, _: i64, _: Option<NotificationDraft>) -> AppResult<bool> {
        unavailable()
    }
    async fn notifications_for_user(&self, _: i64) -> AppResult<Vec<Notification>> {
        unavailable()
    }
}

#[tokio::test]
async fn test_viewer_surfaces_store_failures() {
    let mut config = AppConfig::default();
    config.env = Env::Production;
    config.jwt_secret = TEST_JWT_SECRET.to_string();
    let app_state = AppState {
        repo: Arc::new(UnavailableRepository),
        storage: Arc::new(MockStorageService::new()),
        config,
    };

    // A well-formed token whose user cannot be looked up.
    let mut parts = with_bearer(&create_token("1", 3600));
    let result = Viewer::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(result, Err(AppError::Internal(_))));

    // Bad credentials are still just anonymous.
    let mut parts = with_bearer("garbage");
    let viewer = Viewer::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert!(viewer.0.is_none());
}

// --- Login & tokens ---

#[tokio::test]
async fn test_login_issues_token_for_its_subject() {
    let repo = InMemoryRepository::default();
    let user = seed_user(&repo, Role::User).await;
    let mut config = AppConfig::default();
    config.jwt_secret = TEST_JWT_SECRET.to_string();

    let token = auth::login(&repo, &config, "Test@Example.com", TEST_PASSWORD)
        .await
        .unwrap();

    assert_eq!(token.token_type, "bearer");
    assert_eq!(auth::verify_token(&config, &token.access_token).unwrap(), user.id);
}

#[tokio::test]
async fn test_login_rejects_wrong_password_and_unknown_email_alike() {
    let repo = InMemoryRepository::default();
    seed_user(&repo, Role::User).await;
    let config = AppConfig::default();

    let wrong_password = auth::login(&repo, &config, "test@example.com", "Nope12345")
        .await
        .unwrap_err();
    let unknown_email = auth::login(&repo, &config, "nobody@example.com", TEST_PASSWORD)
        .await
        .unwrap_err();

    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    assert!(matches!(wrong_password, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_password_hash_round_trip() {
    let hash = auth::hash_password("Abcdefg1".to_string()).await.unwrap();
    assert_ne!(hash, "Abcdefg1");
    assert!(auth::verify_password("Abcdefg1".to_string(), hash.clone()).await.unwrap());
    assert!(!auth::verify_password("abcdefg1".to_string(), hash).await.unwrap());
}
