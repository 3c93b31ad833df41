use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::{AppError, AppResult},
    models::{TokenResponse, User},
    repository::{Repository, RepositoryState},
    roles::{Identity, Role},
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const COULD_NOT_VALIDATE: &str = "Could not validate credentials";

/// Claims
///
/// Payload of an access token. `sub` is the user id as a string.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// AuthUser
///
/// The authenticated actor of a request, resolved from the users table on
/// every request so role changes and deletions take effect immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        AuthUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

impl Identity for AuthUser {
    fn id(&self) -> i64 {
        self.id
    }

    fn role(&self) -> Role {
        self.role
    }
}

/// Signs an access token for `user_id` valid for the configured TTL.
pub fn issue_token(config: &AppConfig, user_id: i64) -> AppResult<TokenResponse> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::minutes(config.token_ttl_minutes)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
    })
}

/// Verifies a token and returns the user id it was issued for.
pub fn verify_token(config: &AppConfig, token: &str) -> AppResult<i64> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| AppError::Unauthorized(format!("{COULD_NOT_VALIDATE}: {e}")))?;

    data.claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized(COULD_NOT_VALIDATE.to_string()))
}

/// Hashes a password off the async executor; bcrypt is CPU-bound.
pub async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
        .map_err(AppError::from)
}

pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))?
        .map_err(AppError::from)
}

/// login
///
/// Exchanges an email and password for an access token. Unknown email and
/// wrong password are indistinguishable to the caller.
pub async fn login(
    repo: &dyn Repository,
    config: &AppConfig,
    email: &str,
    password: &str,
) -> AppResult<TokenResponse> {
    let user = repo
        .find_user_by_email(&email.trim().to_lowercase())
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(password.to_string(), user.password_hash.clone()).await? {
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    tracing::info!(user_id = user.id, "Issued access token");
    issue_token(config, user.id)
}

/// AuthUser Extractor
///
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing
///    user is accepted as-is.
/// 2. Otherwise a `Bearer` token is required, verified, and its subject looked up.
///
/// Rejects with 401 on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<i64>().ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    return Ok(user.into());
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

        let user_id = verify_token(&config, token)?;

        // A valid token for a deleted user is still rejected.
        let user = repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(COULD_NOT_VALIDATE.to_string()))?;

        Ok(user.into())
    }
}

/// Viewer
///
/// Optional identity for public reads. Missing or invalid credentials yield an
/// anonymous viewer; any other failure (e.g. the user lookup) is still an error.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<AuthUser>);

impl Viewer {
    pub fn role(&self) -> Option<Role> {
        self.0.as_ref().map(|user| user.role)
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(Viewer(Some(user))),
            Err(AppError::Unauthorized(_)) => Ok(Viewer(None)),
            Err(err) => Err(err),
        }
    }
}
