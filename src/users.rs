use crate::{
    auth::{self, AuthUser},
    error::{AppError, AppResult, FieldIssue},
    guard::{self, Operation},
    models::{CreateUserRequest, NewUser, UserView},
    repository::Repository,
    roles::Role,
};

pub const MIN_PASSWORD_LEN: usize = 8;

const WEAK_PASSWORD: &str = "Password must be at least 8 characters long and contain at least one digit and one uppercase letter.";

fn user_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("User with the id {id} is not available"))
}

pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(char::is_uppercase)
}

fn validate(request: &CreateUserRequest) -> AppResult<()> {
    let mut issues = Vec::new();

    if request.name.trim().is_empty() {
        issues.push(FieldIssue::new("name", "Name is required."));
    }
    if !request.email.contains('@') {
        issues.push(FieldIssue::new("email", "A valid email address is required."));
    }
    if !is_strong_password(&request.password) {
        issues.push(FieldIssue::new("password", WEAK_PASSWORD));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(issues))
    }
}

/// register
///
/// Public sign-up. New accounts start as guests; roles are only ever raised
/// by an admin through `assign_role`.
pub async fn register(repo: &dyn Repository, request: CreateUserRequest) -> AppResult<UserView> {
    validate(&request)?;

    let name = request.name.trim().to_string();
    let email = request.email.trim().to_lowercase();

    if repo.find_user_by_name(&name).await?.is_some() {
        return Err(AppError::Integrity("The name is taken.".to_string()));
    }
    if repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Integrity("Email already registered".to_string()));
    }

    let password_hash = auth::hash_password(request.password).await?;
    let user = repo
        .create_user(NewUser {
            name,
            email,
            password_hash,
            role: Role::Guest,
        })
        .await?;

    tracing::info!(user_id = user.id, "User registered");
    Ok(user.view())
}

pub async fn show_user(repo: &dyn Repository, id: i64) -> AppResult<UserView> {
    repo.get_user(id)
        .await?
        .map(|user| user.view())
        .ok_or_else(|| user_not_found(id))
}

/// Admin only.
pub async fn list_users(repo: &dyn Repository, actor: &AuthUser) -> AppResult<Vec<UserView>> {
    guard::require(actor, Operation::ListUsers)?;
    let users = repo.list_users().await?;
    Ok(users.iter().map(|user| user.view()).collect())
}

/// delete_user
///
/// Users may close their own account; admins may remove anyone. Everything
/// the user owns is removed with them.
pub async fn delete_user(repo: &dyn Repository, actor: &AuthUser, id: i64) -> AppResult<()> {
    let user = repo.get_user(id).await?.ok_or_else(|| user_not_found(id))?;
    guard::authorize(actor, &user, Operation::DeleteUser)?;

    if !repo.delete_user(id).await? {
        return Err(user_not_found(id));
    }

    tracing::info!(user_id = id, actor_id = actor.id, "User deleted");
    Ok(())
}

/// assign_role
///
/// Admin only. The role itself was already validated when the request was
/// deserialized, so an unknown role never reaches this point.
pub async fn assign_role(
    repo: &dyn Repository,
    actor: &AuthUser,
    id: i64,
    role: Role,
) -> AppResult<UserView> {
    guard::require(actor, Operation::AssignRole)?;

    let user = repo
        .set_user_role(id, role)
        .await?
        .ok_or_else(|| user_not_found(id))?;

    tracing::info!(user_id = id, role = %role, admin_id = actor.id, "Role assigned");
    Ok(user.view())
}
