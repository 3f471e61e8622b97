use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::auth::ServiceAuth;
use crate::app::AppState;
use crate::db::models::{Role, User};
use crate::db::user_repository::{NewUser, UserRepository};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_staff: bool,
    /// One of `reader`, `author`, `editor`, `admin`. Defaults to `reader`.
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
    pub role: Role,
}

impl UserView {
    fn new(user: User, role: Role) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_staff: user.is_staff,
            date_joined: user.date_joined,
            role,
        }
    }
}

/// Create a user and its profile.
pub async fn process_create_user(
    users: &dyn UserRepository,
    request: CreateUserRequest,
) -> Result<UserView, AppError> {
    let username = request.username.trim();
    if username.is_empty()
        || !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '@' | '+' | '-' | '_'))
    {
        return Err(AppError::BadRequest(format!("Invalid username '{}'", username)));
    }

    let role = match request.role.as_deref() {
        None => Role::Reader,
        Some(raw) => Role::from_str_ci(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown role '{}'", raw)))?,
    };

    let user = users
        .create(NewUser {
            username: username.to_string(),
            email: request.email.trim().to_string(),
            is_staff: request.is_staff,
        })
        .await?;
    users.set_role(user.id, role).await?;

    tracing::info!(user_id = user.id, username = %user.username, %role, "User created");
    Ok(UserView::new(user, role))
}

/// Axum handler for `POST /api/v1/users`.
pub async fn create_user_handler(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<UserView>, AppError> {
    Ok(Json(process_create_user(state.users.as_ref(), request).await?))
}
