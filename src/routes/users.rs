use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    access,
    auth::{password::hash_password, AuthenticatedUser},
    error::{AppError, AppResult, FieldErrors},
    models::{normalize_email, NewUser, User, ROLE_ADMIN, ROLE_USER},
    schema::users,
    state::AppState,
};

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub unit_name: String,
    pub title: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let is_staff = user.is_admin();
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone_number: user.phone_number,
            unit_name: user.unit_name,
            title: user.title,
            is_staff,
            is_active: user.is_active,
            date_joined: user.created_at.and_utc(),
        }
    }
}

#[derive(Deserialize, Default)]
pub struct UserListQuery {
    pub query: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<UserListQuery>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let mut conn = state.db()?;
    if !user.is_admin() && !access::is_organizer_anywhere(&mut conn, user.user_id)? {
        return Err(AppError::forbidden());
    }

    let mut query = users::table
        .filter(users::is_active.eq(true))
        .order(users::username.asc())
        .into_boxed();

    if let Some(term) = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
    {
        let pattern = format!("%{}%", escape_like(term));
        query = query.filter(
            users::username
                .ilike(pattern.clone())
                .or(users::email.ilike(pattern.clone()))
                .or(users::first_name.ilike(pattern.clone()))
                .or(users::last_name.ilike(pattern)),
        );
    }

    let rows: Vec<User> = query.limit(100).load(&mut conn)?;
    Ok(Json(rows.into_iter().map(UserResponse::from).collect()))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub unit_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_staff: bool,
}

pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    user.require_admin()?;

    let mut fields = FieldErrors::new();
    let username = payload.username.trim();
    let email = payload.email.trim();
    if username.is_empty() {
        fields.insert("username".into(), vec!["This field is required.".into()]);
    }
    if !email.contains('@') {
        fields.insert("email".into(), vec!["Enter a valid email address.".into()]);
    }
    if payload.password.len() < 8 {
        fields.insert(
            "password".into(),
            vec!["Password must be at least 8 characters.".into()],
        );
    }
    if !fields.is_empty() {
        return Err(AppError::validation("invalid user", fields));
    }

    let new_user = NewUser {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: normalize_email(email),
        password_hash: hash_password(&payload.password)?,
        role: if payload.is_staff { ROLE_ADMIN } else { ROLE_USER }.to_string(),
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        phone_number: payload.phone_number.trim().to_string(),
        unit_name: payload.unit_name.trim().to_string(),
        title: payload.title.trim().to_string(),
    };

    let mut conn = state.db()?;
    diesel::insert_into(users::table)
        .values(&new_user)
        .execute(&mut conn)
        .map_err(|err| AppError::unique_violation(err, "username or email already in use"))?;

    let created: User = users::table.find(new_user.id).first(&mut conn)?;
    info!(user_id = %created.id, created_by = %user.user_id, "user created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
