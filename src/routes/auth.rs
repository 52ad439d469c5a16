use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use axum_extra::{headers::Cookie, typed_header::TypedHeader};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use diesel::{pg::PgConnection, prelude::*};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{NewRefreshToken, RefreshToken, User},
    routes::users::UserResponse,
    schema::{refresh_tokens, users},
    state::AppState,
};

const REFRESH_COOKIE_NAME: &str = "refresh_token";

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let mut conn = state.db()?;

    let user = users::table
        .filter(users::username.eq(payload.username.trim()))
        .first::<User>(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        warn!(username = %user.username, "login rejected: wrong password");
        return Err(AppError::unauthorized());
    }
    if !user.is_active {
        warn!(user_id = %user.id, "login rejected: account disabled");
        return Err(AppError::unauthorized());
    }

    let issued = issue_session(&state, &mut conn, &user)?;
    info!(user_id = %user.id, "user logged in");
    Ok(issued)
}

/// Trades a live refresh cookie for a new access token, rotating the cookie.
pub async fn refresh(
    State(state): State<AppState>,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let cookies = jar.ok_or_else(AppError::unauthorized)?;
    let refresh_value = cookies
        .get(REFRESH_COOKIE_NAME)
        .ok_or_else(AppError::unauthorized)?;

    let hashed = hash_refresh_token(refresh_value);
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();

    let token = refresh_tokens::table
        .filter(refresh_tokens::token_hash.eq(&hashed))
        .filter(refresh_tokens::revoked_at.is_null())
        .filter(refresh_tokens::expires_at.gt(now))
        .first::<RefreshToken>(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    diesel::update(refresh_tokens::table.find(token.id))
        .set((
            refresh_tokens::revoked_at.eq(now),
            refresh_tokens::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    let user: User = users::table.find(token.user_id).first(&mut conn)?;
    if !user.is_active {
        return Err(AppError::unauthorized());
    }

    issue_session(&state, &mut conn, &user)
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, StatusCode)> {
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    let live_tokens = refresh_tokens::table
        .filter(refresh_tokens::user_id.eq(user.user_id))
        .filter(refresh_tokens::revoked_at.is_null());

    let presented = jar
        .as_ref()
        .and_then(|cookies| cookies.get(REFRESH_COOKIE_NAME))
        .map(hash_refresh_token);

    let revoked = match presented {
        Some(hashed) => {
            diesel::update(live_tokens.clone().filter(refresh_tokens::token_hash.eq(hashed)))
                .set((
                    refresh_tokens::revoked_at.eq(now),
                    refresh_tokens::updated_at.eq(now),
                ))
                .execute(&mut conn)?
        }
        None => 0,
    };

    // Without a matching cookie every session of the user ends.
    if revoked == 0 {
        diesel::update(live_tokens)
            .set((
                refresh_tokens::revoked_at.eq(now),
                refresh_tokens::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
    }

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, build_clear_refresh_cookie(&state)?);
    Ok((headers, StatusCode::NO_CONTENT))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<UserResponse>> {
    let mut conn = state.db()?;
    let profile: User = users::table
        .find(user.user_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;
    Ok(Json(profile.into()))
}

fn issue_session(
    state: &AppState,
    conn: &mut PgConnection,
    user: &User,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let access_token = state
        .jwt
        .generate_token(user.id, &user.username, &user.role)?;

    let now = Utc::now();
    let refresh_value = generate_refresh_token();
    let refresh_expires_at = now + ChronoDuration::days(state.config.refresh_token_expiry_days);

    diesel::insert_into(refresh_tokens::table)
        .values(&NewRefreshToken {
            id: Uuid::new_v4(),
            user_id: user.id,
            token_hash: hash_refresh_token(&refresh_value),
            issued_at: now.naive_utc(),
            expires_at: refresh_expires_at.naive_utc(),
        })
        .execute(conn)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        build_refresh_cookie(state, &refresh_value, refresh_expires_at)?,
    );

    Ok((
        headers,
        Json(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.config.jwt_expiry_minutes * 60,
        }),
    ))
}

fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn build_refresh_cookie(
    state: &AppState,
    token: &str,
    expires_at: DateTime<Utc>,
) -> AppResult<HeaderValue> {
    let max_age = ChronoDuration::days(state.config.refresh_token_expiry_days).num_seconds();
    let mut parts = vec![
        format!("{REFRESH_COOKIE_NAME}={token}"),
        format!("Max-Age={max_age}"),
        format!("Expires={}", expires_at.to_rfc2822()),
    ];
    cookie_attributes(state, &mut parts);
    HeaderValue::from_str(&parts.join("; ")).map_err(AppError::internal)
}

fn build_clear_refresh_cookie(state: &AppState) -> AppResult<HeaderValue> {
    let mut parts = vec![
        format!("{REFRESH_COOKIE_NAME}="),
        "Max-Age=0".to_string(),
        "Expires=Thu, 01 Jan 1970 00:00:00 GMT".to_string(),
    ];
    cookie_attributes(state, &mut parts);
    HeaderValue::from_str(&parts.join("; ")).map_err(AppError::internal)
}

fn cookie_attributes(state: &AppState, parts: &mut Vec<String>) {
    parts.push("Path=/".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Strict".into());
    if state.config.refresh_cookie_secure {
        parts.push("Secure".into());
    }
    if let Some(domain) = &state.config.refresh_cookie_domain {
        parts.push(format!("Domain={domain}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_tokens_are_random_and_hashed() {
        let first = generate_refresh_token();
        let second = generate_refresh_token();
        assert_eq!(first.len(), 64);
        assert_ne!(first, second);

        let hashed = hash_refresh_token(&first);
        assert_eq!(hashed.len(), 64);
        assert_eq!(hashed, hash_refresh_token(&first));
        assert_ne!(hashed, first);
    }
}
