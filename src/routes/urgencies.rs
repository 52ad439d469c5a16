use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{NewReferralUrgency, ReferralUrgency},
    schema::referral_urgencies,
    state::AppState,
};

#[derive(Debug, Clone, Serialize)]
pub struct UrgencyResponse {
    pub id: i32,
    pub name: String,
    pub duration_days: i32,
    pub is_default: bool,
    pub requires_justification: bool,
}

impl From<ReferralUrgency> for UrgencyResponse {
    fn from(urgency: ReferralUrgency) -> Self {
        Self {
            id: urgency.id,
            name: urgency.name,
            duration_days: urgency.duration_days,
            is_default: urgency.is_default,
            requires_justification: urgency.requires_justification,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateUrgencyRequest {
    pub name: String,
    pub duration_days: i32,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub requires_justification: bool,
}

pub async fn list_urgencies(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<UrgencyResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<ReferralUrgency> = referral_urgencies::table
        .order((
            referral_urgencies::duration_days.asc(),
            referral_urgencies::id.asc(),
        ))
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(UrgencyResponse::from).collect()))
}

pub async fn create_urgency(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateUrgencyRequest>,
) -> AppResult<(StatusCode, Json<UrgencyResponse>)> {
    user.require_admin()?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    if payload.duration_days <= 0 {
        return Err(AppError::bad_request("duration_days must be positive"));
    }

    let mut conn = state.db()?;
    let created = conn.transaction::<ReferralUrgency, AppError, _>(|conn| {
        // A single level is the default one.
        if payload.is_default {
            diesel::update(referral_urgencies::table)
                .set(referral_urgencies::is_default.eq(false))
                .execute(conn)?;
        }

        let urgency: ReferralUrgency = diesel::insert_into(referral_urgencies::table)
            .values(&NewReferralUrgency {
                name: name.to_string(),
                duration_days: payload.duration_days,
                is_default: payload.is_default,
                requires_justification: payload.requires_justification,
            })
            .get_result(conn)?;
        Ok(urgency)
    })?;

    Ok((StatusCode::CREATED, Json(created.into())))
}
