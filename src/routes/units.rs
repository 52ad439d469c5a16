use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use diesel::{pg::PgConnection, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
    access,
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{NewUnit, NewUnitMembership, Referral, Topic, Unit, UnitMembership, User},
    permissions::{can_manage_unit, UnitRole},
    routes::{
        referrals::{load_referral_responses, ReferralResponse},
        topics::TopicResponse,
        users::UserResponse,
    },
    schema::{referrals, topics, unit_memberships, units, users},
    state::AppState,
    workflow::ReferralState,
};

#[derive(Debug, Clone, Serialize)]
pub struct UnitSummary {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Unit> for UnitSummary {
    fn from(unit: Unit) -> Self {
        Self {
            id: unit.id,
            name: unit.name,
            created_at: unit.created_at.and_utc(),
        }
    }
}

#[derive(Serialize)]
pub struct MembershipResponse {
    pub id: Uuid,
    pub role: UnitRole,
    pub user: Uuid,
    pub unit: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct UnitMemberResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub membership: MembershipResponse,
}

#[derive(Serialize)]
pub struct UnitDetailResponse {
    #[serde(flatten)]
    pub unit: UnitSummary,
    pub members: Vec<UnitMemberResponse>,
}

#[derive(Deserialize)]
pub struct CreateUnitRequest {
    pub name: String,
}

pub async fn list_units(State(state): State<AppState>) -> AppResult<Json<Vec<UnitSummary>>> {
    let mut conn = state.db()?;
    let rows: Vec<Unit> = units::table.order(units::name.asc()).load(&mut conn)?;
    Ok(Json(rows.into_iter().map(UnitSummary::from).collect()))
}

pub async fn create_unit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateUnitRequest>,
) -> AppResult<(StatusCode, Json<UnitSummary>)> {
    user.require_admin()?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let mut conn = state.db()?;
    let new_unit = NewUnit {
        id: Uuid::new_v4(),
        name: name.to_string(),
    };
    diesel::insert_into(units::table)
        .values(&new_unit)
        .execute(&mut conn)?;

    let unit: Unit = units::table.find(new_unit.id).first(&mut conn)?;
    info!(unit_id = %unit.id, "unit created");
    Ok((StatusCode::CREATED, Json(unit.into())))
}

/// Unit detail with its member directory. Admins and unit members only.
pub async fn get_unit(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<UnitDetailResponse>> {
    let mut conn = state.db()?;
    let unit: Unit = units::table.find(unit_id).first(&mut conn)?;
    ensure_member_or_admin(&mut conn, &user, unit_id)?;

    let rows: Vec<(UnitMembership, User)> = unit_memberships::table
        .inner_join(users::table)
        .filter(unit_memberships::unit_id.eq(unit_id))
        .order(unit_memberships::created_at.asc())
        .load(&mut conn)?;

    let members = rows
        .into_iter()
        .map(|(membership, user)| UnitMemberResponse {
            user: user.into(),
            membership: to_membership_response(membership),
        })
        .collect();

    Ok(Json(UnitDetailResponse {
        unit: unit.into(),
        members,
    }))
}

pub async fn add_member(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<(StatusCode, Json<MembershipResponse>)> {
    let mut conn = state.db()?;
    let _unit: Unit = units::table.find(unit_id).first(&mut conn)?;
    let caller_role = access::unit_role(&mut conn, user.user_id, unit_id)?;
    if !can_manage_unit(user.is_admin(), caller_role) {
        return Err(AppError::forbidden());
    }

    let member_id = body
        .get("user_id")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(|| AppError::bad_request("user_id must be a valid UUID"))?;
    let role = match body.get("role") {
        None | Some(Value::Null) => UnitRole::Member,
        Some(Value::String(raw)) => raw.parse::<UnitRole>().map_err(AppError::bad_request)?,
        Some(other) => {
            return Err(AppError::bad_request(format!(
                "role must be a string, got {other}"
            )))
        }
    };

    let member_exists = users::table
        .find(member_id)
        .select(users::id)
        .first::<Uuid>(&mut conn)
        .optional()?
        .is_some();
    if !member_exists {
        return Err(AppError::bad_request("user does not exist"));
    }

    let new_membership = NewUnitMembership {
        id: Uuid::new_v4(),
        user_id: member_id,
        unit_id,
        role: role.as_str().to_string(),
    };

    diesel::insert_into(unit_memberships::table)
        .values(&new_membership)
        .execute(&mut conn)
        .map_err(|err| AppError::unique_violation(err, "user is already a member of this unit"))?;

    let membership: UnitMembership = unit_memberships::table
        .find(new_membership.id)
        .first(&mut conn)?;
    info!(%unit_id, user_id = %member_id, role = %role, "unit member added");
    Ok((StatusCode::CREATED, Json(to_membership_response(membership))))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path((unit_id, member_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    let _unit: Unit = units::table.find(unit_id).first(&mut conn)?;
    let caller_role = access::unit_role(&mut conn, user.user_id, unit_id)?;
    if !can_manage_unit(user.is_admin(), caller_role) {
        return Err(AppError::forbidden());
    }

    let deleted = diesel::delete(
        unit_memberships::table
            .filter(unit_memberships::unit_id.eq(unit_id))
            .filter(unit_memberships::user_id.eq(member_id)),
    )
    .execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    info!(%unit_id, user_id = %member_id, "unit member removed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_unit_topics(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
) -> AppResult<Json<Vec<TopicResponse>>> {
    let mut conn = state.db()?;
    let unit: Unit = units::table.find(unit_id).first(&mut conn)?;
    let rows: Vec<Topic> = topics::table
        .filter(topics::unit_id.eq(unit_id))
        .order(topics::name.asc())
        .load(&mut conn)?;

    let summary = UnitSummary::from(unit);
    Ok(Json(
        rows.into_iter()
            .map(|topic| TopicResponse::new(topic, summary.clone()))
            .collect(),
    ))
}

#[derive(Deserialize, Default)]
pub struct InboxQuery {
    pub state: Option<String>,
}

/// Referrals routed to a unit, newest first.
pub async fn unit_inbox(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
    user: AuthenticatedUser,
    Query(params): Query<InboxQuery>,
) -> AppResult<Json<Vec<ReferralResponse>>> {
    let mut conn = state.db()?;
    let _unit: Unit = units::table.find(unit_id).first(&mut conn)?;
    ensure_member_or_admin(&mut conn, &user, unit_id)?;

    let state_filter = params
        .state
        .as_deref()
        .map(|raw| {
            raw.parse::<ReferralState>()
                .map_err(|_| AppError::bad_request(format!("unknown referral state: {raw}")))
        })
        .transpose()?;

    let topic_ids: Vec<Uuid> = topics::table
        .filter(topics::unit_id.eq(unit_id))
        .select(topics::id)
        .load(&mut conn)?;

    let mut query = referrals::table
        .filter(referrals::topic_id.eq_any(topic_ids))
        .order(referrals::created_at.desc())
        .into_boxed();
    if let Some(wanted) = state_filter {
        query = query.filter(referrals::state.eq(wanted.as_str()));
    }
    let rows: Vec<Referral> = query.load(&mut conn)?;

    Ok(Json(load_referral_responses(&mut conn, rows)?))
}

fn to_membership_response(membership: UnitMembership) -> MembershipResponse {
    MembershipResponse {
        id: membership.id,
        role: membership.role.parse().unwrap_or(UnitRole::Member),
        user: membership.user_id,
        unit: membership.unit_id,
        created_at: membership.created_at.and_utc(),
        updated_at: membership.updated_at.and_utc(),
    }
}

fn ensure_member_or_admin(
    conn: &mut PgConnection,
    user: &AuthenticatedUser,
    unit_id: Uuid,
) -> AppResult<()> {
    if user.is_admin() || access::unit_role(conn, user.user_id, unit_id)?.is_some() {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}
