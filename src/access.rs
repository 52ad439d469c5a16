use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    models::{Referral, Topic},
    permissions::{ReferralAccess, UnitRole},
    schema::{topics, unit_memberships},
};

/// Role of `user_id` in `unit_id`, if they belong to it.
pub fn unit_role(
    conn: &mut PgConnection,
    user_id: Uuid,
    unit_id: Uuid,
) -> QueryResult<Option<UnitRole>> {
    let role: Option<String> = unit_memberships::table
        .filter(unit_memberships::user_id.eq(user_id))
        .filter(unit_memberships::unit_id.eq(unit_id))
        .select(unit_memberships::role)
        .first(conn)
        .optional()?;
    Ok(role.and_then(|value| value.parse().ok()))
}

pub fn is_organizer_anywhere(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<bool> {
    let roles: Vec<String> = unit_memberships::table
        .filter(unit_memberships::user_id.eq(user_id))
        .select(unit_memberships::role)
        .load(conn)?;
    Ok(roles
        .iter()
        .filter_map(|role| role.parse::<UnitRole>().ok())
        .any(|role| role.is_organizer()))
}

/// Resolves the referral's unit through its topic and describes the caller's
/// standing towards it.
pub fn referral_access(
    conn: &mut PgConnection,
    user: &AuthenticatedUser,
    referral: &Referral,
) -> QueryResult<(Topic, ReferralAccess)> {
    let topic: Topic = topics::table.find(referral.topic_id).first(conn)?;
    let access = ReferralAccess {
        is_admin: user.is_admin(),
        is_creator: referral.user_id == Some(user.user_id),
        unit_role: unit_role(conn, user.user_id, topic.unit_id)?,
    };
    Ok((topic, access))
}
