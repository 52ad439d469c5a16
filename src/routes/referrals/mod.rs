use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use diesel::{dsl::count_star, pg::PgConnection, prelude::*};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    access,
    auth::AuthenticatedUser,
    error::{AppError, AppResult, FieldErrors},
    models::{
        NewReferral, NewReferralActivity, NewReferralAnswer, NewReferralAnswerAttachment,
        NewReferralAssignment, NewReferralAttachment, Referral, ReferralActivity, ReferralAnswer,
        ReferralAnswerAttachment, ReferralAssignment, ReferralAttachment, ReferralUrgency, Topic,
        Unit, User,
    },
    notifications::{queue_email, queue_emails, EmailJob, EmailTemplate},
    permissions::{ReferralAccess, UnitRole},
    routes::{
        topics::TopicResponse, units::UnitSummary, urgencies::UrgencyResponse,
        users::UserResponse,
    },
    schema::{
        referral_activities, referral_answer_attachments, referral_answers,
        referral_assignments, referral_attachments, referral_urgencies, referrals, topics,
        unit_memberships, units, users,
    },
    state::AppState,
    storage::{answer_attachment_key, referral_attachment_key},
    workflow::{self, ActivityVerb, ReferralState},
};

pub mod form;

use form::{add_error, check_justification, AnswerForm, ReferralForm, UploadedFile};

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentResponse {
    pub id: Uuid,
    pub name: String,
    pub size: i64,
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub attachments: Vec<AttachmentResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferralResponse {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub context: String,
    pub prior_work: String,
    pub question: String,
    pub requester: String,
    pub state: ReferralState,
    pub topic: TopicResponse,
    pub urgency_level: Option<UrgencyResponse>,
    pub urgency_explanation: String,
    pub due_date: Option<DateTime<Utc>>,
    pub user: Option<UserResponse>,
    pub assignees: Vec<Uuid>,
    pub attachments: Vec<AttachmentResponse>,
    pub answers: Vec<AnswerResponse>,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub id: Uuid,
    pub verb: String,
    pub actor: Option<UserResponse>,
    pub item_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Listing every referral is not offered; units browse theirs through the inbox.
pub async fn list_referrals(_user: AuthenticatedUser) -> AppResult<Json<Vec<ReferralResponse>>> {
    Err(AppError::forbidden())
}

pub async fn get_referral(
    State(state): State<AppState>,
    Path(referral_id): Path<i32>,
    user: AuthenticatedUser,
) -> AppResult<Json<ReferralResponse>> {
    let mut conn = state.db()?;
    let (referral, _, access) = load_with_access(&mut conn, referral_id, &user)?;
    if !access.can_view() {
        return Err(AppError::forbidden());
    }
    Ok(Json(referral_detail(&mut conn, referral)?))
}

pub async fn create_referral(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ReferralResponse>)> {
    let form = ReferralForm::from_multipart(multipart).await?;
    let clean = form
        .clean()
        .map_err(|fields| AppError::validation("invalid referral", fields))?;

    let mut conn = state.db()?;
    let mut errors = FieldErrors::new();

    let topic = topics::table
        .find(clean.topic_id)
        .first::<Topic>(&mut conn)
        .optional()?;
    if topic.is_none() {
        add_error(&mut errors, "topic", "Select a valid topic.");
    }

    let urgency = match clean.urgency_level_id {
        Some(id) => {
            let urgency = referral_urgencies::table
                .find(id)
                .first::<ReferralUrgency>(&mut conn)
                .optional()?;
            if urgency.is_none() {
                add_error(&mut errors, "urgency_level", "Select a valid urgency level.");
            }
            urgency
        }
        None => referral_urgencies::table
            .filter(referral_urgencies::is_default.eq(true))
            .first::<ReferralUrgency>(&mut conn)
            .optional()?,
    };
    check_justification(urgency.as_ref(), &clean.urgency_explanation, &mut errors);

    let topic = match topic {
        Some(topic) if errors.is_empty() => topic,
        _ => return Err(AppError::validation("invalid referral", errors)),
    };
    drop(conn);

    let stored = store_files(&state, clean.files, referral_attachment_key).await?;

    let new_referral = NewReferral {
        context: clean.context,
        prior_work: clean.prior_work,
        question: clean.question,
        requester: clean.requester,
        topic_id: topic.id,
        urgency_level_id: urgency.as_ref().map(|level| level.id),
        urgency_explanation: clean.urgency_explanation,
        state: ReferralState::Received.as_str().to_string(),
        user_id: Some(user.user_id),
    };

    let mut conn = state.db()?;
    let created = conn.transaction::<Referral, AppError, _>(|conn| {
        let referral: Referral = diesel::insert_into(referrals::table)
            .values(&new_referral)
            .get_result(conn)?;

        let attachments: Vec<NewReferralAttachment> = stored
            .iter()
            .map(|file| NewReferralAttachment {
                id: file.id,
                referral_id: referral.id,
                name: file.name.clone(),
                size_bytes: file.size,
                content_type: file.content_type.clone(),
                s3_key: file.key.clone(),
            })
            .collect();
        if !attachments.is_empty() {
            diesel::insert_into(referral_attachments::table)
                .values(&attachments)
                .execute(conn)?;
        }

        record_activity(conn, referral.id, user.user_id, ActivityVerb::Created, None)?;

        let owner_emails: Vec<String> = unit_memberships::table
            .inner_join(users::table)
            .filter(unit_memberships::unit_id.eq(topic.unit_id))
            .filter(unit_memberships::role.eq(UnitRole::Owner.as_str()))
            .filter(users::is_active.eq(true))
            .select(users::email)
            .load(conn)?;
        queue_emails(conn, EmailTemplate::ReferralReceived, owner_emails, referral.id)?;

        if let Some(email) = user_email(conn, user.user_id)? {
            queue_email(
                conn,
                &EmailJob {
                    template: EmailTemplate::ReferralSaved,
                    recipient: email,
                    referral_id: referral.id,
                },
            )?;
        }

        Ok(referral)
    });

    let referral = match created {
        Ok(referral) => referral,
        Err(err) => {
            discard_files(&state, &stored).await;
            return Err(err);
        }
    };

    info!(
        referral_id = referral.id,
        topic_id = %referral.topic_id,
        attachments = stored.len(),
        created_by = %user.user_id,
        "referral created"
    );

    Ok((
        StatusCode::CREATED,
        Json(referral_detail(&mut conn, referral)?),
    ))
}

pub async fn answer_referral(
    State(state): State<AppState>,
    Path(referral_id): Path<i32>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<Json<ReferralResponse>> {
    let mut conn = state.db()?;
    let (referral, _, access) = load_with_access(&mut conn, referral_id, &user)?;
    if !access.can_answer() {
        return Err(AppError::forbidden());
    }
    drop(conn);

    let (content, files) = AnswerForm::from_multipart(multipart)
        .await?
        .clean()
        .map_err(|fields| AppError::validation("invalid answer", fields))?;

    // Refuse early so nothing gets uploaded for a referral that cannot be answered.
    workflow::answer(referral.state.parse()?)?;

    let stored = store_files(&state, files, answer_attachment_key).await?;
    let answer_id = Uuid::new_v4();

    let mut conn = state.db()?;
    let answered = conn.transaction::<Referral, AppError, _>(|conn| {
        let locked: Referral = referrals::table
            .find(referral_id)
            .for_update()
            .first(conn)?;
        let next = workflow::answer(locked.state.parse()?)?;

        diesel::insert_into(referral_answers::table)
            .values(&NewReferralAnswer {
                id: answer_id,
                referral_id,
                content: content.clone(),
                created_by: Some(user.user_id),
            })
            .execute(conn)?;

        let attachments: Vec<NewReferralAnswerAttachment> = stored
            .iter()
            .map(|file| NewReferralAnswerAttachment {
                id: file.id,
                referral_answer_id: answer_id,
                name: file.name.clone(),
                size_bytes: file.size,
                content_type: file.content_type.clone(),
                s3_key: file.key.clone(),
            })
            .collect();
        if !attachments.is_empty() {
            diesel::insert_into(referral_answer_attachments::table)
                .values(&attachments)
                .execute(conn)?;
        }

        let updated = set_state(conn, referral_id, next)?;
        record_activity(
            conn,
            referral_id,
            user.user_id,
            ActivityVerb::Answered,
            Some(answer_id),
        )?;

        if let Some(creator) = locked.user_id {
            if let Some(email) = user_email(conn, creator)? {
                queue_email(
                    conn,
                    &EmailJob {
                        template: EmailTemplate::ReferralAnswered,
                        recipient: email,
                        referral_id,
                    },
                )?;
            }
        }

        Ok(updated)
    });

    let referral = match answered {
        Ok(referral) => referral,
        Err(err) => {
            discard_files(&state, &stored).await;
            return Err(err);
        }
    };

    info!(
        referral_id,
        %answer_id,
        answered_by = %user.user_id,
        "referral answered"
    );
    Ok(Json(referral_detail(&mut conn, referral)?))
}

pub async fn assign_referral(
    State(state): State<AppState>,
    Path(referral_id): Path<i32>,
    user: AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<Json<ReferralResponse>> {
    let mut conn = state.db()?;
    let (_, topic, access) = load_with_access(&mut conn, referral_id, &user)?;
    if !access.can_assign() {
        return Err(AppError::forbidden());
    }

    let assignee_id = parse_assignee_id(&body)?;
    let assignee = users::table
        .find(assignee_id)
        .first::<User>(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::bad_request("assignee does not exist"))?;
    if access::unit_role(&mut conn, assignee.id, topic.unit_id)?.is_none() {
        return Err(AppError::bad_request(
            "assignee must be a member of the referral's unit",
        ));
    }

    let referral = conn.transaction::<Referral, AppError, _>(|conn| {
        let locked: Referral = referrals::table
            .find(referral_id)
            .for_update()
            .first(conn)?;
        let next = workflow::assign(locked.state.parse()?)?;

        let assignment = NewReferralAssignment {
            id: Uuid::new_v4(),
            referral_id,
            assignee_id: assignee.id,
            unit_id: Some(topic.unit_id),
            created_by: Some(user.user_id),
        };
        diesel::insert_into(referral_assignments::table)
            .values(&assignment)
            .execute(conn)
            .map_err(|err| {
                AppError::unique_violation(err, "user is already assigned to this referral")
            })?;

        let updated = set_state(conn, referral_id, next)?;
        record_activity(
            conn,
            referral_id,
            user.user_id,
            ActivityVerb::Assigned,
            Some(assignee.id),
        )?;
        queue_email(
            conn,
            &EmailJob {
                template: EmailTemplate::ReferralAssigned,
                recipient: assignee.email.clone(),
                referral_id,
            },
        )?;
        Ok(updated)
    })?;

    info!(
        referral_id,
        assignee_id = %assignee.id,
        assigned_by = %user.user_id,
        "referral assigned"
    );
    Ok(Json(referral_detail(&mut conn, referral)?))
}

pub async fn unassign_referral(
    State(state): State<AppState>,
    Path(referral_id): Path<i32>,
    user: AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<Json<ReferralResponse>> {
    let mut conn = state.db()?;
    let (_, _, access) = load_with_access(&mut conn, referral_id, &user)?;
    if !access.can_unassign() {
        return Err(AppError::forbidden());
    }
    let assignee_id = parse_assignee_id(&body)?;

    let referral = conn.transaction::<Referral, AppError, _>(|conn| {
        let locked: Referral = referrals::table
            .find(referral_id)
            .for_update()
            .first(conn)?;
        let current: ReferralState = locked.state.parse()?;

        let removed = diesel::delete(
            referral_assignments::table
                .filter(referral_assignments::referral_id.eq(referral_id))
                .filter(referral_assignments::assignee_id.eq(assignee_id)),
        )
        .execute(conn)?;
        if removed == 0 {
            return Err(AppError::bad_request("user is not assigned to this referral"));
        }

        let remaining: i64 = referral_assignments::table
            .filter(referral_assignments::referral_id.eq(referral_id))
            .select(count_star())
            .first(conn)?;
        let next = workflow::unassign(current, remaining)?;

        let updated = set_state(conn, referral_id, next)?;
        record_activity(
            conn,
            referral_id,
            user.user_id,
            ActivityVerb::Unassigned,
            Some(assignee_id),
        )?;
        Ok(updated)
    })?;

    info!(
        referral_id,
        %assignee_id,
        unassigned_by = %user.user_id,
        state = %referral.state,
        "referral assignee removed"
    );
    Ok(Json(referral_detail(&mut conn, referral)?))
}

pub async fn list_activities(
    State(state): State<AppState>,
    Path(referral_id): Path<i32>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<ActivityResponse>>> {
    let mut conn = state.db()?;
    let (_, _, access) = load_with_access(&mut conn, referral_id, &user)?;
    if !access.can_view() {
        return Err(AppError::forbidden());
    }

    let rows: Vec<(ReferralActivity, Option<User>)> = referral_activities::table
        .left_join(users::table)
        .filter(referral_activities::referral_id.eq(referral_id))
        .order((
            referral_activities::created_at.asc(),
            referral_activities::id.asc(),
        ))
        .load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|(activity, actor)| ActivityResponse {
                id: activity.id,
                verb: activity.verb,
                actor: actor.map(UserResponse::from),
                item_id: activity.item_id,
                created_at: activity.created_at.and_utc(),
            })
            .collect(),
    ))
}

/// Loads the referral and the caller's standing towards it; 404 when missing.
pub(crate) fn load_with_access(
    conn: &mut PgConnection,
    referral_id: i32,
    user: &AuthenticatedUser,
) -> AppResult<(Referral, Topic, ReferralAccess)> {
    let referral: Referral = referrals::table.find(referral_id).first(conn)?;
    let (topic, access) = access::referral_access(conn, user, &referral)?;
    Ok((referral, topic, access))
}

fn referral_detail(conn: &mut PgConnection, referral: Referral) -> AppResult<ReferralResponse> {
    load_referral_responses(conn, vec![referral])?
        .pop()
        .ok_or_else(AppError::not_found)
}

/// Builds full responses for a batch of referrals, keeping their order.
pub fn load_referral_responses(
    conn: &mut PgConnection,
    rows: Vec<Referral>,
) -> AppResult<Vec<ReferralResponse>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let referral_ids: Vec<i32> = rows.iter().map(|referral| referral.id).collect();
    let topic_ids: Vec<Uuid> = rows.iter().map(|referral| referral.topic_id).collect();
    let urgency_ids: Vec<i32> = rows
        .iter()
        .filter_map(|referral| referral.urgency_level_id)
        .collect();
    let creator_ids: Vec<Uuid> = rows.iter().filter_map(|referral| referral.user_id).collect();

    let topics_map: HashMap<Uuid, TopicResponse> = topics::table
        .inner_join(units::table)
        .filter(topics::id.eq_any(&topic_ids))
        .load::<(Topic, Unit)>(conn)?
        .into_iter()
        .map(|(topic, unit)| (topic.id, TopicResponse::new(topic, UnitSummary::from(unit))))
        .collect();

    let urgencies_map: HashMap<i32, ReferralUrgency> = referral_urgencies::table
        .filter(referral_urgencies::id.eq_any(&urgency_ids))
        .load::<ReferralUrgency>(conn)?
        .into_iter()
        .map(|urgency| (urgency.id, urgency))
        .collect();

    let creators_map: HashMap<Uuid, User> = users::table
        .filter(users::id.eq_any(&creator_ids))
        .load::<User>(conn)?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

    let mut assignees_map: HashMap<i32, Vec<Uuid>> = HashMap::new();
    for assignment in referral_assignments::table
        .filter(referral_assignments::referral_id.eq_any(&referral_ids))
        .order((
            referral_assignments::created_at.asc(),
            referral_assignments::id.asc(),
        ))
        .load::<ReferralAssignment>(conn)?
    {
        assignees_map
            .entry(assignment.referral_id)
            .or_default()
            .push(assignment.assignee_id);
    }

    let mut attachments_map: HashMap<i32, Vec<AttachmentResponse>> = HashMap::new();
    for attachment in referral_attachments::table
        .filter(referral_attachments::referral_id.eq_any(&referral_ids))
        .order((
            referral_attachments::created_at.asc(),
            referral_attachments::name.asc(),
        ))
        .load::<ReferralAttachment>(conn)?
    {
        attachments_map
            .entry(attachment.referral_id)
            .or_default()
            .push(to_attachment_response(attachment));
    }

    let answers: Vec<ReferralAnswer> = referral_answers::table
        .filter(referral_answers::referral_id.eq_any(&referral_ids))
        .order(referral_answers::created_at.asc())
        .load(conn)?;
    let answer_ids: Vec<Uuid> = answers.iter().map(|answer| answer.id).collect();

    let mut answer_attachments_map: HashMap<Uuid, Vec<AttachmentResponse>> = HashMap::new();
    for attachment in referral_answer_attachments::table
        .filter(referral_answer_attachments::referral_answer_id.eq_any(&answer_ids))
        .order((
            referral_answer_attachments::created_at.asc(),
            referral_answer_attachments::name.asc(),
        ))
        .load::<ReferralAnswerAttachment>(conn)?
    {
        answer_attachments_map
            .entry(attachment.referral_answer_id)
            .or_default()
            .push(to_answer_attachment_response(attachment));
    }

    let mut answers_map: HashMap<i32, Vec<AnswerResponse>> = HashMap::new();
    for answer in answers {
        answers_map
            .entry(answer.referral_id)
            .or_default()
            .push(AnswerResponse {
                id: answer.id,
                content: answer.content,
                created_at: answer.created_at.and_utc(),
                created_by: answer.created_by,
                attachments: answer_attachments_map.remove(&answer.id).unwrap_or_default(),
            });
    }

    rows.into_iter()
        .map(|referral| -> AppResult<ReferralResponse> {
            let topic = topics_map
                .get(&referral.topic_id)
                .cloned()
                .ok_or_else(|| AppError::internal("referral topic missing"))?;
            let urgency = referral
                .urgency_level_id
                .and_then(|id| urgencies_map.get(&id));
            let created_at = referral.created_at.and_utc();

            Ok(ReferralResponse {
                id: referral.id,
                created_at,
                updated_at: referral.updated_at.and_utc(),
                context: referral.context,
                prior_work: referral.prior_work,
                question: referral.question,
                requester: referral.requester,
                state: referral.state.parse()?,
                topic,
                due_date: urgency.map(|level| due_date(created_at, level)),
                urgency_level: urgency.cloned().map(UrgencyResponse::from),
                urgency_explanation: referral.urgency_explanation,
                user: referral
                    .user_id
                    .and_then(|id| creators_map.get(&id).cloned())
                    .map(UserResponse::from),
                assignees: assignees_map.remove(&referral.id).unwrap_or_default(),
                attachments: attachments_map.remove(&referral.id).unwrap_or_default(),
                answers: answers_map.remove(&referral.id).unwrap_or_default(),
            })
        })
        .collect()
}

pub fn due_date(created_at: DateTime<Utc>, urgency: &ReferralUrgency) -> DateTime<Utc> {
    created_at + ChronoDuration::days(i64::from(urgency.duration_days))
}

fn set_state(conn: &mut PgConnection, referral_id: i32, next: ReferralState) -> QueryResult<Referral> {
    diesel::update(referrals::table.find(referral_id))
        .set((
            referrals::state.eq(next.as_str()),
            referrals::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result(conn)
}

fn record_activity(
    conn: &mut PgConnection,
    referral_id: i32,
    actor_id: Uuid,
    verb: ActivityVerb,
    item_id: Option<Uuid>,
) -> QueryResult<()> {
    diesel::insert_into(referral_activities::table)
        .values(&NewReferralActivity {
            id: Uuid::new_v4(),
            referral_id,
            actor_id: Some(actor_id),
            verb: verb.as_str().to_string(),
            item_id,
        })
        .execute(conn)?;
    Ok(())
}

fn user_email(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Option<String>> {
    users::table
        .find(user_id)
        .filter(users::is_active.eq(true))
        .select(users::email)
        .first(conn)
        .optional()
}

fn parse_assignee_id(body: &Value) -> AppResult<Uuid> {
    body.get("assignee_id")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(|| AppError::bad_request("assignee_id must be a valid UUID"))
}

fn to_attachment_response(attachment: ReferralAttachment) -> AttachmentResponse {
    AttachmentResponse {
        url: format!("/api/referral-attachments/{}", attachment.id),
        id: attachment.id,
        name: attachment.name,
        size: attachment.size_bytes,
        content_type: attachment.content_type,
        created_at: attachment.created_at.and_utc(),
    }
}

fn to_answer_attachment_response(attachment: ReferralAnswerAttachment) -> AttachmentResponse {
    AttachmentResponse {
        url: format!("/api/referral-answer-attachments/{}", attachment.id),
        id: attachment.id,
        name: attachment.name,
        size: attachment.size_bytes,
        content_type: attachment.content_type,
        created_at: attachment.created_at.and_utc(),
    }
}

struct StoredFile {
    id: Uuid,
    key: String,
    name: String,
    size: i64,
    content_type: Option<String>,
}

/// Uploads every file; on failure the ones already written are removed again.
async fn store_files(
    state: &AppState,
    files: Vec<UploadedFile>,
    key_for: fn(Uuid) -> String,
) -> AppResult<Vec<StoredFile>> {
    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        let id = Uuid::new_v4();
        let key = key_for(id);
        let size = file.bytes.len() as i64;
        let disposition = content_disposition(&file.name);

        if let Err(err) = state
            .storage
            .put_object(&key, file.bytes, file.content_type.clone(), Some(disposition))
            .await
        {
            warn!(error = %err, %key, "attachment upload failed");
            discard_files(state, &stored).await;
            return Err(AppError::internal(format!("failed to store attachment: {err}")));
        }

        stored.push(StoredFile {
            id,
            key,
            name: file.name,
            size,
            content_type: file.content_type,
        });
    }
    Ok(stored)
}

async fn discard_files(state: &AppState, stored: &[StoredFile]) {
    for file in stored {
        if let Err(err) = state.storage.delete_object(&file.key).await {
            warn!(error = %err, key = %file.key, "failed to remove orphaned attachment");
        }
    }
}

/// `attachment` disposition with an ASCII `filename` fallback and the full
/// name percent-encoded in `filename*`.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if !ch.is_ascii() || ch.is_ascii_control() => '_',
            ch => ch,
        })
        .collect();
    let encoded = utf8_percent_encode(file_name, NON_ALPHANUMERIC);
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn due_date_adds_urgency_duration() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let urgency = ReferralUrgency {
            id: 1,
            name: "Three weeks".into(),
            duration_days: 21,
            is_default: true,
            requires_justification: false,
        };
        assert_eq!(
            due_date(created, &urgency),
            Utc.with_ymd_and_hms(2024, 3, 22, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn assignee_id_must_be_a_uuid_string() {
        let id = Uuid::new_v4();
        assert_eq!(
            parse_assignee_id(&serde_json::json!({ "assignee_id": id.to_string() })).unwrap(),
            id
        );
        assert!(parse_assignee_id(&serde_json::json!({ "assignee_id": "42" })).is_err());
        assert!(parse_assignee_id(&serde_json::json!({ "assignee_id": 42 })).is_err());
        assert!(parse_assignee_id(&serde_json::json!({})).is_err());
    }

    #[test]
    fn content_disposition_strips_quotes_and_backslashes() {
        assert_eq!(
            content_disposition("the \"first\" file\\.pdf"),
            "attachment; filename=\"the _first_ file_.pdf\"; \
             filename*=UTF-8''the%20%22first%22%20file%5C%2Epdf"
        );
    }

    #[test]
    fn content_disposition_is_ascii_for_accented_names() {
        let value = content_disposition("réponse à la saisine.pdf");
        assert!(value.is_ascii());
        assert!(value.contains("filename=\"r_ponse _ la saisine.pdf\""));
        assert!(value.contains("filename*=UTF-8''r%C3%A9ponse%20%C3%A0%20la%20saisine%2Epdf"));
        assert!(axum::http::HeaderValue::from_str(&value)
            .map(|header| header.to_str().is_ok())
            .unwrap_or(false));
    }
}
