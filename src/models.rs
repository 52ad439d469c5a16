use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub unit_name: String,
    pub title: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub unit_name: String,
    pub title: String,
}

/// Emails are stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = units)]
pub struct Unit {
    pub id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = units)]
pub struct NewUnit {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = unit_memberships)]
#[diesel(belongs_to(Unit))]
#[diesel(belongs_to(User))]
pub struct UnitMembership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub unit_id: Uuid,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = unit_memberships)]
pub struct NewUnitMembership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub unit_id: Uuid,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = topics)]
#[diesel(belongs_to(Unit))]
pub struct Topic {
    pub id: Uuid,
    pub name: String,
    pub unit_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = topics)]
pub struct NewTopic {
    pub id: Uuid,
    pub name: String,
    pub unit_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = referral_urgencies)]
pub struct ReferralUrgency {
    pub id: i32,
    pub name: String,
    pub duration_days: i32,
    pub is_default: bool,
    pub requires_justification: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = referral_urgencies)]
pub struct NewReferralUrgency {
    pub name: String,
    pub duration_days: i32,
    pub is_default: bool,
    pub requires_justification: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = referrals)]
#[diesel(belongs_to(Topic))]
pub struct Referral {
    pub id: i32,
    pub context: String,
    pub prior_work: String,
    pub question: String,
    pub requester: String,
    pub topic_id: Uuid,
    pub urgency_level_id: Option<i32>,
    pub urgency_explanation: String,
    pub state: String,
    pub user_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = referrals)]
pub struct NewReferral {
    pub context: String,
    pub prior_work: String,
    pub question: String,
    pub requester: String,
    pub topic_id: Uuid,
    pub urgency_level_id: Option<i32>,
    pub urgency_explanation: String,
    pub state: String,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = referral_assignments)]
#[diesel(belongs_to(Referral))]
pub struct ReferralAssignment {
    pub id: Uuid,
    pub referral_id: i32,
    pub assignee_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = referral_assignments)]
pub struct NewReferralAssignment {
    pub id: Uuid,
    pub referral_id: i32,
    pub assignee_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = referral_answers)]
#[diesel(belongs_to(Referral))]
pub struct ReferralAnswer {
    pub id: Uuid,
    pub referral_id: i32,
    pub content: String,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = referral_answers)]
pub struct NewReferralAnswer {
    pub id: Uuid,
    pub referral_id: i32,
    pub content: String,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = referral_activities)]
#[diesel(belongs_to(Referral))]
pub struct ReferralActivity {
    pub id: Uuid,
    pub referral_id: i32,
    pub actor_id: Option<Uuid>,
    pub verb: String,
    pub item_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = referral_activities)]
pub struct NewReferralActivity {
    pub id: Uuid,
    pub referral_id: i32,
    pub actor_id: Option<Uuid>,
    pub verb: String,
    pub item_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = referral_attachments)]
#[diesel(belongs_to(Referral))]
pub struct ReferralAttachment {
    pub id: Uuid,
    pub referral_id: i32,
    pub name: String,
    pub size_bytes: i64,
    pub content_type: Option<String>,
    pub s3_key: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = referral_attachments)]
pub struct NewReferralAttachment {
    pub id: Uuid,
    pub referral_id: i32,
    pub name: String,
    pub size_bytes: i64,
    pub content_type: Option<String>,
    pub s3_key: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = referral_answer_attachments)]
#[diesel(belongs_to(ReferralAnswer))]
pub struct ReferralAnswerAttachment {
    pub id: Uuid,
    pub referral_answer_id: Uuid,
    pub name: String,
    pub size_bytes: i64,
    pub content_type: Option<String>,
    pub s3_key: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = referral_answer_attachments)]
pub struct NewReferralAnswerAttachment {
    pub id: Uuid,
    pub referral_answer_id: Uuid,
    pub name: String,
    pub size_bytes: i64,
    pub content_type: Option<String>,
    pub s3_key: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub run_after: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub run_after: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = refresh_tokens)]
#[diesel(belongs_to(User))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Expert@Example.ORG "), "expert@example.org");
    }
}
