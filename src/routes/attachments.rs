use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::Redirect,
};
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{ReferralAnswer, ReferralAnswerAttachment, ReferralAttachment},
    routes::referrals::load_with_access,
    schema::{referral_answer_attachments, referral_answers, referral_attachments},
    state::AppState,
};

const PRESIGNED_URL_EXPIRY_SECONDS: u64 = 300;

pub async fn download_referral_attachment(
    State(state): State<AppState>,
    Path(attachment_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Redirect> {
    let mut conn = state.db()?;
    let attachment: ReferralAttachment = referral_attachments::table
        .find(attachment_id)
        .first(&mut conn)?;
    let (_, _, access) = load_with_access(&mut conn, attachment.referral_id, &user)?;
    if !access.can_view() {
        return Err(AppError::forbidden());
    }
    drop(conn);

    info!(%attachment_id, referral_id = attachment.referral_id, "attachment download");
    redirect_to_object(&state, &attachment.s3_key).await
}

pub async fn download_answer_attachment(
    State(state): State<AppState>,
    Path(attachment_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Redirect> {
    let mut conn = state.db()?;
    let (attachment, answer): (ReferralAnswerAttachment, ReferralAnswer) =
        referral_answer_attachments::table
            .inner_join(referral_answers::table)
            .filter(referral_answer_attachments::id.eq(attachment_id))
            .first(&mut conn)?;
    let (_, _, access) = load_with_access(&mut conn, answer.referral_id, &user)?;
    if !access.can_view() {
        return Err(AppError::forbidden());
    }
    drop(conn);

    info!(%attachment_id, referral_id = answer.referral_id, "answer attachment download");
    redirect_to_object(&state, &attachment.s3_key).await
}

async fn redirect_to_object(state: &AppState, key: &str) -> AppResult<Redirect> {
    let presigned_url = state
        .storage
        .presign_get_object(key, Duration::from_secs(PRESIGNED_URL_EXPIRY_SECONDS))
        .await
        .map_err(|err| AppError::internal(format!("failed to generate download URL: {err}")))?;
    Ok(Redirect::temporary(&presigned_url))
}
