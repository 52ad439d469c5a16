//! Postgres-backed background job queue.
//!
//! Jobs are rows in `jobs`; a worker claims one with `FOR UPDATE SKIP LOCKED`
//! so several workers can poll the same table.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Job, NewJob};
use crate::schema::jobs;

pub const JOB_SEND_EMAIL: &str = "send-email";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("invalid job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type JobQueueResult<T> = Result<T, JobQueueError>;

/// Queues a job. Runs on the caller's connection, so it joins any open transaction.
pub fn enqueue_job(
    conn: &mut PgConnection,
    job_type: &str,
    payload: Value,
    run_after: Option<NaiveDateTime>,
) -> JobQueueResult<Job> {
    let job = diesel::insert_into(jobs::table)
        .values(&NewJob {
            id: Uuid::new_v4(),
            job_type: job_type.to_string(),
            payload,
            status: JobStatus::Queued.as_str().to_string(),
            run_after: run_after.unwrap_or_else(|| Utc::now().naive_utc()),
        })
        .get_result(conn)?;
    Ok(job)
}

/// Claims the oldest due job of one of `job_types` and marks it processing.
pub fn reserve_job(conn: &mut PgConnection, job_types: &[&str]) -> JobQueueResult<Option<Job>> {
    let now = Utc::now().naive_utc();

    let reserved = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let Some(job) = jobs::table
            .filter(jobs::status.eq(JobStatus::Queued.as_str()))
            .filter(jobs::run_after.le(now))
            .filter(jobs::job_type.eq_any(job_types))
            .order(jobs::run_after.asc())
            .for_update()
            .skip_locked()
            .first::<Job>(conn)
            .optional()?
        else {
            return Ok(None);
        };

        diesel::update(jobs::table.find(job.id))
            .set((
                jobs::status.eq(JobStatus::Processing.as_str()),
                jobs::attempts.eq(jobs::attempts + 1),
                jobs::updated_at.eq(now),
            ))
            .get_result::<Job>(conn)
            .map(Some)
    })?;
    Ok(reserved)
}

pub fn mark_job_succeeded(conn: &mut PgConnection, job_id: Uuid) -> JobQueueResult<()> {
    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(JobStatus::Succeeded.as_str()),
            jobs::last_error.eq(None::<String>),
            jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

/// Puts the job back in the queue, due again after `delay`.
pub fn retry_job_after(
    conn: &mut PgConnection,
    job_id: Uuid,
    delay: Duration,
    error_message: &str,
) -> JobQueueResult<()> {
    let now = Utc::now();
    let delay = ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::seconds(30));

    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(JobStatus::Queued.as_str()),
            jobs::run_after.eq((now + delay).naive_utc()),
            jobs::last_error.eq(Some(error_message)),
            jobs::updated_at.eq(now.naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn mark_job_failed(
    conn: &mut PgConnection,
    job_id: Uuid,
    error_message: &str,
) -> JobQueueResult<()> {
    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(JobStatus::Failed.as_str()),
            jobs::last_error.eq(Some(error_message)),
            jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

/// Deletes succeeded and failed jobs last touched before `older_than`.
pub fn prune_finished_jobs(
    conn: &mut PgConnection,
    older_than: NaiveDateTime,
) -> JobQueueResult<usize> {
    let deleted = diesel::delete(
        jobs::table
            .filter(jobs::status.eq_any([
                JobStatus::Succeeded.as_str(),
                JobStatus::Failed.as_str(),
            ]))
            .filter(jobs::updated_at.lt(older_than)),
    )
    .execute(conn)?;
    Ok(deleted)
}
