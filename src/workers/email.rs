use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::{
    jobs::JOB_SEND_EMAIL,
    models::Job,
    notifications::{Delivery, EmailJob, Mailer},
    state::AppState,
};

use super::{JobExecution, JobHandler};

const RETRY_DELAY: Duration = Duration::from_secs(60);
const MAX_ATTEMPTS: i32 = 5;

pub struct SendEmailJob {
    mailer: Mailer,
}

impl SendEmailJob {
    pub fn new(mailer: Mailer) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl JobHandler for SendEmailJob {
    fn job_type(&self) -> &'static str {
        JOB_SEND_EMAIL
    }

    async fn handle(&self, _state: Arc<AppState>, job: Job) -> JobExecution {
        let email: EmailJob = match serde_json::from_value(job.payload.clone()) {
            Ok(email) => email,
            Err(err) => {
                return JobExecution::Failed {
                    error: format!("invalid email payload: {err}"),
                }
            }
        };

        match self.mailer.send(&email).await {
            Ok(Delivery::Sent) => {
                info!(
                    job_id = %job.id,
                    template = ?email.template,
                    referral_id = email.referral_id,
                    "notification email sent"
                );
                JobExecution::Success
            }
            Ok(Delivery::Skipped) => JobExecution::Success,
            Err(err) if err.is_retryable() && job.attempts < MAX_ATTEMPTS => JobExecution::Retry {
                delay: RETRY_DELAY,
                error: err.to_string(),
            },
            Err(err) => JobExecution::Failed {
                error: err.to_string(),
            },
        }
    }
}
