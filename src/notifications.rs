//! E-mail notifications about referral activity.
//!
//! Handlers never talk to the mail provider directly: they queue a
//! `send-email` job inside the same transaction as the change it reports, and
//! the worker delivers it through [`Mailer`].

use diesel::pg::PgConnection;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;
use crate::jobs::{enqueue_job, JobQueueResult, JOB_SEND_EMAIL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmailTemplate {
    /// A new referral landed in a unit; sent to the unit's owners.
    ReferralReceived,
    /// Confirmation to the user who created the referral.
    ReferralSaved,
    ReferralAssigned,
    ReferralAnswered,
}

impl EmailTemplate {
    pub fn subject(&self) -> &'static str {
        match self {
            EmailTemplate::ReferralReceived => "New referral received",
            EmailTemplate::ReferralSaved => "Your referral has been saved",
            EmailTemplate::ReferralAssigned => "A referral has been assigned to you",
            EmailTemplate::ReferralAnswered => "Your referral has been answered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    pub template: EmailTemplate,
    pub recipient: String,
    pub referral_id: i32,
}

pub fn queue_email(conn: &mut PgConnection, email: &EmailJob) -> JobQueueResult<()> {
    let payload = serde_json::to_value(email)?;
    enqueue_job(conn, JOB_SEND_EMAIL, payload, None)?;
    Ok(())
}

pub fn queue_emails(
    conn: &mut PgConnection,
    template: EmailTemplate,
    recipients: impl IntoIterator<Item = String>,
    referral_id: i32,
) -> JobQueueResult<usize> {
    let mut queued = 0;
    for recipient in recipients {
        queue_email(
            conn,
            &EmailJob {
                template,
                recipient,
                referral_id,
            },
        )?;
        queued += 1;
    }
    Ok(queued)
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail provider rejected the message with status {0}")]
    Rejected(StatusCode),
    #[error("mail provider failed with status {0}")]
    Unavailable(StatusCode),
}

impl MailerError {
    /// Transport failures and provider-side errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, MailerError::Rejected(_))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No provider configured; the message was only logged.
    Skipped,
}

pub struct Mailer {
    client: Client,
    api_url: Option<String>,
    api_key: Option<String>,
    sender: String,
    app_base_url: String,
}

impl Mailer {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            sender: config.email_sender.clone(),
            app_base_url: config.app_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Link to a referral as shown in notification e-mails.
    pub fn referral_url(&self, referral_id: i32) -> String {
        format!("{}/referrals/{referral_id}", self.app_base_url)
    }

    pub async fn send(&self, email: &EmailJob) -> Result<Delivery, MailerError> {
        let Some(api_url) = self.api_url.as_deref() else {
            info!(
                template = ?email.template,
                recipient = %email.recipient,
                referral_id = email.referral_id,
                "no email provider configured; skipping send"
            );
            return Ok(Delivery::Skipped);
        };

        let mut request = self.client.post(api_url).json(&self.payload(email));
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(Delivery::Sent)
        } else if status.is_client_error() {
            Err(MailerError::Rejected(status))
        } else {
            Err(MailerError::Unavailable(status))
        }
    }

    fn payload(&self, email: &EmailJob) -> Value {
        json!({
            "sender": { "email": self.sender },
            "to": [{ "email": email.recipient }],
            "subject": email.template.subject(),
            "template": email.template,
            "params": {
                "referral_id": email.referral_id,
                "referral_url": self.referral_url(email.referral_id),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/db".to_string(),
            database_max_pool_size: 1,
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            jwt_secret: "secret".to_string(),
            jwt_issuer: "issuer".to_string(),
            jwt_audience: "audience".to_string(),
            jwt_expiry_minutes: 60,
            refresh_token_expiry_days: 30,
            refresh_cookie_secure: false,
            refresh_cookie_domain: None,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: "bucket".to_string(),
            email_api_url: None,
            email_api_key: None,
            email_sender: "desk@example.org".to_string(),
            app_base_url: "https://desk.example.org/".to_string(),
        }
    }

    #[test]
    fn job_payload_uses_kebab_case_templates() {
        let job = EmailJob {
            template: EmailTemplate::ReferralAssigned,
            recipient: "expert@example.org".to_string(),
            referral_id: 12,
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["template"], "referral-assigned");
        let parsed: EmailJob = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, job);
    }

    #[test]
    fn provider_payload_links_to_referral() {
        let job = EmailJob {
            template: EmailTemplate::ReferralAnswered,
            recipient: "requester@example.org".to_string(),
            referral_id: 3,
        };
        let payload = Mailer::from_config(&config()).payload(&job);
        assert_eq!(payload["sender"]["email"], "desk@example.org");
        assert_eq!(payload["to"][0]["email"], "requester@example.org");
        assert_eq!(payload["subject"], "Your referral has been answered");
        assert_eq!(
            payload["params"]["referral_url"],
            "https://desk.example.org/referrals/3"
        );
    }

    #[tokio::test]
    async fn send_without_provider_is_skipped() {
        let mailer = Mailer::from_config(&config());
        let job = EmailJob {
            template: EmailTemplate::ReferralSaved,
            recipient: "someone@example.org".to_string(),
            referral_id: 1,
        };
        assert_eq!(mailer.send(&job).await.unwrap(), Delivery::Skipped);
    }

    #[test]
    fn rejected_messages_are_not_retried() {
        assert!(!MailerError::Rejected(StatusCode::BAD_REQUEST).is_retryable());
        assert!(MailerError::Unavailable(StatusCode::BAD_GATEWAY).is_retryable());
    }
}
