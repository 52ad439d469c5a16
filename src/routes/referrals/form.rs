use axum::extract::Multipart;
use tracing::error;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::ReferralUrgency,
};

const REQUIRED: &str = "This field is required.";
const MAX_REQUESTER: usize = 500;
const MAX_ATTACHMENT_NAME: usize = 200;
const MAX_CONTENT_TYPE: usize = 100;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Raw multipart submission for a new referral, before validation.
#[derive(Debug, Default)]
pub struct ReferralForm {
    pub context: Option<String>,
    pub prior_work: Option<String>,
    pub question: Option<String>,
    pub requester: Option<String>,
    pub topic: Option<String>,
    pub urgency_level: Option<String>,
    pub urgency_explanation: Option<String>,
    pub files: Vec<UploadedFile>,
}

/// A referral submission whose fields passed the checks that need no database.
#[derive(Debug)]
pub struct CleanReferral {
    pub context: String,
    pub prior_work: String,
    pub question: String,
    pub requester: String,
    pub topic_id: Uuid,
    pub urgency_level_id: Option<i32>,
    pub urgency_explanation: String,
    pub files: Vec<UploadedFile>,
}

impl ReferralForm {
    pub async fn from_multipart(multipart: Multipart) -> AppResult<Self> {
        let mut form = ReferralForm::default();
        let files = read_multipart(multipart, |name, value| {
            let slot = match name {
                "context" => &mut form.context,
                "prior_work" => &mut form.prior_work,
                "question" => &mut form.question,
                "requester" => &mut form.requester,
                "topic" => &mut form.topic,
                "urgency_level" => &mut form.urgency_level,
                "urgency_explanation" => &mut form.urgency_explanation,
                _ => return,
            };
            *slot = Some(value);
        })
        .await?;
        form.files = files;
        Ok(form)
    }

    pub fn clean(self) -> Result<CleanReferral, FieldErrors> {
        let mut errors = FieldErrors::new();

        let context = required(&mut errors, "context", self.context);
        let prior_work = required(&mut errors, "prior_work", self.prior_work);
        let question = required(&mut errors, "question", self.question);
        let requester = required(&mut errors, "requester", self.requester)
            .filter(|requester| {
                let fits = requester.chars().count() <= MAX_REQUESTER;
                if !fits {
                    add_error(
                        &mut errors,
                        "requester",
                        "Ensure this field has no more than 500 characters.",
                    );
                }
                fits
            });

        let topic_id = match non_blank(self.topic) {
            None => {
                add_error(&mut errors, "topic", REQUIRED);
                None
            }
            Some(raw) => match Uuid::parse_str(&raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    add_error(&mut errors, "topic", "Enter a valid UUID.");
                    None
                }
            },
        };

        let urgency_level_id = match non_blank(self.urgency_level) {
            None => None,
            Some(raw) => match raw.parse::<i32>() {
                Ok(id) => Some(id),
                Err(_) => {
                    add_error(&mut errors, "urgency_level", "A valid integer is required.");
                    None
                }
            },
        };

        check_files(&self.files, &mut errors);

        match (context, prior_work, question, requester, topic_id) {
            (Some(context), Some(prior_work), Some(question), Some(requester), Some(topic_id))
                if errors.is_empty() =>
            {
                Ok(CleanReferral {
                    context,
                    prior_work,
                    question,
                    requester,
                    topic_id,
                    urgency_level_id,
                    urgency_explanation: self
                        .urgency_explanation
                        .map(|value| value.trim().to_string())
                        .unwrap_or_default(),
                    files: self.files,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Urgency levels flagged `requires_justification` need an explanation.
pub fn check_justification(
    urgency: Option<&ReferralUrgency>,
    explanation: &str,
    errors: &mut FieldErrors,
) {
    if urgency.is_some_and(|level| level.requires_justification) && explanation.trim().is_empty()
    {
        add_error(errors, "urgency_explanation", REQUIRED);
    }
}

/// Submission for an answer: a text body plus optional files.
#[derive(Debug, Default)]
pub struct AnswerForm {
    pub content: Option<String>,
    pub files: Vec<UploadedFile>,
}

impl AnswerForm {
    pub async fn from_multipart(multipart: Multipart) -> AppResult<Self> {
        let mut content = None;
        let files = read_multipart(multipart, |name, value| {
            if name == "content" {
                content = Some(value);
            }
        })
        .await?;
        Ok(AnswerForm { content, files })
    }

    pub fn clean(self) -> Result<(String, Vec<UploadedFile>), FieldErrors> {
        let mut errors = FieldErrors::new();
        let content = required(&mut errors, "content", self.content);
        check_files(&self.files, &mut errors);
        match content {
            Some(content) if errors.is_empty() => Ok((content, self.files)),
            _ => Err(errors),
        }
    }
}

/// Attachment metadata has to fit the attachment table columns.
fn check_files(files: &[UploadedFile], errors: &mut FieldErrors) {
    for file in files {
        if file.name.chars().count() > MAX_ATTACHMENT_NAME {
            add_error(
                errors,
                "files",
                "Attachment names cannot exceed 200 characters.",
            );
        }
        if file
            .content_type
            .as_deref()
            .is_some_and(|content_type| content_type.chars().count() > MAX_CONTENT_TYPE)
        {
            add_error(
                errors,
                "files",
                "Attachment content types cannot exceed 100 characters.",
            );
        }
    }
}

pub fn add_error(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    let value = non_blank(value);
    if value.is_none() {
        add_error(errors, field, REQUIRED);
    }
    value
}

/// Walks every multipart field: parts named `files` are collected as uploads,
/// every other part is handed to `on_text` as a string.
async fn read_multipart<F>(mut multipart: Multipart, mut on_text: F) -> AppResult<Vec<UploadedFile>>
where
    F: FnMut(&str, String),
{
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string()).unwrap_or_default();
        if name == "files" {
            let file_name = field
                .file_name()
                .map(|n| n.to_string())
                .filter(|n| !n.trim().is_empty());
            let content_type = field.content_type().map(|mime| mime.to_string());
            let data = field.bytes().await.map_err(|err| {
                error!(error = %err, "failed to read attachment bytes");
                AppError::bad_request(format!("failed to read file bytes: {err}"))
            })?;
            let name = file_name.unwrap_or_else(|| format!("attachment-{}", files.len() + 1));
            let content_type = content_type.or_else(|| {
                mime_guess::from_path(&name)
                    .first()
                    .map(|mime| mime.essence_str().to_string())
            });
            files.push(UploadedFile {
                name,
                content_type,
                bytes: data.to_vec(),
            });
        } else {
            let value = field.text().await.map_err(|err| {
                error!(error = %err, field = %name, "invalid multipart text field");
                AppError::bad_request(format!("invalid value for {name}: {err}"))
            })?;
            on_text(&name, value);
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_form() -> ReferralForm {
        ReferralForm {
            context: Some("the context".into()),
            prior_work: Some("the prior work".into()),
            question: Some("the question".into()),
            requester: Some("the requester".into()),
            topic: Some(Uuid::new_v4().to_string()),
            urgency_level: None,
            urgency_explanation: None,
            files: Vec::new(),
        }
    }

    fn urgency(requires_justification: bool) -> ReferralUrgency {
        ReferralUrgency {
            id: 1,
            name: "Urgent".into(),
            duration_days: 3,
            is_default: false,
            requires_justification,
        }
    }

    #[test]
    fn complete_form_is_clean() {
        let clean = complete_form().clean().unwrap();
        assert_eq!(clean.question, "the question");
        assert_eq!(clean.urgency_level_id, None);
        assert_eq!(clean.urgency_explanation, "");
    }

    #[test]
    fn missing_question_reports_only_that_field() {
        let mut form = complete_form();
        form.question = None;
        let errors = form.clean().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["question"], vec![REQUIRED.to_string()]);
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut form = complete_form();
        form.context = Some("   ".into());
        form.requester = Some(String::new());
        let errors = form.clean().unwrap_err();
        assert!(errors.contains_key("context"));
        assert!(errors.contains_key("requester"));
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let mut form = complete_form();
        form.topic = Some("42".into());
        form.urgency_level = Some("soon".into());
        let errors = form.clean().unwrap_err();
        assert_eq!(errors["topic"], vec!["Enter a valid UUID.".to_string()]);
        assert!(errors.contains_key("urgency_level"));
    }

    #[test]
    fn urgency_level_is_parsed() {
        let mut form = complete_form();
        form.urgency_level = Some(" 7 ".into());
        assert_eq!(form.clean().unwrap().urgency_level_id, Some(7));
    }

    #[test]
    fn justification_only_required_when_level_demands_it() {
        let mut errors = FieldErrors::new();
        check_justification(Some(&urgency(false)), "", &mut errors);
        check_justification(None, "", &mut errors);
        assert!(errors.is_empty());

        check_justification(Some(&urgency(true)), "because", &mut errors);
        assert!(errors.is_empty());

        check_justification(Some(&urgency(true)), "  ", &mut errors);
        assert_eq!(errors["urgency_explanation"], vec![REQUIRED.to_string()]);
    }

    #[test]
    fn answer_requires_content() {
        let errors = AnswerForm::default().clean().unwrap_err();
        assert!(errors.contains_key("content"));

        let (content, files) = AnswerForm {
            content: Some("answer content".into()),
            files: Vec::new(),
        }
        .clean()
        .unwrap();
        assert_eq!(content, "answer content");
        assert!(files.is_empty());
    }

    #[test]
    fn requester_is_limited_to_500_characters() {
        let mut form = complete_form();
        form.requester = Some("r".repeat(500));
        assert!(form.clean().is_ok());

        let mut form = complete_form();
        form.requester = Some("r".repeat(501));
        let errors = form.clean().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("requester"));
    }

    #[test]
    fn answer_files_are_checked_like_referral_files() {
        let long_name = UploadedFile {
            name: format!("{}.pdf", "a".repeat(210)),
            content_type: Some("application/pdf".into()),
            bytes: b"%PDF".to_vec(),
        };
        let long_type = UploadedFile {
            name: "notes.txt".into(),
            content_type: Some(format!("text/{}", "x".repeat(100))),
            bytes: b"notes".to_vec(),
        };

        let errors = AnswerForm {
            content: Some("answer content".into()),
            files: vec![long_name.clone(), long_type.clone()],
        }
        .clean()
        .unwrap_err();
        assert_eq!(errors["files"].len(), 2);

        let mut form = complete_form();
        form.files = vec![long_type];
        let errors = form.clean().unwrap_err();
        assert_eq!(
            errors["files"],
            vec!["Attachment content types cannot exceed 100 characters.".to_string()]
        );
    }
}
