use async_trait::async_trait;
use redis::AsyncCommands;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::application::{ApplicationRow, ApplicationStatus};
use crate::models::job::JobRow;

/// Redis list the external mail worker consumes from.
pub const DELIVERY_QUEUE: &str = "mailer:deliveries";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    NewApplication,
    ApplicationReviewing,
    ApplicationInterview,
    ApplicationAccepted,
    ApplicationRejected,
    JobClosed,
}

impl Template {
    /// Mail template for an application status change, if the status has one.
    /// Withdrawal is silent.
    pub fn for_status_change(status: ApplicationStatus) -> Option<Template> {
        match status {
            ApplicationStatus::Reviewing => Some(Template::ApplicationReviewing),
            ApplicationStatus::Interviewed => Some(Template::ApplicationInterview),
            ApplicationStatus::Accepted => Some(Template::ApplicationAccepted),
            ApplicationStatus::Rejected => Some(Template::ApplicationRejected),
            ApplicationStatus::Pending | ApplicationStatus::Withdrawn => None,
        }
    }
}

/// One queued mail delivery. The worker owns templating; we ship the routing
/// fields and enough context to render a subject line.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub template: Template,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub job_title: String,
    pub application_id: Uuid,
    pub instance: String,
}

impl Notification {
    /// Tells the job's contact address about a fresh application; replies go
    /// straight to the applicant.
    pub fn new_application(job: &JobRow, application: &ApplicationRow, instance: &str) -> Self {
        let to = job
            .contact_email
            .clone()
            .unwrap_or_else(|| application.applicant_email.clone());
        Notification {
            template: Template::NewApplication,
            to,
            reply_to: Some(application.applicant_email.clone()),
            job_title: job.title.clone(),
            application_id: application.id,
            instance: instance.to_string(),
        }
    }

    pub fn status_change(
        template: Template,
        job: &JobRow,
        application: &ApplicationRow,
        instance: &str,
    ) -> Self {
        Notification {
            template,
            to: application.applicant_email.clone(),
            reply_to: None,
            job_title: job.title.clone(),
            application_id: application.id,
            instance: instance.to_string(),
        }
    }

    pub fn job_closed(job: &JobRow, application: &ApplicationRow, instance: &str) -> Self {
        Self::status_change(Template::JobClosed, job, application, instance)
    }
}

/// Outbound notification seam. Publishing is fire-and-forget: implementations
/// must never surface a failure into the calling request.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, notification: Notification);
}

/// Production notifier: RPUSHes JSON payloads onto the mailer delivery list.
pub struct RedisNotifier {
    client: redis::Client,
}

impl RedisNotifier {
    pub fn new(client: redis::Client) -> Self {
        RedisNotifier { client }
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn publish(&self, notification: Notification) {
        let payload = match serde_json::to_string(&notification) {
            Ok(p) => p,
            Err(e) => {
                warn!("Dropping notification, serialization failed: {e}");
                return;
            }
        };

        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                warn!("Dropping notification, Redis unavailable: {e}");
                return;
            }
        };

        match conn.rpush::<_, _, ()>(DELIVERY_QUEUE, &payload).await {
            Ok(()) => debug!(
                "Queued {:?} notification for {}",
                notification.template, notification.to
            ),
            Err(e) => warn!("Dropping notification, RPUSH failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Test double that records everything published.
    pub struct RecordingNotifier {
        pub published: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            RecordingNotifier {
                published: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn publish(&self, notification: Notification) {
            self.published.lock().unwrap().push(notification);
        }
    }

    fn job(contact_email: Option<&str>) -> JobRow {
        JobRow {
            id: Uuid::new_v4(),
            title: "Backend Engineer".to_string(),
            description: "desc".to_string(),
            requirements: None,
            location: None,
            salary_range: None,
            deadline: None,
            status: crate::models::job::JobStatus::Open,
            job_type: crate::models::job::JobType::FullTime,
            job_category: None,
            contact_email: contact_email.map(str::to_string),
            views_count: 0,
            application_count: 0,
            organization_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn application() -> ApplicationRow {
        ApplicationRow {
            id: Uuid::new_v4(),
            status: ApplicationStatus::Pending,
            cover_letter: None,
            applicant_email: "jane@seeker.com".to_string(),
            applicant_phone_number: "555-0100".to_string(),
            applicant_fullname: "Jane Doe".to_string(),
            resume_file_name: "cv.pdf".to_string(),
            resume_content_type: "application/pdf".to_string(),
            resume_file_size: 1024,
            resume_key: "resumes/x/cv.pdf".to_string(),
            user_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn status_templates_skip_pending_and_withdrawn() {
        assert_eq!(
            Template::for_status_change(ApplicationStatus::Reviewing),
            Some(Template::ApplicationReviewing)
        );
        assert_eq!(
            Template::for_status_change(ApplicationStatus::Interviewed),
            Some(Template::ApplicationInterview)
        );
        assert_eq!(
            Template::for_status_change(ApplicationStatus::Accepted),
            Some(Template::ApplicationAccepted)
        );
        assert_eq!(
            Template::for_status_change(ApplicationStatus::Rejected),
            Some(Template::ApplicationRejected)
        );
        assert_eq!(Template::for_status_change(ApplicationStatus::Pending), None);
        assert_eq!(
            Template::for_status_change(ApplicationStatus::Withdrawn),
            None
        );
    }

    #[test]
    fn new_application_routes_to_contact_email_with_reply_to() {
        let n = Notification::new_application(&job(Some("jobs@acme.com")), &application(), "host");
        assert_eq!(n.to, "jobs@acme.com");
        assert_eq!(n.reply_to.as_deref(), Some("jane@seeker.com"));
        assert_eq!(n.template, Template::NewApplication);
    }

    #[test]
    fn status_change_routes_to_applicant() {
        let n = Notification::status_change(
            Template::ApplicationAccepted,
            &job(Some("jobs@acme.com")),
            &application(),
            "host",
        );
        assert_eq!(n.to, "jane@seeker.com");
        assert!(n.reply_to.is_none());
    }

    #[test]
    fn payload_serializes_with_snake_case_template() {
        let n = Notification::job_closed(&job(None), &application(), "jobs.example");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["template"], "job_closed");
        assert_eq!(json["job_title"], "Backend Engineer");
        assert_eq!(json["instance"], "jobs.example");
        assert!(json.get("reply_to").is_none());
    }

    #[tokio::test]
    async fn recording_notifier_captures_in_order() {
        let notifier = RecordingNotifier::new();
        notifier
            .publish(Notification::job_closed(&job(None), &application(), "host"))
            .await;
        notifier
            .publish(Notification::new_application(
                &job(Some("jobs@acme.com")),
                &application(),
                "host",
            ))
            .await;
        let published = notifier.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].template, Template::JobClosed);
        assert_eq!(published[1].template, Template::NewApplication);
    }
}
