use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::database::store::{ApplicationStore, JobDirectory, MessageLog};
use crate::error::{Error, Result};
use crate::models::application::{
    Application, ApplicationFilter, ApplicationStatus, ApplicationView, NewApplication,
};
use crate::models::job::Job;
use crate::models::message::{Message, NewMessage};
use crate::models::user::{Identity, Role};
use crate::utils::pagination::PageRequest;

pub const MAX_MESSAGE_CHARS: usize = 5000;
const RECENT_ACTIVITY_LIMIT: i64 = 5;

/// Application lifecycle: submission, employer status changes and the
/// per-application message thread.
#[derive(Clone)]
pub struct ApplicationService {
    applications: Arc<dyn ApplicationStore>,
    messages: Arc<dyn MessageLog>,
    jobs: Arc<dyn JobDirectory>,
}

#[derive(Debug)]
pub struct ApplicationList {
    pub items: Vec<ApplicationView>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl ApplicationList {
    fn new(items: Vec<ApplicationView>, total: i64, page: PageRequest) -> Self {
        Self {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
            total_pages: page.total_pages(total),
        }
    }
}

pub struct ApplicationStats {
    pub status_counts: BTreeMap<ApplicationStatus, i64>,
    pub recent_activity: Vec<ApplicationView>,
}

impl ApplicationService {
    pub fn new(
        applications: Arc<dyn ApplicationStore>,
        messages: Arc<dyn MessageLog>,
        jobs: Arc<dyn JobDirectory>,
    ) -> Self {
        Self {
            applications,
            messages,
            jobs,
        }
    }

    pub async fn submit_application(
        &self,
        caller: &Identity,
        job_id: Uuid,
        cover_letter: Option<String>,
        resume_ref: Option<String>,
    ) -> Result<Application> {
        if caller.role != Role::JobSeeker {
            return Err(Error::Forbidden(
                "Only job seekers can apply for jobs".to_string(),
            ));
        }

        self.jobs
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::NotFound("Job not found".to_string()))?;

        let application = self
            .applications
            .insert_application(NewApplication {
                job_id,
                applicant_id: caller.user_id,
                cover_letter,
                resume_ref,
            })
            .await?
            .ok_or_else(|| {
                Error::Conflict("You have already applied for this job".to_string())
            })?;

        tracing::info!(
            application_id = %application.id,
            job_id = %job_id,
            applicant_id = %caller.user_id,
            "application submitted"
        );
        Ok(application)
    }

    pub async fn list_my_applications(
        &self,
        caller_id: Uuid,
        filter: ApplicationFilter,
        page: PageRequest,
    ) -> Result<ApplicationList> {
        let (items, total) = self
            .applications
            .list_by_applicant(caller_id, &filter, page)
            .await?;
        Ok(ApplicationList::new(items, total, page))
    }

    /// Applications received for one job; only its employer may look.
    pub async fn list_job_applications(
        &self,
        caller_id: Uuid,
        job_id: Uuid,
        filter: ApplicationFilter,
        page: PageRequest,
    ) -> Result<ApplicationList> {
        let job = self
            .jobs
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::NotFound("Job not found".to_string()))?;
        if job.employer_id != caller_id {
            return Err(Error::Forbidden(
                "Not authorized to view applications for this job".to_string(),
            ));
        }

        let (items, total) = self.applications.list_by_job(job_id, &filter, page).await?;
        Ok(ApplicationList::new(items, total, page))
    }

    /// Any status may follow any other. The status write and the system
    /// message recording it commit together.
    pub async fn update_status(
        &self,
        caller_id: Uuid,
        application_id: Uuid,
        new_status: &str,
    ) -> Result<Application> {
        let (_, job) = self.load_with_job(application_id).await?;
        if job.employer_id != caller_id {
            return Err(Error::Forbidden(
                "Not authorized to update this application".to_string(),
            ));
        }
        let status: ApplicationStatus = new_status.parse()?;

        let transition = self
            .applications
            .update_status(application_id, status, caller_id)
            .await?;

        tracing::info!(
            application_id = %application_id,
            from = %transition.previous,
            to = %status,
            message_id = %transition.message.id,
            "application status updated"
        );
        Ok(transition.application)
    }

    pub async fn send_message(
        &self,
        caller_id: Uuid,
        application_id: Uuid,
        content: &str,
    ) -> Result<Message> {
        let (application, job) = self.load_with_job(application_id).await?;
        ensure_party(caller_id, &application, &job, "send messages on")?;

        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidArgument(
                "Message content must not be empty".to_string(),
            ));
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(Error::InvalidArgument(format!(
                "Message content exceeds {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        self.messages
            .insert_message(NewMessage {
                application_id,
                sender_id: caller_id,
                content: content.to_string(),
                is_system_message: false,
            })
            .await
    }

    /// Returns the thread oldest first, then marks the returned messages the
    /// caller did not author as read. The returned messages carry their read
    /// flags from before the marking; anything posted after the snapshot
    /// stays unread.
    pub async fn list_messages(&self, caller_id: Uuid, application_id: Uuid) -> Result<Vec<Message>> {
        let (application, job) = self.load_with_job(application_id).await?;
        ensure_party(caller_id, &application, &job, "view messages for")?;

        let thread = self.messages.list_messages(application_id).await?;
        let unread: Vec<Uuid> = thread
            .iter()
            .filter(|message| !message.is_read && message.sender_id != caller_id)
            .map(|message| message.id)
            .collect();
        let marked = self.messages.mark_read(caller_id, &unread).await?;
        if marked > 0 {
            tracing::debug!(application_id = %application_id, reader_id = %caller_id, marked, "messages marked as read");
        }
        Ok(thread)
    }

    pub async fn application_stats(&self, caller_id: Uuid) -> Result<ApplicationStats> {
        let status_counts = self
            .applications
            .status_counts(caller_id)
            .await?
            .into_iter()
            .collect();
        let recent_activity = self
            .applications
            .recent_activity(caller_id, RECENT_ACTIVITY_LIMIT)
            .await?;

        Ok(ApplicationStats {
            status_counts,
            recent_activity,
        })
    }

    pub async fn unread_message_count(&self, caller_id: Uuid) -> Result<i64> {
        self.messages.unread_count(caller_id).await
    }

    async fn load_with_job(&self, application_id: Uuid) -> Result<(Application, Job)> {
        let application = self
            .applications
            .get_application(application_id)
            .await?
            .ok_or_else(|| Error::NotFound("Application not found".to_string()))?;
        let job = self
            .jobs
            .get_job(application.job_id)
            .await?
            .ok_or_else(|| Error::NotFound("Job not found".to_string()))?;
        Ok((application, job))
    }
}

fn ensure_party(caller_id: Uuid, application: &Application, job: &Job, action: &str) -> Result<()> {
    if caller_id == application.applicant_id || caller_id == job.employer_id {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "Not authorized to {} this application",
            action
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::store::MockJobDirectory;

    struct Fixture {
        service: ApplicationService,
        store: Arc<MemoryStore>,
        employer: Uuid,
        job: Uuid,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let employer = Uuid::new_v4();
        let job = Uuid::new_v4();
        store
            .insert_job(Job {
                id: job,
                employer_id: employer,
                title: "Backend Engineer".into(),
                company: "Acme".into(),
            })
            .unwrap();
        let service = ApplicationService::new(store.clone(), store.clone(), store.clone());
        Fixture {
            service,
            store,
            employer,
            job,
        }
    }

    fn seeker() -> Identity {
        Identity::new(Uuid::new_v4(), Role::JobSeeker)
    }

    #[tokio::test]
    async fn submit_creates_pending_application() {
        let fx = fixture();
        let applicant = seeker();
        let app = fx
            .service
            .submit_application(&applicant, fx.job, Some("Hello".into()), None)
            .await
            .unwrap();
        assert_eq!(app.status, ApplicationStatus::Pending);
        assert_eq!(app.applicant_id, applicant.user_id);
        assert_eq!(app.cover_letter.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn duplicate_submission_conflicts() {
        let fx = fixture();
        let applicant = seeker();
        fx.service
            .submit_application(&applicant, fx.job, None, None)
            .await
            .unwrap();
        let err = fx
            .service
            .submit_application(&applicant, fx.job, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn employers_cannot_apply() {
        let fx = fixture();
        let employer = Identity::new(fx.employer, Role::Employer);
        let err = fx
            .service
            .submit_application(&employer, fx.job, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn unknown_job_is_not_found_before_touching_the_store() {
        let mut jobs = MockJobDirectory::new();
        jobs.expect_get_job().times(1).returning(|_| Ok(None));
        let store = Arc::new(MemoryStore::new());
        let service = ApplicationService::new(store.clone(), store.clone(), Arc::new(jobs));

        let applicant = seeker();
        let err = service
            .submit_application(&applicant, Uuid::new_v4(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let (items, total) = store
            .list_by_applicant(applicant.user_id, &ApplicationFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn status_update_by_stranger_is_forbidden_and_leaves_status() {
        let fx = fixture();
        let applicant = seeker();
        let app = fx
            .service
            .submit_application(&applicant, fx.job, None, None)
            .await
            .unwrap();

        for caller in [applicant.user_id, Uuid::new_v4()] {
            let err = fx
                .service
                .update_status(caller, app.id, "accepted")
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Forbidden(_)));
        }

        let stored = fx.store.get_application(app.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Pending);
        assert!(fx.store.list_messages(app.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_update_rejects_unknown_status() {
        let fx = fixture();
        let app = fx
            .service
            .submit_application(&seeker(), fx.job, None, None)
            .await
            .unwrap();
        let err = fx
            .service
            .update_status(fx.employer, app.id, "hired")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn status_update_of_missing_application_is_not_found() {
        let fx = fixture();
        let err = fx
            .service
            .update_status(fx.employer, Uuid::new_v4(), "reviewed")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn each_transition_logs_one_system_message() {
        let fx = fixture();
        let applicant = seeker();
        let app = fx
            .service
            .submit_application(&applicant, fx.job, None, None)
            .await
            .unwrap();

        let updated = fx
            .service
            .update_status(fx.employer, app.id, "shortlisted")
            .await
            .unwrap();
        assert_eq!(updated.status, ApplicationStatus::Shortlisted);

        // accepted back to pending is allowed
        fx.service
            .update_status(fx.employer, app.id, "accepted")
            .await
            .unwrap();
        fx.service
            .update_status(fx.employer, app.id, "pending")
            .await
            .unwrap();

        let thread = fx.service.list_messages(applicant.user_id, app.id).await.unwrap();
        let contents: Vec<&str> = thread.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "Application status updated from pending to shortlisted",
                "Application status updated from shortlisted to accepted",
                "Application status updated from accepted to pending",
            ]
        );
        assert!(thread
            .iter()
            .all(|m| m.is_system_message && m.sender_id == fx.employer));
    }

    #[tokio::test]
    async fn outsiders_cannot_read_or_write_threads() {
        let fx = fixture();
        let app = fx
            .service
            .submit_application(&seeker(), fx.job, None, None)
            .await
            .unwrap();
        let outsider = Uuid::new_v4();

        let err = fx
            .service
            .send_message(outsider, app.id, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        let err = fx.service.list_messages(outsider, app.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn blank_messages_are_rejected() {
        let fx = fixture();
        let applicant = seeker();
        let app = fx
            .service
            .submit_application(&applicant, fx.job, None, None)
            .await
            .unwrap();
        let err = fx
            .service
            .send_message(applicant.user_id, app.id, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn listing_marks_only_the_other_partys_messages_read() {
        let fx = fixture();
        let applicant = seeker();
        let app = fx
            .service
            .submit_application(&applicant, fx.job, None, None)
            .await
            .unwrap();

        let mine = fx
            .service
            .send_message(applicant.user_id, app.id, "Any update?")
            .await
            .unwrap();
        let theirs = fx
            .service
            .send_message(fx.employer, app.id, "We are reviewing it")
            .await
            .unwrap();
        assert!(!mine.is_read && !theirs.is_read);
        assert_eq!(fx.service.unread_message_count(applicant.user_id).await.unwrap(), 1);
        assert_eq!(fx.service.unread_message_count(fx.employer).await.unwrap(), 1);

        let first_read = fx.service.list_messages(applicant.user_id, app.id).await.unwrap();
        assert_eq!(first_read.len(), 2);
        assert_eq!(first_read[0].id, mine.id);
        assert!(!first_read[1].is_read, "snapshot reflects state before marking");

        let after = fx.store.list_messages(app.id).await.unwrap();
        let by_id = |id: Uuid| after.iter().find(|m| m.id == id).unwrap().is_read;
        assert!(by_id(theirs.id));
        assert!(!by_id(mine.id));
        assert_eq!(fx.service.unread_message_count(applicant.user_id).await.unwrap(), 0);
        assert_eq!(fx.service.unread_message_count(fx.employer).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stats_count_by_status_and_show_recent_activity() {
        let fx = fixture();
        let applicant = seeker();
        let mut ids = Vec::new();
        for n in 0..5 {
            let job = Uuid::new_v4();
            fx.store
                .insert_job(Job {
                    id: job,
                    employer_id: fx.employer,
                    title: format!("Role {}", n),
                    company: "Acme".into(),
                })
                .unwrap();
            let app = fx
                .service
                .submit_application(&applicant, job, None, None)
                .await
                .unwrap();
            ids.push(app.id);
        }
        for id in &ids[..2] {
            fx.service
                .update_status(fx.employer, *id, "accepted")
                .await
                .unwrap();
        }

        let stats = fx.service.application_stats(applicant.user_id).await.unwrap();
        assert_eq!(stats.status_counts.get(&ApplicationStatus::Pending), Some(&3));
        assert_eq!(stats.status_counts.get(&ApplicationStatus::Accepted), Some(&2));
        assert_eq!(stats.status_counts.len(), 2);
        assert_eq!(stats.recent_activity.len(), 5);
        assert_eq!(stats.recent_activity[0].application.id, ids[1]);
        assert_eq!(stats.recent_activity[1].application.id, ids[0]);
    }

    #[tokio::test]
    async fn pagination_returns_remaining_items_newest_first() {
        let fx = fixture();
        let applicant = seeker();
        let mut ids = Vec::new();
        for n in 0..25 {
            let job = Uuid::new_v4();
            fx.store
                .insert_job(Job {
                    id: job,
                    employer_id: fx.employer,
                    title: format!("Role {}", n),
                    company: "Acme".into(),
                })
                .unwrap();
            ids.push(
                fx.service
                    .submit_application(&applicant, job, None, None)
                    .await
                    .unwrap()
                    .id,
            );
        }

        let page = PageRequest::new(Some(3), Some(10)).unwrap();
        let list = fx
            .service
            .list_my_applications(applicant.user_id, ApplicationFilter::default(), page)
            .await
            .unwrap();
        assert_eq!(list.total, 25);
        assert_eq!(list.total_pages, 3);
        let got: Vec<Uuid> = list.items.iter().map(|v| v.application.id).collect();
        let expected: Vec<Uuid> = ids[..5].iter().rev().copied().collect();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn listing_filters_by_status_and_search() {
        let fx = fixture();
        let applicant = seeker();
        let other_job = Uuid::new_v4();
        fx.store
            .insert_job(Job {
                id: other_job,
                employer_id: fx.employer,
                title: "Designer".into(),
                company: "Globex".into(),
            })
            .unwrap();
        let first = fx
            .service
            .submit_application(&applicant, fx.job, None, None)
            .await
            .unwrap();
        fx.service
            .submit_application(&applicant, other_job, None, None)
            .await
            .unwrap();
        fx.service
            .update_status(fx.employer, first.id, "reviewed")
            .await
            .unwrap();

        let search = ApplicationFilter {
            status: None,
            search: Some("gLoBeX".into()),
        };
        let list = fx
            .service
            .list_my_applications(applicant.user_id, search, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].job.company, "Globex");

        let reviewed = ApplicationFilter {
            status: Some(ApplicationStatus::Reviewed),
            search: None,
        };
        let list = fx
            .service
            .list_my_applications(applicant.user_id, reviewed, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].application.id, first.id);

        let other = fx
            .service
            .list_my_applications(Uuid::new_v4(), ApplicationFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(other.total, 0);
    }

    #[tokio::test]
    async fn job_applications_are_visible_to_the_employer_only() {
        let fx = fixture();
        fx.service
            .submit_application(&seeker(), fx.job, None, None)
            .await
            .unwrap();
        fx.service
            .submit_application(&seeker(), fx.job, None, None)
            .await
            .unwrap();

        let list = fx
            .service
            .list_job_applications(fx.employer, fx.job, ApplicationFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(list.total, 2);

        let err = fx
            .service
            .list_job_applications(Uuid::new_v4(), fx.job, ApplicationFilter::default(), PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }
}
