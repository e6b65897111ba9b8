//! Storage seams for the application workflow.
//!
//! The service layer only sees these traits; `PgStore` backs them in
//! production and `MemoryStore` in tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::application::{
    Application, ApplicationFilter, ApplicationStatus, ApplicationView, NewApplication,
};
use crate::models::job::Job;
use crate::models::message::{Message, NewMessage};
use crate::utils::pagination::PageRequest;

/// Read-only lookup of job postings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobDirectory: Send + Sync {
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>>;
}

/// Outcome of an atomic status change: the prior status, the updated row and
/// the system message that records it.
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub previous: ApplicationStatus,
    pub application: Application,
    pub message: Message,
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Inserts a pending application. Returns `None` when the applicant
    /// already has one for the job; the check and the insert are atomic.
    async fn insert_application(&self, new: NewApplication) -> Result<Option<Application>>;

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>>;

    async fn list_by_applicant(
        &self,
        applicant_id: Uuid,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<(Vec<ApplicationView>, i64)>;

    async fn list_by_job(
        &self,
        job_id: Uuid,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<(Vec<ApplicationView>, i64)>;

    /// Overwrites the status and appends the matching system message in one
    /// unit. Either both land or neither does.
    async fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        actor_id: Uuid,
    ) -> Result<StatusTransition>;

    async fn status_counts(&self, applicant_id: Uuid) -> Result<Vec<(ApplicationStatus, i64)>>;

    async fn recent_activity(&self, applicant_id: Uuid, limit: i64)
        -> Result<Vec<ApplicationView>>;
}

/// Per-application message threads.
#[async_trait]
pub trait MessageLog: Send + Sync {
    async fn insert_message(&self, new: NewMessage) -> Result<Message>;

    /// Oldest first.
    async fn list_messages(&self, application_id: Uuid) -> Result<Vec<Message>>;

    /// Marks the given messages read, skipping any sent by `reader_id`.
    /// Messages outside `message_ids` are left alone even if unread.
    async fn mark_read(&self, reader_id: Uuid, message_ids: &[Uuid]) -> Result<u64>;

    /// Unread messages addressed to `user_id` across all threads the user is
    /// a party to.
    async fn unread_count(&self, user_id: Uuid) -> Result<i64>;
}
