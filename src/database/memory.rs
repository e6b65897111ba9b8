//! In-process store used by the test suites and local experiments.
//!
//! All state sits behind one mutex, so every trait method is a single
//! critical section.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::database::store::{ApplicationStore, JobDirectory, MessageLog, StatusTransition};
use crate::error::{Error, Result};
use crate::models::application::{
    Application, ApplicationFilter, ApplicationStatus, ApplicationView, NewApplication,
};
use crate::models::job::{Job, JobSummary};
use crate::models::message::{Message, NewMessage};
use crate::utils::pagination::PageRequest;

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    // Monotonic counter; breaks timestamp ties so ordering follows call order.
    clock: u64,
    jobs: HashMap<Uuid, Job>,
    applications: Vec<StoredApplication>,
    messages: Vec<StoredMessage>,
}

struct StoredApplication {
    application: Application,
    created_seq: u64,
    updated_seq: u64,
}

struct StoredMessage {
    message: Message,
    seq: u64,
}

impl MemoryState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn view(&self, application: &Application) -> Result<ApplicationView> {
        let job = self
            .jobs
            .get(&application.job_id)
            .ok_or_else(|| Error::Internal(format!("job {} missing", application.job_id)))?;
        Ok(ApplicationView {
            application: application.clone(),
            job: JobSummary::from(job),
        })
    }

    fn matches(&self, stored: &StoredApplication, filter: &ApplicationFilter) -> bool {
        if let Some(status) = filter.status {
            if stored.application.status != status {
                return false;
            }
        }
        if let Some(search) = filter.search.as_deref() {
            let needle = search.to_lowercase();
            let Some(job) = self.jobs.get(&stored.application.job_id) else {
                return false;
            };
            if !job.title.to_lowercase().contains(&needle)
                && !job.company.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }

    fn page_of<F>(
        &self,
        scope: F,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<(Vec<ApplicationView>, i64)>
    where
        F: Fn(&Application) -> bool,
    {
        let mut hits: Vec<&StoredApplication> = self
            .applications
            .iter()
            .filter(|stored| scope(&stored.application) && self.matches(stored, filter))
            .collect();
        hits.sort_by(|a, b| {
            (b.application.created_at, b.created_seq).cmp(&(a.application.created_at, a.created_seq))
        });

        let total = hits.len() as i64;
        let items = hits
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.per_page as usize)
            .map(|stored| self.view(&stored.application))
            .collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("memory store mutex poisoned".to_string()))
    }

    /// Registers a job so the directory can resolve it.
    pub fn insert_job(&self, job: Job) -> Result<()> {
        self.lock()?.jobs.insert(job.id, job);
        Ok(())
    }
}

#[async_trait]
impl JobDirectory for MemoryStore {
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.lock()?.jobs.get(&job_id).cloned())
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn insert_application(&self, new: NewApplication) -> Result<Option<Application>> {
        let mut state = self.lock()?;
        let duplicate = state.applications.iter().any(|stored| {
            stored.application.job_id == new.job_id
                && stored.application.applicant_id == new.applicant_id
        });
        if duplicate {
            return Ok(None);
        }

        let now = Utc::now();
        let application = Application {
            id: Uuid::new_v4(),
            job_id: new.job_id,
            applicant_id: new.applicant_id,
            status: ApplicationStatus::Pending,
            cover_letter: new.cover_letter,
            resume_ref: new.resume_ref,
            created_at: now,
            updated_at: now,
        };
        let seq = state.tick();
        state.applications.push(StoredApplication {
            application: application.clone(),
            created_seq: seq,
            updated_seq: seq,
        });
        Ok(Some(application))
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>> {
        let state = self.lock()?;
        Ok(state
            .applications
            .iter()
            .find(|stored| stored.application.id == id)
            .map(|stored| stored.application.clone()))
    }

    async fn list_by_applicant(
        &self,
        applicant_id: Uuid,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<(Vec<ApplicationView>, i64)> {
        self.lock()?
            .page_of(|a| a.applicant_id == applicant_id, filter, page)
    }

    async fn list_by_job(
        &self,
        job_id: Uuid,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<(Vec<ApplicationView>, i64)> {
        self.lock()?.page_of(|a| a.job_id == job_id, filter, page)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        actor_id: Uuid,
    ) -> Result<StatusTransition> {
        let mut state = self.lock()?;
        let seq = state.tick();
        let now = Utc::now();

        let stored = state
            .applications
            .iter_mut()
            .find(|stored| stored.application.id == id)
            .ok_or_else(|| Error::NotFound("Application not found".to_string()))?;
        let previous = stored.application.status;
        stored.application.status = status;
        stored.application.updated_at = now;
        stored.updated_seq = seq;
        let application = stored.application.clone();

        let note = NewMessage::status_change(id, actor_id, previous, status);
        let message = Message {
            id: Uuid::new_v4(),
            application_id: note.application_id,
            sender_id: note.sender_id,
            content: note.content,
            is_system_message: note.is_system_message,
            is_read: false,
            created_at: now,
        };
        state.messages.push(StoredMessage {
            message: message.clone(),
            seq,
        });

        Ok(StatusTransition {
            previous,
            application,
            message,
        })
    }

    async fn status_counts(&self, applicant_id: Uuid) -> Result<Vec<(ApplicationStatus, i64)>> {
        let state = self.lock()?;
        let mut counts: BTreeMap<ApplicationStatus, i64> = BTreeMap::new();
        for stored in state
            .applications
            .iter()
            .filter(|stored| stored.application.applicant_id == applicant_id)
        {
            *counts.entry(stored.application.status).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn recent_activity(
        &self,
        applicant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ApplicationView>> {
        let state = self.lock()?;
        let mut hits: Vec<&StoredApplication> = state
            .applications
            .iter()
            .filter(|stored| stored.application.applicant_id == applicant_id)
            .collect();
        hits.sort_by(|a, b| {
            (b.application.updated_at, b.updated_seq).cmp(&(a.application.updated_at, a.updated_seq))
        });
        hits.into_iter()
            .take(limit.max(0) as usize)
            .map(|stored| state.view(&stored.application))
            .collect()
    }
}

#[async_trait]
impl MessageLog for MemoryStore {
    async fn insert_message(&self, new: NewMessage) -> Result<Message> {
        let mut state = self.lock()?;
        let seq = state.tick();
        let message = Message {
            id: Uuid::new_v4(),
            application_id: new.application_id,
            sender_id: new.sender_id,
            content: new.content,
            is_system_message: new.is_system_message,
            is_read: false,
            created_at: Utc::now(),
        };
        state.messages.push(StoredMessage {
            message: message.clone(),
            seq,
        });
        Ok(message)
    }

    async fn list_messages(&self, application_id: Uuid) -> Result<Vec<Message>> {
        let state = self.lock()?;
        let mut thread: Vec<&StoredMessage> = state
            .messages
            .iter()
            .filter(|stored| stored.message.application_id == application_id)
            .collect();
        thread.sort_by_key(|stored| (stored.message.created_at, stored.seq));
        Ok(thread.into_iter().map(|stored| stored.message.clone()).collect())
    }

    async fn mark_read(&self, reader_id: Uuid, message_ids: &[Uuid]) -> Result<u64> {
        let mut state = self.lock()?;
        let mut marked = 0;
        for stored in state.messages.iter_mut() {
            let message = &mut stored.message;
            if message_ids.contains(&message.id)
                && message.sender_id != reader_id
                && !message.is_read
            {
                message.is_read = true;
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        let state = self.lock()?;
        let party_to = |application_id: Uuid| {
            state
                .applications
                .iter()
                .find(|stored| stored.application.id == application_id)
                .map(|stored| {
                    let app = &stored.application;
                    app.applicant_id == user_id
                        || state
                            .jobs
                            .get(&app.job_id)
                            .is_some_and(|job| job.employer_id == user_id)
                })
                .unwrap_or(false)
        };
        let count = state
            .messages
            .iter()
            .filter(|stored| {
                let message = &stored.message;
                !message.is_read && message.sender_id != user_id && party_to(message.application_id)
            })
            .count();
        Ok(count as i64)
    }
}
