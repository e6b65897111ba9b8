use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, PgExecutor, PgPool, Row};
use uuid::Uuid;

use crate::database::store::{ApplicationStore, JobDirectory, MessageLog, StatusTransition};
use crate::error::{Error, Result};
use crate::models::application::{
    Application, ApplicationFilter, ApplicationStatus, ApplicationView, NewApplication,
};
use crate::models::job::{Job, JobSummary};
use crate::models::message::{Message, NewMessage};
use crate::utils::pagination::PageRequest;

const VIEW_COLUMNS: &str = "a.id, a.job_id, a.applicant_id, a.status, a.cover_letter, a.resume_ref, a.created_at, a.updated_at, j.title AS job_title, j.company AS job_company";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn list_views(
        &self,
        scope: Scope,
        scope_id: Uuid,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<(Vec<ApplicationView>, i64)> {
        let mut filters = vec![format!("{} = $1", scope.column())];
        let mut args: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            filters.push(format!("a.status = ${}", args.len() + 2));
            args.push(status.as_str().to_string());
        }
        if let Some(search) = filter.search.as_deref() {
            let n = args.len() + 2;
            filters.push(format!("(j.title ILIKE ${n} OR j.company ILIKE ${n})"));
            args.push(format!("%{}%", escape_like(search)));
        }

        let where_clause = format!("WHERE {}", filters.join(" AND "));

        let items_query = format!(
            "SELECT {}
             FROM applications a
             JOIN jobs j ON j.id = a.job_id
             {}
             ORDER BY a.created_at DESC, a.id DESC
             LIMIT ${} OFFSET ${}",
            VIEW_COLUMNS,
            where_clause,
            args.len() + 2,
            args.len() + 3
        );
        let total_query = format!(
            "SELECT COUNT(*) FROM applications a JOIN jobs j ON j.id = a.job_id {}",
            where_clause
        );

        let mut items_statement = sqlx::query_as::<_, ApplicationView>(&items_query).bind(scope_id);
        for value in &args {
            items_statement = items_statement.bind(value);
        }
        let items = items_statement
            .bind(page.per_page)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let mut total_statement = sqlx::query_scalar::<_, i64>(&total_query).bind(scope_id);
        for value in &args {
            total_statement = total_statement.bind(value);
        }
        let total = total_statement.fetch_one(&self.pool).await?;

        Ok((items, total))
    }
}

#[derive(Clone, Copy)]
enum Scope {
    Applicant,
    Job,
}

impl Scope {
    fn column(self) -> &'static str {
        match self {
            Scope::Applicant => "a.applicant_id",
            Scope::Job => "a.job_id",
        }
    }
}

/// Escapes `%`, `_` and `\` so user search text matches literally under ILIKE.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

impl<'r> FromRow<'r, PgRow> for ApplicationView {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let application = Application::from_row(row)?;
        let job = JobSummary {
            id: application.job_id,
            title: row.try_get("job_title")?,
            company: row.try_get("job_company")?,
        };
        Ok(Self { application, job })
    }
}

async fn insert_message_with<'e, E>(executor: E, new: &NewMessage) -> Result<Message>
where
    E: PgExecutor<'e>,
{
    let message = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages (application_id, sender_id, content, is_system_message)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(new.application_id)
    .bind(new.sender_id)
    .bind(&new.content)
    .bind(new.is_system_message)
    .fetch_one(executor)
    .await?;

    Ok(message)
}

#[async_trait]
impl JobDirectory for PgStore {
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            "SELECT id, employer_id, title, company FROM jobs WHERE id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }
}

#[async_trait]
impl ApplicationStore for PgStore {
    async fn insert_application(&self, new: NewApplication) -> Result<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications (job_id, applicant_id, status, cover_letter, resume_ref)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (job_id, applicant_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(new.job_id)
        .bind(new.applicant_id)
        .bind(ApplicationStatus::Pending.as_str())
        .bind(&new.cover_letter)
        .bind(&new.resume_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(application)
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>> {
        let application =
            sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(application)
    }

    async fn list_by_applicant(
        &self,
        applicant_id: Uuid,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<(Vec<ApplicationView>, i64)> {
        self.list_views(Scope::Applicant, applicant_id, filter, page)
            .await
    }

    async fn list_by_job(
        &self,
        job_id: Uuid,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<(Vec<ApplicationView>, i64)> {
        self.list_views(Scope::Job, job_id, filter, page).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        actor_id: Uuid,
    ) -> Result<StatusTransition> {
        let mut tx = self.pool.begin().await?;

        let previous: String =
            sqlx::query_scalar::<_, String>("SELECT status FROM applications WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| Error::NotFound("Application not found".to_string()))?;
        let previous: ApplicationStatus = previous
            .parse()
            .map_err(|e| Error::Internal(format!("stored status is corrupt: {}", e)))?;

        let application = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let note = NewMessage::status_change(id, actor_id, previous, status);
        let message = insert_message_with(&mut *tx, &note).await?;

        tx.commit().await?;

        Ok(StatusTransition {
            previous,
            application,
            message,
        })
    }

    async fn status_counts(&self, applicant_id: Uuid) -> Result<Vec<(ApplicationStatus, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT status, COUNT(*)
            FROM applications
            WHERE applicant_id = $1
            GROUP BY status
            "#,
        )
        .bind(applicant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| -> Result<(ApplicationStatus, i64)> {
                let status: ApplicationStatus = status
                    .parse()
                    .map_err(|e| Error::Internal(format!("stored status is corrupt: {}", e)))?;
                Ok((status, count))
            })
            .collect()
    }

    async fn recent_activity(
        &self,
        applicant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ApplicationView>> {
        let query = format!(
            "SELECT {}
             FROM applications a
             JOIN jobs j ON j.id = a.job_id
             WHERE a.applicant_id = $1
             ORDER BY a.updated_at DESC
             LIMIT $2",
            VIEW_COLUMNS
        );
        let items = sqlx::query_as::<_, ApplicationView>(&query)
            .bind(applicant_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }
}

#[async_trait]
impl MessageLog for PgStore {
    async fn insert_message(&self, new: NewMessage) -> Result<Message> {
        insert_message_with(&self.pool, &new).await
    }

    async fn list_messages(&self, application_id: Uuid) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE application_id = $1
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn mark_read(&self, reader_id: Uuid, message_ids: &[Uuid]) -> Result<u64> {
        if message_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = TRUE
            WHERE id = ANY($1) AND sender_id <> $2 AND is_read = FALSE
            "#,
        )
        .bind(message_ids)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM messages m
            JOIN applications a ON a.id = m.application_id
            JOIN jobs j ON j.id = a.job_id
            WHERE m.is_read = FALSE
              AND m.sender_id <> $1
              AND (a.applicant_id = $1 OR j.employer_id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }
}
