use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::application::ApplicationStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub application_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_system_message: bool,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub application_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_system_message: bool,
}

impl NewMessage {
    /// The entry recorded on the thread whenever an employer changes an
    /// application's status.
    pub fn status_change(
        application_id: Uuid,
        sender_id: Uuid,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Self {
        Self {
            application_id,
            sender_id,
            content: format!("Application status updated from {} to {}", from, to),
            is_system_message: true,
        }
    }
}
