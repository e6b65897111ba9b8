use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::Result;
use crate::models::application::{ApplicationFilter, ApplicationStatus, ApplicationView};
use crate::services::application_service::{ApplicationList, ApplicationStats};
use crate::utils::pagination::PageRequest;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusPayload {
    #[validate(length(min = 1))]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SendMessagePayload {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ApplicationListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ApplicationListQuery {
    /// Parses the raw query into a typed filter and page window. Unknown
    /// statuses and non-positive pages are rejected.
    pub fn into_parts(self) -> Result<(ApplicationFilter, PageRequest)> {
        let status = match self.status.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(raw) => Some(raw.parse::<ApplicationStatus>()?),
        };
        let search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let page = PageRequest::new(self.page, self.limit)?;
        Ok((ApplicationFilter { status, search }, page))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApplicationListResponse {
    pub items: Vec<ApplicationView>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl From<ApplicationList> for ApplicationListResponse {
    fn from(value: ApplicationList) -> Self {
        Self {
            items: value.items,
            total: value.total,
            page: value.page,
            per_page: value.per_page,
            total_pages: value.total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApplicationStatsResponse {
    pub status_counts: BTreeMap<String, i64>,
    pub recent_activity: Vec<ApplicationView>,
}

impl From<ApplicationStats> for ApplicationStatsResponse {
    fn from(value: ApplicationStats) -> Self {
        Self {
            status_counts: value
                .status_counts
                .into_iter()
                .map(|(status, count)| (status.as_str().to_string(), count))
                .collect(),
            recent_activity: value.recent_activity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn query_parses_status_and_trims_search() {
        let query = ApplicationListQuery {
            status: Some("shortlisted".into()),
            search: Some("  rust ".into()),
            page: Some(2),
            limit: Some(5),
        };
        let (filter, page) = query.into_parts().unwrap();
        assert_eq!(filter.status, Some(ApplicationStatus::Shortlisted));
        assert_eq!(filter.search.as_deref(), Some("rust"));
        assert_eq!(page.offset(), 5);
    }

    #[test]
    fn query_rejects_unknown_status() {
        let query = ApplicationListQuery {
            status: Some("hired".into()),
            ..Default::default()
        };
        assert!(matches!(query.into_parts(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn blank_filters_are_ignored() {
        let query = ApplicationListQuery {
            status: Some(" ".into()),
            search: Some("".into()),
            ..Default::default()
        };
        let (filter, _) = query.into_parts().unwrap();
        assert!(filter.status.is_none());
        assert!(filter.search.is_none());
    }

    #[test]
    fn status_payload_rejects_unknown_fields() {
        let parsed: std::result::Result<UpdateStatusPayload, _> =
            serde_json::from_str(r#"{"status":"reviewed","note":"x"}"#);
        assert!(parsed.is_err());
    }
}
