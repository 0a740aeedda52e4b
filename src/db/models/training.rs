//! Training report models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainingReport {
    pub id: String,
    pub site_id: String,
    pub date: String,
    /// Comma-separated topic list
    pub topics: Option<String>,
    pub attendance_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl TrainingReport {
    /// Number of non-empty entries in the comma-separated topic list.
    pub fn topics_covered(&self) -> usize {
        self.topics
            .as_deref()
            .unwrap_or("")
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .count()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTrainingReportRequest {
    pub site_id: String,
    pub date: String,
    pub topics: Option<String>,
    pub attendance_count: Option<i64>,
}

/// `GET /training/latest` payload: the report plus the derived topic count.
#[derive(Debug, Serialize)]
pub struct TrainingLatestResponse {
    #[serde(flatten)]
    pub report: TrainingReport,
    #[serde(rename = "topicsCovered")]
    pub topics_covered: usize,
}
