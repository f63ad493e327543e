// src/models/review.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Faculty verdict on a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Flagged,
    Disqualified,
    NeedsReview,
}

/// Post-hoc review attached to an ended or terminated session. Set at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProctorReview {
    pub reviewer_id: String,
    pub decision: ReviewDecision,
    pub notes: String,
    pub overall_rating: u8,
    pub reviewed_at: DateTime<Utc>,
}

/// DTO for `POST /sessions/{id}/review`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewRequest {
    #[validate(length(min = 1, max = 128))]
    pub reviewer_id: String,
    pub decision: ReviewDecision,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub notes: String,
    #[validate(range(min = 1, max = 10, message = "Rating must be between 1 and 10."))]
    pub overall_rating: u8,
}
