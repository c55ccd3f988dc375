use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use validator::Validate;

use super::{ItemType, Sentiment};

/// Prior sentiment archived when a review changes its opinion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentHistoryEntry {
    pub sentiment: Sentiment,
    /// When the archived sentiment was chosen.
    pub timestamp: DateTime<Utc>,
    pub replaced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub sentiment: Sentiment,
    pub content: Option<String>,
    pub sentiment_history: Json<Vec<SentimentHistoryEntry>>,
    pub is_deleted: bool,
    pub sentiment_updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Applies an edit in place. A sentiment change first archives the
    /// previous sentiment; returns whether history grew.
    pub fn apply_changes(
        &mut self,
        sentiment: Option<Sentiment>,
        content: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut archived = false;
        if let Some(next) = sentiment {
            if next != self.sentiment {
                self.sentiment_history.0.push(SentimentHistoryEntry {
                    sentiment: self.sentiment,
                    timestamp: self.sentiment_updated_at,
                    replaced_at: now,
                });
                self.sentiment = next;
                self.sentiment_updated_at = now;
                archived = true;
            }
        }
        if content.is_some() {
            self.content = content;
        }
        self.updated_at = now;
        archived
    }
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub sentiment: Sentiment,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitReviewRequest {
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub sentiment: Sentiment,
    #[validate(length(max = 5000))]
    pub content: Option<String>,
}

impl SubmitReviewRequest {
    pub fn into_new_review(self) -> NewReview {
        NewReview {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            item_type: self.item_type,
            item_id: self.item_id,
            sentiment: self.sentiment,
            content: self.content,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    pub sentiment: Option<Sentiment>,
    #[validate(length(max = 5000))]
    pub content: Option<String>,
}

impl UpdateReviewRequest {
    pub fn validate_business_rules(&self) -> Result<(), String> {
        if self.sentiment.is_none() && self.content.is_none() {
            return Err("Nothing to update: provide a sentiment or content".into());
        }
        Ok(())
    }
}

/// Outcome of a submit: whether a new row was created or an existing one edited
#[derive(Debug, Clone, Serialize)]
pub struct ReviewSubmission {
    pub review: Review,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub positive: i64,
    pub neutral: i64,
    pub negative: i64,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn review(sentiment: Sentiment) -> Review {
        let created = Utc::now() - Duration::days(3);
        Review {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            item_type: ItemType::Product,
            item_id: Uuid::new_v4(),
            sentiment,
            content: Some("Solid build".into()),
            sentiment_history: Json(Vec::new()),
            is_deleted: false,
            sentiment_updated_at: created,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn sentiment_change_archives_previous_state() {
        let mut review = review(Sentiment::Positive);
        let chosen_at = review.sentiment_updated_at;
        let now = Utc::now();

        let archived = review.apply_changes(Some(Sentiment::Negative), None, now);

        assert!(archived);
        assert_eq!(review.sentiment, Sentiment::Negative);
        assert_eq!(
            review.sentiment_history.0,
            vec![SentimentHistoryEntry {
                sentiment: Sentiment::Positive,
                timestamp: chosen_at,
                replaced_at: now,
            }]
        );
        assert_eq!(review.content.as_deref(), Some("Solid build"));
        assert_eq!(review.sentiment_updated_at, now);
    }

    #[test]
    fn content_edits_do_not_move_sentiment_time() {
        let mut review = review(Sentiment::Positive);
        let chosen_at = review.sentiment_updated_at;

        review.apply_changes(None, Some("Rewritten".into()), Utc::now());
        let replaced_at = Utc::now();
        review.apply_changes(Some(Sentiment::Neutral), None, replaced_at);

        let entry = &review.sentiment_history.0[0];
        assert_eq!(entry.timestamp, chosen_at);
        assert_eq!(entry.replaced_at, replaced_at);
    }

    #[test]
    fn same_sentiment_leaves_history_untouched() {
        let mut review = review(Sentiment::Neutral);
        let archived =
            review.apply_changes(Some(Sentiment::Neutral), Some("Changed my text".into()), Utc::now());

        assert!(!archived);
        assert!(review.sentiment_history.0.is_empty());
        assert_eq!(review.content.as_deref(), Some("Changed my text"));
    }

    #[test]
    fn history_is_append_only_across_changes() {
        let mut review = review(Sentiment::Positive);
        review.apply_changes(Some(Sentiment::Neutral), None, Utc::now());
        review.apply_changes(Some(Sentiment::Negative), None, Utc::now());

        let archived: Vec<Sentiment> = review
            .sentiment_history
            .0
            .iter()
            .map(|entry| entry.sentiment)
            .collect();
        assert_eq!(archived, vec![Sentiment::Positive, Sentiment::Neutral]);
    }

    #[test]
    fn empty_update_is_rejected() {
        let request = UpdateReviewRequest {
            sentiment: None,
            content: None,
        };
        assert!(request.validate_business_rules().is_err());
    }
}
