use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use super::{
    bump_analytics, ensure_active_user, ensure_item_exists, lock_submission, page_bounds,
    AnalyticsCounter, Database,
};
use crate::errors::ServiceError;
use crate::models::{
    ItemType, NewReview, Review, ReviewSubmission, Sentiment, SentimentSummary,
    UpdateReviewRequest,
};

impl Database {
    /// Creates the caller's review of an item, or edits it in place when one
    /// already exists. A previously deleted review is revived.
    pub async fn submit_review(&self, review: NewReview) -> Result<ReviewSubmission, ServiceError> {
        let mut tx = self.pool.begin().await?;

        ensure_active_user(&mut tx, review.user_id).await?;
        ensure_item_exists(&mut tx, review.item_type, review.item_id).await?;
        lock_submission(
            &mut tx,
            "review",
            review.user_id,
            review.item_type,
            review.item_id,
        )
        .await?;

        let existing = sqlx::query_as::<_, Review>(
            r#"
            SELECT * FROM reviews
            WHERE user_id = $1 AND item_type = $2 AND item_id = $3
            FOR UPDATE
            "#,
        )
        .bind(review.user_id)
        .bind(review.item_type)
        .bind(review.item_id)
        .fetch_optional(&mut *tx)
        .await?;

        let submission = match existing {
            Some(mut current) => {
                let revived = current.is_deleted;
                current.apply_changes(Some(review.sentiment), review.content, Utc::now());
                current.is_deleted = false;
                let stored = write_review(&mut tx, &current).await?;
                if revived {
                    bump_analytics(&mut tx, stored.user_id, AnalyticsCounter::Reviews, 1).await?;
                }
                ReviewSubmission {
                    review: stored,
                    created: false,
                }
            }
            None => {
                let stored = insert_review(&mut tx, review).await?;
                bump_analytics(&mut tx, stored.user_id, AnalyticsCounter::Reviews, 1).await?;
                ReviewSubmission {
                    review: stored,
                    created: true,
                }
            }
        };

        tx.commit().await?;
        Ok(submission)
    }

    pub async fn update_review(
        &self,
        review_id: Uuid,
        changes: UpdateReviewRequest,
    ) -> Result<Review, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut current = sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE id = $1 AND NOT is_deleted FOR UPDATE",
        )
        .bind(review_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found("Review"))?;

        if current.apply_changes(changes.sentiment, changes.content, Utc::now()) {
            log::info!("Review {} sentiment changed to {:?}", review_id, current.sentiment);
        }
        let stored = write_review(&mut tx, &current).await?;

        tx.commit().await?;
        Ok(stored)
    }

    pub async fn get_review(&self, review_id: Uuid) -> Result<Option<Review>, ServiceError> {
        let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(review)
    }

    pub async fn list_reviews_for_item(
        &self,
        item_type: ItemType,
        item_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Review>, ServiceError> {
        let (limit, offset) = page_bounds(limit, offset);
        let reviews = sqlx::query_as::<_, Review>(
            r#"
            SELECT * FROM reviews
            WHERE item_type = $1 AND item_id = $2 AND NOT is_deleted
            ORDER BY updated_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(item_type)
        .bind(item_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    pub async fn list_reviews_for_user(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Review>, ServiceError> {
        let (limit, offset) = page_bounds(limit, offset);
        let reviews = sqlx::query_as::<_, Review>(
            r#"
            SELECT * FROM reviews
            WHERE user_id = $1 AND NOT is_deleted
            ORDER BY updated_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    pub async fn item_sentiment_summary(
        &self,
        item_type: ItemType,
        item_id: Uuid,
    ) -> Result<SentimentSummary, ServiceError> {
        let rows: Vec<(Sentiment, i64)> = sqlx::query_as(
            r#"
            SELECT sentiment, COUNT(*)
            FROM reviews
            WHERE item_type = $1 AND item_id = $2 AND NOT is_deleted
            GROUP BY sentiment
            "#,
        )
        .bind(item_type)
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        let mut summary = SentimentSummary {
            item_type,
            item_id,
            positive: 0,
            neutral: 0,
            negative: 0,
            total: 0,
        };
        for (sentiment, count) in rows {
            match sentiment {
                Sentiment::Positive => summary.positive = count,
                Sentiment::Neutral => summary.neutral = count,
                Sentiment::Negative => summary.negative = count,
            }
            summary.total += count;
        }
        Ok(summary)
    }

    /// Soft-deletes a review; the author's counter drops only on the first delete.
    pub async fn delete_review(&self, review_id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        let deleted: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE reviews SET is_deleted = TRUE, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING user_id
            "#,
        )
        .bind(review_id)
        .fetch_optional(&mut *tx)
        .await?;

        match deleted {
            Some(user_id) => {
                bump_analytics(&mut tx, user_id, AnalyticsCounter::Reviews, -1).await?;
            }
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reviews WHERE id = $1)")
                        .bind(review_id)
                        .fetch_one(&mut *tx)
                        .await?;
                if !exists {
                    return Err(ServiceError::not_found("Review"));
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn insert_review(conn: &mut PgConnection, review: NewReview) -> Result<Review, sqlx::Error> {
    sqlx::query_as::<_, Review>(
        r#"
        INSERT INTO reviews (id, user_id, item_type, item_id, sentiment, content)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(review.id)
    .bind(review.user_id)
    .bind(review.item_type)
    .bind(review.item_id)
    .bind(review.sentiment)
    .bind(review.content)
    .fetch_one(conn)
    .await
}

async fn write_review(conn: &mut PgConnection, review: &Review) -> Result<Review, sqlx::Error> {
    sqlx::query_as::<_, Review>(
        r#"
        UPDATE reviews
        SET sentiment = $2,
            content = $3,
            sentiment_history = $4,
            is_deleted = $5,
            sentiment_updated_at = $6,
            updated_at = $7
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(review.id)
    .bind(review.sentiment)
    .bind(&review.content)
    .bind(Json(&review.sentiment_history.0))
    .bind(review.is_deleted)
    .bind(review.sentiment_updated_at)
    .bind(review.updated_at)
    .fetch_one(conn)
    .await
}

#[cfg(test)]
mod tests {
    use futures_util::future::join_all;

    use super::*;
    use crate::database::fixtures;

    fn submission(user_id: Uuid, item_id: Uuid, sentiment: Sentiment) -> NewReview {
        NewReview {
            id: Uuid::new_v4(),
            user_id,
            item_type: ItemType::Product,
            item_id,
            sentiment,
            content: None,
        }
    }

    #[actix_rt::test]
    async fn resubmission_edits_in_place_and_archives_once() {
        let Some(db) = fixtures::database().await else {
            return;
        };
        let user = fixtures::mobile_user(&db).await;
        let item = fixtures::product(&db).await;

        let first = db
            .submit_review(submission(user, item, Sentiment::Positive))
            .await
            .unwrap();
        assert!(first.created);

        let second = db
            .submit_review(submission(user, item, Sentiment::Negative))
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.review.id, first.review.id);
        assert_eq!(second.review.sentiment, Sentiment::Negative);

        let history = &second.review.sentiment_history.0;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sentiment, Sentiment::Positive);

        let analytics = db.get_user_analytics(user).await.unwrap().unwrap();
        assert_eq!(analytics.reviews_count, 1);
    }

    #[actix_rt::test]
    async fn concurrent_first_submissions_share_one_review() {
        let Some(db) = fixtures::database().await else {
            return;
        };
        let user = fixtures::mobile_user(&db).await;
        let item = fixtures::product(&db).await;

        let attempts = (0..8).map(|i| {
            let db = db.clone();
            let sentiment = if i % 2 == 0 {
                Sentiment::Positive
            } else {
                Sentiment::Neutral
            };
            async move { db.submit_review(submission(user, item, sentiment)).await }
        });
        let results = join_all(attempts).await;

        let mut created = 0;
        for result in results {
            let submission = result.expect("every submission succeeds");
            if submission.created {
                created += 1;
            }
        }
        assert_eq!(created, 1);

        let reviews = db.list_reviews_for_user(user, None, None).await.unwrap();
        assert_eq!(reviews.len(), 1);
        let analytics = db.get_user_analytics(user).await.unwrap().unwrap();
        assert_eq!(analytics.reviews_count, 1);
    }
}
