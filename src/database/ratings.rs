use chrono::Utc;
use uuid::Uuid;

use super::{
    bump_analytics, ensure_active_user, ensure_item_exists, lock_submission, page_bounds,
    AnalyticsCounter, Database,
};
use crate::errors::ServiceError;
use crate::models::{
    ItemType, QuickRating, QuickRatingSubmission, RatingPolicy, RatingSummary,
    SubmitQuickRatingRequest,
};

impl Database {
    /// Stores a 1-5 rating. Changing an existing rating is refused until the
    /// policy's cooldown has passed since `last_updated`.
    pub async fn submit_quick_rating(
        &self,
        request: SubmitQuickRatingRequest,
        policy: &RatingPolicy,
    ) -> Result<QuickRatingSubmission, ServiceError> {
        let mut tx = self.pool.begin().await?;

        ensure_active_user(&mut tx, request.user_id).await?;
        ensure_item_exists(&mut tx, request.item_type, request.item_id).await?;
        lock_submission(
            &mut tx,
            "quick_rating",
            request.user_id,
            request.item_type,
            request.item_id,
        )
        .await?;

        let existing = sqlx::query_as::<_, QuickRating>(
            r#"
            SELECT * FROM quick_ratings
            WHERE user_id = $1 AND item_type = $2 AND item_id = $3
            FOR UPDATE
            "#,
        )
        .bind(request.user_id)
        .bind(request.item_type)
        .bind(request.item_id)
        .fetch_optional(&mut *tx)
        .await?;

        let now = Utc::now();
        let submission = match existing {
            Some(current) => {
                if let Some(remaining) = policy.remaining(current.last_updated, now) {
                    return Err(ServiceError::Cooldown(remaining));
                }

                let rating = sqlx::query_as::<_, QuickRating>(
                    r#"
                    UPDATE quick_ratings
                    SET rating = $2, last_updated = $3
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(current.id)
                .bind(request.rating)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;

                QuickRatingSubmission {
                    rating,
                    created: false,
                }
            }
            None => {
                let rating = sqlx::query_as::<_, QuickRating>(
                    r#"
                    INSERT INTO quick_ratings (id, user_id, item_type, item_id, rating, last_updated)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(request.user_id)
                .bind(request.item_type)
                .bind(request.item_id)
                .bind(request.rating)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;

                bump_analytics(&mut tx, rating.user_id, AnalyticsCounter::QuickRatings, 1).await?;

                QuickRatingSubmission {
                    rating,
                    created: true,
                }
            }
        };

        tx.commit().await?;
        Ok(submission)
    }

    pub async fn get_user_rating(
        &self,
        user_id: Uuid,
        item_type: ItemType,
        item_id: Uuid,
    ) -> Result<Option<QuickRating>, ServiceError> {
        let rating = sqlx::query_as::<_, QuickRating>(
            "SELECT * FROM quick_ratings WHERE user_id = $1 AND item_type = $2 AND item_id = $3",
        )
        .bind(user_id)
        .bind(item_type)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rating)
    }

    pub async fn item_rating_summary(
        &self,
        item_type: ItemType,
        item_id: Uuid,
    ) -> Result<RatingSummary, ServiceError> {
        let buckets: Vec<(i16, i64)> = sqlx::query_as(
            r#"
            SELECT rating, COUNT(*)
            FROM quick_ratings
            WHERE item_type = $1 AND item_id = $2
            GROUP BY rating
            "#,
        )
        .bind(item_type)
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(RatingSummary::from_buckets(item_type, item_id, &buckets))
    }

    pub async fn list_ratings_for_user(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<QuickRating>, ServiceError> {
        let (limit, offset) = page_bounds(limit, offset);
        let ratings = sqlx::query_as::<_, QuickRating>(
            r#"
            SELECT * FROM quick_ratings
            WHERE user_id = $1
            ORDER BY last_updated DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(ratings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::fixtures;

    fn rating(user_id: Uuid, item_id: Uuid, rating: i16) -> SubmitQuickRatingRequest {
        SubmitQuickRatingRequest {
            user_id,
            item_type: ItemType::Product,
            item_id,
            rating,
        }
    }

    #[actix_rt::test]
    async fn early_update_reports_remaining_time() {
        let Some(db) = fixtures::database().await else {
            return;
        };
        let policy = RatingPolicy::default();
        let user = fixtures::mobile_user(&db).await;
        let item = fixtures::product(&db).await;

        let first = db.submit_quick_rating(rating(user, item, 4), &policy).await.unwrap();
        assert!(first.created);

        let err = db
            .submit_quick_rating(rating(user, item, 2), &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Cooldown(_)));
        assert!(err
            .to_string()
            .starts_with("You can update your rating again in "));

        let stored = db
            .get_user_rating(user, ItemType::Product, item)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.rating, 4);
        let analytics = db.get_user_analytics(user).await.unwrap().unwrap();
        assert_eq!(analytics.quick_ratings_count, 1);
    }

    #[actix_rt::test]
    async fn update_is_allowed_once_cooldown_elapsed() {
        let Some(db) = fixtures::database().await else {
            return;
        };
        let user = fixtures::mobile_user(&db).await;
        let item = fixtures::product(&db).await;
        let no_wait = RatingPolicy::new(0);

        db.submit_quick_rating(rating(user, item, 3), &no_wait).await.unwrap();
        let second = db
            .submit_quick_rating(rating(user, item, 5), &no_wait)
            .await
            .unwrap();

        assert!(!second.created);
        assert_eq!(second.rating.rating, 5);
    }
}
