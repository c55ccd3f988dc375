use sqlx::PgConnection;
use uuid::Uuid;

use super::{bump_analytics, ensure_active_user, ensure_item_exists, page_bounds, AnalyticsCounter, Database};
use crate::errors::ServiceError;
use crate::models::{
    Comment, CommentReaction, ItemType, NewComment, ReactionDelta, ReactionOutcome, ReactionType,
};

impl Database {
    /// Inserts a comment or reply. Reply depth, the parent's `reply_count` and
    /// the author's analytics move together in one transaction.
    pub async fn create_comment(&self, comment: NewComment) -> Result<Comment, ServiceError> {
        let mut tx = self.pool.begin().await?;

        ensure_active_user(&mut tx, comment.user_id).await?;
        ensure_item_exists(&mut tx, comment.item_type, comment.item_id).await?;

        let depth = match comment.parent_id {
            Some(parent_id) => {
                let parent = lock_comment(&mut tx, parent_id)
                    .await?
                    .filter(|parent| !parent.is_deleted)
                    .ok_or_else(|| ServiceError::not_found("Parent comment"))?;
                let depth = parent
                    .reply_depth(comment.item_type, comment.item_id)
                    .map_err(ServiceError::Validation)?;

                sqlx::query(
                    "UPDATE comments SET reply_count = reply_count + 1, updated_at = NOW() WHERE id = $1",
                )
                .bind(parent_id)
                .execute(&mut *tx)
                .await?;

                depth
            }
            None => 0,
        };

        let record = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, user_id, item_type, item_id, parent_id, depth, content)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(comment.id)
        .bind(comment.user_id)
        .bind(comment.item_type)
        .bind(comment.item_id)
        .bind(comment.parent_id)
        .bind(depth)
        .bind(comment.content)
        .fetch_one(&mut *tx)
        .await?;

        bump_analytics(&mut tx, record.user_id, AnalyticsCounter::Comments, 1).await?;

        tx.commit().await?;
        Ok(record)
    }

    pub async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>, ServiceError> {
        let record = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    pub async fn list_comments_for_item(
        &self,
        item_type: ItemType,
        item_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Comment>, ServiceError> {
        let (limit, offset) = page_bounds(limit, offset);
        let records = sqlx::query_as::<_, Comment>(
            r#"
            SELECT * FROM comments
            WHERE item_type = $1 AND item_id = $2 AND depth = 0 AND NOT is_deleted
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(item_type)
        .bind(item_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn list_replies(&self, parent_id: Uuid) -> Result<Vec<Comment>, ServiceError> {
        let records = sqlx::query_as::<_, Comment>(
            r#"
            SELECT * FROM comments
            WHERE parent_id = $1 AND NOT is_deleted
            ORDER BY created_at ASC
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn update_comment(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<Comment, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let existing = lock_comment(&mut tx, comment_id)
            .await?
            .filter(|c| !c.is_deleted)
            .ok_or_else(|| ServiceError::not_found("Comment"))?;

        if existing.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Only the author can edit a comment".into(),
            ));
        }

        let updated = sqlx::query_as::<_, Comment>(
            "UPDATE comments SET content = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(comment_id)
        .bind(content.trim())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Soft-deletes a comment. A reply takes exactly one off its parent's
    /// `reply_count`; deleting twice changes nothing.
    pub async fn delete_comment(&self, comment_id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        let existing = lock_comment(&mut tx, comment_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Comment"))?;

        if existing.is_deleted {
            return Ok(());
        }

        sqlx::query("UPDATE comments SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;

        if let Some(parent_id) = existing.parent_id {
            sqlx::query(
                r#"
                UPDATE comments
                SET reply_count = GREATEST(reply_count - 1, 0), updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(parent_id)
            .execute(&mut *tx)
            .await?;
        }

        bump_analytics(&mut tx, existing.user_id, AnalyticsCounter::Comments, -1).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Sets the user's reaction on a comment. Switching type moves one count
    /// from the old counter to the new one; repeating a reaction is a no-op.
    pub async fn react_to_comment(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
        reaction_type: ReactionType,
    ) -> Result<ReactionOutcome, ServiceError> {
        let mut tx = self.pool.begin().await?;

        ensure_active_user(&mut tx, user_id).await?;
        let comment = lock_comment(&mut tx, comment_id)
            .await?
            .filter(|c| !c.is_deleted)
            .ok_or_else(|| ServiceError::not_found("Comment"))?;

        let previous = sqlx::query_as::<_, CommentReaction>(
            "SELECT * FROM comment_reactions WHERE comment_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(comment_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let delta = ReactionDelta::between(
            previous.as_ref().map(|r| r.reaction_type),
            Some(reaction_type),
        );

        if delta.is_noop() {
            tx.commit().await?;
            return Ok(ReactionOutcome {
                comment,
                reaction: previous,
            });
        }

        let reaction = sqlx::query_as::<_, CommentReaction>(
            r#"
            INSERT INTO comment_reactions (id, comment_id, user_id, reaction_type)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (comment_id, user_id) DO UPDATE
            SET reaction_type = EXCLUDED.reaction_type, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(comment_id)
        .bind(user_id)
        .bind(reaction_type)
        .fetch_one(&mut *tx)
        .await?;

        let comment = apply_reaction_delta(&mut tx, comment_id, delta).await?;

        if previous.is_none() {
            bump_analytics(&mut tx, user_id, AnalyticsCounter::Reactions, 1).await?;
        }

        tx.commit().await?;
        Ok(ReactionOutcome {
            comment,
            reaction: Some(reaction),
        })
    }

    pub async fn remove_reaction(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> Result<Comment, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let comment = lock_comment(&mut tx, comment_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Comment"))?;

        let removed: Option<ReactionType> = sqlx::query_scalar(
            "DELETE FROM comment_reactions WHERE comment_id = $1 AND user_id = $2 RETURNING reaction_type",
        )
        .bind(comment_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let comment = match removed {
            Some(previous) => {
                let delta = ReactionDelta::between(Some(previous), None);
                let updated = apply_reaction_delta(&mut tx, comment_id, delta).await?;
                bump_analytics(&mut tx, user_id, AnalyticsCounter::Reactions, -1).await?;
                updated
            }
            None => comment,
        };

        tx.commit().await?;
        Ok(comment)
    }
}

async fn lock_comment(
    conn: &mut PgConnection,
    comment_id: Uuid,
) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1 FOR UPDATE")
        .bind(comment_id)
        .fetch_optional(conn)
        .await
}

async fn apply_reaction_delta(
    conn: &mut PgConnection,
    comment_id: Uuid,
    delta: ReactionDelta,
) -> Result<Comment, sqlx::Error> {
    sqlx::query_as::<_, Comment>(
        r#"
        UPDATE comments
        SET agree_count = GREATEST(agree_count + $2, 0),
            disagree_count = GREATEST(disagree_count + $3, 0),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(comment_id)
    .bind(delta.agree)
    .bind(delta.disagree)
    .fetch_one(conn)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::fixtures;

    fn comment(user_id: Uuid, item_id: Uuid, parent_id: Option<Uuid>) -> NewComment {
        NewComment {
            id: Uuid::new_v4(),
            user_id,
            item_type: ItemType::Product,
            item_id,
            parent_id,
            content: "Works as described".into(),
        }
    }

    #[actix_rt::test]
    async fn deleting_a_reply_decrements_parent_once() {
        let Some(db) = fixtures::database().await else {
            return;
        };
        let user = fixtures::mobile_user(&db).await;
        let item = fixtures::product(&db).await;

        let parent = db.create_comment(comment(user, item, None)).await.unwrap();
        let reply = db
            .create_comment(comment(user, item, Some(parent.id)))
            .await
            .unwrap();
        assert_eq!(reply.depth, 1);
        let parent_now = db.get_comment(parent.id).await.unwrap().unwrap();
        assert_eq!(parent_now.reply_count, 1);

        db.delete_comment(reply.id).await.unwrap();
        db.delete_comment(reply.id).await.unwrap();

        let parent_now = db.get_comment(parent.id).await.unwrap().unwrap();
        assert_eq!(parent_now.reply_count, 0);
        let analytics = db.get_user_analytics(user).await.unwrap().unwrap();
        assert_eq!(analytics.comments_count, 1);
    }

    #[actix_rt::test]
    async fn reply_to_deleted_parent_is_not_found() {
        let Some(db) = fixtures::database().await else {
            return;
        };
        let user = fixtures::mobile_user(&db).await;
        let item = fixtures::product(&db).await;

        let parent = db.create_comment(comment(user, item, None)).await.unwrap();
        db.delete_comment(parent.id).await.unwrap();

        let err = db
            .create_comment(comment(user, item, Some(parent.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[actix_rt::test]
    async fn switching_reaction_moves_one_count() {
        let Some(db) = fixtures::database().await else {
            return;
        };
        let author = fixtures::mobile_user(&db).await;
        let reader = fixtures::mobile_user(&db).await;
        let item = fixtures::product(&db).await;
        let target = db.create_comment(comment(author, item, None)).await.unwrap();

        let agreed = db
            .react_to_comment(target.id, reader, ReactionType::Agree)
            .await
            .unwrap();
        assert_eq!((agreed.comment.agree_count, agreed.comment.disagree_count), (1, 0));

        let repeated = db
            .react_to_comment(target.id, reader, ReactionType::Agree)
            .await
            .unwrap();
        assert_eq!((repeated.comment.agree_count, repeated.comment.disagree_count), (1, 0));

        let switched = db
            .react_to_comment(target.id, reader, ReactionType::Disagree)
            .await
            .unwrap();
        assert_eq!((switched.comment.agree_count, switched.comment.disagree_count), (0, 1));

        let stored: Vec<(ReactionType, i64)> = sqlx::query_as(
            "SELECT reaction_type, COUNT(*) FROM comment_reactions WHERE comment_id = $1 GROUP BY reaction_type",
        )
        .bind(target.id)
        .fetch_all(&db.pool)
        .await
        .unwrap();
        assert_eq!(stored, vec![(ReactionType::Disagree, 1)]);

        let analytics = db.get_user_analytics(reader).await.unwrap().unwrap();
        assert_eq!(analytics.reactions_count, 1);
    }
}
