use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{ItemType, ReactionType};

/// Deepest allowed reply level; top-level comments sit at depth 0.
pub const MAX_COMMENT_DEPTH: i16 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub depth: i16,
    pub content: String,
    pub reply_count: i32,
    pub agree_count: i32,
    pub disagree_count: i32,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    /// Depth a reply to this comment would get. Callers treat a deleted
    /// parent as missing before asking.
    pub fn reply_depth(&self, item_type: ItemType, item_id: Uuid) -> Result<i16, String> {
        if self.item_type != item_type || self.item_id != item_id {
            return Err("Reply must target the same item as its parent comment".into());
        }
        if self.depth >= MAX_COMMENT_DEPTH {
            return Err(format!(
                "Replies can only be nested {} levels deep",
                MAX_COMMENT_DEPTH
            ));
        }
        Ok(self.depth + 1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentReaction {
    pub id: Uuid,
    pub comment_id: Uuid,
    pub user_id: Uuid,
    pub reaction_type: ReactionType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Counter adjustments implied by a reaction change on one comment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactionDelta {
    pub agree: i32,
    pub disagree: i32,
}

impl ReactionDelta {
    pub fn between(previous: Option<ReactionType>, next: Option<ReactionType>) -> Self {
        let mut delta = Self::default();
        if previous == next {
            return delta;
        }
        if let Some(old) = previous {
            *delta.slot(old) -= 1;
        }
        if let Some(new) = next {
            *delta.slot(new) += 1;
        }
        delta
    }

    pub fn is_noop(&self) -> bool {
        self.agree == 0 && self.disagree == 0
    }

    fn slot(&mut self, reaction: ReactionType) -> &mut i32 {
        match reaction {
            ReactionType::Agree => &mut self.agree,
            ReactionType::Disagree => &mut self.disagree,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub parent_id: Option<Uuid>,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

impl CreateCommentRequest {
    pub fn validate_business_rules(&self) -> Result<(), String> {
        if self.content.trim().is_empty() {
            return Err("Comment content can not be blank".into());
        }
        Ok(())
    }

    pub fn into_new_comment(self) -> NewComment {
        NewComment {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            item_type: self.item_type,
            item_id: self.item_id,
            parent_id: self.parent_id,
            content: self.content.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ReactRequest {
    pub user_id: Uuid,
    pub reaction_type: ReactionType,
}

/// Comment after a reaction change, with the caller's current reaction
#[derive(Debug, Clone, Serialize)]
pub struct ReactionOutcome {
    pub comment: Comment,
    pub reaction: Option<CommentReaction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(depth: i16) -> Comment {
        let now = Utc::now();
        Comment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            item_type: ItemType::Service,
            item_id: Uuid::new_v4(),
            parent_id: None,
            depth,
            content: "Friendly staff".into(),
            reply_count: 0,
            agree_count: 0,
            disagree_count: 0,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn replies_nest_up_to_two_levels() {
        let top = comment(0);
        assert_eq!(top.reply_depth(top.item_type, top.item_id), Ok(1));

        let reply = comment(1);
        assert_eq!(reply.reply_depth(reply.item_type, reply.item_id), Ok(2));

        let nested = comment(MAX_COMMENT_DEPTH);
        assert!(nested.reply_depth(nested.item_type, nested.item_id).is_err());
    }

    #[test]
    fn reply_to_foreign_comment_is_rejected() {
        let parent = comment(0);
        assert!(parent
            .reply_depth(ItemType::Product, parent.item_id)
            .is_err());
        assert!(parent
            .reply_depth(parent.item_type, Uuid::new_v4())
            .is_err());
    }

    #[test]
    fn first_reaction_increments_one_counter() {
        let delta = ReactionDelta::between(None, Some(ReactionType::Agree));
        assert_eq!(delta, ReactionDelta { agree: 1, disagree: 0 });
    }

    #[test]
    fn switching_reaction_moves_the_count() {
        let delta = ReactionDelta::between(Some(ReactionType::Agree), Some(ReactionType::Disagree));
        assert_eq!(delta, ReactionDelta { agree: -1, disagree: 1 });
    }

    #[test]
    fn repeating_reaction_is_a_noop() {
        let delta =
            ReactionDelta::between(Some(ReactionType::Disagree), Some(ReactionType::Disagree));
        assert!(delta.is_noop());
    }

    #[test]
    fn removing_reaction_decrements() {
        let delta = ReactionDelta::between(Some(ReactionType::Disagree), None);
        assert_eq!(delta, ReactionDelta { agree: 0, disagree: -1 });
    }

    #[test]
    fn blank_content_is_rejected() {
        let request = CreateCommentRequest {
            user_id: Uuid::new_v4(),
            item_type: ItemType::Product,
            item_id: Uuid::new_v4(),
            parent_id: None,
            content: "   ".into(),
        };
        assert!(request.validate_business_rules().is_err());
    }
}
