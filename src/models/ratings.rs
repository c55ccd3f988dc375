use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::ItemType;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuickRating {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub rating: i16,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Time left before a rating may change again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownRemaining {
    pub hours: i64,
    pub minutes: i64,
}

/// How often a user may change a quick rating
#[derive(Debug, Clone, Copy)]
pub struct RatingPolicy {
    pub cooldown: Duration,
}

impl Default for RatingPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::hours(24),
        }
    }
}

impl RatingPolicy {
    pub fn new(cooldown_hours: i64) -> Self {
        Self {
            cooldown: Duration::hours(cooldown_hours),
        }
    }

    /// `None` once the cooldown has elapsed. Partial minutes round up so a
    /// rejection never reports "0 hours and 0 minutes".
    pub fn remaining(
        &self,
        last_updated: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<CooldownRemaining> {
        let left = last_updated + self.cooldown - now;
        if left <= Duration::zero() {
            return None;
        }
        let total_minutes = (left.num_seconds() + 59) / 60;
        Some(CooldownRemaining {
            hours: total_minutes / 60,
            minutes: total_minutes % 60,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitQuickRatingRequest {
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickRatingSubmission {
    pub rating: QuickRating,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSummary {
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub count: i64,
    pub average: Option<f64>,
    /// Counts for ratings 1 through 5.
    pub distribution: [i64; 5],
}

impl RatingSummary {
    pub fn from_buckets(item_type: ItemType, item_id: Uuid, buckets: &[(i16, i64)]) -> Self {
        let mut distribution = [0i64; 5];
        for (rating, count) in buckets {
            if (1..=5).contains(rating) {
                distribution[(*rating - 1) as usize] += count;
            }
        }
        let count: i64 = distribution.iter().sum();
        let weighted: i64 = distribution
            .iter()
            .enumerate()
            .map(|(idx, n)| (idx as i64 + 1) * n)
            .sum();
        let average = (count > 0).then(|| weighted as f64 / count as f64);
        Self {
            item_type,
            item_id,
            count,
            average,
            distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_inside_window_reports_remaining_time() {
        let policy = RatingPolicy::default();
        let now = Utc::now();
        let last = now - Duration::hours(20) - Duration::minutes(30);

        let remaining = policy.remaining(last, now).unwrap();
        assert_eq!(remaining, CooldownRemaining { hours: 3, minutes: 30 });
    }

    #[test]
    fn update_after_window_is_allowed() {
        let policy = RatingPolicy::default();
        let now = Utc::now();
        assert!(policy.remaining(now - Duration::hours(24), now).is_none());
        assert!(policy.remaining(now - Duration::days(3), now).is_none());
    }

    #[test]
    fn partial_minutes_round_up() {
        let policy = RatingPolicy::default();
        let now = Utc::now();
        let last = now - Duration::hours(24) + Duration::seconds(20);

        let remaining = policy.remaining(last, now).unwrap();
        assert_eq!(remaining, CooldownRemaining { hours: 0, minutes: 1 });
    }

    #[test]
    fn custom_cooldown_is_honoured() {
        let policy = RatingPolicy::new(1);
        let now = Utc::now();
        assert!(policy.remaining(now - Duration::minutes(61), now).is_none());
        assert!(policy.remaining(now - Duration::minutes(59), now).is_some());
    }

    #[test]
    fn out_of_range_rating_fails_validation() {
        let request = SubmitQuickRatingRequest {
            user_id: Uuid::new_v4(),
            item_type: ItemType::Product,
            item_id: Uuid::new_v4(),
            rating: 6,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn summary_averages_buckets() {
        let summary =
            RatingSummary::from_buckets(ItemType::Service, Uuid::new_v4(), &[(5, 3), (1, 1)]);
        assert_eq!(summary.count, 4);
        assert_eq!(summary.distribution, [1, 0, 0, 0, 3]);
        assert_eq!(summary.average, Some(4.0));
    }

    #[test]
    fn empty_summary_has_no_average() {
        let summary = RatingSummary::from_buckets(ItemType::Product, Uuid::new_v4(), &[]);
        assert_eq!(summary.count, 0);
        assert!(summary.average.is_none());
    }
}
