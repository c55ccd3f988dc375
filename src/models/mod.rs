use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod comments;
pub mod ratings;
pub mod reviews;
pub mod users;

pub use catalog::*;
pub use comments::*;
pub use ratings::*;
pub use reviews::*;
pub use users::*;

// ============================================================================
// ENUMS
// ============================================================================

/// Role discriminator shared by admin staff and mobile users (Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    MobileUser,
    Staff,
    Admin,
    SuperAdmin,
}

impl UserRole {
    /// Roles that carry an `admin_auth` row and may log into the dashboard.
    pub fn is_admin_tier(self) -> bool {
        !matches!(self, UserRole::MobileUser)
    }
}

/// Kind of catalog entry a review, comment or rating points at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "item_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Product,
    Service,
}

impl ItemType {
    pub fn table(self) -> &'static str {
        match self {
            ItemType::Product => "products",
            ItemType::Service => "services",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemType::Product => "Product",
            ItemType::Service => "Service",
        }
    }
}

/// Opinion bucket attached to a review
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "sentiment", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// Reaction a user leaves on a comment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "reaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReactionType {
    Agree,
    Disagree,
}

// ============================================================================
// REQUEST/RESPONSE DTOs
// ============================================================================

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

/// Aggregated totals for the admin dashboard landing page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub active_users: i64,
    pub admins: i64,
    pub businesses: i64,
    pub products: i64,
    pub services: i64,
    pub categories: i64,
    pub reviews: i64,
    pub comments: i64,
    pub quick_ratings: i64,
    pub reviews_today: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_users_are_not_admin_tier() {
        assert!(!UserRole::MobileUser.is_admin_tier());
        assert!(UserRole::Staff.is_admin_tier());
        assert!(UserRole::Admin.is_admin_tier());
        assert!(UserRole::SuperAdmin.is_admin_tier());
    }

    #[test]
    fn enums_use_snake_case_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&UserRole::SuperAdmin).unwrap(),
            "\"super_admin\""
        );
        let item: ItemType = serde_json::from_str("\"service\"").unwrap();
        assert_eq!(item, ItemType::Service);
        assert_eq!(item.table(), "services");
    }

    #[test]
    fn error_envelope_has_no_data() {
        let response = ApiResponse::<()>::error("boom".into());
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.error.as_deref(), Some("boom"));
    }
}
