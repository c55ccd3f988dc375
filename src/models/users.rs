use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::UserRole;

// ============================================================================
// USERS (admin staff + mobile users share one table)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub firebase_uid: Option<String>,
    pub photo_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Helper used when inserting a new user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub firebase_uid: Option<String>,
    pub photo_url: Option<String>,
}

/// Denormalized per-user activity counters
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserAnalytics {
    pub user_id: Uuid,
    pub reviews_count: i32,
    pub comments_count: i32,
    pub quick_ratings_count: i32,
    pub reactions_count: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserWithAnalytics {
    #[serde(flatten)]
    pub user: User,
    pub analytics: Option<UserAnalytics>,
}

// ============================================================================
// ADMINS
// ============================================================================

/// Admin-tier user joined with its credential metadata (never the hash)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdminProfile {
    pub fn from_user(user: User, last_login_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            is_active: user.is_active,
            last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Row used only during login
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminCredentials {
    pub user_id: Uuid,
    pub role: UserRole,
    pub is_active: bool,
    pub password_hash: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetupSuperAdminRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 2, max = 80))]
    pub display_name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

impl SetupSuperAdminRequest {
    pub fn into_new_user(self) -> (NewUser, String) {
        let user = NewUser {
            id: Uuid::new_v4(),
            email: self.email.trim().to_lowercase(),
            display_name: self.display_name,
            role: UserRole::SuperAdmin,
            firebase_uid: None,
            photo_url: None,
        };
        (user, self.password)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetupStatus {
    pub super_admin_exists: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub admin: AdminProfile,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAdminRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 2, max = 80))]
    pub display_name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub role: UserRole,
}

impl CreateAdminRequest {
    pub fn validate_business_rules(&self) -> Result<(), String> {
        match self.role {
            UserRole::Staff | UserRole::Admin => Ok(()),
            UserRole::SuperAdmin => {
                Err("Super admin accounts can only be created through setup".into())
            }
            UserRole::MobileUser => Err("Admin accounts require an admin-tier role".into()),
        }
    }

    pub fn into_new_user(self) -> (NewUser, String) {
        let user = NewUser {
            id: Uuid::new_v4(),
            email: self.email.trim().to_lowercase(),
            display_name: self.display_name,
            role: self.role,
            firebase_uid: None,
            photo_url: None,
        };
        (user, self.password)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAdminRequest {
    #[validate(length(min = 2, max = 80))]
    pub display_name: String,
    pub role: UserRole,
    pub is_active: bool,
}

impl UpdateAdminRequest {
    /// Checks a role/status change against the account being edited.
    pub fn validate_transition(&self, existing: &User) -> Result<(), String> {
        if !self.role.is_admin_tier() {
            return Err("Admin accounts require an admin-tier role".into());
        }
        if self.role == UserRole::SuperAdmin && existing.role != UserRole::SuperAdmin {
            return Err("Admins can not be promoted to super admin".into());
        }
        Ok(())
    }

    /// True when the change removes super admin powers from the account.
    pub fn demotes_super_admin(&self, existing: &User) -> bool {
        existing.role == UserRole::SuperAdmin
            && existing.is_active
            && (self.role != UserRole::SuperAdmin || !self.is_active)
    }

    pub fn apply_to_existing(&self, existing: &mut User) {
        existing.display_name = self.display_name.clone();
        existing.role = self.role;
        existing.is_active = self.is_active;
        existing.updated_at = Utc::now();
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

// ============================================================================
// MOBILE USERS
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct SyncUserRequest {
    #[validate(length(min = 1))]
    pub id_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 80))]
    pub display_name: String,
    #[validate(url)]
    pub photo_url: Option<String>,
    pub is_active: bool,
}

impl UpdateUserRequest {
    pub fn apply_to_existing(&self, existing: &mut User) {
        existing.display_name = self.display_name.clone();
        existing.photo_url = self.photo_url.clone();
        existing.is_active = self.is_active;
        existing.updated_at = Utc::now();
    }
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub include_inactive: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole, is_active: bool) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "ops@example.com".into(),
            display_name: "Ops".into(),
            role,
            firebase_uid: None,
            photo_url: None,
            is_active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_admin_rejects_super_admin_role() {
        let request = CreateAdminRequest {
            email: "a@example.com".into(),
            display_name: "Alice".into(),
            password: "correct horse".into(),
            role: UserRole::SuperAdmin,
        };
        assert!(request.validate_business_rules().is_err());
    }

    #[test]
    fn create_admin_normalizes_email() {
        let request = CreateAdminRequest {
            email: "  Alice@Example.COM ".into(),
            display_name: "Alice".into(),
            password: "correct horse".into(),
            role: UserRole::Staff,
        };
        let (new_user, password) = request.into_new_user();
        assert_eq!(new_user.email, "alice@example.com");
        assert_eq!(password, "correct horse");
    }

    #[test]
    fn promotion_to_super_admin_is_rejected() {
        let existing = user(UserRole::Admin, true);
        let request = UpdateAdminRequest {
            display_name: "Ops".into(),
            role: UserRole::SuperAdmin,
            is_active: true,
        };
        assert!(request.validate_transition(&existing).is_err());
    }

    #[test]
    fn deactivating_super_admin_counts_as_demotion() {
        let existing = user(UserRole::SuperAdmin, true);
        let request = UpdateAdminRequest {
            display_name: "Ops".into(),
            role: UserRole::SuperAdmin,
            is_active: false,
        };
        assert!(request.validate_transition(&existing).is_ok());
        assert!(request.demotes_super_admin(&existing));

        let rename_only = UpdateAdminRequest {
            display_name: "Root".into(),
            role: UserRole::SuperAdmin,
            is_active: true,
        };
        assert!(!rename_only.demotes_super_admin(&existing));
    }
}
