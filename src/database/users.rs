use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{page_bounds, Database};
use crate::clients::identity::IdentityUser;
use crate::errors::ServiceError;
use crate::models::{
    AdminCredentials, AdminProfile, NewUser, UpdateAdminRequest, UpdateUserRequest, User,
    UserAnalytics, UserListQuery, UserRole, UserWithAnalytics,
};

/// Advisory lock key serializing super-admin bootstrap and demotion.
const SUPER_ADMIN_LOCK: i64 = 0x5355_5045_525f_4144;

const ADMIN_PROFILE_SELECT: &str = r#"
    SELECT
        u.id,
        u.email,
        u.display_name,
        u.role,
        u.is_active,
        a.last_login_at,
        u.created_at,
        u.updated_at
    FROM users u
    JOIN admin_auth a ON a.user_id = u.id
"#;

impl Database {
    // ========================================================================
    // ADMINS
    // ========================================================================

    pub async fn super_admin_exists(&self) -> Result<bool, ServiceError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE role = 'super_admin')",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Creates the first super admin. The existence check and the insert share
    /// a transaction holding an advisory lock, so concurrent setups can not
    /// both succeed.
    pub async fn setup_super_admin(
        &self,
        user: NewUser,
        password_hash: String,
    ) -> Result<AdminProfile, ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SUPER_ADMIN_LOCK)
            .execute(&mut *tx)
            .await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'super_admin')")
                .fetch_one(&mut *tx)
                .await?;
        if exists {
            return Err(ServiceError::Conflict(
                "A super admin account already exists".into(),
            ));
        }

        let admin = insert_admin(&mut tx, user, password_hash).await?;
        tx.commit().await?;

        log::info!("Super admin {} created through setup", admin.id);
        Ok(admin)
    }

    pub async fn create_admin(
        &self,
        user: NewUser,
        password_hash: String,
    ) -> Result<AdminProfile, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let admin = insert_admin(&mut tx, user, password_hash).await?;
        tx.commit().await?;
        Ok(admin)
    }

    pub async fn find_admin_credentials(
        &self,
        email: &str,
    ) -> Result<Option<AdminCredentials>, ServiceError> {
        let record = sqlx::query_as::<_, AdminCredentials>(
            r#"
            SELECT u.id AS user_id, u.role, u.is_active, a.password_hash
            FROM users u
            JOIN admin_auth a ON a.user_id = u.id
            WHERE LOWER(u.email) = LOWER($1)
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn record_admin_login(&self, user_id: Uuid) -> Result<AdminProfile, ServiceError> {
        sqlx::query("UPDATE admin_auth SET last_login_at = NOW() WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        self.get_admin(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Admin"))
    }

    pub async fn get_admin(&self, user_id: Uuid) -> Result<Option<AdminProfile>, ServiceError> {
        let sql = format!("{ADMIN_PROFILE_SELECT} WHERE u.id = $1");
        let record = sqlx::query_as::<_, AdminProfile>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    pub async fn list_admins(&self, include_inactive: bool) -> Result<Vec<AdminProfile>, ServiceError> {
        let sql = format!(
            "{ADMIN_PROFILE_SELECT} WHERE ($1 OR u.is_active) ORDER BY u.created_at ASC"
        );
        let records = sqlx::query_as::<_, AdminProfile>(&sql)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    pub async fn update_admin(
        &self,
        user_id: Uuid,
        changes: UpdateAdminRequest,
        actor_id: Uuid,
    ) -> Result<AdminProfile, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut existing = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND role <> 'mobile_user' FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found("Admin"))?;

        changes
            .validate_transition(&existing)
            .map_err(ServiceError::Validation)?;

        if user_id == actor_id && !changes.is_active {
            return Err(ServiceError::Forbidden(
                "Admins can not deactivate their own account".into(),
            ));
        }

        if changes.demotes_super_admin(&existing) {
            ensure_other_super_admin(&mut tx, user_id).await?;
        }

        changes.apply_to_existing(&mut existing);

        sqlx::query(
            r#"
            UPDATE users
            SET display_name = $2, role = $3, is_active = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(existing.id)
        .bind(&existing.display_name)
        .bind(existing.role)
        .bind(existing.is_active)
        .bind(existing.updated_at)
        .execute(&mut *tx)
        .await?;

        let sql = format!("{ADMIN_PROFILE_SELECT} WHERE u.id = $1");
        let profile = sqlx::query_as::<_, AdminProfile>(&sql)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(profile)
    }

    pub async fn change_admin_password(
        &self,
        user_id: Uuid,
        password_hash: String,
    ) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "UPDATE admin_auth SET password_hash = $2, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Admin"));
        }
        Ok(())
    }

    pub async fn deactivate_admin(&self, user_id: Uuid, actor_id: Uuid) -> Result<(), ServiceError> {
        if user_id == actor_id {
            return Err(ServiceError::Forbidden(
                "Admins can not deactivate their own account".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND role <> 'mobile_user' FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found("Admin"))?;

        if !existing.is_active {
            return Ok(());
        }

        if existing.role == UserRole::SuperAdmin {
            ensure_other_super_admin(&mut tx, user_id).await?;
        }

        sqlx::query("UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ========================================================================
    // MOBILE USERS
    // ========================================================================

    /// Creates or refreshes the mobile user behind an identity account.
    pub async fn upsert_mobile_user(&self, identity: IdentityUser) -> Result<User, ServiceError> {
        let email = identity
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ServiceError::Validation("Identity account has no email".into()))?;
        let display_name = identity
            .display_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, display_name, role, firebase_uid, photo_url)
            VALUES ($1, $2, $3, 'mobile_user', $4, $5)
            ON CONFLICT (firebase_uid) DO UPDATE
            SET email = EXCLUDED.email,
                photo_url = COALESCE(EXCLUDED.photo_url, users.photo_url),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(&display_name)
        .bind(&identity.local_id)
        .bind(&identity.photo_url)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO user_analytics (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    pub async fn list_users(&self, query: &UserListQuery) -> Result<Vec<User>, ServiceError> {
        let (limit, offset) = page_bounds(query.limit, query.offset);

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM users WHERE 1 = 1");
        if let Some(role) = query.role {
            builder.push(" AND role = ").push_bind(role);
        }
        if !query.include_inactive.unwrap_or(false) {
            builder.push(" AND is_active");
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            builder
                .push(" AND (email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR display_name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let users = builder.build_query_as::<User>().fetch_all(&self.pool).await?;
        Ok(users)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user_with_analytics(
        &self,
        user_id: Uuid,
    ) -> Result<Option<UserWithAnalytics>, ServiceError> {
        let user = match self.get_user(user_id).await? {
            Some(user) => user,
            None => return Ok(None),
        };
        let analytics = self.get_user_analytics(user_id).await?;
        Ok(Some(UserWithAnalytics { user, analytics }))
    }

    pub async fn update_user(
        &self,
        user_id: Uuid,
        changes: UpdateUserRequest,
    ) -> Result<User, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut existing = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND role = 'mobile_user' FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found("User"))?;

        changes.apply_to_existing(&mut existing);

        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET display_name = $2, photo_url = $3, is_active = $4, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(existing.id)
        .bind(&existing.display_name)
        .bind(&existing.photo_url)
        .bind(existing.is_active)
        .bind(existing.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn deactivate_user(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1 AND role = 'mobile_user'
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("User"));
        }
        Ok(())
    }

    pub async fn get_user_analytics(
        &self,
        user_id: Uuid,
    ) -> Result<Option<UserAnalytics>, ServiceError> {
        let analytics =
            sqlx::query_as::<_, UserAnalytics>("SELECT * FROM user_analytics WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(analytics)
    }
}

async fn insert_admin(
    conn: &mut PgConnection,
    user: NewUser,
    password_hash: String,
) -> Result<AdminProfile, ServiceError> {
    let NewUser {
        id,
        email,
        display_name,
        role,
        firebase_uid,
        photo_url,
    } = user;

    let record = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, display_name, role, firebase_uid, photo_url)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(display_name)
    .bind(role)
    .bind(firebase_uid)
    .bind(photo_url)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("INSERT INTO admin_auth (user_id, password_hash) VALUES ($1, $2)")
        .bind(record.id)
        .bind(password_hash)
        .execute(&mut *conn)
        .await?;

    sqlx::query("INSERT INTO user_analytics (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(record.id)
        .execute(&mut *conn)
        .await?;

    Ok(AdminProfile::from_user(record, None))
}

/// Guards against removing the last active super admin.
async fn ensure_other_super_admin(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<(), ServiceError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SUPER_ADMIN_LOCK)
        .execute(&mut *conn)
        .await?;

    let others: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE role = 'super_admin' AND is_active AND id <> $1",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    if others == 0 {
        return Err(ServiceError::Conflict(
            "The last active super admin can not be demoted or deactivated".into(),
        ));
    }
    Ok(())
}
