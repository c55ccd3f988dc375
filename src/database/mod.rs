use std::{borrow::Cow, time::Duration};

use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Connection, Executor, PgConnection, PgPool,
};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{DashboardStats, ItemType};

mod catalog;
mod comments;
mod ratings;
mod reviews;
mod users;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

/// Per-user counters kept in `user_analytics`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsCounter {
    Reviews,
    Comments,
    QuickRatings,
    Reactions,
}

impl AnalyticsCounter {
    fn column(self) -> &'static str {
        match self {
            AnalyticsCounter::Reviews => "reviews_count",
            AnalyticsCounter::Comments => "comments_count",
            AnalyticsCounter::QuickRatings => "quick_ratings_count",
            AnalyticsCounter::Reactions => "reactions_count",
        }
    }
}

fn pool_options(max_connections: u32) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(max_connections.min(2))
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Some(Duration::from_secs(600)))
        .test_before_acquire(true)
}

impl Database {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = match pool_options(max_connections).connect(database_url).await {
            Ok(pool) => pool,
            Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("3D000")) => {
                log::info!("Database missing, attempting to create it");
                create_database_if_missing(database_url).await?;

                pool_options(max_connections).connect(database_url).await?
            }
            Err(err) => return Err(err),
        };

        // Run embedded migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        log::info!("Database connection established and migrations applied");
        Ok(Self { pool })
    }

    /// Pool that only dials out on first use.
    #[cfg(test)]
    pub fn connect_lazy(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ServiceError> {
        let row: (i64, i64, i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE role = 'mobile_user' AND is_active),
                (SELECT COUNT(*) FROM users WHERE role <> 'mobile_user' AND is_active),
                (SELECT COUNT(*) FROM businesses WHERE is_active),
                (SELECT COUNT(*) FROM products WHERE is_active),
                (SELECT COUNT(*) FROM services WHERE is_active),
                (SELECT COUNT(*) FROM categories WHERE is_active),
                (SELECT COUNT(*) FROM reviews WHERE NOT is_deleted),
                (SELECT COUNT(*) FROM comments WHERE NOT is_deleted),
                (SELECT COUNT(*) FROM quick_ratings),
                (SELECT COUNT(*) FROM reviews
                    WHERE NOT is_deleted AND created_at >= NOW() - INTERVAL '1 day')
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardStats {
            active_users: row.0,
            admins: row.1,
            businesses: row.2,
            products: row.3,
            services: row.4,
            categories: row.5,
            reviews: row.6,
            comments: row.7,
            quick_ratings: row.8,
            reviews_today: row.9,
        })
    }
}

/// Adds `delta` to one analytics counter, creating the row on first use.
/// Counters floor at zero.
pub(crate) async fn bump_analytics(
    conn: &mut PgConnection,
    user_id: Uuid,
    counter: AnalyticsCounter,
    delta: i32,
) -> Result<(), sqlx::Error> {
    if delta == 0 {
        return Ok(());
    }
    let column = counter.column();
    let sql = format!(
        r#"
        INSERT INTO user_analytics (user_id, {column})
        VALUES ($1, GREATEST($2, 0))
        ON CONFLICT (user_id) DO UPDATE
        SET {column} = GREATEST(user_analytics.{column} + $2, 0),
            updated_at = NOW()
        "#
    );
    sqlx::query(&sql)
        .bind(user_id)
        .bind(delta)
        .execute(conn)
        .await?;
    Ok(())
}

/// Fails with 404 unless the referenced product/service exists and is active.
pub(crate) async fn ensure_item_exists(
    conn: &mut PgConnection,
    item_type: ItemType,
    item_id: Uuid,
) -> Result<(), ServiceError> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1 AND is_active)",
        item_type.table()
    );
    let exists: bool = sqlx::query_scalar(&sql)
        .bind(item_id)
        .fetch_one(conn)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(ServiceError::not_found(item_type.label()))
    }
}

/// Serializes writers of one user's review or rating of one item. Row locks
/// cover existing rows only; this also covers the first insert.
pub(crate) async fn lock_submission(
    conn: &mut PgConnection,
    scope: &str,
    user_id: Uuid,
    item_type: ItemType,
    item_id: Uuid,
) -> Result<(), sqlx::Error> {
    let key = format!("{scope}:{user_id}:{}:{item_id}", item_type.table());
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(key)
        .execute(conn)
        .await?;
    Ok(())
}

/// Fails with 404 unless the user exists and is active.
pub(crate) async fn ensure_active_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<(), ServiceError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND is_active)")
            .bind(user_id)
            .fetch_one(conn)
            .await?;
    if exists {
        Ok(())
    } else {
        Err(ServiceError::not_found("User"))
    }
}

async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    let options: PgConnectOptions = database_url.parse()?;
    let database_name = options
        .get_database()
        .map(|name| name.to_string())
        .unwrap_or_else(|| "postgres".to_string());

    if database_name.eq_ignore_ascii_case("postgres") {
        return Ok(());
    }

    let maintenance_options = options.clone().database("postgres");

    let mut connection = PgConnection::connect_with(&maintenance_options).await?;

    let escaped_name = database_name.replace('"', "\"\"");
    let create_stmt = format!("CREATE DATABASE \"{}\"", escaped_name);

    match connection.execute(create_stmt.as_str()).await {
        Ok(_) => {
            log::info!("Created database '{}'", database_name);
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("42P04")) => {
            log::info!("Database '{}' already exists", database_name);
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Clamps list paging to sane bounds (default 50, max 100).
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (limit.unwrap_or(50).clamp(1, 100), offset.unwrap_or(0).max(0))
}

/// Shared setup for tests that need a live Postgres. They run against
/// `TEST_DATABASE_URL` (or `DATABASE_URL`) and are skipped when neither is set
/// or `SKIP_DB_TESTS` is.
#[cfg(test)]
pub(crate) mod fixtures {
    use uuid::Uuid;

    use super::Database;
    use crate::clients::identity::IdentityUser;
    use crate::models::NewProduct;

    pub async fn database() -> Option<Database> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return None;
        }
        let url = std::env::var("TEST_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .ok()?;
        Some(Database::connect(&url, 5).await.expect("test database"))
    }

    pub async fn mobile_user(db: &Database) -> Uuid {
        let uid = Uuid::new_v4().simple().to_string();
        db.upsert_mobile_user(IdentityUser {
            email: Some(format!("{uid}@example.com")),
            local_id: uid,
            display_name: Some("Test Reviewer".into()),
            photo_url: None,
            disabled: false,
        })
        .await
        .expect("mobile user")
        .id
    }

    pub async fn product(db: &Database) -> Uuid {
        db.create_product(
            NewProduct {
                id: Uuid::new_v4(),
                business_id: None,
                name: "Test Kettle".into(),
                brand: None,
                description: None,
                image_url: None,
            },
            Vec::new(),
        )
        .await
        .expect("product")
        .product
        .id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_clamp_inputs() {
        assert_eq!(page_bounds(None, None), (50, 0));
        assert_eq!(page_bounds(Some(0), Some(-5)), (1, 0));
        assert_eq!(page_bounds(Some(500), Some(20)), (100, 20));
    }

    #[test]
    fn analytics_columns_are_distinct() {
        let columns = [
            AnalyticsCounter::Reviews.column(),
            AnalyticsCounter::Comments.column(),
            AnalyticsCounter::QuickRatings.column(),
            AnalyticsCounter::Reactions.column(),
        ];
        let unique: std::collections::HashSet<_> = columns.iter().collect();
        assert_eq!(unique.len(), columns.len());
    }
}
