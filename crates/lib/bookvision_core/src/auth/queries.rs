//! PostgreSQL credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::password::{self, BCRYPT_COST};
use super::store::CredentialStore;
use super::{AuthError, Role};
use crate::models::auth::{NewUser, User, Visibility};

/// Credential store backed by the `users` table.
///
/// Username uniqueness is the `users_username_key` unique index; a violation
/// surfaces as [`AuthError::Conflict`].
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
    bcrypt_cost: u32,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            bcrypt_cost: BCRYPT_COST,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    avatar_url: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    books_read: i32,
    reviews_count: i32,
    likes_received: i32,
    profile_visibility: String,
    activity_visibility: String,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

impl TryFrom<UserRow> for User {
    type Error = AuthError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| AuthError::Internal(format!("unknown role in users table: {}", row.role)))?;
        let visibility = |s: &str| {
            Visibility::parse(s)
                .ok_or_else(|| AuthError::Internal(format!("unknown visibility in users table: {s}")))
        };
        Ok(User {
            profile_visibility: visibility(&row.profile_visibility)?,
            activity_visibility: visibility(&row.activity_visibility)?,
            id: row.id,
            username: row.username,
            email: row.email,
            avatar_url: row.avatar_url,
            role,
            created_at: row.created_at,
            books_read: row.books_read,
            reviews_count: row.reviews_count,
            likes_received: row.likes_received,
        })
    }
}

/// Ids that are not UUIDs cannot exist in the table.
fn parse_id(id: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(id).map_err(|_| AuthError::NotFound(format!("user {id}")))
}

fn username_conflict(username: &str) -> impl FnOnce(sqlx::Error) -> AuthError + '_ {
    move |e| match AuthError::from(e) {
        AuthError::Conflict(_) => AuthError::Conflict(format!("username {username} already exists")),
        other => other,
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create(&self, new_user: NewUser) -> Result<User, AuthError> {
        let password_hash = password::hash_password(&new_user.password, self.bcrypt_cost)?;

        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id::text AS id, username, email, avatar_url, role, created_at, \
                       books_read, reviews_count, likes_received, \
                       profile_visibility, activity_visibility",
        )
        .bind(Uuid::now_v7())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&password_hash)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(username_conflict(&new_user.username))?;

        let user = User::try_from(row)?;
        info!(user_id = %user.id, username = %user.username, "user created");
        Ok(user)
    }

    async fn get_by_id(&self, id: &str) -> Result<User, AuthError> {
        let uuid = parse_id(id)?;
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id::text AS id, username, email, avatar_url, role, created_at, \
                    books_read, reviews_count, likes_received, \
                    profile_visibility, activity_visibility \
             FROM users WHERE id = $1",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AuthError::NotFound(format!("user {id}")))
            .and_then(User::try_from)
    }

    async fn get_by_username(&self, username: &str) -> Result<User, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id::text AS id, username, email, avatar_url, role, created_at, \
                    books_read, reviews_count, likes_received, \
                    profile_visibility, activity_visibility \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AuthError::NotFound(format!("user {username}")))
            .and_then(User::try_from)
    }

    async fn update(&self, user: &User) -> Result<User, AuthError> {
        let uuid = parse_id(&user.id)?;
        let row = sqlx::query_as::<_, UserRow>(
            "UPDATE users \
             SET username = $2, avatar_url = $3, role = $4, \
                 books_read = $5, reviews_count = $6, likes_received = $7, \
                 profile_visibility = $8, activity_visibility = $9 \
             WHERE id = $1 \
             RETURNING id::text AS id, username, email, avatar_url, role, created_at, \
                       books_read, reviews_count, likes_received, \
                       profile_visibility, activity_visibility",
        )
        .bind(uuid)
        .bind(&user.username)
        .bind(&user.avatar_url)
        .bind(user.role.as_str())
        .bind(user.books_read)
        .bind(user.reviews_count)
        .bind(user.likes_received)
        .bind(user.profile_visibility.as_str())
        .bind(user.activity_visibility.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(username_conflict(&user.username))?;

        let updated = row
            .ok_or_else(|| AuthError::NotFound(format!("user {}", user.id)))
            .and_then(User::try_from)?;
        info!(user_id = %updated.id, "user updated");
        Ok(updated)
    }

    async fn verify_password(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id::text AS id, username, email, avatar_url, role, created_at, \
                    books_read, reviews_count, likes_received, \
                    profile_visibility, activity_visibility, password_hash \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            password::verify_dummy(password);
            return Err(AuthError::NotFound(format!("user {username}")));
        };

        if password::verify_password(password, &row.password_hash)? {
            User::try_from(row.user)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    async fn ping(&self) -> Result<(), AuthError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
