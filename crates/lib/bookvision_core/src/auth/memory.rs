//! In-memory credential store.
//!
//! Backs tests and `--in-memory` dev runs. Username uniqueness is enforced by
//! the `usernames` index entry lock, so racing creates resolve to exactly one
//! winner.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;
use uuid::Uuid;

use super::password::{self, BCRYPT_COST};
use super::store::CredentialStore;
use super::AuthError;
use crate::models::auth::{NewUser, User, Visibility};

#[derive(Debug, Clone)]
struct Record {
    user: User,
    password_hash: String,
}

/// Credential store held entirely in process memory.
///
/// Lock order is always `users` before `usernames`: no path holds a
/// `usernames` guard while touching `users`.
#[derive(Debug)]
pub struct InMemoryCredentialStore {
    users: DashMap<String, Record>,
    usernames: DashMap<String, String>,
    bcrypt_cost: u32,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::with_bcrypt_cost(BCRYPT_COST)
    }

    /// Store hashing at a custom bcrypt cost (tests use the minimum, 4).
    pub fn with_bcrypt_cost(bcrypt_cost: u32) -> Self {
        Self {
            users: DashMap::new(),
            usernames: DashMap::new(),
            bcrypt_cost,
        }
    }

    /// Number of stored users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn id_for(&self, username: &str) -> Option<String> {
        self.usernames.get(username).map(|id| id.value().clone())
    }

    fn record(&self, id: &str) -> Option<Record> {
        self.users.get(id).map(|r| r.value().clone())
    }

    /// Record currently holding `username`. An index entry whose record has
    /// moved on (a rename mid-commit) does not count.
    fn record_for(&self, username: &str) -> Option<Record> {
        self.id_for(username)
            .and_then(|id| self.record(&id))
            .filter(|r| r.user.username == username)
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create(&self, new_user: NewUser) -> Result<User, AuthError> {
        let password_hash = password::hash_password(&new_user.password, self.bcrypt_cost)?;

        let user = User {
            id: Uuid::now_v7().to_string(),
            username: new_user.username,
            email: new_user.email,
            avatar_url: None,
            role: new_user.role,
            created_at: Utc::now(),
            books_read: 0,
            reviews_count: 0,
            likes_received: 0,
            profile_visibility: Visibility::Public,
            activity_visibility: Visibility::Public,
        };

        // The record is unreachable by name until the index entry is claimed.
        self.users.insert(
            user.id.clone(),
            Record {
                user: user.clone(),
                password_hash,
            },
        );
        let claimed = match self.usernames.entry(user.username.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
                true
            }
        };
        if !claimed {
            self.users.remove(&user.id);
            return Err(AuthError::Conflict(format!(
                "username {} already exists",
                user.username
            )));
        }

        info!(user_id = %user.id, username = %user.username, "user created");
        Ok(user)
    }

    async fn get_by_id(&self, id: &str) -> Result<User, AuthError> {
        self.record(id)
            .map(|r| r.user)
            .ok_or_else(|| AuthError::NotFound(format!("user {id}")))
    }

    async fn get_by_username(&self, username: &str) -> Result<User, AuthError> {
        self.record_for(username)
            .map(|r| r.user)
            .ok_or_else(|| AuthError::NotFound(format!("user {username}")))
    }

    async fn update(&self, user: &User) -> Result<User, AuthError> {
        // The record guard is held across the index move, so concurrent
        // updates of one user apply one at a time.
        let mut record = self
            .users
            .get_mut(&user.id)
            .ok_or_else(|| AuthError::NotFound(format!("user {}", user.id)))?;

        let old_username = record.user.username.clone();
        if old_username != user.username {
            match self.usernames.entry(user.username.clone()) {
                Entry::Occupied(owner) if owner.get() != &user.id => {
                    return Err(AuthError::Conflict(format!(
                        "username {} already exists",
                        user.username
                    )));
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(user.id.clone());
                }
            }
            self.usernames.remove_if(&old_username, |_, id| id == &user.id);
        }

        let stored = &mut record.user;
        stored.username = user.username.clone();
        stored.avatar_url = user.avatar_url.clone();
        stored.role = user.role;
        stored.books_read = user.books_read;
        stored.reviews_count = user.reviews_count;
        stored.likes_received = user.likes_received;
        stored.profile_visibility = user.profile_visibility;
        stored.activity_visibility = user.activity_visibility;
        Ok(stored.clone())
    }

    async fn verify_password(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let Some(record) = self.record_for(username) else {
            password::verify_dummy(password);
            return Err(AuthError::NotFound(format!("user {username}")));
        };

        if password::verify_password(password, &record.password_hash)? {
            Ok(record.user)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    async fn ping(&self) -> Result<(), AuthError> {
        Ok(())
    }
}
