//! Authentication service: registration, login, token refresh and profile
//! flows over a [`CredentialStore`] and a [`TokenService`].

use std::sync::Arc;

use bookvision_core::auth::{AuthError, CredentialStore, Role, TokenService};
use bookvision_core::models::auth::{NewUser, PublicUser, TokenClaims, User};
use tracing::{debug, info, warn};

use crate::config::{ProfilePolicy, UsernameChangePolicy};
use crate::error::{AppError, AppResult};
use crate::models::{LoginRequest, RegisterRequest, UpdateProfileRequest};

const USERNAME_MIN_CHARS: usize = 3;
const USERNAME_MAX_CHARS: usize = 50;
const PASSWORD_MIN_CHARS: usize = 6;

/// Coordinates the credential store and the token service.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: TokenService,
    policy: ProfilePolicy,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: TokenService, policy: ProfilePolicy) -> Self {
        Self {
            store,
            tokens,
            policy,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new user with the default role and log them in.
    pub async fn register(&self, req: RegisterRequest) -> AppResult<(PublicUser, String)> {
        validate_username(&req.username)?;
        validate_email(&req.email)?;
        if req.password.chars().count() < PASSWORD_MIN_CHARS {
            return Err(AppError::Validation(format!(
                "Password must be at least {PASSWORD_MIN_CHARS} characters"
            )));
        }

        match self.store.get_by_username(&req.username).await {
            Ok(_) => {
                return Err(AppError::Conflict(format!(
                    "User with username {} already exists",
                    req.username
                )));
            }
            Err(AuthError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        // The lookup above is a fast path only; a racing registration is
        // settled by the store's uniqueness constraint.
        let user = self
            .store
            .create(NewUser {
                username: req.username,
                email: req.email,
                password: req.password,
                role: Role::User,
            })
            .await?;

        let token = self.issue(&user)?;
        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok((user.to_public(), token))
    }

    /// Check credentials and issue a token.
    ///
    /// Unknown usernames and wrong passwords produce the same error.
    pub async fn login(&self, req: LoginRequest) -> AppResult<(PublicUser, String)> {
        let user = match self.store.verify_password(&req.username, &req.password).await {
            Ok(user) => user,
            Err(AuthError::NotFound(_)) => {
                debug!(username = %req.username, reason = "unknown username", "login rejected");
                return Err(AppError::InvalidCredentials);
            }
            Err(AuthError::InvalidCredentials) => {
                debug!(username = %req.username, reason = "wrong password", "login rejected");
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let token = self.issue(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok((user.to_public(), token))
    }

    /// Exchange a still-valid token for a fresh one.
    pub fn refresh_token(&self, token: &str) -> AppResult<String> {
        self.tokens.refresh_token(token).map_err(|e| {
            debug!(reason = %e, "token refresh rejected");
            AppError::InvalidToken
        })
    }

    pub fn validate_token(&self, token: &str) -> AppResult<TokenClaims> {
        self.tokens.validate_token(token).map_err(|e| {
            debug!(reason = %e, "token rejected");
            AppError::InvalidToken
        })
    }

    pub async fn get_profile(&self, user_id: &str) -> AppResult<PublicUser> {
        let user = self.store.get_by_id(user_id).await?;
        Ok(user.to_public())
    }

    /// Apply the fields present in `req` and persist.
    pub async fn update_profile(
        &self,
        user_id: &str,
        req: UpdateProfileRequest,
    ) -> AppResult<PublicUser> {
        let mut user = self.store.get_by_id(user_id).await?;

        if let Some(username) = req.username {
            if username != user.username {
                self.check_rename(&user, &username).await?;
                user.username = username;
            }
        }
        if let Some(avatar_url) = req.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        if let Some(role) = req.role {
            if role != user.role {
                warn!(user_id = %user.id, from = %user.role, to = %role, "role changed via profile update");
            }
            user.role = role;
        }
        if let Some(visibility) = req.profile_visibility {
            user.profile_visibility = visibility;
        }
        if let Some(visibility) = req.activity_visibility {
            user.activity_visibility = visibility;
        }

        let updated = self.store.update(&user).await?;
        info!(user_id = %updated.id, "profile updated");
        Ok(updated.to_public())
    }

    /// Probe the credential store.
    pub async fn health(&self) -> AppResult<()> {
        self.store.ping().await.map_err(AppError::from)
    }

    async fn check_rename(&self, user: &User, username: &str) -> AppResult<()> {
        match self.policy.username_changes {
            UsernameChangePolicy::Locked => Err(AppError::Validation(
                "Username changes are not allowed".into(),
            )),
            UsernameChangePolicy::Unique => {
                validate_username(username)?;
                match self.store.get_by_username(username).await {
                    Ok(other) if other.id != user.id => Err(AppError::Conflict(format!(
                        "User with username {username} already exists"
                    ))),
                    Ok(_) | Err(AuthError::NotFound(_)) => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    fn issue(&self, user: &User) -> AppResult<String> {
        self.tokens
            .generate_token(user)
            .map_err(|e| AppError::Internal(format!("token generation: {e}")))
    }
}

fn validate_username(username: &str) -> AppResult<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
        return Err(AppError::Validation(format!(
            "Username must be {USERNAME_MIN_CHARS}-{USERNAME_MAX_CHARS} characters"
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(
            "Username must not contain whitespace".into(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> AppResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(AppError::Validation("Email address is invalid".into())),
    }
}
