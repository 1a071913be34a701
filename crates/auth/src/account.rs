//! Account service: registration, login throttling, confirmation, password
//! reset and administrative block/unblock.

use std::sync::Arc;

use tracing::{error, info, warn};

use rolegate_core::{Clock, DomainError, UserId};

use crate::authorize::AuthorizationEngine;
use crate::claims::TokenPurpose;
use crate::error::{AuthError, AuthResult, TokenError};
use crate::mail::{MailDispatcher, OutboundMessage};
use crate::password::CredentialStore;
use crate::roles::DEFAULT_USER_ROLE;
use crate::settings::{AuthSettings, SUPPORTED_LOCALES};
use crate::store::RbacStore;
use crate::token::{IssuedToken, TokenService};
use crate::user::{BlockCheck, NewUser, User};

const PASSWORD_MIN_LEN: usize = 6;
const PASSWORD_MAX_LEN: usize = 128;

/// An authenticated session established by `login`.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: IssuedToken,
}

pub struct AccountService {
    store: Arc<dyn RbacStore>,
    tokens: Arc<TokenService>,
    credentials: CredentialStore,
    authz: Arc<AuthorizationEngine>,
    mail: Arc<dyn MailDispatcher>,
    clock: Arc<dyn Clock>,
    settings: AuthSettings,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn RbacStore>,
        tokens: Arc<TokenService>,
        credentials: CredentialStore,
        authz: Arc<AuthorizationEngine>,
        mail: Arc<dyn MailDispatcher>,
        clock: Arc<dyn Clock>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            tokens,
            credentials,
            authz,
            mail,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registration & confirmation
    // ─────────────────────────────────────────────────────────────────────

    /// Create an unconfirmed account and queue its confirmation message.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> AuthResult<User> {
        validate_password(password)?;
        let hash = self.credentials.hash(password).await?;
        let new = NewUser::new(username, email, hash)?;

        if self.store.user_by_username(&new.username).await?.is_some() {
            return Err(DomainError::duplicate_name(new.username).into());
        }
        if self.store.user_by_email(&new.email).await?.is_some() {
            return Err(DomainError::duplicate_name(new.email).into());
        }

        let user = self.store.insert_user(new, self.clock.now(), None).await?;
        info!(user_id = %user.id, username = %user.username, "user registered");

        match self.store.role_by_name(DEFAULT_USER_ROLE).await? {
            Some(role) => {
                self.authz.add_role(user.id, role.id, None).await?;
            }
            None => warn!(role = DEFAULT_USER_ROLE, "default role missing; skipping assignment"),
        }
        self.authz.ensure_admin_role(&user).await?;

        if let Err(e) = self.send_confirmation(&user) {
            error!(user_id = %user.id, error = %e, "could not queue confirmation message");
        }
        self.get_user(user.id).await
    }

    /// Queue another confirmation message. No-op for confirmed users.
    pub async fn resend_confirmation(&self, user_id: UserId) -> AuthResult<()> {
        let user = self.get_user(user_id).await?;
        if user.confirmed {
            return Ok(());
        }
        self.send_confirmation(&user)
    }

    /// Confirm `user_id` with a confirmation token issued to that same user.
    ///
    /// Returns `false` if the account was already confirmed.
    pub async fn confirm(&self, user_id: UserId, token: &str) -> AuthResult<bool> {
        let user = self.get_user(user_id).await?;
        if user.confirmed {
            return Ok(false);
        }

        let claims = self.tokens.verify(token, TokenPurpose::Confirm)?;
        if claims.sub != user_id {
            warn!(user_id = %user_id, token_sub = %claims.sub, "confirmation token for another user");
            return Err(TokenError::Invalid.into());
        }

        let now = self.clock.now();
        let mut changed = false;
        self.store
            .update_user_with(user_id, &mut |u: &mut User| changed = u.mark_confirmed(now))
            .await?;
        if changed {
            info!(user_id = %user_id, "account confirmed");
        }
        Ok(changed)
    }

    fn send_confirmation(&self, user: &User) -> AuthResult<()> {
        let issued = self.tokens.issue_default(user.id, TokenPurpose::Confirm)?;
        self.mail.dispatch(OutboundMessage::confirmation(
            &self.settings.site_name,
            &user.email,
            &user.username,
            issued.token,
        ));
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Login & sessions
    // ─────────────────────────────────────────────────────────────────────

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Session> {
        let Some(user) = self.store.user_by_email(email.trim()).await? else {
            self.credentials.verify_absent(password).await;
            return Err(AuthError::InvalidCredentials);
        };

        if !self.credentials.verify(&user.password_hash, password).await {
            self.handle_failed_login(user.id).await?;
            return Err(AuthError::InvalidCredentials);
        }

        if self.is_blocked(user.id).await? {
            info!(user_id = %user.id, "login refused for blocked account");
            return Err(AuthError::AccountBlocked);
        }

        let user = self.handle_successful_login(user.id).await?;
        self.authz.ensure_admin_role(&user).await?;
        let token = self.tokens.issue_default(user.id, TokenPurpose::Session)?;
        info!(user_id = %user.id, "session established");
        Ok(Session { user, token })
    }

    /// Resolve a session token to its user and record activity.
    pub async fn authenticate_session(&self, token: &str) -> AuthResult<User> {
        let claims = self.tokens.verify(token, TokenPurpose::Session)?;
        let now = self.clock.now();
        let user = self
            .store
            .update_user_with(claims.sub, &mut |u: &mut User| u.last_seen = now)
            .await?;
        Ok(user)
    }

    pub async fn handle_failed_login(&self, user_id: UserId) -> AuthResult<User> {
        let now = self.clock.now();
        let max = self.settings.max_login_attempts;
        let window = self.settings.block_duration;
        let mut newly_blocked = false;
        let user = self
            .store
            .update_user_with(user_id, &mut |u: &mut User| {
                newly_blocked = u.record_failed_login(now, max, window)
            })
            .await?;
        if newly_blocked {
            warn!(
                user_id = %user_id,
                attempts = user.login_attempts,
                "too many failed logins; account throttled"
            );
        }
        Ok(user)
    }

    pub async fn handle_successful_login(&self, user_id: UserId) -> AuthResult<User> {
        let now = self.clock.now();
        let user = self
            .store
            .update_user_with(user_id, &mut |u: &mut User| u.record_successful_login(now))
            .await?;
        Ok(user)
    }

    /// Whether the account is currently blocked. Clears an expired throttle.
    pub async fn is_blocked(&self, user_id: UserId) -> AuthResult<bool> {
        let now = self.clock.now();
        let window = self.settings.block_duration;
        let mut outcome = BlockCheck::NotBlocked;
        self.store
            .update_user_with(user_id, &mut |u: &mut User| outcome = u.check_block(now, window))
            .await?;
        if outcome == BlockCheck::Released {
            info!(user_id = %user_id, "throttle window elapsed; account unblocked");
        }
        Ok(outcome.is_blocked())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Password reset
    // ─────────────────────────────────────────────────────────────────────

    /// Queue a reset message. Unknown addresses are `NotFound`.
    pub async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        let Some(user) = self.store.user_by_email(email.trim()).await? else {
            return Err(AuthError::not_found());
        };
        let issued = self.tokens.issue_default(user.id, TokenPurpose::Reset)?;
        self.mail.dispatch(OutboundMessage::password_reset(
            &self.settings.site_name,
            &user.email,
            &user.username,
            issued.token,
        ));
        info!(user_id = %user.id, "password reset requested");
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<User> {
        let claims = self.tokens.verify(token, TokenPurpose::Reset)?;
        validate_password(new_password)?;
        let hash = self.credentials.hash(new_password).await?;
        let now = self.clock.now();
        let user = self
            .store
            .update_user_with(claims.sub, &mut |u: &mut User| {
                u.password_hash = hash.clone();
                u.audit.touch(now, Some(u.id));
            })
            .await?;
        info!(user_id = %user.id, "password reset");
        Ok(user)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Administration & profile
    // ─────────────────────────────────────────────────────────────────────

    pub async fn block_account(&self, user_id: UserId, actor: Option<UserId>) -> AuthResult<User> {
        let now = self.clock.now();
        let user = self
            .store
            .update_user_with(user_id, &mut |u: &mut User| u.block(now, actor))
            .await?;
        info!(user_id = %user_id, actor = ?actor, "account blocked");
        Ok(user)
    }

    pub async fn unblock_account(&self, user_id: UserId, actor: Option<UserId>) -> AuthResult<User> {
        let now = self.clock.now();
        let user = self
            .store
            .update_user_with(user_id, &mut |u: &mut User| u.unblock(now, actor))
            .await?;
        info!(user_id = %user_id, actor = ?actor, "account unblocked");
        Ok(user)
    }

    pub async fn update_locale(&self, user_id: UserId, locale: &str) -> AuthResult<User> {
        let locale = locale.trim();
        if !SUPPORTED_LOCALES.contains(&locale) {
            return Err(DomainError::validation(format!(
                "unsupported locale '{locale}', expected one of {SUPPORTED_LOCALES:?}"
            ))
            .into());
        }
        let now = self.clock.now();
        let user = self
            .store
            .update_user_with(user_id, &mut |u: &mut User| {
                u.locale = locale.to_string();
                u.audit.touch(now, Some(u.id));
            })
            .await?;
        Ok(user)
    }

    pub async fn get_user(&self, user_id: UserId) -> AuthResult<User> {
        self.store
            .user_by_id(user_id)
            .await?
            .ok_or_else(AuthError::not_found)
    }

    pub async fn list_users(&self) -> AuthResult<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    pub async fn delete_user(&self, user_id: UserId) -> AuthResult<()> {
        if !self.store.delete_user(user_id).await? {
            return Err(AuthError::not_found());
        }
        self.authz.invalidate_user(user_id);
        info!(user_id = %user_id, "user deleted");
        Ok(())
    }
}

fn validate_password(password: &str) -> AuthResult<()> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(DomainError::validation(format!(
            "password must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters"
        ))
        .into());
    }
    Ok(())
}
