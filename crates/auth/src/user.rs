//! User accounts and the account state machine.
//!
//! The transitions here are pure: they take "now" explicitly and mutate the
//! in-memory row. `AccountService` wraps each one in a single store-level
//! read-modify-write so concurrent requests never interleave halfway.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use rolegate_core::{AuditStamp, DomainError, DomainResult, Entity, UserId};

use crate::settings::DEFAULT_LOCALE;

// ─────────────────────────────────────────────────────────────────────────────
// Account State
// ─────────────────────────────────────────────────────────────────────────────

/// Derived lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    /// Confirmed and not blocked.
    Active,
    /// Registered but the confirmation link has not been used yet.
    Unconfirmed,
    /// Temporarily blocked after too many failed logins; clears by itself.
    ThrottledBlocked,
    /// Blocked by an administrator; only an explicit unblock clears it.
    PermanentlyBlocked,
}

impl core::fmt::Display for AccountState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AccountState::Active => write!(f, "Active"),
            AccountState::Unconfirmed => write!(f, "Unconfirmed"),
            AccountState::ThrottledBlocked => write!(f, "ThrottledBlocked"),
            AccountState::PermanentlyBlocked => write!(f, "PermanentlyBlocked"),
        }
    }
}

/// Outcome of evaluating a user's block flags at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCheck {
    NotBlocked,
    /// Still blocked (permanently, or inside the throttle window).
    Blocked,
    /// The throttle window had elapsed; the block was cleared by this check.
    Released,
}

impl BlockCheck {
    pub fn is_blocked(self) -> bool {
        matches!(self, BlockCheck::Blocked)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A user account row.
///
/// # Invariants
/// - `blocked == false` implies `block_time == None`.
/// - `block_time == None` with `blocked == true` is a permanent block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub confirmed: bool,
    pub blocked: bool,
    pub login_attempts: u32,
    pub last_login_attempt: Option<DateTime<Utc>>,
    pub block_time: Option<DateTime<Utc>>,
    pub locale: String,
    pub timezone: Option<String>,
    pub last_seen: DateTime<Utc>,
    pub audit: AuditStamp,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn audit(&self) -> &AuditStamp {
        &self.audit
    }
}

impl User {
    /// Materialize a freshly inserted row.
    pub fn from_new(id: UserId, new: NewUser, now: DateTime<Utc>, actor: Option<UserId>) -> Self {
        Self {
            id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            confirmed: new.confirmed,
            blocked: false,
            login_attempts: 0,
            last_login_attempt: None,
            block_time: None,
            locale: new.locale,
            timezone: new.timezone,
            last_seen: now,
            audit: AuditStamp::new(now, actor),
        }
    }

    pub fn state(&self) -> AccountState {
        match (self.blocked, self.block_time) {
            (true, None) => AccountState::PermanentlyBlocked,
            (true, Some(_)) => AccountState::ThrottledBlocked,
            (false, _) if !self.confirmed => AccountState::Unconfirmed,
            (false, _) => AccountState::Active,
        }
    }

    pub fn is_permanently_blocked(&self) -> bool {
        self.blocked && self.block_time.is_none()
    }

    /// Count a failed login. Returns `true` if this call started a throttle block.
    ///
    /// An elapsed throttle is released first, so the count restarts at 1 after
    /// the window. Every failure at or past the limit restamps `block_time`, so
    /// hammering a throttled account keeps it throttled. A permanent block is
    /// never downgraded to a throttle.
    pub fn record_failed_login(
        &mut self,
        now: DateTime<Utc>,
        max_attempts: u32,
        block_duration: Duration,
    ) -> bool {
        self.check_block(now, block_duration);
        self.login_attempts = self.login_attempts.saturating_add(1);
        self.last_login_attempt = Some(now);
        self.audit.updated_at = now;

        if self.login_attempts >= max_attempts && !self.is_permanently_blocked() {
            let newly_blocked = !self.blocked;
            self.blocked = true;
            self.block_time = Some(now);
            return newly_blocked;
        }
        false
    }

    /// Reset all throttling state after a successful login.
    pub fn record_successful_login(&mut self, now: DateTime<Utc>) {
        self.login_attempts = 0;
        self.last_login_attempt = None;
        self.block_time = None;
        self.blocked = false;
        self.audit.updated_at = now;
    }

    /// Evaluate the block flags, clearing an expired throttle in place.
    pub fn check_block(&mut self, now: DateTime<Utc>, block_duration: Duration) -> BlockCheck {
        if !self.blocked {
            return BlockCheck::NotBlocked;
        }
        let Some(block_time) = self.block_time else {
            return BlockCheck::Blocked;
        };
        if now >= block_time + block_duration {
            self.blocked = false;
            self.block_time = None;
            self.login_attempts = 0;
            self.audit.updated_at = now;
            BlockCheck::Released
        } else {
            BlockCheck::Blocked
        }
    }

    /// Administrative block. Permanent until `unblock`.
    pub fn block(&mut self, now: DateTime<Utc>, actor: Option<UserId>) {
        self.blocked = true;
        self.block_time = None;
        self.audit.touch(now, actor);
    }

    /// Administrative unblock. Clears throttling state too.
    pub fn unblock(&mut self, now: DateTime<Utc>, actor: Option<UserId>) {
        self.blocked = false;
        self.block_time = None;
        self.login_attempts = 0;
        self.audit.touch(now, actor);
    }

    /// Returns `false` if the account was already confirmed.
    pub fn mark_confirmed(&mut self, now: DateTime<Utc>) -> bool {
        if self.confirmed {
            return false;
        }
        self.confirmed = true;
        self.audit.updated_at = now;
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// New User
// ─────────────────────────────────────────────────────────────────────────────

/// Validated input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub confirmed: bool,
    pub locale: String,
    pub timezone: Option<String>,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> DomainResult<Self> {
        let username = username.into().trim().to_string();
        let email = email.into().trim().to_string();

        let len = username.chars().count();
        if !(2..=30).contains(&len) {
            return Err(DomainError::validation(
                "username must be between 2 and 30 characters",
            ));
        }
        if email.is_empty() || !email.contains('@') || email.len() > 120 {
            return Err(DomainError::validation("invalid email format"));
        }

        Ok(Self {
            username,
            email,
            password_hash: password_hash.into(),
            confirmed: false,
            locale: DEFAULT_LOCALE.to_string(),
            timezone: None,
        })
    }

    pub fn confirmed(mut self, confirmed: bool) -> Self {
        self.confirmed = confirmed;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
