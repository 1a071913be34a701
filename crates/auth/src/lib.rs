//! `rolegate-auth`: accounts, tokens and role-based authorization.
//!
//! This crate is decoupled from HTTP and storage: persistence, caching and mail
//! delivery are reached through the seams in `store`, `cache` and `mail`.

pub mod account;
pub mod authorize;
pub mod cache;
pub mod claims;
pub mod error;
pub mod mail;
pub mod password;
pub mod permissions;
pub mod registry;
pub mod roles;
pub mod settings;
pub mod store;
pub mod token;
pub mod user;

pub use account::{AccountService, Session};
pub use authorize::{AuthorizationEngine, Requirement};
pub use cache::{AuthzCache, NoCache};
pub use claims::{TokenClaims, TokenPurpose, validate_claims};
pub use error::{AuthError, AuthResult, CredentialError, StoreError, TokenError};
pub use mail::{MailDispatcher, MessageKind, OutboundMessage};
pub use password::CredentialStore;
pub use permissions::{Permission, PermissionDraft};
pub use registry::{RbacRegistry, RoleDetails};
pub use roles::{ADMIN_ROLE, DEFAULT_USER_ROLE, Role, RoleDraft};
pub use settings::{AuthSettings, ConfigError, DEFAULT_LOCALE, SUPPORTED_LOCALES};
pub use store::{PermissionStore, RbacStore, RoleStore, StoreResult, UserMutation, UserStore};
pub use token::{IssuedToken, TokenKeys, TokenService};
pub use user::{AccountState, BlockCheck, NewUser, User};
