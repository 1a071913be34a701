//! Memo cache seam for authorization answers.

use rolegate_core::UserId;

/// Process-wide keyed store of memoized authorization answers.
///
/// Writes are fenced by an invalidation epoch: callers read `epoch()` before
/// computing a value and pass it to `set`, which drops the write if any
/// invalidation happened in between.
pub trait AuthzCache: Send + Sync {
    fn epoch(&self) -> u64;

    fn get(&self, key: &str) -> Option<bool>;

    fn set(&self, key: &str, value: bool, observed_epoch: u64);

    /// Drop every entry whose key starts with `prefix`.
    fn invalidate_prefix(&self, prefix: &str);

    fn clear(&self);
}

pub fn user_prefix(user: UserId) -> String {
    format!("authz:{user}:")
}

pub fn role_key(user: UserId, role: &str) -> String {
    format!("authz:{user}:role:{role}")
}

/// The role segment is length-prefixed: names may contain `:`, and
/// `("ab:cd", "ef")` must not share a key with `("ab", "cd:ef")`.
pub fn permission_key(user: UserId, role: &str, permission: &str) -> String {
    format!("authz:{user}:perm:{}:{role}:{permission}", role.len())
}

/// Cache that never stores anything. Every check goes to the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl AuthzCache for NoCache {
    fn epoch(&self) -> u64 {
        0
    }

    fn get(&self, _key: &str) -> Option<bool> {
        None
    }

    fn set(&self, _key: &str, _value: bool, _observed_epoch: u64) {}

    fn invalidate_prefix(&self, _prefix: &str) {}

    fn clear(&self) {}
}
