use rolegate_auth::User;
use rolegate_core::UserId;

/// Authenticated account for a request.
///
/// Inserted by the session middleware; handlers behind it can rely on it
/// being present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    user: User,
}

impl CurrentUser {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn id(&self) -> UserId {
        self.user.id
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn into_user(self) -> User {
        self.user
    }
}
