//! Outbound message handoff.
//!
//! Delivery mechanics live behind `MailDispatcher`. Dispatch is fire-and-forget:
//! account mutations have already been persisted when a message is queued and
//! a delivery failure never undoes them.

use serde::Serialize;

use crate::claims::TokenPurpose;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Confirmation,
    PasswordReset,
}

impl MessageKind {
    pub fn purpose(self) -> TokenPurpose {
        match self {
            MessageKind::Confirmation => TokenPurpose::Confirm,
            MessageKind::PasswordReset => TokenPurpose::Reset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub token: String,
    pub kind: MessageKind,
}

impl OutboundMessage {
    pub fn confirmation(site: &str, recipient: &str, username: &str, token: String) -> Self {
        Self {
            recipient: recipient.to_string(),
            subject: format!("[{site}] Confirm your account"),
            body: format!(
                "Hello {username},\n\nTo confirm your account use the following token:\n\n{token}\n"
            ),
            token,
            kind: MessageKind::Confirmation,
        }
    }

    pub fn password_reset(site: &str, recipient: &str, username: &str, token: String) -> Self {
        Self {
            recipient: recipient.to_string(),
            subject: format!("[{site}] Reset your password"),
            body: format!(
                "Hello {username},\n\nTo reset your password use the following token:\n\n{token}\n\n\
                 If you did not request a password reset, ignore this message.\n"
            ),
            token,
            kind: MessageKind::PasswordReset,
        }
    }
}

/// Queues a message for background delivery. Must not block on delivery.
pub trait MailDispatcher: Send + Sync {
    fn dispatch(&self, message: OutboundMessage);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_token_and_kind() {
        let m = OutboundMessage::confirmation("rolegate", "a@example.com", "alice", "tok".into());
        assert_eq!(m.kind, MessageKind::Confirmation);
        assert_eq!(m.kind.purpose(), TokenPurpose::Confirm);
        assert!(m.body.contains("tok"));
        assert!(m.subject.contains("rolegate"));

        let r = OutboundMessage::password_reset("rolegate", "a@example.com", "alice", "t2".into());
        assert_eq!(r.kind.purpose(), TokenPurpose::Reset);
    }
}
