/// Security event log
///
/// Security-relevant events go to the `security` tracing target, which
/// `main` routes to a dedicated JSON sink. Every record carries the request
/// id, client IP and user id (when known).

use std::fmt;
use uuid::Uuid;

use tasklane_shared::logging::sanitize;

use crate::middleware::client_info::ClientInfo;

/// Tracing target for security events
pub const SECURITY_TARGET: &str = "security";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    LoginFailure,
    AccountLockout,
    AccessDenied,
    ListDeleted,
    RefreshTokenReuse,
}

impl SecurityEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEvent::LoginFailure => "login_failure",
            SecurityEvent::AccountLockout => "account_lockout",
            SecurityEvent::AccessDenied => "access_denied",
            SecurityEvent::ListDeleted => "list_deleted",
            SecurityEvent::RefreshTokenReuse => "refresh_token_reuse",
        }
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records a security event
pub fn record(event: SecurityEvent, client: &ClientInfo, user_id: Option<Uuid>, detail: &str) {
    let user_id = user_id.map(|id| id.to_string()).unwrap_or_default();

    tracing::warn!(
        target: SECURITY_TARGET,
        event = event.as_str(),
        request_id = %client.request_id,
        ip = %client.ip,
        user_id = %user_id,
        detail = %sanitize(detail),
        "Security event"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(SecurityEvent::LoginFailure.to_string(), "login_failure");
        assert_eq!(SecurityEvent::AccountLockout.as_str(), "account_lockout");
        assert_eq!(SecurityEvent::AccessDenied.as_str(), "access_denied");
        assert_eq!(SecurityEvent::ListDeleted.as_str(), "list_deleted");
        assert_eq!(SecurityEvent::RefreshTokenReuse.as_str(), "refresh_token_reuse");
    }

    #[test]
    fn test_record_without_subscriber_is_harmless() {
        let client = ClientInfo {
            ip: "127.0.0.1".into(),
            request_id: "req".into(),
        };
        record(SecurityEvent::AccessDenied, &client, None, "line\nbreak");
    }
}
