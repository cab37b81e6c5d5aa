use crate::config::SsoProvider;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request context captured at session creation, plus the sliding-window
/// activity stamp refreshed on every successful validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub last_activity: DateTime<Utc>,
    pub sso_provider: Option<SsoProvider>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// An issued session.
///
/// A session is valid only while BOTH hold: `now < expires_at` (absolute
/// TTL) and `now - last_activity < idle timeout` (sliding window). The two
/// checks are independent; either alone expires the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Opaque, unguessable identifier.
    pub session_id: String,
    pub user_id: Uuid,
    pub organization_id: Uuid,

    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,

    /// Inactivity window snapshot taken from the organization's
    /// `session_timeout_minutes` at creation time.
    pub idle_timeout_minutes: i64,

    pub metadata: SessionMetadata,
}

impl SessionInfo {
    /// Absolute TTL exceeded. `expires_at == now` is already expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Idle longer than the inactivity window.
    pub fn is_inactive(&self) -> bool {
        Utc::now() - self.metadata.last_activity >= Duration::minutes(self.idle_timeout_minutes)
    }

    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.is_inactive()
    }

    pub fn touch(&mut self) {
        self.metadata.last_activity = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: DateTime<Utc>, last_activity: DateTime<Utc>) -> SessionInfo {
        SessionInfo {
            session_id: "s".repeat(64),
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            expires_at,
            created_at: Utc::now() - Duration::hours(1),
            idle_timeout_minutes: 480,
            metadata: SessionMetadata {
                last_activity,
                sso_provider: None,
                ip_address: None,
                user_agent: None,
            },
        }
    }

    #[test]
    fn test_expired_one_second_ago() {
        let s = session(Utc::now() - Duration::seconds(1), Utc::now());
        assert!(s.is_expired());
        assert!(!s.is_valid());
    }

    #[test]
    fn test_inactive_despite_future_expiry() {
        let s = session(
            Utc::now() + Duration::hours(4),
            Utc::now() - Duration::minutes(480) - Duration::seconds(1),
        );
        assert!(!s.is_expired());
        assert!(s.is_inactive());
        assert!(!s.is_valid());
    }

    #[test]
    fn test_valid_session() {
        let s = session(Utc::now() + Duration::hours(4), Utc::now());
        assert!(s.is_valid());
    }

    #[test]
    fn test_touch_restores_sliding_window() {
        let mut s = session(
            Utc::now() + Duration::hours(4),
            Utc::now() - Duration::minutes(400),
        );
        assert!(s.is_valid());
        s.touch();
        assert!(Utc::now() - s.metadata.last_activity < Duration::seconds(1));
    }
}
