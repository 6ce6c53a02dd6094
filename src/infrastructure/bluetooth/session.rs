//! Connection Session
//!
//! One `Session` exists per connection attempt. It is created when the user
//! asks to connect and dropped on teardown, so no connection flags outlive
//! the link they describe.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──link up──▶ Connected ──services──▶ ServicesReady
//!       ▲                         │                     │                        │
//!       └─────────────────────────┴──── link lost ──────┴────────────────────────┘
//! ```

use crate::domain::models::ConnectionStatus;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    ServicesReady,
}

impl From<SessionState> for ConnectionStatus {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Disconnected => ConnectionStatus::Disconnected,
            SessionState::Connecting => ConnectionStatus::Connecting,
            SessionState::Connected => ConnectionStatus::Connected,
            SessionState::ServicesReady => ConnectionStatus::Ready,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTrigger {
    Connect,
    LinkUp,
    ServicesResolved,
    LinkLost,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {id}: cannot apply {trigger:?} in state {from:?}")]
    InvalidTransition {
        id: u64,
        from: SessionState,
        trigger: SessionTrigger,
    },
}

#[derive(Debug)]
pub struct Session {
    id: u64,
    state: SessionState,
}

impl Session {
    /// Fresh session, not yet connecting
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: SessionState::Disconnected,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Commands are only written once both characteristics are known
    pub fn can_send(&self) -> bool {
        self.state == SessionState::ServicesReady
    }

    /// Notifications are accepted once the link is up
    pub fn accepts_notifications(&self) -> bool {
        matches!(
            self.state,
            SessionState::Connected | SessionState::ServicesReady
        )
    }

    pub fn apply(&mut self, trigger: SessionTrigger) -> Result<SessionState, SessionError> {
        use SessionState::*;
        use SessionTrigger::*;

        let next = match (self.state, trigger) {
            (Disconnected, Connect) => Connecting,
            (Connecting, LinkUp) => Connected,
            (Connected, ServicesResolved) => ServicesReady,
            (_, LinkLost) => Disconnected,
            (from, trigger) => {
                return Err(SessionError::InvalidTransition {
                    id: self.id,
                    from,
                    trigger,
                })
            }
        };

        self.state = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut session = Session::new(1);
        assert!(!session.can_send());
        assert_eq!(
            session.apply(SessionTrigger::Connect),
            Ok(SessionState::Connecting)
        );
        assert!(!session.accepts_notifications());
        assert_eq!(
            session.apply(SessionTrigger::LinkUp),
            Ok(SessionState::Connected)
        );
        assert!(session.accepts_notifications());
        assert!(!session.can_send());
        assert_eq!(
            session.apply(SessionTrigger::ServicesResolved),
            Ok(SessionState::ServicesReady)
        );
        assert!(session.can_send());
    }

    #[test]
    fn test_services_before_link_is_rejected() {
        let mut session = Session::new(7);
        session.apply(SessionTrigger::Connect).unwrap();
        let err = session.apply(SessionTrigger::ServicesResolved).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                id: 7,
                from: SessionState::Connecting,
                trigger: SessionTrigger::ServicesResolved,
            }
        );
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn test_link_lost_from_any_state() {
        for steps in 0..=3 {
            let mut session = Session::new(2);
            let path = [
                SessionTrigger::Connect,
                SessionTrigger::LinkUp,
                SessionTrigger::ServicesResolved,
            ];
            for trigger in &path[..steps] {
                session.apply(*trigger).unwrap();
            }
            assert_eq!(
                session.apply(SessionTrigger::LinkLost),
                Ok(SessionState::Disconnected)
            );
            assert!(!session.can_send());
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ConnectionStatus::from(SessionState::ServicesReady),
            ConnectionStatus::Ready
        );
        assert_eq!(
            ConnectionStatus::from(SessionState::Connecting),
            ConnectionStatus::Connecting
        );
    }
}
