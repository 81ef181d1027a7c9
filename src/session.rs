use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use cookie::{Cookie, SameSite};
use tokio::sync::watch;
use uuid::Uuid;

pub const COOKIE_NAME: &str = "sessionid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for SessionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::try_parse(s).map(Self).map_err(|_| ())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

pub fn session_cookie(session_id: &SessionId, secure: bool) -> String {
    Cookie::build((COOKIE_NAME, session_id.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .build()
        .to_string()
}

/// A `Set-Cookie` value that makes the client forget its session.
pub fn clear_session_cookie(secure: bool) -> String {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(::time::Duration::ZERO)
        .build()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEventKind {
    Startup,
    SignedIn { user: Uuid, session: SessionId },
    SignedOut { user: Uuid, session: SessionId },
    /// The account is gone, so there is no session left to name.
    Revoked { user: Uuid },
}

/// One entry in the process-wide auth-change feed. `epoch` increases by
/// one per event and orders lookups triggered by different events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub epoch: u64,
    pub kind: SessionEventKind,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SessionEventKind::*;

        // session ids are credentials and stay out of the log line
        match &self.kind {
            Startup => write!(fmt, "startup (epoch {})", self.epoch),
            SignedIn { user, .. } => write!(fmt, "sign-in for {user} (epoch {})", self.epoch),
            SignedOut { user, .. } => write!(fmt, "sign-out for {user} (epoch {})", self.epoch),
            Revoked { user } => write!(fmt, "revocation for {user} (epoch {})", self.epoch),
        }
    }
}

/// Single broadcast point for sign-in, sign-out and revocation.
/// Everything that caches a role subscribes here and re-resolves on
/// every event rather than trusting what it last saw.
#[derive(Debug)]
pub struct SessionHub {
    epoch: AtomicU64,
    tx: watch::Sender<SessionEvent>,
}

impl SessionHub {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionEvent {
            epoch: 0,
            kind: SessionEventKind::Startup,
        });

        Self {
            epoch: AtomicU64::new(0),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, kind: SessionEventKind) {
        // taking the epoch inside the channel lock keeps the latest
        // value carrying the highest epoch under concurrent publishers
        self.tx.send_modify(|event| {
            *event = SessionEvent {
                epoch: self.epoch.fetch_add(1, Ordering::SeqCst) + 1,
                kind,
            }
        });
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn session_id_round_trips() {
        let id = SessionId::new();
        assert_eq!(SessionId::from_str(&id.to_string()), Ok(id));
        assert_eq!(SessionId::from_str("not-a-uuid"), Err(()));
    }

    #[test]
    fn session_cookie_is_scoped_and_http_only() {
        let id = SessionId::new();

        let plain = session_cookie(&id, false);
        assert!(plain.starts_with(&format!("{COOKIE_NAME}={id}")));
        assert!(plain.contains("HttpOnly"));
        assert!(plain.contains("Path=/"));
        assert!(plain.contains("SameSite=Strict"));
        assert!(!plain.contains("Secure"));

        let secure = session_cookie(&id, true);
        assert!(secure.contains("Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cleared = clear_session_cookie(false);
        assert!(cleared.starts_with(&format!("{COOKIE_NAME}=")));
        assert!(cleared.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn hub_orders_events_by_epoch() {
        let hub = SessionHub::new();
        let mut rx = hub.subscribe();
        assert_eq!(hub.epoch(), 0);

        let user = Uuid::new_v4();
        let session = SessionId::new();
        hub.publish(SessionEventKind::SignedIn { user, session });
        hub.publish(SessionEventKind::SignedOut { user, session });

        assert_eq!(hub.epoch(), 2);

        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.epoch, 2);
        assert_eq!(seen.kind, SessionEventKind::SignedOut { user, session });
    }

    #[tokio::test]
    async fn late_subscriber_sees_latest_event() {
        let hub = SessionHub::new();
        let user = Uuid::new_v4();
        hub.publish(SessionEventKind::Revoked { user });

        let rx = hub.subscribe();
        let seen = rx.borrow().clone();
        assert_eq!(seen.epoch, 1);
        assert_eq!(seen.kind, SessionEventKind::Revoked { user });
    }
}
