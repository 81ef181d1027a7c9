use log::{debug, error};
use tokio::sync::watch;

use crate::role::Role;
use crate::session::{SessionEvent, SessionHub, SessionId};
use crate::store::Store;
use crate::user::UserRecord;

/// What the current session resolves to. `Pending` only exists between
/// an auth event and the lookup it triggers; a finished lookup always
/// lands on one of the other two.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleResolution {
    Unauthenticated,
    Pending,
    Resolved { user: UserRecord },
}

impl RoleResolution {
    pub fn role(&self) -> Option<Role> {
        match self {
            RoleResolution::Resolved { user } => Some(user.role),
            RoleResolution::Unauthenticated | RoleResolution::Pending => None,
        }
    }

    pub fn user(&self) -> Option<&UserRecord> {
        match self {
            RoleResolution::Resolved { user } => Some(user),
            RoleResolution::Unauthenticated | RoleResolution::Pending => None,
        }
    }
}

/// One role lookup for one session. Every failure collapses to
/// `Unauthenticated`: a user the store can't vouch for gets the public
/// surface, never a stale role.
pub async fn resolve_session(store: &Store, session: Option<&SessionId>) -> RoleResolution {
    let Some(session) = session else {
        return RoleResolution::Unauthenticated;
    };

    let session_str = session.to_string();

    let users = match store.users_with_session(&session_str).await {
        Ok(users) => users,
        Err(()) => {
            error!("role lookup failed for session {session}, treating as unauthenticated");
            return RoleResolution::Unauthenticated;
        }
    };

    match &users[..] {
        [] => {
            debug!("no user for session {session}");
            RoleResolution::Unauthenticated
        }
        [user] => {
            debug!("session {session} is {} ({})", user.email, user.role);
            RoleResolution::Resolved { user: user.clone() }
        }
        _ => {
            error!("multiple users found for session {session}");
            RoleResolution::Unauthenticated
        }
    }
}

/// A subscription to the hub that keeps one session's resolution
/// current. Holders re-resolve on every event instead of trusting what
/// they last saw.
pub struct SessionResolver {
    store: Store,
    session: Option<SessionId>,
    events: watch::Receiver<SessionEvent>,
    epoch: u64,
    state: RoleResolution,
}

impl SessionResolver {
    pub async fn attach(store: Store, hub: &SessionHub, session: Option<SessionId>) -> Self {
        let events = hub.subscribe();
        let epoch = events.borrow().epoch;
        let state = resolve_session(&store, session.as_ref()).await;

        Self {
            store,
            session,
            events,
            epoch,
            state,
        }
    }

    pub fn state(&self) -> &RoleResolution {
        &self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Swap the session this resolver follows, e.g. after the client's
    /// cookie changed. Takes effect on the next lookup.
    pub fn set_session(&mut self, session: Option<SessionId>) {
        self.session = session;
    }

    /// Waits for the next hub event and hands it back. The held role is
    /// parked as `Pending` until `resolve_now` finishes. Returns `None`
    /// once the hub is gone.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.events.changed().await.is_err() {
            return None;
        }

        let event = self.events.borrow_and_update().clone();
        self.epoch = event.epoch;
        self.state = RoleResolution::Pending;
        Some(event)
    }

    /// Runs the lookup for the most recent event. If another event
    /// arrived mid-lookup the result is stale and dropped, leaving the
    /// state `Pending` for the caller to go again.
    pub async fn resolve_now(&mut self) -> &RoleResolution {
        let resolution = resolve_session(&self.store, self.session.as_ref()).await;

        if self.events.has_changed().unwrap_or(false) {
            debug!("dropping superseded role lookup (epoch {})", self.epoch);
        } else {
            self.state = resolution;
        }

        &self.state
    }
}
