use std::sync::Arc;

use log::{debug, info, trace};

use crate::resolver::{RoleResolution, SessionResolver};
use crate::role::{can_access, Role, RoleSet};
use crate::session::{SessionEventKind, SessionHub, SessionId};
use crate::store::Store;

pub const ADMIN_TIER: RoleSet = RoleSet::new(&[Role::Admin, Role::Superadmin]);
pub const SUPERADMIN_ONLY: RoleSet = RoleSet::new(&[Role::Superadmin]);

/// Where a turned-away visitor is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyTarget {
    /// No usable session: go authenticate first.
    Login,
    /// Authenticated, but the role doesn't clear the gate.
    AccessDenied,
}

impl DenyTarget {
    pub fn location(self) -> &'static str {
        match self {
            DenyTarget::Login => "/admin-login",
            DenyTarget::AccessDenied => "/access-denied",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Loading,
    Authorized(Role),
    Denied(DenyTarget),
}

pub struct RoutePolicy {
    pub route: &'static str,
    pub required: RoleSet,
}

pub const PROTECTED: &[RoutePolicy] = &[
    RoutePolicy {
        route: "/post-scholarship",
        required: ADMIN_TIER,
    },
    RoutePolicy {
        route: "/admin-scholarship-list",
        required: ADMIN_TIER,
    },
    RoutePolicy {
        route: "/update-scholarship",
        required: ADMIN_TIER,
    },
    RoutePolicy {
        route: "/super-admin-panel",
        required: SUPERADMIN_ONLY,
    },
];

pub fn decide(required: RoleSet, resolution: &RoleResolution) -> GateState {
    match resolution {
        RoleResolution::Pending => GateState::Loading,
        RoleResolution::Unauthenticated => GateState::Denied(DenyTarget::Login),
        RoleResolution::Resolved { user } => {
            if can_access(required, Some(user.role)) {
                GateState::Authorized(user.role)
            } else {
                GateState::Denied(DenyTarget::AccessDenied)
            }
        }
    }
}

/// One mounted gated route. The decision is re-derived on every
/// identity change and never carried across one; while a lookup is in
/// flight the gate shows `Loading` rather than the previous answer.
pub struct RouteGate {
    policy: &'static RoutePolicy,
    epoch: u64,
    state: GateState,
}

impl RouteGate {
    pub fn mount(policy: &'static RoutePolicy) -> Self {
        Self {
            policy,
            epoch: 0,
            state: GateState::Loading,
        }
    }

    pub fn route(&self) -> &'static str {
        self.policy.route
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// An identity lookup for `epoch` started: hold back gated content
    /// until it settles.
    pub fn begin_recheck(&mut self, epoch: u64) {
        if epoch >= self.epoch {
            self.epoch = epoch;
            self.state = GateState::Loading;
        }
    }

    /// The lookup for `epoch` finished. Outcomes older than the newest
    /// recheck are discarded.
    pub fn settle(&mut self, epoch: u64, resolution: &RoleResolution) -> GateState {
        if epoch >= self.epoch {
            self.epoch = epoch;
            self.state = decide(self.policy.required, resolution);
        }

        self.state
    }
}

/// Hub-driven sweep of the protected routes. The task follows whichever
/// session signed in last and re-gates every route on each auth event:
/// the gates park on `Loading`, one lookup runs, and the fresh answer
/// settles them. Ends once nothing publishes any more.
pub async fn watch_sessions(store: Store, hub: Arc<SessionHub>) {
    let mut resolver = SessionResolver::attach(store, &hub, None).await;
    debug!("session watcher attached at epoch {}", hub.epoch());

    // the receiver inside the resolver is subscription enough; holding
    // the hub here would keep this task alive after everyone else quit
    drop(hub);

    let mut gates: Vec<_> = PROTECTED.iter().map(RouteGate::mount).collect();
    let mut followed: Option<SessionId> = None;

    while let Some(event) = resolver.next_event().await {
        info!("{event}");

        match event.kind {
            SessionEventKind::SignedIn { session, .. } => {
                followed = Some(session);
                resolver.set_session(followed);
            }
            // only a sign-out of the session being followed detaches it,
            // revocations surface through the lookup coming back empty
            SessionEventKind::SignedOut { session, .. } if followed == Some(session) => {
                followed = None;
                resolver.set_session(None);
            }
            SessionEventKind::SignedOut { .. }
            | SessionEventKind::Revoked { .. }
            | SessionEventKind::Startup => {}
        }

        for gate in &mut gates {
            gate.begin_recheck(event.epoch);
        }

        resolver.resolve_now().await;

        for gate in &mut gates {
            gate.settle(resolver.epoch(), resolver.state());
            trace!("{} gate: {:?}", gate.route(), gate.state());
        }
    }
}
