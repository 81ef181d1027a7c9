use std::{result, sync::Arc};

use log::{debug, error, info, trace, warn};
use serde::Serialize;
use uuid::Uuid;
use warp::http;

use crate::auth::{normalize_email, normalized_phone, pwhash, LoginForm, SignupForm};
use crate::contact::ContactForm;
use crate::gate::ADMIN_TIER;
use crate::resolver::{resolve_session, RoleResolution};
use crate::role::{can_access, Role, RoleSet};
use crate::scholarship::{
    ListQuery, ScholarshipDetail, ScholarshipDraft, ScholarshipPage, ScholarshipRecord,
};
use crate::session::{SessionEventKind, SessionHub, SessionId};
use crate::store::{FindError, Store, WriteError};
use crate::subscribe::SubscribeForm;
use crate::time::Timestamp;
use crate::user::{NewUser, NewUserForm, UserRecord};

#[derive(Debug)]
pub struct Board {
    store: Store,
    hub: Arc<SessionHub>,
}

/// A session the store vouched for. `AUTHORIZED` records that the
/// user's role has cleared a route gate; the gated operations only
/// exist on the `true` form.
#[derive(Debug)]
pub struct BoardAuthed<const AUTHORIZED: bool = false> {
    board: Arc<Board>,
    session_id: SessionId,
    user: UserRecord,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Internal,
    /// Login attempt with an unknown email or wrong password.
    CredentialInvalid,
    /// No session, or one the store no longer recognises.
    Unauthorized,
    /// Authenticated, but the role doesn't clear the gate.
    Denied,
    NotFound,
    AlreadySubscribed,
    EmailInUse,
    BadRequest,
}

pub type Result<T> = result::Result<T, Error>;

impl Into<http::StatusCode> for Error {
    fn into(self) -> http::StatusCode {
        match self {
            Self::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::CredentialInvalid | Self::Unauthorized => http::StatusCode::UNAUTHORIZED,
            Self::Denied => http::StatusCode::FORBIDDEN,
            Self::NotFound => http::StatusCode::NOT_FOUND,
            Self::AlreadySubscribed | Self::EmailInUse => http::StatusCode::CONFLICT,
            Self::BadRequest => http::StatusCode::BAD_REQUEST,
        }
    }
}

impl warp::reject::Reject for Error {}

#[derive(Debug, Serialize)]
pub struct Panel {
    pub scholarships: Vec<ScholarshipRecord>,
    pub users: Vec<UserRecord>,
}

fn find_error(e: FindError) -> Error {
    match e {
        FindError::NotFound => Error::NotFound,
        FindError::Internal => Error::Internal,
    }
}

fn now() -> Result<Timestamp> {
    Timestamp::now().map_err(|()| Error::Internal)
}

impl Board {
    pub fn new(store: Store, hub: Arc<SessionHub>) -> Self {
        Self { store, hub }
    }

    pub async fn scholarships(&self, query: &ListQuery) -> Result<ScholarshipPage> {
        let scholarships = self
            .store
            .scholarships(query)
            .await
            .map_err(|()| Error::Internal)?;

        let (countries, degree_levels) = self
            .store
            .filter_options()
            .await
            .map_err(|()| Error::Internal)?;

        trace!("listing {} scholarships", scholarships.len());

        Ok(ScholarshipPage {
            scholarships,
            countries,
            degree_levels,
        })
    }

    pub async fn scholarship_detail(&self, id: i64) -> Result<ScholarshipDetail> {
        let record = self.store.find_scholarship(id).await.map_err(find_error)?;

        Ok(ScholarshipDetail::new(record))
    }

    pub async fn contact(&self, form: &ContactForm) -> Result<()> {
        self.store
            .insert_contact(form, now()?)
            .await
            .map_err(|()| Error::Internal)?;

        info!("contact message from {}", form.email);
        Ok(())
    }

    pub async fn subscribe(&self, form: &SubscribeForm) -> Result<()> {
        let email = form.email_normalized();

        // checked up front for the friendly reply, the unique column
        // still backstops a racing submit
        if self
            .store
            .subscriber_exists(&email)
            .await
            .map_err(|()| Error::Internal)?
        {
            return Err(Error::AlreadySubscribed);
        }

        self.store
            .insert_subscriber(form, &email, now()?)
            .await
            .map_err(|e| match e {
                WriteError::Duplicate => Error::AlreadySubscribed,
                WriteError::Internal => Error::Internal,
            })?;

        info!("subscribed {email}");
        Ok(())
    }

    /// Self-service signup. The account always starts as a student and
    /// no session is issued, the new user signs in afterwards.
    pub async fn signup(&self, form: &SignupForm) -> Result<()> {
        let email = form.email_normalized();

        let Some(phone) = normalized_phone(&form.phone) else {
            return Err(Error::BadRequest);
        };

        let user = NewUser {
            id: Uuid::new_v4(),
            email: email.clone(),
            fullname: form.fullname.trim().to_string(),
            phone,
            role: Role::Student,
            pwhash: form.calc_pwhash(),
            created_at: now()?,
        };

        self.store.insert_user(&user).await.map_err(|e| match e {
            WriteError::Duplicate => {
                info!("signup with already-registered email {email}");
                Error::EmailInUse
            }
            WriteError::Internal => Error::Internal,
        })?;

        info!("new student account {email}");
        Ok(())
    }

    async fn check_credentials(&self, creds: &LoginForm) -> Result<UserRecord> {
        let email = creds.email_normalized();

        let user = self.store.find_user_by_email(&email).await.map_err(|e| {
            if matches!(e, FindError::NotFound) {
                error!("rejecting unknown email {email}");
                Error::CredentialInvalid
            } else {
                error!("couldn't authenticate {email}: {e:?}");
                Error::Internal
            }
        })?;

        if creds.calc_pwhash() != user.pwhash {
            error!("wrong password for {email}");
            return Err(Error::CredentialInvalid);
        }

        Ok(user)
    }

    async fn issue_session(self: &Arc<Self>, user: UserRecord) -> Result<BoardAuthed> {
        let email = &user.email;

        let session_id = match user.session_id.as_deref() {
            Some(existing) => {
                // an account holds one session at a time, a still-live
                // one from another browser is reused
                let session_id = existing.parse().map_err(|()| {
                    error!("invalid stored session_id for {email}");
                    Error::Internal
                })?;

                info!("{email} login: existing session reused");
                session_id
            }
            None => {
                let session_id = SessionId::new();

                if !self
                    .store
                    .set_session(&user.id, Some(&session_id.to_string()))
                    .await
                {
                    error!("couldn't login {email}");
                    return Err(Error::Internal);
                }

                info!("{email} login: new session created");
                session_id
            }
        };

        self.hub.publish(SessionEventKind::SignedIn {
            user: user.id,
            session: session_id,
        });

        Ok(BoardAuthed {
            board: Arc::clone(self),
            session_id,
            user,
        })
    }

    /// Front-door login, open to every role.
    pub async fn login(self: &Arc<Self>, creds: &LoginForm) -> Result<BoardAuthed> {
        let user = self.check_credentials(creds).await?;

        self.issue_session(user).await
    }

    /// Back-office login. The role is checked before any session is
    /// issued, a student is turned away with no session to show for
    /// the attempt.
    pub async fn admin_login(self: &Arc<Self>, creds: &LoginForm) -> Result<BoardAuthed> {
        let user = self.check_credentials(creds).await?;

        if !can_access(ADMIN_TIER, Some(user.role)) {
            warn!("{} ({}) denied back-office login", user.email, user.role);
            return Err(Error::Denied);
        }

        self.issue_session(user).await
    }

    pub async fn authenticate(self: &Arc<Self>, session_id: SessionId) -> Result<BoardAuthed> {
        match resolve_session(&self.store, Some(&session_id)).await {
            RoleResolution::Resolved { user } => {
                debug!("found user by session");
                Ok(BoardAuthed {
                    board: Arc::clone(self),
                    session_id,
                    user,
                })
            }
            RoleResolution::Unauthenticated | RoleResolution::Pending => Err(Error::Unauthorized),
        }
    }

    pub async fn resolve(&self, session: Option<&SessionId>) -> RoleResolution {
        resolve_session(&self.store, session).await
    }

    /// Idempotent first-run helper: creates the superadmin account if
    /// the email is unknown, otherwise leaves whatever exists alone.
    pub async fn bootstrap_superadmin(&self, email: &str, password: &str) -> Result<()> {
        let email = normalize_email(email);

        match self.store.find_user_by_email(&email).await {
            Ok(existing) => {
                match existing.role {
                    Role::Superadmin => info!("superadmin {email} already present"),
                    role => warn!("{email} already exists as {role}, leaving it untouched"),
                }
                Ok(())
            }
            Err(FindError::NotFound) => {
                let user = NewUser {
                    id: Uuid::new_v4(),
                    email: email.clone(),
                    fullname: "Superadmin".into(),
                    phone: String::new(),
                    role: Role::Superadmin,
                    pwhash: pwhash(&email, password),
                    created_at: now()?,
                };

                self.store
                    .insert_user(&user)
                    .await
                    .map_err(|_| Error::Internal)?;

                info!("bootstrapped superadmin {email}");
                Ok(())
            }
            Err(FindError::Internal) => Err(Error::Internal),
        }
    }
}

impl<const AUTHORIZED: bool> BoardAuthed<AUTHORIZED> {
    pub fn user(&self) -> &UserRecord {
        &self.user
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub async fn logout(&self) -> Result<()> {
        let email = &self.user.email;
        info!("{email} logout");

        self.board
            .store
            .set_session(&self.user.id, None)
            .await
            .then(|| ())
            .ok_or(Error::Internal)?;

        self.board
            .hub
            .publish(SessionEventKind::SignedOut {
                user: self.user.id,
                session: self.session_id,
            });

        Ok(())
    }
}

impl BoardAuthed {
    pub fn authorize(self, required: RoleSet) -> Result<BoardAuthed<true>> {
        if can_access(required, Some(self.user.role)) {
            Ok(BoardAuthed {
                board: self.board,
                session_id: self.session_id,
                user: self.user,
            })
        } else {
            warn!(
                "{} ({}) turned away from a gated operation",
                self.user.email, self.user.role,
            );
            Err(Error::Denied)
        }
    }
}

impl BoardAuthed<true> {
    pub async fn post_scholarship(&self, draft: &ScholarshipDraft) -> Result<i64> {
        let email = &self.user.email;

        let id = self
            .board
            .store
            .insert_scholarship(draft, now()?)
            .await
            .map_err(|()| Error::Internal)?;

        info!("{email} posted scholarship {id} ({})", draft.name);
        Ok(id)
    }

    pub async fn admin_scholarships(&self, search: Option<&str>) -> Result<Vec<ScholarshipRecord>> {
        trace!("{} browsing the back-office list", self.user.email);

        self.board
            .store
            .scholarships_named(search)
            .await
            .map_err(|()| Error::Internal)
    }

    /// Prefill for the update form.
    pub async fn scholarship(&self, id: i64) -> Result<ScholarshipRecord> {
        self.board.store.find_scholarship(id).await.map_err(find_error)
    }

    pub async fn update_scholarship(&self, id: i64, draft: &ScholarshipDraft) -> Result<()> {
        self.board
            .store
            .update_scholarship(id, draft)
            .await
            .map_err(find_error)?;

        info!("{} updated scholarship {id}", self.user.email);
        Ok(())
    }

    pub async fn delete_scholarship(&self, id: i64) -> Result<()> {
        self.board
            .store
            .delete_scholarship(id)
            .await
            .map_err(find_error)?;

        info!("{} deleted scholarship {id}", self.user.email);
        Ok(())
    }

    // The superadmin surface re-matches the role itself, so widening a
    // route policy can never widen these operations.
    fn require_superadmin(&self) -> Result<()> {
        match self.user.role {
            Role::Superadmin => Ok(()),
            Role::Admin | Role::Student => {
                warn!(
                    "{} ({}) blocked from the superadmin surface",
                    self.user.email, self.user.role,
                );
                Err(Error::Denied)
            }
        }
    }

    pub async fn panel(&self, search: Option<&str>) -> Result<Panel> {
        self.require_superadmin()?;

        let scholarships = self
            .board
            .store
            .scholarships_named(search)
            .await
            .map_err(|()| Error::Internal)?;

        let users = self.board.store.users().await.map_err(|()| Error::Internal)?;

        Ok(Panel {
            scholarships,
            users,
        })
    }

    pub async fn add_user(&self, form: &NewUserForm) -> Result<Uuid> {
        self.require_superadmin()?;

        let role = match form.role {
            Role::Admin | Role::Superadmin => form.role,
            Role::Student => return Err(Error::BadRequest),
        };

        let Some(phone) = normalized_phone(&form.phone) else {
            return Err(Error::BadRequest);
        };

        let email = form.email_normalized();
        let user = NewUser {
            id: Uuid::new_v4(),
            email: email.clone(),
            fullname: form.fullname.trim().to_string(),
            phone,
            role,
            pwhash: form.calc_pwhash(),
            created_at: now()?,
        };

        self.board.store.insert_user(&user).await.map_err(|e| match e {
            WriteError::Duplicate => Error::EmailInUse,
            WriteError::Internal => Error::Internal,
        })?;

        info!("{} added {role} account {email}", self.user.email);
        Ok(user.id)
    }

    pub async fn delete_user(&self, id: &Uuid) -> Result<()> {
        self.require_superadmin()?;

        self.board.store.delete_user(id).await.map_err(find_error)?;

        // their session died with the row, anything holding that role
        // hears about it and re-resolves
        self.board
            .hub
            .publish(SessionEventKind::Revoked { user: *id });

        info!("{} deleted account {id}", self.user.email);
        Ok(())
    }
}
