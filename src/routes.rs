use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use log::error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warp::http::{header, StatusCode, Uri};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::auth::{FieldErrors, LoginForm, SignupForm};
use crate::board::{self, Board, BoardAuthed};
use crate::contact::ContactForm;
use crate::gate::{decide, DenyTarget, GateState, ADMIN_TIER, PROTECTED, SUPERADMIN_ONLY};
use crate::resolver::RoleResolution;
use crate::role::{Role, RoleSet};
use crate::scholarship::{ListQuery, ScholarshipDraft};
use crate::session::{clear_session_cookie, session_cookie, SessionId, COOKIE_NAME};
use crate::subscribe::SubscribeForm;
use crate::user::NewUserForm;

pub fn all(
    board: Arc<Board>,
    secure: bool,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    public(&board)
        .or(accounts(&board, secure))
        .or(staff(&board))
        .or(panel(&board))
        .recover(handle_rejection)
        .with(warp::log("scholboard"))
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    search: Option<String>,
}

/// Body of `GET /session`, enough for a client to draw its nav without
/// a second request.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize)]
struct SessionReply {
    state: &'static str,
    role: Option<Role>,
    fullname: Option<String>,
    email: Option<String>,
    access: BTreeMap<&'static str, bool>,
}

impl From<&RoleResolution> for SessionReply {
    fn from(resolution: &RoleResolution) -> Self {
        // the same decision the mounted gates make, one entry per route
        let access = PROTECTED
            .iter()
            .map(|policy| {
                let allowed = matches!(
                    decide(policy.required, resolution),
                    GateState::Authorized(_),
                );
                (policy.route, allowed)
            })
            .collect();

        let state = match resolution {
            RoleResolution::Resolved { .. } => "resolved",
            RoleResolution::Pending => "pending",
            RoleResolution::Unauthenticated => "unauthenticated",
        };

        let user = resolution.user();

        Self {
            state,
            role: resolution.role(),
            fullname: user.map(|user| user.fullname.clone()),
            email: user.map(|user| user.email.clone()),
            access,
        }
    }
}

fn public(board: &Arc<Board>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let index = warp::path::end().and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }))
        .into_response()
    });

    let list = warp::path!("scholarship-list")
        .and(warp::get())
        .and(with_board(board))
        .and(warp::query::<ListQuery>())
        .and_then(list_scholarships);

    let detail = warp::path!("scholarship-detail" / i64)
        .and(warp::get())
        .and(with_board(board))
        .and_then(scholarship_detail);

    let contact = warp::path!("contact")
        .and(warp::post())
        .and(with_board(board))
        .and(warp::body::json())
        .and_then(contact);

    let subscribe = warp::path!("subscribe")
        .and(warp::post())
        .and(with_board(board))
        .and(warp::body::json())
        .and_then(subscribe);

    let whoami = warp::path!("session")
        .and(warp::get())
        .and(with_board(board))
        .and(warp::cookie::optional::<SessionId>(COOKIE_NAME))
        .and_then(whoami);

    let denied = warp::path!("access-denied").and(warp::get()).map(|| {
        error_reply(
            StatusCode::FORBIDDEN,
            "You do not have permission to view this page.",
        )
    });

    index
        .or(list)
        .or(detail)
        .or(contact)
        .or(subscribe)
        .or(whoami)
        .or(denied)
}

fn accounts(
    board: &Arc<Board>,
    secure: bool,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let signup = warp::path!("signup")
        .and(warp::post())
        .and(with_board(board))
        .and(warp::body::json())
        .and_then(signup);

    let login = warp::path!("login")
        .and(warp::post())
        .and(with_board(board))
        .and(with_secure(secure))
        .and(warp::body::json())
        .and_then(login);

    let admin_login = warp::path!("admin-login")
        .and(warp::post())
        .and(with_board(board))
        .and(with_secure(secure))
        .and(warp::body::json())
        .and_then(admin_login);

    let logout = warp::path!("logout")
        .and(warp::post())
        .and(authed(board))
        .and(with_secure(secure))
        .and_then(logout);

    signup.or(login).or(admin_login).or(logout)
}

fn staff(board: &Arc<Board>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let post = warp::path!("post-scholarship")
        .and(warp::post())
        .and(gated(board, ADMIN_TIER))
        .and(warp::body::json())
        .and_then(post_scholarship);

    let list = warp::path!("admin-scholarship-list")
        .and(warp::get())
        .and(gated(board, ADMIN_TIER))
        .and(warp::query::<SearchQuery>())
        .and_then(admin_scholarships);

    let delete = warp::path!("admin-scholarship-list" / i64)
        .and(warp::delete())
        .and(gated(board, ADMIN_TIER))
        .and_then(delete_scholarship);

    let prefill = warp::path!("update-scholarship" / i64)
        .and(warp::get())
        .and(gated(board, ADMIN_TIER))
        .and_then(scholarship_prefill);

    let update = warp::path!("update-scholarship" / i64)
        .and(warp::post())
        .and(gated(board, ADMIN_TIER))
        .and(warp::body::json())
        .and_then(update_scholarship);

    post.or(list).or(delete).or(prefill).or(update)
}

fn panel(board: &Arc<Board>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let overview = warp::path!("super-admin-panel")
        .and(warp::get())
        .and(gated(board, SUPERADMIN_ONLY))
        .and(warp::query::<SearchQuery>())
        .and_then(panel_overview);

    let add_user = warp::path!("super-admin-panel" / "users")
        .and(warp::post())
        .and(gated(board, SUPERADMIN_ONLY))
        .and(warp::body::json())
        .and_then(add_user);

    let delete_user = warp::path!("super-admin-panel" / "users" / Uuid)
        .and(warp::delete())
        .and(gated(board, SUPERADMIN_ONLY))
        .and_then(delete_user);

    overview.or(add_user).or(delete_user)
}

fn with_board(
    board: &Arc<Board>,
) -> impl Filter<Extract = (Arc<Board>,), Error = Infallible> + Clone {
    let board = Arc::clone(board);

    warp::any().map(move || Arc::clone(&board))
}

fn with_secure(secure: bool) -> impl Filter<Extract = (bool,), Error = Infallible> + Clone {
    warp::any().map(move || secure)
}

fn authed(board: &Arc<Board>) -> impl Filter<Extract = (BoardAuthed,), Error = Rejection> + Clone {
    with_board(board)
        .and(warp::cookie::optional::<SessionId>(COOKIE_NAME))
        .and_then(|board: Arc<Board>, session: Option<SessionId>| async move {
            let session =
                session.ok_or_else(|| warp::reject::custom(board::Error::Unauthorized))?;

            board
                .authenticate(session)
                .await
                .map_err(warp::reject::custom)
        })
}

fn gated(
    board: &Arc<Board>,
    required: RoleSet,
) -> impl Filter<Extract = (BoardAuthed<true>,), Error = Rejection> + Clone {
    authed(board).and_then(move |authed: BoardAuthed| async move {
        authed.authorize(required).map_err(warp::reject::custom)
    })
}

async fn list_scholarships(board: Arc<Board>, query: ListQuery) -> Result<Response, Rejection> {
    let page = board
        .scholarships(&query)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&page).into_response())
}

async fn scholarship_detail(id: i64, board: Arc<Board>) -> Result<Response, Rejection> {
    match board.scholarship_detail(id).await {
        Ok(detail) => Ok(warp::reply::json(&detail).into_response()),
        Err(board::Error::NotFound) => {
            Ok(error_reply(StatusCode::NOT_FOUND, "Scholarship not found."))
        }
        Err(e) => Err(warp::reject::custom(e)),
    }
}

async fn contact(board: Arc<Board>, form: ContactForm) -> Result<Response, Rejection> {
    if let Err(errors) = form.validate() {
        return Ok(validation_reply(&errors));
    }

    board.contact(&form).await.map_err(warp::reject::custom)?;

    Ok(message_reply(
        StatusCode::OK,
        "Message submitted successfully! An admin will reach out to you shortly.",
    ))
}

async fn subscribe(board: Arc<Board>, form: SubscribeForm) -> Result<Response, Rejection> {
    if let Err(errors) = form.validate() {
        return Ok(validation_reply(&errors));
    }

    board.subscribe(&form).await.map_err(warp::reject::custom)?;

    Ok(message_reply(StatusCode::OK, "Thank you for subscribing!"))
}

async fn whoami(board: Arc<Board>, session: Option<SessionId>) -> Result<Response, Rejection> {
    let resolution = board.resolve(session.as_ref()).await;

    Ok(warp::reply::json(&SessionReply::from(&resolution)).into_response())
}

async fn signup(board: Arc<Board>, form: SignupForm) -> Result<Response, Rejection> {
    if let Err(errors) = form.validate() {
        return Ok(validation_reply(&errors));
    }

    board.signup(&form).await.map_err(warp::reject::custom)?;

    Ok(message_reply(
        StatusCode::CREATED,
        "Registration successful! Redirecting to login...",
    ))
}

async fn login(board: Arc<Board>, secure: bool, creds: LoginForm) -> Result<Response, Rejection> {
    if let Err(errors) = creds.validate() {
        return Ok(validation_reply(&errors));
    }

    let authed = board.login(&creds).await.map_err(warp::reject::custom)?;

    Ok(signed_in_reply(
        &authed,
        secure,
        "Login successful! Redirecting to dashboard...",
    ))
}

async fn admin_login(
    board: Arc<Board>,
    secure: bool,
    creds: LoginForm,
) -> Result<Response, Rejection> {
    if let Err(errors) = creds.validate() {
        return Ok(validation_reply(&errors));
    }

    let authed = board
        .admin_login(&creds)
        .await
        .map_err(warp::reject::custom)?;

    Ok(signed_in_reply(&authed, secure, "Login successful!"))
}

fn signed_in_reply(authed: &BoardAuthed, secure: bool, message: &'static str) -> Response {
    let user = authed.user();

    let body = warp::reply::json(&serde_json::json!({
        "message": message,
        "role": user.role,
        "fullname": user.fullname,
    }));

    warp::reply::with_header(
        body,
        header::SET_COOKIE,
        session_cookie(authed.session_id(), secure),
    )
    .into_response()
}

async fn logout(authed: BoardAuthed, secure: bool) -> Result<Response, Rejection> {
    authed.logout().await.map_err(warp::reject::custom)?;

    let reply = warp::reply::with_header(
        warp::reply(),
        header::SET_COOKIE,
        clear_session_cookie(secure),
    );

    Ok(reply.into_response())
}

async fn post_scholarship(
    staff: BoardAuthed<true>,
    draft: ScholarshipDraft,
) -> Result<Response, Rejection> {
    if let Err(errors) = draft.validate_new() {
        return Ok(validation_reply(&errors));
    }

    let id = staff
        .post_scholarship(&draft)
        .await
        .map_err(warp::reject::custom)?;

    let body = warp::reply::json(&serde_json::json!({
        "id": id,
        "message": "Scholarship posted successfully!",
    }));

    Ok(warp::reply::with_status(body, StatusCode::CREATED).into_response())
}

async fn admin_scholarships(
    staff: BoardAuthed<true>,
    query: SearchQuery,
) -> Result<Response, Rejection> {
    let scholarships = staff
        .admin_scholarships(query.search.as_deref())
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&scholarships).into_response())
}

async fn delete_scholarship(id: i64, staff: BoardAuthed<true>) -> Result<Response, Rejection> {
    staff
        .delete_scholarship(id)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply().into_response())
}

async fn scholarship_prefill(id: i64, staff: BoardAuthed<true>) -> Result<Response, Rejection> {
    let scholarship = staff.scholarship(id).await.map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&scholarship).into_response())
}

async fn update_scholarship(
    id: i64,
    staff: BoardAuthed<true>,
    draft: ScholarshipDraft,
) -> Result<Response, Rejection> {
    if let Err(errors) = draft.validate_update() {
        return Ok(validation_reply(&errors));
    }

    staff
        .update_scholarship(id, &draft)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply().into_response())
}

async fn panel_overview(
    superadmin: BoardAuthed<true>,
    query: SearchQuery,
) -> Result<Response, Rejection> {
    let panel = superadmin
        .panel(query.search.as_deref())
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&panel).into_response())
}

async fn add_user(superadmin: BoardAuthed<true>, form: NewUserForm) -> Result<Response, Rejection> {
    if let Err(errors) = form.validate() {
        return Ok(validation_reply(&errors));
    }

    let id = superadmin
        .add_user(&form)
        .await
        .map_err(warp::reject::custom)?;

    let body = warp::reply::json(&serde_json::json!({
        "id": id,
        "message": "User added successfully!",
    }));

    Ok(warp::reply::with_status(body, StatusCode::CREATED).into_response())
}

async fn delete_user(id: Uuid, superadmin: BoardAuthed<true>) -> Result<Response, Rejection> {
    superadmin
        .delete_user(&id)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply().into_response())
}

fn error_reply(status: StatusCode, message: &'static str) -> Response {
    let body = warp::reply::json(&serde_json::json!({ "error": message }));

    warp::reply::with_status(body, status).into_response()
}

fn message_reply(status: StatusCode, message: &'static str) -> Response {
    let body = warp::reply::json(&serde_json::json!({ "message": message }));

    warp::reply::with_status(body, status).into_response()
}

fn validation_reply(errors: &FieldErrors) -> Response {
    let body = warp::reply::json(&serde_json::json!({ "errors": errors }));

    warp::reply::with_status(body, StatusCode::BAD_REQUEST).into_response()
}

fn deny_redirect(target: DenyTarget) -> Response {
    warp::redirect::see_other(Uri::from_static(target.location())).into_response()
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    use board::Error::*;

    let reply = if let Some(&e) = err.find::<board::Error>() {
        match e {
            Unauthorized => deny_redirect(DenyTarget::Login),
            Denied => deny_redirect(DenyTarget::AccessDenied),
            CredentialInvalid => error_reply(e.into(), "Invalid email or password"),
            NotFound => error_reply(e.into(), "Not found."),
            AlreadySubscribed => error_reply(e.into(), "This email is already subscribed."),
            EmailInUse => error_reply(e.into(), "This email is already registered."),
            BadRequest => error_reply(e.into(), "Bad request."),
            Internal => error_reply(e.into(), "Something went wrong. Please try again."),
        }
    } else if err.is_not_found() {
        error_reply(StatusCode::NOT_FOUND, "Not found.")
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        error_reply(StatusCode::BAD_REQUEST, "Bad request.")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.")
    } else {
        error!("unhandled rejection: {err:?}");
        error_reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong. Please try again.",
        )
    };

    Ok(reply)
}

#[cfg(test)]
mod test {
    use super::*;

    use warp::http::HeaderMap;

    use crate::board::test::{create_board, login_form, seed_user};

    fn body_json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    fn cookie_from(headers: &HeaderMap) -> String {
        let set = headers[header::SET_COOKIE].to_str().unwrap();

        set.split(';').next().unwrap().to_string()
    }

    async fn session_for(board: &Arc<Board>, email: &str) -> String {
        let authed = board.login(&login_form(email, "pw")).await.unwrap();

        format!("{COOKIE_NAME}={}", authed.session_id())
    }

    fn draft_json() -> serde_json::Value {
        serde_json::json!({
            "name": "Global Scholars",
            "description": "Fully funded masters",
            "deadline": "2999-01-01",
            "host_country": "Norway",
            "benefits": "Tuition\nStipend",
            "eligibility": "Bachelor degree",
            "degree_level": "Masters",
            "link": "https://example.com/apply",
            "author": "admin",
        })
    }

    #[tokio::test]
    async fn index_names_the_service() {
        let routes = all(create_board().await, false);

        let resp = warp::test::request().path("/").reply(&routes).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp.body());
        assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    }

    #[tokio::test]
    async fn listing_and_detail_are_public() {
        let board = create_board().await;
        seed_user(&board, "admin@example.com", "pw", Role::Admin).await;
        let routes = all(Arc::clone(&board), false);

        let cookie = session_for(&board, "admin@example.com").await;
        let posted = warp::test::request()
            .method("POST")
            .path("/post-scholarship")
            .header("cookie", &cookie)
            .json(&draft_json())
            .reply(&routes)
            .await;
        assert_eq!(posted.status(), StatusCode::CREATED);
        let id = body_json(posted.body())["id"].as_i64().unwrap();

        let listed = warp::test::request()
            .path("/scholarship-list")
            .reply(&routes)
            .await;
        assert_eq!(listed.status(), StatusCode::OK);
        let body = body_json(listed.body());
        assert_eq!(body["scholarships"].as_array().unwrap().len(), 1);
        assert_eq!(body["countries"], serde_json::json!(["Norway"]));

        let filtered = warp::test::request()
            .path("/scholarship-list?search=nothing%20like%20this")
            .reply(&routes)
            .await;
        assert!(body_json(filtered.body())["scholarships"]
            .as_array()
            .unwrap()
            .is_empty());

        let detail = warp::test::request()
            .path(&format!("/scholarship-detail/{id}"))
            .reply(&routes)
            .await;
        assert_eq!(detail.status(), StatusCode::OK);
        let body = body_json(detail.body());
        assert_eq!(body["name"], "Global Scholars");
        assert_eq!(body["benefit_lines"], serde_json::json!(["Tuition", "Stipend"]));

        let missing = warp::test::request()
            .path("/scholarship-detail/999")
            .reply(&routes)
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(missing.body())["error"], "Scholarship not found.");
    }

    #[tokio::test]
    async fn gated_routes_redirect_anonymous_visitors_to_login() {
        let routes = all(create_board().await, false);

        let list = warp::test::request()
            .path("/admin-scholarship-list")
            .reply(&routes)
            .await;
        assert_eq!(list.status(), StatusCode::SEE_OTHER);
        assert_eq!(list.headers()[header::LOCATION], "/admin-login");

        let post = warp::test::request()
            .method("POST")
            .path("/post-scholarship")
            .json(&draft_json())
            .reply(&routes)
            .await;
        assert_eq!(post.status(), StatusCode::SEE_OTHER);
        assert_eq!(post.headers()[header::LOCATION], "/admin-login");
    }

    #[tokio::test]
    async fn unknown_sessions_count_as_anonymous() {
        let routes = all(create_board().await, false);

        let garbled = warp::test::request()
            .path("/admin-scholarship-list")
            .header("cookie", format!("{COOKIE_NAME}=not-a-uuid"))
            .reply(&routes)
            .await;
        assert_eq!(garbled.status(), StatusCode::SEE_OTHER);
        assert_eq!(garbled.headers()[header::LOCATION], "/admin-login");

        let unknown = warp::test::request()
            .path("/admin-scholarship-list")
            .header("cookie", format!("{COOKIE_NAME}={}", Uuid::new_v4()))
            .reply(&routes)
            .await;
        assert_eq!(unknown.status(), StatusCode::SEE_OTHER);
        assert_eq!(unknown.headers()[header::LOCATION], "/admin-login");
    }

    #[tokio::test]
    async fn students_are_redirected_to_access_denied() {
        let board = create_board().await;
        seed_user(&board, "student@example.com", "pw", Role::Student).await;
        let routes = all(Arc::clone(&board), false);

        let cookie = session_for(&board, "student@example.com").await;
        let resp = warp::test::request()
            .path("/admin-scholarship-list")
            .header("cookie", &cookie)
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/access-denied");
    }

    #[tokio::test]
    async fn admin_login_flow_round_trips() {
        let board = create_board().await;
        seed_user(&board, "admin@example.com", "pw", Role::Admin).await;
        seed_user(&board, "student@example.com", "pw", Role::Student).await;
        let routes = all(board, false);

        let wrong = warp::test::request()
            .method("POST")
            .path("/admin-login")
            .json(&serde_json::json!({ "email": "admin@example.com", "password": "nope" }))
            .reply(&routes)
            .await;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(wrong.body())["error"], "Invalid email or password");

        let student = warp::test::request()
            .method("POST")
            .path("/admin-login")
            .json(&serde_json::json!({ "email": "student@example.com", "password": "pw" }))
            .reply(&routes)
            .await;
        assert_eq!(student.status(), StatusCode::SEE_OTHER);
        assert_eq!(student.headers()[header::LOCATION], "/access-denied");
        assert!(student.headers().get(header::SET_COOKIE).is_none());

        let admin = warp::test::request()
            .method("POST")
            .path("/admin-login")
            .json(&serde_json::json!({ "email": "admin@example.com", "password": "pw" }))
            .reply(&routes)
            .await;
        assert_eq!(admin.status(), StatusCode::OK);
        assert_eq!(body_json(admin.body())["role"], "admin");
        let cookie = cookie_from(admin.headers());
        assert!(cookie.starts_with(&format!("{COOKIE_NAME}=")));

        let posted = warp::test::request()
            .method("POST")
            .path("/post-scholarship")
            .header("cookie", &cookie)
            .json(&draft_json())
            .reply(&routes)
            .await;
        assert_eq!(posted.status(), StatusCode::CREATED);

        let listed = warp::test::request()
            .path("/admin-scholarship-list?search=global")
            .header("cookie", &cookie)
            .reply(&routes)
            .await;
        assert_eq!(listed.status(), StatusCode::OK);
        assert_eq!(body_json(listed.body()).as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn signup_login_session_logout_cycle() {
        let board = create_board().await;
        let routes = all(board, false);

        let form = serde_json::json!({
            "fullname": "New Student",
            "email": "new@example.com",
            "password": "hunter22",
            "confirm_password": "hunter22",
            "phone": "012-345-6789",
        });

        let signed_up = warp::test::request()
            .method("POST")
            .path("/signup")
            .json(&form)
            .reply(&routes)
            .await;
        assert_eq!(signed_up.status(), StatusCode::CREATED);

        let duplicate = warp::test::request()
            .method("POST")
            .path("/signup")
            .json(&form)
            .reply(&routes)
            .await;
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(duplicate.body())["error"],
            "This email is already registered.",
        );

        let logged_in = warp::test::request()
            .method("POST")
            .path("/login")
            .json(&serde_json::json!({ "email": "new@example.com", "password": "hunter22" }))
            .reply(&routes)
            .await;
        assert_eq!(logged_in.status(), StatusCode::OK);
        let cookie = cookie_from(logged_in.headers());

        let session = warp::test::request()
            .path("/session")
            .header("cookie", &cookie)
            .reply(&routes)
            .await;
        let body = body_json(session.body());
        assert_eq!(body["state"], "resolved");
        assert_eq!(body["role"], "student");
        assert_eq!(body["access"]["/post-scholarship"], false);

        let logged_out = warp::test::request()
            .method("POST")
            .path("/logout")
            .header("cookie", &cookie)
            .reply(&routes)
            .await;
        assert_eq!(logged_out.status(), StatusCode::OK);
        assert!(logged_out.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));

        // the store no longer recognises the old cookie
        let after = warp::test::request()
            .path("/session")
            .header("cookie", &cookie)
            .reply(&routes)
            .await;
        assert_eq!(body_json(after.body())["state"], "unauthenticated");
    }

    #[tokio::test]
    async fn anonymous_whoami_shows_no_access() {
        let routes = all(create_board().await, false);

        let resp = warp::test::request().path("/session").reply(&routes).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp.body());
        assert_eq!(body["state"], "unauthenticated");
        assert!(body.get("role").is_none() || body["role"].is_null());
        for (_, allowed) in body["access"].as_object().unwrap() {
            assert_eq!(*allowed, serde_json::json!(false));
        }
    }

    #[tokio::test]
    async fn validation_failures_are_inline() {
        let routes = all(create_board().await, false);

        let resp = warp::test::request()
            .method("POST")
            .path("/contact")
            .json(&serde_json::json!({ "name": "", "email": "bad", "message": "" }))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let errors = &body_json(resp.body())["errors"];
        assert_eq!(errors["name"], "Name is required");
        assert_eq!(errors["email"], "Email is invalid");
        assert_eq!(errors["message"], "Message is required");
    }

    #[tokio::test]
    async fn garbled_bodies_are_bad_requests() {
        let routes = all(create_board().await, false);

        let resp = warp::test::request()
            .method("POST")
            .path("/contact")
            .header("content-type", "application/json")
            .body("{")
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn subscribe_conflicts_are_inline() {
        let routes = all(create_board().await, false);
        let form = serde_json::json!({ "name": "Someone", "email": "someone@example.com" });

        let first = warp::test::request()
            .method("POST")
            .path("/subscribe")
            .json(&form)
            .reply(&routes)
            .await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(
            body_json(first.body())["message"],
            "Thank you for subscribing!",
        );

        let second = warp::test::request()
            .method("POST")
            .path("/subscribe")
            .json(&form)
            .reply(&routes)
            .await;
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(second.body())["error"],
            "This email is already subscribed.",
        );
    }

    #[tokio::test]
    async fn superadmin_panel_flow() {
        let board = create_board().await;
        seed_user(&board, "super@example.com", "pw", Role::Superadmin).await;
        seed_user(&board, "admin@example.com", "pw", Role::Admin).await;
        let routes = all(Arc::clone(&board), false);

        let super_cookie = session_for(&board, "super@example.com").await;
        let admin_cookie = session_for(&board, "admin@example.com").await;

        // the shared staff gate is not enough for the panel
        let as_admin = warp::test::request()
            .path("/super-admin-panel")
            .header("cookie", &admin_cookie)
            .reply(&routes)
            .await;
        assert_eq!(as_admin.status(), StatusCode::SEE_OTHER);
        assert_eq!(as_admin.headers()[header::LOCATION], "/access-denied");

        let overview = warp::test::request()
            .path("/super-admin-panel")
            .header("cookie", &super_cookie)
            .reply(&routes)
            .await;
        assert_eq!(overview.status(), StatusCode::OK);
        assert_eq!(body_json(overview.body())["users"].as_array().unwrap().len(), 2);

        let added = warp::test::request()
            .method("POST")
            .path("/super-admin-panel/users")
            .header("cookie", &super_cookie)
            .json(&serde_json::json!({
                "fullname": "Second Admin",
                "email": "second@example.com",
                "phone": "0123456789",
                "password": "longenough",
                "role": "admin",
            }))
            .reply(&routes)
            .await;
        assert_eq!(added.status(), StatusCode::CREATED);
        assert_eq!(body_json(added.body())["message"], "User added successfully!");
        let new_id = body_json(added.body())["id"].as_str().unwrap().to_string();

        let as_student = warp::test::request()
            .method("POST")
            .path("/super-admin-panel/users")
            .header("cookie", &super_cookie)
            .json(&serde_json::json!({
                "fullname": "Smuggled Student",
                "email": "student2@example.com",
                "phone": "0123456789",
                "password": "longenough",
                "role": "student",
            }))
            .reply(&routes)
            .await;
        assert_eq!(as_student.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(as_student.body())["errors"]["role"],
            "Role must be admin or superadmin",
        );

        let removed = warp::test::request()
            .method("DELETE")
            .path(&format!("/super-admin-panel/users/{new_id}"))
            .header("cookie", &super_cookie)
            .reply(&routes)
            .await;
        assert_eq!(removed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn update_and_delete_round_trip() {
        let board = create_board().await;
        seed_user(&board, "admin@example.com", "pw", Role::Admin).await;
        let routes = all(Arc::clone(&board), false);

        let cookie = session_for(&board, "admin@example.com").await;
        let posted = warp::test::request()
            .method("POST")
            .path("/post-scholarship")
            .header("cookie", &cookie)
            .json(&draft_json())
            .reply(&routes)
            .await;
        let id = body_json(posted.body())["id"].as_i64().unwrap();

        let prefill = warp::test::request()
            .path(&format!("/update-scholarship/{id}"))
            .header("cookie", &cookie)
            .reply(&routes)
            .await;
        assert_eq!(prefill.status(), StatusCode::OK);
        assert_eq!(body_json(prefill.body())["name"], "Global Scholars");

        let mut renamed = draft_json();
        renamed["name"] = "Renamed".into();
        let updated = warp::test::request()
            .method("POST")
            .path(&format!("/update-scholarship/{id}"))
            .header("cookie", &cookie)
            .json(&renamed)
            .reply(&routes)
            .await;
        assert_eq!(updated.status(), StatusCode::OK);

        let missing = warp::test::request()
            .method("POST")
            .path("/update-scholarship/999")
            .header("cookie", &cookie)
            .json(&renamed)
            .reply(&routes)
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let removed = warp::test::request()
            .method("DELETE")
            .path(&format!("/admin-scholarship-list/{id}"))
            .header("cookie", &cookie)
            .reply(&routes)
            .await;
        assert_eq!(removed.status(), StatusCode::OK);

        let gone = warp::test::request()
            .path(&format!("/scholarship-detail/{id}"))
            .reply(&routes)
            .await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn access_denied_is_a_final_page() {
        let routes = all(create_board().await, false);

        let resp = warp::test::request()
            .path("/access-denied")
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(resp.body())["error"],
            "You do not have permission to view this page.",
        );
    }
}
