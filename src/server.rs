use axum::{
    Form, Router,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::headers::{Cookie, HeaderMapExt};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::config::{AppConfig, AuthMode, GraphTarget};
use crate::error::AppError;
use crate::graph::ProfileTarget;
use crate::identity::{Identity, IdentityError};
use crate::presenter::{ChallengePage, HtmlTemplate, LoginPage, ProfilePage};
use crate::token::TokenRequest;

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: AppConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let config = Arc::clone(&state.config);

    info!(
        name: "portal.config.loaded",
        auth_mode = ?config.auth.mode,
        users = state.credentials.len(),
        token_sources = ?state.tokens.names(),
        graph_base_url = %config.graph.base_url,
        graph_target = ?config.graph.target,
        "Portal configuration loaded"
    );

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the router for the configured authentication mode.
pub fn router(state: AppState) -> Router {
    let app = match state.config.auth.mode {
        AuthMode::ClientPrincipal => Router::new()
            .route("/", get(principal_profile))
            .route("/home", get(principal_profile)),
        AuthMode::Basic => Router::new()
            .route("/", get(login_form))
            .route("/login", axum::routing::post(login))
            .route("/home", get(basic_profile)),
    };

    app.route("/healthz", get(|| async { "ok" }))
        .layer(axum::middleware::from_fn(log_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Debug-log each inbound request. Header values are left out because they
/// carry principals and tokens.
async fn log_request(req: Request, next: Next) -> Response {
    tracing::debug!(
        name: "request.received",
        method = %req.method(),
        path = %req.uri().path(),
        headers = ?req.headers().keys().map(|k| k.as_str()).collect::<Vec<_>>(),
        "Request received"
    );
    next.run(req).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET / and /home - profile of the platform-authenticated caller.
async fn principal_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<HtmlTemplate<ProfilePage>, AppError> {
    let identity = Identity::from_client_principal(&headers)?;
    render_profile(&state, &identity, &headers).await
}

/// GET / - login form.
async fn login_form() -> HtmlTemplate<LoginPage> {
    HtmlTemplate(LoginPage::new())
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

/// POST /login - check the form against the credential table.
async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    if !state.credentials.verify(&form.username, &form.password) {
        info!(
            name: "login.rejected",
            username = %form.username,
            "Login rejected"
        );
        return HtmlTemplate(LoginPage::failed(&form.username)).into_response();
    }

    let cookie = format!("{}={}; Path=/", state.config.auth.cookie_name, form.username);
    let Ok(cookie) = HeaderValue::from_str(&cookie) else {
        return AppError::internal("username cannot be stored in a cookie").into_response();
    };

    info!(
        name: "login.accepted",
        username = %form.username,
        "Login accepted"
    );
    let mut response = Redirect::to("/home").into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    response
}

/// GET /home - profile for a caller presenting basic credentials.
///
/// Without valid credentials the browser gets an HTML challenge page. The
/// login cookie only personalises that page; it never authenticates.
async fn basic_profile(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = match state.credentials.authenticate_basic(&headers) {
        Ok(identity) => identity,
        Err(err) => return challenge(&state, &headers, &err),
    };
    render_profile(&state, &identity, &headers)
        .await
        .into_response()
}

fn challenge(state: &AppState, headers: &HeaderMap, err: &IdentityError) -> Response {
    let username = headers
        .typed_get::<Cookie>()
        .and_then(|cookie| cookie.get(&state.config.auth.cookie_name).map(str::to_string))
        .filter(|name| !name.is_empty());

    tracing::warn!(
        name: "request.rejected",
        status = StatusCode::UNAUTHORIZED.as_u16(),
        error = %err,
        remembered_user = ?username,
        "Basic credentials required"
    );

    let page = HtmlTemplate(ChallengePage::new(username, err.to_string()));
    let mut response = (StatusCode::UNAUTHORIZED, page).into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
    response
}

/// Token, profile fetch and rendering for an already resolved identity.
async fn render_profile(
    state: &AppState,
    identity: &Identity,
    headers: &HeaderMap,
) -> Result<HtmlTemplate<ProfilePage>, AppError> {
    let target = match state.config.graph.target {
        GraphTarget::Me => ProfileTarget::Me,
        GraphTarget::PrincipalObject => ProfileTarget::User(
            identity
                .object_id()
                .ok_or(IdentityError::MissingObjectId)?
                .to_string(),
        ),
    };

    let token = state
        .tokens
        .token(&TokenRequest {
            resource: &state.config.graph.resource,
            headers,
        })
        .await?;

    let profile = state.graph.fetch_profile(&token, &target).await?;

    Ok(HtmlTemplate(ProfilePage::new(identity, &profile)))
}
