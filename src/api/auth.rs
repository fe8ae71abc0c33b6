use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{SignedCookieJar, cookie::Cookie};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    api::session::{SESSION_COOKIE, session_cookie, session_id},
    management::{CredentialProvider, SessionCredentials},
    server::AppState,
    utils,
};

/// Starts the authorization-code flow.
///
/// Reuses the session from the cookie when it is still alive, otherwise
/// opens a new one, and stores a fresh state and PKCE verifier in it.
pub async fn login(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    let existing = match session_id(&jar) {
        Some(id) if state.sessions.get(&id).await.is_some() => Some(id),
        _ => None,
    };
    let id = match existing {
        Some(id) => id,
        None => state.sessions.create().await,
    };

    let verifier = utils::generate_code_verifier();
    let challenge = utils::generate_code_challenge(&verifier);
    let oauth_state = utils::generate_state();

    let url = state.oauth.authorize_url(&oauth_state, &challenge);
    state
        .sessions
        .update(&id, |s| {
            s.oauth_state = Some(oauth_state);
            s.code_verifier = Some(verifier);
        })
        .await;

    (jar.add(session_cookie(id)), Redirect::to(&url)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn login_failed(reason: &str) -> Response {
    Redirect::to(&format!("/?error={}", reason)).into_response()
}

pub async fn callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(id) = session_id(&jar) else {
        return login_failed("session_expired");
    };
    let Some(session) = state.sessions.get(&id).await else {
        return login_failed("session_expired");
    };

    if let Some(error) = params.error {
        warn!(%error, "authorization denied");
        return login_failed("authorization_denied");
    }

    let (Some(expected), Some(verifier)) = (session.oauth_state, session.code_verifier) else {
        return login_failed("no_pending_login");
    };
    if params.state.as_deref() != Some(expected.as_str()) {
        warn!(session = %id, "state mismatch on callback");
        return login_failed("state_mismatch");
    }
    let Some(code) = params.code else {
        return login_failed("missing_code");
    };

    let token = match state.oauth.exchange_code(&code, &verifier).await {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "token exchange failed");
            return login_failed("token_exchange_failed");
        }
    };

    state
        .sessions
        .update(&id, |s| {
            s.token = Some(token);
            s.oauth_state = None;
            s.code_verifier = None;
        })
        .await;

    let credentials = SessionCredentials::new(state.sessions.clone(), id.clone(), state.oauth.clone());
    match state.pipeline.profile(&credentials).await {
        Ok(profile) => {
            info!(user = %profile.id, "user logged in");
            state.sessions.update(&id, |s| s.profile = Some(profile)).await;
        }
        Err(e) => {
            warn!(error = %e, "cannot load user profile");
            // Without a profile the login is not complete
            credentials.clear().await;
            return login_failed("profile_unavailable");
        }
    }

    Redirect::to("/dashboard").into_response()
}

pub async fn logout(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    if let Some(id) = session_id(&jar) {
        state.sessions.remove(&id).await;
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/")).into_response()
}
