use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    SignedCookieJar,
    cookie::{Cookie, SameSite},
};
use tracing::debug;

use crate::{
    error::AppError,
    management::SessionCredentials,
    server::AppState,
    types::UserProfile,
};

pub const SESSION_COOKIE: &str = "playlist_tuner_session";

/// Signed, HTTP-only cookie carrying the session id.
pub fn session_cookie(session_id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn session_id(jar: &SignedCookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|c| c.value().to_string())
}

/// A logged-in session holding a Spotify token.
pub struct AuthSession {
    pub id: String,
    pub profile: Option<UserProfile>,
    pub credentials: SessionCredentials,
}

/// Rejection for requests without a logged-in session: JSON `401` on the
/// API, a redirect to the login page everywhere else.
pub enum AuthRejection {
    Api,
    Browser,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::Api => AppError::Unauthorized("login required".into()).into_response(),
            AuthRejection::Browser => Redirect::to("/login").into_response(),
        }
    }
}

async fn extract_session(parts: &mut Parts, state: &AppState) -> Option<AuthSession> {
    let Ok(jar) = SignedCookieJar::from_request_parts(parts, state).await;
    let Some(id) = session_id(&jar) else {
        debug!("no session cookie");
        return None;
    };

    let session = state.sessions.get(&id).await?;
    if session.token.is_none() {
        debug!(session = %id, "session has no token");
        return None;
    }

    Some(AuthSession {
        credentials: SessionCredentials::new(state.sessions.clone(), id.clone(), state.oauth.clone()),
        profile: session.profile,
        id,
    })
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let is_api = parts.uri.path().starts_with("/api/");
        extract_session(parts, state).await.ok_or(if is_api {
            AuthRejection::Api
        } else {
            AuthRejection::Browser
        })
    }
}

impl OptionalFromRequestParts<AppState> for AuthSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(extract_session(parts, state).await)
    }
}
