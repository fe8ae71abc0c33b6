use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::warn;

use crate::{
    api::session::AuthSession, error::AppError, server::AppState, types::PlaylistSummary,
    utils::escape_html,
};

#[derive(Debug, Deserialize)]
pub struct IndexParams {
    pub error: Option<String>,
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title></head>\
         <body>{}</body></html>",
        escape_html(title),
        body
    ))
}

pub async fn index(session: Option<AuthSession>, Query(params): Query<IndexParams>) -> Response {
    if session.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    let error = params
        .error
        .map(|e| format!("<p class=\"error\">Login failed: {}</p>", escape_html(&e)))
        .unwrap_or_default();

    page(
        "Playlist Tuner",
        &format!(
            "<h1>Playlist Tuner</h1>{}<p>Analyze your Spotify playlists and prune the \
             tracks that drag them down.</p><p><a href=\"/login\">Log in with Spotify</a></p>",
            error
        ),
    )
    .into_response()
}

fn playlist_row(p: &PlaylistSummary) -> String {
    format!(
        "<li><strong>{}</strong> ({} tracks, by {}) \
         <a href=\"/api/playlist/{id}/analyze\">analyze</a> \
         <a href=\"/api/playlist/{id}/changes\">recent changes</a></li>",
        escape_html(&p.name),
        p.track_total,
        escape_html(&p.owner_name),
        id = escape_html(&p.id),
    )
}

pub async fn dashboard(State(state): State<AppState>, session: AuthSession) -> Response {
    let playlists = match state.pipeline.playlists(&session.credentials).await {
        Ok(playlists) => playlists,
        Err(AppError::Unauthorized(_)) => return Redirect::to("/login").into_response(),
        Err(e) => {
            warn!(error = %e, "cannot list playlists for dashboard");
            return (
                e.status_code(),
                page("Playlist Tuner", "<h4>Could not load your playlists.</h4>"),
            )
                .into_response();
        }
    };

    let name = session
        .profile
        .as_ref()
        .map(|p| p.display_name.as_str())
        .unwrap_or("there");
    let rows: String = playlists.iter().map(playlist_row).collect();

    (
        StatusCode::OK,
        page(
            "Dashboard",
            &format!(
                "<h1>Hi {}</h1><p>{} playlists</p><ul>{}</ul>\
                 <form method=\"post\" action=\"/logout\"><button>Log out</button></form>",
                escape_html(name),
                playlists.len(),
                rows
            ),
        ),
    )
        .into_response()
}
