use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header::RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::Config,
    error::{AppError, Result},
    spotify::MusicApi,
    types::{
        AddTracksRequest, AudioFeatures, AudioFeaturesResponse, Page, PlayHistoryItem,
        PlaylistInfo, PlaylistItem, PlaylistObject, PlaylistSummary, RecommendationRequest,
        RecommendationsResponse, RemoveTracksRequest, SimplifiedPlaylist, TrackObject, UriRef,
        UserObject, UserProfile,
    },
};

/// Retry ceiling and backoff for upstream requests.
///
/// Rate-limited responses wait for the `Retry-After` hint when Spotify sends
/// one; everything else retryable waits `base_delay * 2^(attempt - 1)`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_retry_after: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// HTTP client for the Spotify Web API.
///
/// One instance lives for the whole process; access tokens are passed per
/// call so the client itself holds no user state.
pub struct SpotifyClient {
    http: Client,
    api_url: String,
    retry: RetryPolicy,
}

impl SpotifyClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_url.clone(),
            config.upstream_timeout,
            RetryPolicy {
                max_attempts: config.upstream_max_attempts,
                base_delay: config.upstream_backoff,
                ..RetryPolicy::default()
            },
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Sends the request built by `build`, retrying transient failures.
    ///
    /// `build` is called once per attempt because a `RequestBuilder` is
    /// consumed by sending it.
    async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            let outcome = match build().send().await {
                Ok(response) => check_status(response).await,
                Err(err) => Err(AppError::Http(err)),
            };

            match outcome {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = match &err {
                        AppError::RateLimited {
                            retry_after: Some(secs),
                        } => {
                            let hinted = Duration::from_secs(*secs);
                            if hinted > self.retry.max_retry_after {
                                warn!(
                                    retry_after = secs,
                                    "Spotify asked for an abnormally long pause, giving up"
                                );
                                return Err(err);
                            }
                            hinted
                        }
                        _ => self.retry.backoff(attempt),
                    };
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying Spotify request"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, token: &str, url: &str) -> Result<T> {
        debug!(url, "GET");
        let response = self.send(|| self.http.get(url).bearer_auth(token)).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Maps a non-success response onto the error taxonomy.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body, status);

    Err(match status {
        StatusCode::UNAUTHORIZED => AppError::Unauthorized(message),
        StatusCode::FORBIDDEN => AppError::Forbidden(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited { retry_after },
        _ => AppError::Upstream {
            status: status.as_u16(),
            message,
        },
    })
}

/// Pulls the human readable message out of a Spotify error body.
///
/// The Web API nests it as `{"error": {"message": ..}}`, the accounts
/// service uses `{"error": .., "error_description": ..}`.
pub(crate) fn error_message(body: &str, status: StatusCode) -> String {
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_string()
    };

    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };

    json["error"]["message"]
        .as_str()
        .or_else(|| json["error_description"].as_str())
        .or_else(|| json["error"].as_str())
        .map(str::to_string)
        .unwrap_or_else(fallback)
}

#[async_trait]
impl MusicApi for SpotifyClient {
    async fn current_user(&self, token: &str) -> Result<UserProfile> {
        let user: UserObject = self.get_json(token, &self.url("/me")).await?;
        Ok(user.into())
    }

    async fn user_playlists(&self, token: &str) -> Result<Vec<PlaylistSummary>> {
        let mut playlists = Vec::new();
        let mut url = self.url("/me/playlists?limit=50");
        let mut visited = HashSet::new();

        loop {
            visited.insert(url.clone());
            let page: Page<Option<SimplifiedPlaylist>> = self.get_json(token, &url).await?;
            playlists.extend(page.items.into_iter().flatten().map(PlaylistSummary::from));

            match page.next {
                Some(next) if visited.contains(&next) => {
                    warn!(%next, "playlist listing repeated a page, stopping");
                    break;
                }
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(playlists)
    }

    async fn playlist(&self, token: &str, playlist_id: &str) -> Result<PlaylistInfo> {
        let url = self.url(&format!(
            "/playlists/{}?fields=id,name,tracks.total",
            playlist_id
        ));
        let playlist: PlaylistObject = self.get_json(token, &url).await?;
        Ok(playlist.into())
    }

    async fn playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<PlaylistItem>> {
        let url = match cursor {
            Some(next) => next.to_string(),
            None => self.url(&format!("/playlists/{}/tracks?limit=100", playlist_id)),
        };
        self.get_json(token, &url).await
    }

    async fn recently_played(
        &self,
        token: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<PlayHistoryItem>> {
        let url = match cursor {
            Some(next) => next.to_string(),
            None => self.url(&format!(
                "/me/player/recently-played?limit={}",
                limit.clamp(1, 50)
            )),
        };
        self.get_json(token, &url).await
    }

    async fn audio_features(
        &self,
        token: &str,
        ids: &[String],
    ) -> Result<Vec<Option<AudioFeatures>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.url(&format!("/audio-features?ids={}", ids.join(",")));
        let response: AudioFeaturesResponse = self.get_json(token, &url).await?;
        Ok(response.audio_features)
    }

    async fn recommendations(
        &self,
        token: &str,
        request: &RecommendationRequest,
    ) -> Result<Vec<TrackObject>> {
        let mut params: Vec<(&str, String)> = vec![
            ("seed_tracks", request.seed_tracks.join(",")),
            ("limit", request.limit.to_string()),
        ];
        if let Some(energy) = request.target_energy {
            params.push(("target_energy", format!("{:.3}", energy)));
        }
        if let Some(popularity) = request.min_popularity {
            params.push(("min_popularity", popularity.to_string()));
        }

        let url = self.url("/recommendations");
        let response = self
            .send(|| self.http.get(&url).bearer_auth(token).query(&params))
            .await?;
        let json = response.json::<RecommendationsResponse>().await?;
        Ok(json.tracks)
    }

    async fn add_tracks(&self, token: &str, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = self.url(&format!("/playlists/{}/tracks", playlist_id));
        let body = AddTracksRequest {
            uris: uris.to_vec(),
        };
        self.send(|| self.http.post(&url).bearer_auth(token).json(&body))
            .await?;
        Ok(())
    }

    async fn remove_tracks(&self, token: &str, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = self.url(&format!("/playlists/{}/tracks", playlist_id));
        let body = RemoveTracksRequest {
            tracks: uris.iter().map(|uri| UriRef { uri: uri.clone() }).collect(),
        };
        self.send(|| self.http.delete(&url).bearer_auth(token).json(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn error_message_reads_both_error_shapes() {
        let api = r#"{"error":{"status":404,"message":"Resource not found"}}"#;
        assert_eq!(
            error_message(api, StatusCode::NOT_FOUND),
            "Resource not found"
        );

        let accounts = r#"{"error":"invalid_grant","error_description":"Refresh token revoked"}"#;
        assert_eq!(
            error_message(accounts, StatusCode::BAD_REQUEST),
            "Refresh token revoked"
        );

        assert_eq!(
            error_message("<html>", StatusCode::BAD_GATEWAY),
            "Bad Gateway"
        );
    }
}
