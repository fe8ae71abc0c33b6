use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::{
    config::Config,
    error::{AppError, Result},
    spotify::{OAuthApi, client::error_message},
    types::{TokenInfo, TokenResponse},
};

/// Client for the Spotify accounts service.
///
/// Implements the authorization-code flow with PKCE. The confidential
/// client credentials are sent as HTTP basic auth on every token request, so
/// the code verifier is an additional proof on top of the client secret.
pub struct SpotifyAuth {
    http: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authorize_endpoint: Url,
    token_url: String,
    scope: String,
}

impl SpotifyAuth {
    pub fn from_config(config: &Config) -> Result<Self> {
        let authorize_endpoint = Url::parse(&config.auth_url).map_err(|e| {
            AppError::Config(format!("invalid SPOTIFY_API_AUTH_URL {}: {}", config.auth_url, e))
        })?;
        let http = Client::builder().timeout(config.upstream_timeout).build()?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            authorize_endpoint,
            token_url: config.token_url.clone(),
            scope: config.scope.clone(),
        })
    }

    /// Posts a grant to the token endpoint.
    ///
    /// Any rejection from the accounts service means the user has to log in
    /// again, so every failure status maps to [`AppError::Unauthorized`].
    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenInfo> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body, status);
            warn!(status = status.as_u16(), %message, "token request rejected");
            return Err(AppError::Unauthorized(message));
        }

        let token = response.json::<TokenResponse>().await?;
        Ok(TokenInfo::from_response(token, Utc::now()))
    }
}

#[async_trait]
impl OAuthApi for SpotifyAuth {
    fn authorize_url(&self, state: &str, code_challenge: &str) -> String {
        let mut url = self.authorize_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", state)
            .append_pair("scope", &self.scope)
            .append_pair("code_challenge_method", "S256")
            .append_pair("code_challenge", code_challenge);
        url.to_string()
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenInfo> {
        debug!("exchanging authorization code");
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenInfo> {
        debug!("refreshing access token");
        self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}
