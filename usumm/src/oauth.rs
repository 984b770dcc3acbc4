//! OAuth 2.0 management for Google sign-in and YouTube API access.
//!
//! This module encapsulates the authorization-code flow as seen from a web server: building the
//! authorization URL for `/login`, exchanging the code delivered to `/callback`, and refreshing
//! expired access tokens on behalf of the YouTube client.

use crate::credential::Credential;
use eyre::Context;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenUrl, reqwest, url::Url,
};

/// Google OAuth2 authorization endpoint.
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth2 token endpoint URL used for both code exchange and token refresh
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scopes requested at login: basic identity plus read-only YouTube access.
const SCOPES: &[&str] = &[
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/youtube.readonly",
];

/// State that must survive between `/login` and `/callback` for one browser session.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    csrf_state: String,
    pkce_verifier: String,
    redirect_url: String,
}

impl std::fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("redirect_url", &self.redirect_url)
            .finish_non_exhaustive()
    }
}

impl PendingAuthorization {
    /// Whether `state` (as presented on the callback) matches the one issued at login.
    pub fn matches_state(&self, state: &str) -> bool {
        self.csrf_state == state
    }

    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }
}

/// Manages OAuth 2.0 authentication flows for Google and the YouTube API.
///
/// The OAuthManager encapsulates all OAuth operations, providing a consistent interface
/// for both initial user authentication and token refresh operations. It only holds the
/// registered client's id and secret; an `oauth2` client is assembled per operation.
#[derive(Clone)]
pub struct OAuthManager {
    client_id: String,
    client_secret: String,
    token_url: String,
}

impl std::fmt::Debug for OAuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthManager")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl OAuthManager {
    /// Creates a new OAuth manager with the specified credentials.
    ///
    /// # Arguments
    ///
    /// * `client_id` - The OAuth client ID registered in the Google Cloud console
    /// * `client_secret` - The matching client secret
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: TOKEN_URL.to_string(),
        }
    }

    /// Points token exchange and refresh at a different endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Starts an authorization-code flow.
    ///
    /// Returns the URL the browser should be redirected to, along with the
    /// [`PendingAuthorization`] to stash in the session until the provider calls back.
    pub fn authorize_redirect(
        &self,
        redirect_url: &str,
    ) -> eyre::Result<(Url, PendingAuthorization)> {
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(AUTH_URL.to_string()).context("parse authorization URL")?)
            .set_redirect_uri(
                RedirectUrl::new(redirect_url.to_string()).context("construct redirect url")?,
            );

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(SCOPES.iter().map(|s| Scope::new(s.to_string())))
            // without offline access Google never hands out a refresh token
            .add_extra_param("access_type", "offline")
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::debug!(redirect_url, "issued authorization redirect");
        Ok((
            auth_url,
            PendingAuthorization {
                csrf_state: csrf.secret().clone(),
                pkce_verifier: pkce_verifier.secret().clone(),
                redirect_url: redirect_url.to_string(),
            },
        ))
    }

    /// Exchanges the authorization code presented on the callback for a [`Credential`].
    ///
    /// The caller is responsible for checking the `state` parameter against
    /// [`PendingAuthorization::matches_state`] first.
    pub async fn authorize_access_token(
        &self,
        code: &str,
        pending: PendingAuthorization,
    ) -> eyre::Result<Credential> {
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_token_uri(TokenUrl::new(self.token_url.clone()).context("parse token URL")?)
            .set_redirect_uri(
                RedirectUrl::new(pending.redirect_url).context("construct redirect url")?,
            );

        let http_client = http_client()?;
        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pending.pkce_verifier))
            .request_async(&http_client)
            .await
            .context("exchange authorization code with access token")?;

        Ok(Credential::from_token_response(&token))
    }

    /// Attempts to refresh an expired credential using its refresh token.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(new_credential))` - Refresh succeeded
    /// * `Ok(None)` - No refresh token available, or the provider rejected it
    /// * `Err(_)` - Network or other error occurred during the refresh attempt
    ///
    /// When refresh fails, the credential should be considered invalid and the user
    /// sent through `/login` again.
    pub async fn refresh(&self, credential: &Credential) -> eyre::Result<Option<Credential>> {
        let Some(refresh_token) = credential.refresh_token() else {
            tracing::warn!("no refresh token available, cannot refresh");
            return Ok(None);
        };

        tracing::debug!("attempting to refresh OAuth token");

        // Create a minimal OAuth client for token refresh (no redirect URL needed)
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_token_uri(TokenUrl::new(self.token_url.clone()).context("parse token URL")?);

        let http_client = http_client()?;
        match client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&http_client)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(credential.refreshed(&new_token)))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(
                    sr.error(),
                    oauth2::basic::BasicErrorResponseType::InvalidGrant
                ) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }
}

fn http_client() -> eyre::Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        // SSRF no thank you.
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("build OAuth HTTP client")
}
