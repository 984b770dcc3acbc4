//! Core YouTube API client functionality and authentication management.

use crate::credential::Credential;
use crate::oauth::OAuthManager;
use crate::youtube_api::{
    channels::{Channel, ChannelListResponse},
    playlist_items::{PlaylistItem, PlaylistItemListResponse},
    search::{SearchListResponse, SearchResult},
    subscriptions::{Subscription, SubscriptionListResponse},
    videos::{Video, VideoListResponse},
};
use eyre::Context;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::instrument;

/// Production endpoint of the YouTube Data API v3.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Largest page size the list endpoints accept.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Failures of a YouTube API call that callers need to tell apart.
///
/// These travel inside an [`eyre::Report`]; use `report.downcast_ref::<ApiError>()` to recover
/// them.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("YouTube API request to {endpoint} failed with status {status}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("access token expired and could not be refreshed")]
    Unauthenticated,
}

impl ApiError {
    /// Whether the failure means the session's credential is no longer usable.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            ApiError::Unauthenticated => true,
            ApiError::Status { status, .. } => *status == StatusCode::UNAUTHORIZED,
        }
    }
}

/// Builds [`YouTubeClient`]s for incoming requests.
///
/// Holds everything a client needs except the per-session credential.
#[derive(Debug, Clone)]
pub struct ClientFactory {
    oauth_manager: Option<Arc<OAuthManager>>,
    client: reqwest::Client,
    api_base: String,
}

impl ClientFactory {
    pub fn new(oauth_manager: Option<Arc<OAuthManager>>, api_base: impl Into<String>) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build YouTube HTTP client")?;
        Ok(Self {
            oauth_manager,
            client,
            api_base: api_base.into(),
        })
    }

    /// Returns a client bound to `credential`, or `None` when the session has no credential.
    ///
    /// No network traffic happens here; an invalid token only surfaces on the first API call.
    pub fn authorized_client(&self, credential: Option<Credential>) -> Option<YouTubeClient> {
        let credential = credential?;
        Some(YouTubeClient::new(
            credential,
            self.oauth_manager.clone(),
            self.client.clone(),
            self.api_base.clone(),
        ))
    }
}

/// Client for interacting with the YouTube Data API v3.
///
/// This client wraps a session [`Credential`] and provides methods to call the read-only
/// endpoints the feed needs. All calls require an access token with the
/// `youtube.readonly` scope.
///
/// The client automatically refreshes an expired access token before API calls using the stored
/// refresh token and OAuth manager. The refreshed credential can be read back with
/// [`YouTubeClient::credential`] so it can be stored in the session again.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    /// The current credential, behind a mutex so refreshes are serialized.
    credential: Arc<Mutex<Credential>>,
    /// OAuth manager for refreshing tokens (shared across clients)
    oauth_manager: Option<Arc<OAuthManager>>,
    /// HTTP client for API requests
    client: reqwest::Client,
    api_base: String,
}

impl YouTubeClient {
    /// Creates a new YouTube API client.
    ///
    /// # Arguments
    ///
    /// * `credential` - The session's OAuth credential
    /// * `oauth_manager` - Shared OAuth manager for token refresh, if OAuth is configured
    /// * `client` - Shared HTTP client for making API requests
    /// * `api_base` - Base URL of the Data API, normally [`DEFAULT_API_BASE`]
    pub fn new(
        credential: Credential,
        oauth_manager: Option<Arc<OAuthManager>>,
        client: reqwest::Client,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            credential: Arc::new(Mutex::new(credential)),
            oauth_manager,
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns a clone of the current credential, including any refresh that happened.
    pub async fn credential(&self) -> Credential {
        self.credential.lock().await.clone()
    }

    /// Gets a guaranteed-fresh access token, refreshing if necessary.
    ///
    /// # Returns
    ///
    /// * `Ok(token)` - A guaranteed-fresh access token
    /// * `Err(_)` - Token refresh failed ([`ApiError::Unauthenticated`]) or a network error occurred
    #[instrument(skip(self))]
    async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut credential = self.credential.lock().await;

        if credential.is_expired() {
            tracing::debug!("access token expired, attempting refresh");

            let Some(oauth_manager) = &self.oauth_manager else {
                return Err(ApiError::Unauthenticated.into());
            };
            match oauth_manager
                .refresh(&credential)
                .await
                .context("refresh OAuth token")?
            {
                Some(fresh) => {
                    tracing::debug!("access token successfully refreshed");
                    *credential = fresh;
                }
                None => {
                    tracing::warn!("access token refresh failed, client is unusable");
                    return Err(ApiError::Unauthenticated.into());
                }
            }
        }

        Ok(credential.access_token().to_string())
    }

    /// Makes an authenticated GET request to a YouTube API endpoint and decodes the JSON body.
    ///
    /// Consolidates token freshness, the authorization header, query parameters and status
    /// code validation. Non-success statuses become [`ApiError::Status`].
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> eyre::Result<T> {
        let access_token = self.fresh_access_token().await?;
        let url = format!("{}/{}", self.api_base, endpoint);

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(query_params)
            .send()
            .await
            .with_context(|| format!("send request to YouTube API: {}", endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status,
                body,
            }
            .into());
        }

        response
            .json()
            .await
            .with_context(|| format!("parse YouTube {} response as JSON", endpoint))
    }

    /// Lists the authenticated user's subscriptions, first page only.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/subscriptions/list>
    #[instrument(skip(self))]
    pub async fn list_my_subscriptions(&self, max_results: u32) -> eyre::Result<Vec<Subscription>> {
        let max_results = page_size(max_results);
        let response: SubscriptionListResponse = self
            .get_json(
                "subscriptions",
                &[
                    ("part", "snippet"),
                    ("mine", "true"),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;

        tracing::debug!(
            total_results = response.page_info.total_results,
            returned_items = response.items.len(),
            "fetched subscriptions"
        );

        Ok(response.items)
    }

    /// Lists the most recent items of a playlist.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/playlistItems/list>
    #[instrument(skip(self))]
    pub async fn list_playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
    ) -> eyre::Result<Vec<PlaylistItem>> {
        let max_results = page_size(max_results);
        let response: PlaylistItemListResponse = self
            .get_json(
                "playlistItems",
                &[
                    ("part", "snippet,contentDetails"),
                    ("playlistId", playlist_id),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;

        tracing::trace!(
            playlist_id,
            returned_items = response.items.len(),
            "fetched playlist items"
        );

        Ok(response.items)
    }

    /// Fetches statistics for several videos in one call.
    ///
    /// The IDs are sent as a single comma-separated list; the API caps that list at 50 entries.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/videos/list>
    #[instrument(skip(self), fields(count = video_ids.len()))]
    pub async fn list_video_statistics(&self, video_ids: &[String]) -> eyre::Result<Vec<Video>> {
        let ids = video_ids.join(",");
        let response: VideoListResponse = self
            .get_json("videos", &[("part", "statistics"), ("id", ids.as_str())])
            .await?;

        tracing::debug!(
            requested = video_ids.len(),
            returned_items = response.items.len(),
            "fetched video statistics"
        );

        Ok(response.items)
    }

    /// Retrieves a single video's snippet, or `None` if YouTube does not know the ID.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/videos/list>
    #[instrument(skip(self))]
    pub async fn get_video(&self, video_id: &str) -> eyre::Result<Option<Video>> {
        let response: VideoListResponse = self
            .get_json("videos", &[("part", "snippet"), ("id", video_id)])
            .await?;

        tracing::debug!(
            video_id,
            returned_items = response.items.len(),
            "fetched video metadata"
        );

        Ok(response.items.into_iter().next())
    }

    /// Runs a keyword search restricted to videos.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/search/list>
    #[instrument(skip(self))]
    pub async fn search_videos(&self, query: &str, max_results: u32) -> eyre::Result<Vec<SearchResult>> {
        let max_results = page_size(max_results);
        let response: SearchListResponse = self
            .get_json(
                "search",
                &[
                    ("part", "snippet"),
                    ("q", query),
                    ("type", "video"),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;

        tracing::debug!(
            total_results = response.page_info.total_results,
            returned_items = response.items.len(),
            "searched videos"
        );

        Ok(response.items)
    }

    /// Looks up several channels in one call.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/channels/list>
    #[instrument(skip(self), fields(count = channel_ids.len()))]
    pub async fn list_channels(&self, channel_ids: &[String]) -> eyre::Result<Vec<Channel>> {
        let ids = channel_ids.join(",");
        let response: ChannelListResponse = self
            .get_json("channels", &[("part", "snippet"), ("id", ids.as_str())])
            .await?;

        tracing::debug!(
            requested = channel_ids.len(),
            returned_items = response.items.len(),
            "fetched channels"
        );

        Ok(response.items)
    }
}

fn page_size(requested: u32) -> String {
    requested.clamp(1, MAX_PAGE_SIZE).to_string()
}
