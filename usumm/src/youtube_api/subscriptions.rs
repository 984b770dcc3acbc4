//! YouTube Subscriptions API types.

use crate::youtube_api::types::{ListResponse, Thumbnails};
use serde::{Deserialize, Serialize};

/// Response structure for the `subscriptions.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/subscriptions/list>
pub type SubscriptionListResponse = ListResponse<Subscription>;

/// A `subscription` resource links the authenticated user to a channel they follow.
///
/// See: <https://developers.google.com/youtube/v3/docs/subscriptions#resource>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub snippet: SubscriptionSnippet,
}

/// See: <https://developers.google.com/youtube/v3/docs/subscriptions#snippet>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSnippet {
    /// Title of the subscribed channel.
    pub title: String,
    /// The channel the subscription points at.
    pub resource_id: ResourceId,
    /// Avatars of the subscribed channel.
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub channel_id: String,
}

impl Subscription {
    /// ID of the channel's auto-generated uploads playlist.
    ///
    /// Channel IDs start with `UC`; the matching uploads playlist swaps that prefix for `UU`.
    pub fn uploads_playlist_id(&self) -> String {
        uploads_playlist_id(&self.snippet.resource_id.channel_id)
    }
}

/// Derives the uploads playlist ID from a channel ID.
pub fn uploads_playlist_id(channel_id: &str) -> String {
    let rest = channel_id.get(2..).unwrap_or("");
    format!("UU{rest}")
}
