//! YouTube Videos API types.

use crate::youtube_api::types::{ListResponse, Thumbnails};
use serde::{Deserialize, Serialize};

/// Response structure for the `videos.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos/list>
pub type VideoListResponse = ListResponse<Video>;

/// A `video` resource represents a YouTube video.
///
/// Which parts are present depends on the `part` parameter of the request, so both are optional.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#resource>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    /// The ID that YouTube uses to uniquely identify the video.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<VideoSnippet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<VideoStatistics>,
}

/// Basic details about the video.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#snippet>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

/// Statistics about the video.
///
/// YouTube encodes the counters as decimal strings and omits the ones the owner has hidden.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#statistics>
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    /// The number of times the video has been viewed.
    pub view_count: Option<String>,
    /// The number of users who have indicated that they liked the video.
    pub like_count: Option<String>,
    /// The number of comments for the video.
    pub comment_count: Option<String>,
}
