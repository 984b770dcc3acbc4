//! Feed aggregation.
//!
//! Turns a handful of YouTube list calls into one enriched, newest-first list of
//! [`VideoSummary`] entries, either for the signed-in user's subscriptions or for a keyword
//! search. Calls are issued one after another; nothing is cached or retried here, and any API
//! failure is handed straight back to the caller.

use crate::youtube_api::{
    Channel, PlaylistItem, SearchResult, Subscription, Video, YouTubeClient,
};
use eyre::Context;
use jiff::Timestamp;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Default number of subscriptions consulted for the home feed.
pub const DEFAULT_FEED_SIZE: u32 = 20;

/// Default number of keyword search results.
pub const DEFAULT_SEARCH_SIZE: u32 = 15;

/// The read-only slice of the video platform the aggregator depends on.
#[async_trait::async_trait]
pub trait VideoPlatform: Send + Sync {
    /// First page of the caller's subscriptions.
    async fn my_subscriptions(&self, max_results: u32) -> eyre::Result<Vec<Subscription>>;

    /// Newest `max_results` items of a playlist.
    async fn playlist_items(&self, playlist_id: &str, max_results: u32)
    -> eyre::Result<Vec<PlaylistItem>>;

    /// Statistics for all `video_ids` in a single call.
    async fn video_statistics(&self, video_ids: &[String]) -> eyre::Result<Vec<Video>>;

    /// Keyword search over videos.
    async fn search_videos(&self, query: &str, max_results: u32) -> eyre::Result<Vec<SearchResult>>;

    /// Snippets for all `channel_ids` in a single call.
    async fn channels(&self, channel_ids: &[String]) -> eyre::Result<Vec<Channel>>;
}

#[async_trait::async_trait]
impl VideoPlatform for YouTubeClient {
    async fn my_subscriptions(&self, max_results: u32) -> eyre::Result<Vec<Subscription>> {
        self.list_my_subscriptions(max_results).await
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
    ) -> eyre::Result<Vec<PlaylistItem>> {
        self.list_playlist_items(playlist_id, max_results).await
    }

    async fn video_statistics(&self, video_ids: &[String]) -> eyre::Result<Vec<Video>> {
        self.list_video_statistics(video_ids).await
    }

    async fn search_videos(&self, query: &str, max_results: u32) -> eyre::Result<Vec<SearchResult>> {
        YouTubeClient::search_videos(self, query, max_results).await
    }

    async fn channels(&self, channel_ids: &[String]) -> eyre::Result<Vec<Channel>> {
        self.list_channels(channel_ids).await
    }
}

/// Which feed to assemble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMode {
    /// Newest upload of every subscribed channel.
    Subscriptions,
    /// Videos matching a keyword query.
    Search(String),
}

/// One card of the feed.
///
/// Serializes with the field names the feed download has always used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoSummary {
    pub video_id: String,
    pub title: String,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,
    #[serde(rename = "channelTitle")]
    pub channel_title: String,
    #[serde(rename = "channel_avatar")]
    pub channel_avatar_url: Option<String>,
    pub description: String,
    pub published_at: Timestamp,
    pub like_count: String,
    pub comment_count: String,
    #[serde(skip)]
    pub(crate) channel_id: Option<String>,
}

impl VideoSummary {
    fn from_upload(subscription: &Subscription, item: PlaylistItem) -> Self {
        let snippet = item.snippet;
        Self {
            video_id: item.content_details.video_id,
            title: decode_entities(&snippet.title),
            thumbnail_url: snippet.thumbnails.high_url().unwrap_or_default().to_string(),
            channel_title: snippet.channel_title,
            channel_avatar_url: subscription
                .snippet
                .thumbnails
                .default_url()
                .map(str::to_string),
            description: decode_entities(&snippet.description),
            published_at: snippet.published_at,
            like_count: "0".to_string(),
            comment_count: "0".to_string(),
            channel_id: Some(subscription.snippet.resource_id.channel_id.clone()),
        }
    }

    fn from_search_result(result: SearchResult) -> Option<Self> {
        let video_id = result.id.video_id?;
        let snippet = result.snippet;
        Some(Self {
            video_id,
            title: decode_entities(&snippet.title),
            thumbnail_url: snippet.thumbnails.high_url().unwrap_or_default().to_string(),
            channel_title: snippet.channel_title,
            channel_avatar_url: None,
            description: decode_entities(&snippet.description),
            published_at: snippet.published_at,
            like_count: "0".to_string(),
            comment_count: "0".to_string(),
            channel_id: Some(snippet.channel_id),
        })
    }
}

/// The YouTube API returns titles and descriptions with HTML entities escaped.
fn decode_entities(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

/// Assembles a feed for `mode`.
///
/// `max_items` bounds the subscription page (subscriptions mode) or the search page (search
/// mode). The result is sorted newest first; entries published at the same instant keep the
/// order in which they were fetched.
#[tracing::instrument(skip(platform))]
pub async fn aggregate_feed<P>(
    platform: &P,
    mode: &FeedMode,
    max_items: u32,
) -> eyre::Result<Vec<VideoSummary>>
where
    P: VideoPlatform + ?Sized,
{
    let mut videos = match mode {
        FeedMode::Subscriptions => latest_uploads(platform, max_items).await?,
        FeedMode::Search(query) => {
            let mut videos = search(platform, query, max_items).await?;
            attach_channel_avatars(platform, &mut videos).await?;
            videos
        }
    };

    attach_statistics(platform, &mut videos).await?;

    // sort_by is stable, so ties keep fetch order
    videos.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    tracing::debug!(count = videos.len(), "assembled feed");
    Ok(videos)
}

async fn latest_uploads<P>(platform: &P, max_items: u32) -> eyre::Result<Vec<VideoSummary>>
where
    P: VideoPlatform + ?Sized,
{
    let subscriptions = platform
        .my_subscriptions(max_items)
        .await
        .context("list subscriptions")?;

    let mut videos = Vec::with_capacity(subscriptions.len());
    for subscription in &subscriptions {
        let uploads = subscription.uploads_playlist_id();
        let items = platform
            .playlist_items(&uploads, 1)
            .await
            .with_context(|| format!("fetch latest upload of {}", subscription.snippet.title))?;

        match items.into_iter().next() {
            Some(item) => videos.push(VideoSummary::from_upload(subscription, item)),
            None => tracing::trace!(playlist_id = %uploads, "channel has no uploads"),
        }
    }

    Ok(videos)
}

async fn search<P>(platform: &P, query: &str, max_items: u32) -> eyre::Result<Vec<VideoSummary>>
where
    P: VideoPlatform + ?Sized,
{
    let results = platform
        .search_videos(query, max_items)
        .await
        .context("search videos")?;

    Ok(results
        .into_iter()
        .filter_map(VideoSummary::from_search_result)
        .collect())
}

/// Resolves channel avatars with one lookup over the distinct channel IDs.
async fn attach_channel_avatars<P>(platform: &P, videos: &mut [VideoSummary]) -> eyre::Result<()>
where
    P: VideoPlatform + ?Sized,
{
    if videos.is_empty() {
        return Ok(());
    }

    let mut seen = HashSet::new();
    let channel_ids: Vec<String> = videos
        .iter()
        .filter_map(|v| v.channel_id.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect();

    let channels = platform
        .channels(&channel_ids)
        .await
        .context("look up channels")?;

    let avatars: HashMap<String, String> = channels
        .into_iter()
        .filter_map(|c| {
            let url = c.snippet.thumbnails.default_url()?.to_string();
            Some((c.id, url))
        })
        .collect();

    for video in videos {
        video.channel_avatar_url = video
            .channel_id
            .as_ref()
            .and_then(|id| avatars.get(id))
            .cloned();
    }

    Ok(())
}

/// Merges like and comment counts from one batched statistics call.
///
/// Videos missing from the response (deleted, private) or with hidden counters keep `"0"`.
async fn attach_statistics<P>(platform: &P, videos: &mut [VideoSummary]) -> eyre::Result<()>
where
    P: VideoPlatform + ?Sized,
{
    if videos.is_empty() {
        return Ok(());
    }

    let video_ids: Vec<String> = videos.iter().map(|v| v.video_id.clone()).collect();
    let stats: HashMap<String, Video> = platform
        .video_statistics(&video_ids)
        .await
        .context("fetch video statistics")?
        .into_iter()
        .map(|v| (v.id.clone(), v))
        .collect();

    for video in videos {
        let statistics = stats.get(&video.video_id).and_then(|v| v.statistics.as_ref());
        video.like_count = statistics
            .and_then(|s| s.like_count.clone())
            .unwrap_or_else(|| "0".to_string());
        video.comment_count = statistics
            .and_then(|s| s.comment_count.clone())
            .unwrap_or_else(|| "0".to_string());
    }

    Ok(())
}
