//! YouTube Data API v3 client library.
//!
//! Only the read-only endpoints behind the feed are covered:
//!
//! - [`subscriptions`]: the channels the signed-in user follows
//! - [`playlist_items`]: the newest upload of a channel, through its uploads playlist
//! - [`videos`]: per-video statistics and snippets, batched by ID
//! - [`search`]: keyword search restricted to videos
//! - [`channels`]: channel avatars, batched by ID
//!
//! Every call goes through [`YouTubeClient`], which owns the session credential and refreshes
//! it transparently. Failures are [`eyre::Report`]s; those that callers must react to carry an
//! [`ApiError`].

pub mod channels;
pub mod client;
pub mod playlist_items;
pub mod search;
pub mod subscriptions;
pub mod types;
pub mod videos;

// Re-export main types for convenience
pub use client::{ApiError, ClientFactory, DEFAULT_API_BASE, YouTubeClient};
pub use types::{ListResponse, PageInfo, Thumbnail, Thumbnails};

pub use channels::{Channel, ChannelSnippet};
pub use playlist_items::{PlaylistItem, PlaylistItemContentDetails, PlaylistItemSnippet};
pub use search::{SearchResult, SearchResultId, SearchResultSnippet};
pub use subscriptions::{ResourceId, Subscription, SubscriptionSnippet, uploads_playlist_id};
pub use videos::{Video, VideoSnippet, VideoStatistics};
