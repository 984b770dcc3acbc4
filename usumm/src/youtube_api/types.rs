//! Shared types for the YouTube API client.

use serde::{Deserialize, Serialize};

/// Paging details for lists of resources.
///
/// Includes the total number of items available and the number of resources
/// returned in a single page response.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// The total number of results in the result set.
    #[serde(default)]
    pub total_results: u32,
    /// The number of results included in the API response.
    #[serde(default)]
    pub results_per_page: u32,
}

/// A single thumbnail image.
///
/// See: <https://developers.google.com/youtube/v3/docs/thumbnails>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// The set of thumbnail images attached to a resource, keyed by size.
///
/// Which sizes are present depends on the resource; channel snippets usually carry `default`,
/// `medium` and `high`, while videos may add `standard` and `maxres`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Thumbnails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Thumbnail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<Thumbnail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Thumbnail>,
}

impl Thumbnails {
    /// URL of the largest of the `high`/`medium`/`default` thumbnails.
    pub fn high_url(&self) -> Option<&str> {
        self.high
            .as_ref()
            .or(self.medium.as_ref())
            .or(self.default.as_ref())
            .map(|t| t.url.as_str())
    }

    /// URL of the smallest thumbnail, as used for channel avatars.
    pub fn default_url(&self) -> Option<&str> {
        self.default
            .as_ref()
            .or(self.medium.as_ref())
            .or(self.high.as_ref())
            .map(|t| t.url.as_str())
    }
}

/// Generic shape shared by every `*.list` response this crate consumes.
///
/// YouTube omits `items` entirely for some empty results, hence the default.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    /// Identifies the API resource's type, e.g. `youtube#videoListResponse`.
    #[serde(default)]
    pub kind: String,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub page_info: PageInfo,
    /// Token that can be used as the value of the pageToken parameter to retrieve the next page in the result set.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_url_falls_back_to_smaller_sizes() {
        let thumbs: Thumbnails = serde_json::from_value(serde_json::json!({
            "default": { "url": "https://i.ytimg.com/default.jpg" },
            "medium": { "url": "https://i.ytimg.com/medium.jpg" }
        }))
        .unwrap();
        assert_eq!(thumbs.high_url(), Some("https://i.ytimg.com/medium.jpg"));
        assert_eq!(thumbs.default_url(), Some("https://i.ytimg.com/default.jpg"));
        assert_eq!(Thumbnails::default().high_url(), None);
    }

    #[test]
    fn list_response_tolerates_missing_items() {
        let resp: ListResponse<serde_json::Value> =
            serde_json::from_str(r#"{"kind":"youtube#videoListResponse","pageInfo":{"totalResults":0,"resultsPerPage":0}}"#)
                .unwrap();
        assert!(resp.items.is_empty());
        assert!(resp.next_page_token.is_none());
    }
}
