use mockito::Matcher;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use usumm::credential::Credential;
use usumm::feed::{FeedMode, aggregate_feed};
use usumm::oauth::OAuthManager;
use usumm::youtube_api::{ApiError, YouTubeClient};

fn client(server: &mockito::ServerGuard, credential: Credential) -> YouTubeClient {
    YouTubeClient::new(credential, None, reqwest::Client::new(), server.url())
}

#[tokio::test]
async fn subscriptions_are_listed_with_bearer_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/subscriptions")
        .match_header("authorization", "Bearer ya29.token")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("part".into(), "snippet".into()),
            Matcher::UrlEncoded("mine".into(), "true".into()),
            Matcher::UrlEncoded("maxResults".into(), "20".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "kind": "youtube#subscriptionListResponse",
                "pageInfo": { "totalResults": 1, "resultsPerPage": 20 },
                "items": [{
                    "id": "sub1",
                    "snippet": {
                        "title": "Jon Gjengset",
                        "resourceId": { "kind": "youtube#channel", "channelId": "UC_iD0xppBwwsrM9DegC5cQQ" },
                        "thumbnails": { "default": { "url": "https://yt3.ggpht.com/jon" } }
                    }
                }]
            }"#,
        )
        .create_async()
        .await;

    let subscriptions = client(&server, Credential::new("ya29.token", None))
        .list_my_subscriptions(20)
        .await
        .unwrap();

    assert_eq!(subscriptions.len(), 1);
    assert_eq!(
        subscriptions[0].uploads_playlist_id(),
        "UU_iD0xppBwwsrM9DegC5cQQ"
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn unauthorized_status_is_an_auth_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/search")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"error":{"code":401,"message":"Invalid Credentials"}}"#)
        .create_async()
        .await;

    let err = client(&server, Credential::new("revoked", None))
        .search_videos("rust", 15)
        .await
        .unwrap_err();

    let api_error = err.downcast_ref::<ApiError>().unwrap();
    assert!(api_error.is_auth_failure());
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn quota_errors_are_not_auth_failures() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/videos")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"error":{"code":403,"message":"quotaExceeded"}}"#)
        .create_async()
        .await;

    let err = client(&server, Credential::new("tok", None))
        .get_video("abc")
        .await
        .unwrap_err();

    assert!(!err.downcast_ref::<ApiError>().unwrap().is_auth_failure());
}

#[tokio::test]
async fn unknown_video_is_none() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/videos")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("part".into(), "snippet".into()),
            Matcher::UrlEncoded("id".into(), "nope".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"kind":"youtube#videoListResponse","items":[]}"#)
        .create_async()
        .await;

    let video = client(&server, Credential::new("tok", None))
        .get_video("nope")
        .await
        .unwrap();
    assert!(video.is_none());
}

#[tokio::test]
async fn expired_token_is_refreshed_before_the_call() {
    let mut server = mockito::Server::new_async().await;
    let token = server
        .mock("POST", "/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"fresh","token_type":"Bearer","expires_in":3599}"#)
        .create_async()
        .await;
    let channels = server
        .mock("GET", "/channels")
        .match_header("authorization", "Bearer fresh")
        .match_query(Matcher::UrlEncoded("id".into(), "UCa,UCb".into()))
        .with_status(200)
        .with_body(r#"{"items":[]}"#)
        .create_async()
        .await;

    let oauth = OAuthManager::new("client", "secret").with_token_url(format!("{}/token", server.url()));
    let yt = YouTubeClient::new(
        Credential::new("stale", Some("refresh".into())).expired(),
        Some(Arc::new(oauth)),
        reqwest::Client::new(),
        server.url(),
    );

    yt.list_channels(&["UCa".to_string(), "UCb".to_string()])
        .await
        .unwrap();

    token.assert_async().await;
    channels.assert_async().await;
    let credential = yt.credential().await;
    assert_eq!(credential.access_token(), "fresh");
    assert_eq!(credential.refresh_token(), Some("refresh"));
}

#[tokio::test]
async fn revoked_refresh_token_fails_closed() {
    let mut server = mockito::Server::new_async().await;
    let _token = server
        .mock("POST", "/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;
    let subscriptions = server
        .mock("GET", "/subscriptions")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let oauth = OAuthManager::new("client", "secret").with_token_url(format!("{}/token", server.url()));
    let yt = YouTubeClient::new(
        Credential::new("stale", Some("revoked".into())).expired(),
        Some(Arc::new(oauth)),
        reqwest::Client::new(),
        server.url(),
    );

    let err = yt.list_my_subscriptions(20).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::Unauthenticated)
    ));
    subscriptions.assert_async().await;
}

#[tokio::test]
async fn subscription_feed_end_to_end() {
    let mut server = mockito::Server::new_async().await;
    let _subscriptions = server
        .mock("GET", "/subscriptions")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"items":[
                {"id":"s1","snippet":{"title":"Old","resourceId":{"channelId":"UCold"},
                  "thumbnails":{"default":{"url":"https://yt3.ggpht.com/old"}}}},
                {"id":"s2","snippet":{"title":"New","resourceId":{"channelId":"UCnew"},
                  "thumbnails":{"default":{"url":"https://yt3.ggpht.com/new"}}}},
                {"id":"s3","snippet":{"title":"Empty","resourceId":{"channelId":"UCempty"}}}
            ]}"#,
        )
        .create_async()
        .await;
    let _old = server
        .mock("GET", "/playlistItems")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("playlistId".into(), "UUold".into()),
            Matcher::UrlEncoded("maxResults".into(), "1".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"items":[{"snippet":{"publishedAt":"2024-01-01T00:00:00Z","title":"Rock &amp; Roll",
                "channelTitle":"Old","thumbnails":{"high":{"url":"https://i.ytimg.com/old.jpg"}}},
                "contentDetails":{"videoId":"vOld"}}]}"#,
        )
        .create_async()
        .await;
    let _new = server
        .mock("GET", "/playlistItems")
        .match_query(Matcher::UrlEncoded("playlistId".into(), "UUnew".into()))
        .with_status(200)
        .with_body(
            r#"{"items":[{"snippet":{"publishedAt":"2024-02-01T00:00:00Z","title":"Fresh",
                "channelTitle":"New","thumbnails":{"high":{"url":"https://i.ytimg.com/new.jpg"}}},
                "contentDetails":{"videoId":"vNew"}}]}"#,
        )
        .create_async()
        .await;
    let _empty = server
        .mock("GET", "/playlistItems")
        .match_query(Matcher::UrlEncoded("playlistId".into(), "UUempty".into()))
        .with_status(200)
        .with_body(r#"{"items":[]}"#)
        .create_async()
        .await;
    let stats = server
        .mock("GET", "/videos")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("part".into(), "statistics".into()),
            Matcher::UrlEncoded("id".into(), "vOld,vNew".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"items":[{"id":"vNew","statistics":{"likeCount":"10","commentCount":"2"}}]}"#)
        .expect(1)
        .create_async()
        .await;

    let yt = client(&server, Credential::new("tok", None));
    let feed = aggregate_feed(&yt, &FeedMode::Subscriptions, 20)
        .await
        .unwrap();

    let summary: Vec<_> = feed
        .iter()
        .map(|v| (v.video_id.as_str(), v.title.as_str(), v.like_count.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![("vNew", "Fresh", "10"), ("vOld", "Rock & Roll", "0")]
    );
    assert_eq!(
        feed[1].channel_avatar_url.as_deref(),
        Some("https://yt3.ggpht.com/old")
    );
    stats.assert_async().await;
}
