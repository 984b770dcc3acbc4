//! The HTTP front end.
//!
//! A hyper HTTP/1 server with a hand-written router. Handlers take a `Request<()>`: every route
//! is a GET and nothing reads a request body.

use crate::config::ServerConfig;
use crate::credential::Credential;
use crate::feed::{FeedMode, VideoSummary, aggregate_feed};
use crate::oauth::OAuthManager;
use crate::render;
use crate::session::{self, SessionStore};
use crate::summarizer::{ArticleResult, Summarizer, watch_url};
use crate::youtube_api::{ApiError, ClientFactory, YouTubeClient};
use eyre::Context;
use http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW, CACHE_CONTROL, CONTENT_TYPE, HOST, LOCATION, SET_COOKIE,
};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::borrow::Cow;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

const STYLE_CSS: &str = include_str!("../static/style.css");
const SERVICE_WORKER_JS: &str = include_str!("../static/service-worker.js");

const OAUTH_NOT_CONFIGURED: &str = "Google OAuth is not configured properly.";

pub type Body = Full<Bytes>;

/// Everything the handlers share.
#[derive(Debug)]
pub struct AppState {
    pub sessions: SessionStore,
    /// `None` when no OAuth client is configured; sign-in routes then answer 500.
    pub oauth: Option<Arc<OAuthManager>>,
    pub youtube: ClientFactory,
    pub summarizer: Summarizer,
    /// Externally visible base URL, without a trailing slash.
    pub public_url: Option<String>,
    pub feed_size: u32,
    pub search_size: u32,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> eyre::Result<Self> {
        let oauth = config.oauth_manager().map(Arc::new);
        if oauth.is_none() {
            tracing::warn!("YOUTUBE_CLIENT_ID/YOUTUBE_CLIENT_SECRET not set; sign-in is disabled");
        }

        Ok(Self {
            sessions: SessionStore::new(config.session_ttl(), config.secure_cookies()),
            youtube: ClientFactory::new(oauth.clone(), &config.youtube_api_base)
                .context("set up YouTube client")?,
            oauth,
            summarizer: config
                .gemini
                .summarizer()
                .context("set up summarizer")?,
            public_url: config
                .public_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
            feed_size: config.feed_size,
            search_size: config.search_size,
        })
    }

    /// A YouTube client for the signed-in session `session_id`, if it is one.
    async fn youtube_client(&self, session_id: Option<&str>) -> Option<SignedIn> {
        let id = session_id?.to_string();
        let issued = self.sessions.credential(&id).await?;
        let youtube = self.youtube.authorized_client(Some(issued.clone()))?;
        Some(SignedIn {
            id,
            issued,
            youtube,
        })
    }

    /// Stores a refreshed credential back into the session.
    ///
    /// Skipped when nothing changed, and dropped if the session no longer holds the credential
    /// the request started from (it was signed out or refreshed by another request).
    async fn remember(&self, signed_in: &SignedIn) {
        let current = signed_in.youtube.credential().await;
        if current == signed_in.issued {
            return;
        }
        let stored = self
            .sessions
            .store_credential(&signed_in.id, &signed_in.issued, current)
            .await;
        if !stored {
            tracing::debug!("session changed during the request; refreshed token discarded");
        }
    }

    /// Turns a failed YouTube call into a response.
    ///
    /// Authentication failures sign the session out.
    async fn youtube_failure(
        &self,
        session_id: &str,
        err: eyre::Report,
        format: Format,
    ) -> Response<Body> {
        if is_auth_failure(&err) {
            tracing::info!("YouTube rejected the session credential: {err:#}");
            self.sessions.clear_credential(session_id).await;
            return match format {
                Format::Html => redirect("/login"),
                Format::Json => unauthorized_json(),
            };
        }

        tracing::error!("YouTube request failed: {err:#}");
        match format {
            Format::Html => text(StatusCode::BAD_GATEWAY, "Failed to reach YouTube."),
            Format::Json => json(
                StatusCode::BAD_GATEWAY,
                &ErrorBody {
                    error: "Failed to reach YouTube",
                },
            ),
        }
    }

    /// Base URL browsers use to reach us.
    ///
    /// Without a configured public URL this trusts one proxy hop for scheme and host.
    fn external_base(&self, headers: &HeaderMap) -> Cow<'_, str> {
        if let Some(url) = &self.public_url {
            return Cow::Borrowed(url);
        }

        let first = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let scheme = first("x-forwarded-proto").unwrap_or("http");
        let host = first("x-forwarded-host")
            .or_else(|| first(HOST.as_str()))
            .unwrap_or("localhost");
        Cow::Owned(format!("{scheme}://{host}"))
    }
}

/// A request's view of a signed-in session.
struct SignedIn {
    id: String,
    /// The credential as it was when the request started.
    issued: Credential,
    youtube: YouTubeClient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Html,
    Json,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

fn is_auth_failure(err: &eyre::Report) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<ApiError>())
        .any(ApiError::is_auth_failure)
}

/// Accepts connections on `listener` until `shutdown` resolves.
///
/// In-flight requests are allowed to finish before this returns.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> eyre::Result<()>
where
    F: Future<Output = ()>,
{
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut shutdown = std::pin::pin!(shutdown);

    loop {
        let (conn, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("failed to accept connection: {e}");
                    continue;
                }
            },
            () = &mut shutdown => break,
        };

        let state = Arc::clone(&state);
        let mut stop = stop_rx.clone();
        tokio::spawn(async move {
            let conn = TokioIo::new(conn);
            let service = service_fn(move |req: Request<Incoming>| {
                let state = Arc::clone(&state);
                async move { Ok::<_, Infallible>(handle(&state, req.map(|_| ())).await) }
            });
            let mut serve = std::pin::pin!(http1::Builder::new().serve_connection(conn, service));

            let result = tokio::select! {
                exit = &mut serve => exit,
                _ = stop.changed() => {
                    serve.as_mut().graceful_shutdown();
                    serve.await
                }
            };
            if let Err(e) = result {
                tracing::debug!(%peer, "connection ended with error: {e}");
            }
        });
    }

    tracing::info!("shutting down, waiting for open connections");
    drop(stop_rx);
    let _ = stop_tx.send(true);
    // every connection task holds a receiver
    stop_tx.closed().await;
    Ok(())
}

/// Routes one request.
pub async fn handle(state: &AppState, req: Request<()>) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = route(state, &req).await;
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

    tracing::debug!(%method, path = %path, status = response.status().as_u16(), "handled request");
    response
}

async fn route(state: &AppState, req: &Request<()>) -> Response<Body> {
    if req.method() != Method::GET {
        let mut response = text(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET"));
        return response;
    }

    let session_id = session::session_id(req.headers());
    let session_id = session_id.as_deref();
    let path = req.uri().path();

    if let Some(video_id) = path.strip_prefix("/summarize/") {
        return summarize(state, session_id, video_id).await;
    }

    match path {
        "/" => index(state, session_id).await,
        "/download_feed" => download_feed(state, session_id).await,
        "/search" => search(state, session_id, req.uri().query()).await,
        "/login" => login(state, session_id, req.headers()).await,
        "/callback" => callback(state, session_id, req.uri().query()).await,
        "/logout" => logout(state, session_id).await,
        "/healthz" => text(StatusCode::OK, "ok"),
        "/static/style.css" => asset("text/css; charset=utf-8", STYLE_CSS),
        "/static/service-worker.js" => asset("text/javascript; charset=utf-8", SERVICE_WORKER_JS),
        _ => text(StatusCode::NOT_FOUND, "Not found"),
    }
}

async fn index(state: &AppState, session_id: Option<&str>) -> Response<Body> {
    let Some(signed_in) = state.youtube_client(session_id).await else {
        return html(render::login_page());
    };

    match aggregate_feed(&signed_in.youtube, &FeedMode::Subscriptions, state.feed_size).await {
        Ok(videos) => {
            state.remember(&signed_in).await;
            html(render::feed_page(&videos, None))
        }
        Err(e) => state.youtube_failure(&signed_in.id, e, Format::Html).await,
    }
}

async fn download_feed(state: &AppState, session_id: Option<&str>) -> Response<Body> {
    let Some(signed_in) = state.youtube_client(session_id).await else {
        return unauthorized_json();
    };

    match aggregate_feed(&signed_in.youtube, &FeedMode::Subscriptions, state.feed_size).await {
        Ok(videos) => {
            state.remember(&signed_in).await;
            json::<Vec<VideoSummary>>(StatusCode::OK, &videos)
        }
        Err(e) => state.youtube_failure(&signed_in.id, e, Format::Json).await,
    }
}

async fn search(state: &AppState, session_id: Option<&str>, query: Option<&str>) -> Response<Body> {
    let q = query_param(query, "q");
    let q = q.as_deref().map(str::trim).unwrap_or_default();
    if q.is_empty() {
        return redirect("/");
    }

    let Some(signed_in) = state.youtube_client(session_id).await else {
        return redirect("/login");
    };

    let mode = FeedMode::Search(q.to_string());
    match aggregate_feed(&signed_in.youtube, &mode, state.search_size).await {
        Ok(videos) => {
            state.remember(&signed_in).await;
            html(render::feed_page(&videos, Some(q)))
        }
        Err(e) => state.youtube_failure(&signed_in.id, e, Format::Html).await,
    }
}

async fn summarize(state: &AppState, session_id: Option<&str>, video_id: &str) -> Response<Body> {
    let Some(signed_in) = state.youtube_client(session_id).await else {
        return redirect("/login");
    };

    if !is_video_id(video_id) {
        return text(StatusCode::NOT_FOUND, "Video not found");
    }

    let video = match signed_in.youtube.get_video(video_id).await {
        Ok(video) => video,
        Err(e) => return state.youtube_failure(&signed_in.id, e, Format::Html).await,
    };
    state.remember(&signed_in).await;

    let Some(snippet) = video.and_then(|v| v.snippet) else {
        return text(StatusCode::NOT_FOUND, "Video not found");
    };

    let article = state
        .summarizer
        .summarize(video_id, &snippet.channel_title, &watch_url(video_id))
        .await;

    html(render::article_page(&ArticleResult {
        video_id: video_id.to_string(),
        title: snippet.title,
        thumbnail_url: snippet.thumbnails.high_url().unwrap_or_default().to_string(),
        channel_title: snippet.channel_title,
        article,
    }))
}

async fn login(state: &AppState, session_id: Option<&str>, headers: &HeaderMap) -> Response<Body> {
    let Some(oauth) = &state.oauth else {
        return text(StatusCode::INTERNAL_SERVER_ERROR, OAUTH_NOT_CONFIGURED);
    };

    let callback_url = format!("{}/callback", state.external_base(headers));
    let (auth_url, pending) = match oauth.authorize_redirect(&callback_url) {
        Ok(redirect) => redirect,
        Err(e) => {
            tracing::error!("failed to start sign-in: {e:#}");
            return text(StatusCode::INTERNAL_SERVER_ERROR, OAUTH_NOT_CONFIGURED);
        }
    };

    let session_id = state.sessions.begin_login(session_id, pending).await;
    with_cookie(redirect(auth_url.as_str()), &state.sessions.cookie(&session_id))
}

async fn callback(state: &AppState, session_id: Option<&str>, query: Option<&str>) -> Response<Body> {
    let Some(oauth) = &state.oauth else {
        return text(StatusCode::INTERNAL_SERVER_ERROR, OAUTH_NOT_CONFIGURED);
    };

    let Some(session_id) = session_id else {
        return text(StatusCode::BAD_REQUEST, "No sign-in in progress.");
    };
    let pending = state.sessions.take_pending(session_id).await;

    if let Some(error) = query_param(query, "error") {
        tracing::info!(%error, "sign-in was not completed");
        return redirect("/");
    }

    let Some(pending) = pending else {
        return text(StatusCode::BAD_REQUEST, "No sign-in in progress.");
    };
    let state_matches = query_param(query, "state").is_some_and(|s| pending.matches_state(&s));
    if !state_matches {
        tracing::warn!("OAuth callback with mismatched state");
        return text(StatusCode::BAD_REQUEST, "Invalid sign-in state.");
    }
    let Some(code) = query_param(query, "code") else {
        return text(StatusCode::BAD_REQUEST, "No authorization code.");
    };

    match oauth.authorize_access_token(&code, pending).await {
        Ok(credential) => {
            let session_id = state.sessions.complete_login(session_id, credential).await;
            tracing::info!("user signed in");
            with_cookie(redirect("/"), &state.sessions.cookie(&session_id))
        }
        Err(e) => {
            tracing::error!("OAuth code exchange failed: {e:#}");
            text(StatusCode::BAD_GATEWAY, "Sign-in with Google failed.")
        }
    }
}

async fn logout(state: &AppState, session_id: Option<&str>) -> Response<Body> {
    if let Some(session_id) = session_id {
        state.sessions.clear_credential(session_id).await;
    }
    redirect("/")
}

/// YouTube video IDs are URL-safe base64.
fn is_video_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    form_urlencoded::parse(query.unwrap_or("").as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn response(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Body> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn html(body: String) -> Response<Body> {
    response(StatusCode::OK, "text/html; charset=utf-8", body)
}

fn text(status: StatusCode, body: &'static str) -> Response<Body> {
    response(status, "text/plain; charset=utf-8", body)
}

fn json<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(body) => response(status, "application/json", body),
        Err(e) => {
            tracing::error!("failed to serialize response: {e}");
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn unauthorized_json() -> Response<Body> {
    json(
        StatusCode::UNAUTHORIZED,
        &ErrorBody {
            error: "Unauthorized",
        },
    )
}

fn asset(content_type: &'static str, body: &'static str) -> Response<Body> {
    let mut response = response(StatusCode::OK, content_type, body);
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

fn redirect(location: &str) -> Response<Body> {
    let Ok(location) = HeaderValue::try_from(location) else {
        tracing::error!(location, "refusing to redirect to invalid location");
        return text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    };
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::FOUND;
    response.headers_mut().insert(LOCATION, location);
    response
}

fn with_cookie(mut response: Response<Body>, cookie: &str) -> Response<Body> {
    match HeaderValue::try_from(cookie) {
        Ok(cookie) => {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        Err(e) => tracing::error!("invalid session cookie: {e}"),
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_ids() {
        assert!(is_video_id("dQw4w9WgXcQ"));
        assert!(is_video_id("a-b_c"));
        assert!(!is_video_id(""));
        assert!(!is_video_id("abc/def"));
        assert!(!is_video_id("abc%20def"));
    }

    #[test]
    fn query_params_are_decoded() {
        assert_eq!(
            query_param(Some("q=rust+async&x=1"), "q").as_deref(),
            Some("rust async")
        );
        assert_eq!(query_param(Some("q=caf%C3%A9"), "q").as_deref(), Some("café"));
        assert_eq!(query_param(None, "q"), None);
    }

    #[test]
    fn auth_failures_are_found_through_context() {
        let report = eyre::Report::new(ApiError::Unauthenticated).wrap_err("list subscriptions");
        assert!(is_auth_failure(&report));

        let forbidden = eyre::Report::new(ApiError::Status {
            endpoint: "search".into(),
            status: StatusCode::FORBIDDEN,
            body: "quotaExceeded".into(),
        });
        assert!(!is_auth_failure(&forbidden));
        assert!(!is_auth_failure(&eyre::eyre!("connection reset")));
    }

    #[test]
    fn redirect_sets_location() {
        let response = redirect("/login");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/login");
    }
}
