//! Command-line and environment configuration.
//!
//! Every flag can also be set through the environment variable named next to it, and `main`
//! loads a `.env` file before parsing, so a deployment normally only needs that file.

use crate::feed::{DEFAULT_FEED_SIZE, DEFAULT_SEARCH_SIZE};
use crate::gemini::{self, GeminiClient};
use crate::oauth::OAuthManager;
use crate::session::DEFAULT_IDLE_TTL;
use crate::summarizer::{RetryPolicy, Summarizer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

/// Settings of the `usumm` web server.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "usumm", version, about = "Your YouTube subscriptions as a feed, and videos as articles")]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "USUMM_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Externally visible base URL, e.g. `https://usumm.example.com`.
    ///
    /// Used to build the OAuth callback URL. When unset it is derived from the `Host` and
    /// `X-Forwarded-*` headers of each request.
    #[arg(long, env = "USUMM_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// OAuth client ID from the Google Cloud console.
    #[arg(long, env = "YOUTUBE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret matching `--client-id`.
    #[arg(long, env = "YOUTUBE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Subscriptions consulted for the home feed.
    #[arg(long, env = "USUMM_FEED_SIZE", default_value_t = DEFAULT_FEED_SIZE)]
    pub feed_size: u32,

    /// Results shown for a search.
    #[arg(long, env = "USUMM_SEARCH_SIZE", default_value_t = DEFAULT_SEARCH_SIZE)]
    pub search_size: u32,

    /// Idle time after which a browser session is forgotten, in seconds.
    #[arg(long, env = "USUMM_SESSION_TTL_SECS", default_value_t = DEFAULT_IDLE_TTL.as_secs())]
    pub session_ttl_secs: u64,

    /// Base URL of the YouTube Data API.
    #[arg(long, env = "YOUTUBE_API_BASE", default_value = crate::youtube_api::DEFAULT_API_BASE)]
    pub youtube_api_base: String,

    #[command(flatten)]
    pub gemini: GeminiArgs,

    /// Default log level; `RUST_LOG` directives take precedence.
    #[arg(long, env = "USUMM_LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,
}

impl ServerConfig {
    /// The OAuth manager, if both halves of the client registration are present.
    pub fn oauth_manager(&self) -> Option<OAuthManager> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some(OAuthManager::new(id, secret))
            }
            _ => None,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Session cookies are marked `Secure` when the public URL is https.
    pub fn secure_cookies(&self) -> bool {
        self.public_url
            .as_deref()
            .is_some_and(|url| url.starts_with("https://"))
    }
}

/// Gemini and retry settings, shared by the server and `usumm-summarize`.
#[derive(Debug, Clone, clap::Args)]
pub struct GeminiArgs {
    /// Gemini API key. Summaries fail with an error page when unset.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Model that writes the articles.
    #[arg(long, env = "GEMINI_MODEL", default_value = gemini::DEFAULT_MODEL)]
    pub gemini_model: String,

    /// Base URL of the Gemini API.
    #[arg(long, env = "GEMINI_API_BASE", default_value = gemini::DEFAULT_API_BASE)]
    pub gemini_api_base: String,

    /// Timeout of a single generation request, in seconds.
    #[arg(long, env = "GEMINI_TIMEOUT_SECS", default_value_t = gemini::DEFAULT_TIMEOUT.as_secs())]
    pub gemini_timeout_secs: u64,

    /// Attempts per summary, including the first.
    #[arg(long, env = "USUMM_SUMMARY_ATTEMPTS", default_value_t = RetryPolicy::default().max_attempts)]
    pub summary_attempts: u32,

    /// Wait before the first retry, in seconds. Doubles after every retry.
    #[arg(long, env = "USUMM_SUMMARY_BACKOFF_SECS", default_value_t = RetryPolicy::default().base_wait.as_secs())]
    pub summary_backoff_secs: u64,
}

impl GeminiArgs {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.summary_attempts,
            base_wait: Duration::from_secs(self.summary_backoff_secs),
        }
    }

    pub fn summarizer(&self) -> eyre::Result<Summarizer> {
        if self.gemini_api_key.as_deref().is_none_or(str::is_empty) {
            tracing::warn!("GEMINI_API_KEY is not set; summaries will fail");
        }
        let client = Arc::new(GeminiClient::new(
            self.gemini_api_key.clone(),
            &self.gemini_model,
            &self.gemini_api_base,
            Duration::from_secs(self.gemini_timeout_secs),
        )?);
        let model = client.model().to_string();
        let summarizer = Summarizer::new(client, self.retry_policy());
        tracing::info!(model = %model, policy = ?summarizer.policy(), "summarizer ready");
        Ok(summarizer)
    }
}
