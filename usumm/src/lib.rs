//! usumm: a YouTube subscription feed with Gemini-written articles.
//!
//! The server signs users in with Google, lists the newest upload of every channel they follow
//! (or the results of a search) and, on request, has Gemini turn a video into a blog post.

pub mod config;
pub mod credential;
pub mod feed;
pub mod gemini;
pub mod oauth;
pub mod render;
pub mod session;
pub mod summarizer;
pub mod web;
pub mod youtube_api;

use std::io::IsTerminal;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` directives win over `default_level`.
pub fn init_tracing(default_level: LevelFilter) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .init();
}
