//! HTML pages.
//!
//! Everything coming from YouTube is escaped. The generated article is the exception: it is
//! HTML by construction and is embedded as is.

use crate::feed::VideoSummary;
use crate::summarizer::{ArticleResult, SummarizeError};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

const APP_NAME: &str = "usumm";

fn layout(title: &str, query: Option<&str>, signed_in: bool, body: &str) -> String {
    let nav = if signed_in {
        format!(
            r#"<form action="/search" method="get" role="search">
        <input type="search" name="q" placeholder="Search YouTube" value="{q}">
        <button type="submit">Search</button>
      </form>
      <a href="/logout">Log out</a>"#,
            q = attr(query.unwrap_or_default()),
        )
    } else {
        String::new()
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <link rel="stylesheet" href="/static/style.css">
  </head>
  <body>
    <header>
      <h1><a href="/">{APP_NAME}</a></h1>
      {nav}
    </header>
    <main>
{body}
    </main>
    <script>
      if ('serviceWorker' in navigator) {{
        navigator.serviceWorker.register('/static/service-worker.js', {{ scope: '/' }});
      }}
    </script>
  </body>
</html>
"#,
        title = text(title),
    )
}

pub fn login_page() -> String {
    layout(
        APP_NAME,
        None,
        false,
        r#"      <section class="login">
        <p>Your YouTube subscriptions, newest first, with an article for every video.</p>
        <a class="button" href="/login">Sign in with Google</a>
      </section>"#,
    )
}

/// The subscription feed, or the results of a search when `query` is set.
pub fn feed_page(videos: &[VideoSummary], query: Option<&str>) -> String {
    let title = match query {
        Some(q) => format!("{q} - {APP_NAME}"),
        None => APP_NAME.to_string(),
    };

    let body = if videos.is_empty() {
        r#"      <p class="empty">No videos found.</p>"#.to_string()
    } else {
        let cards: String = videos.iter().map(card).collect();
        format!("      <section class=\"feed\">\n{cards}      </section>")
    };

    layout(&title, query, true, &body)
}

fn card(video: &VideoSummary) -> String {
    let avatar = video
        .channel_avatar_url
        .as_deref()
        .map(|url| format!(r#"<img src="{}" alt="" loading="lazy">"#, attr(url)))
        .unwrap_or_default();

    format!(
        r#"        <article class="card">
          <a href="https://www.youtube.com/watch?v={id}" target="_blank" rel="noopener">
            <img class="thumbnail" src="{thumb}" alt="" loading="lazy">
          </a>
          <div class="body">
            <h2>{title}</h2>
            <div class="channel">{avatar}<span>{channel}</span></div>
            <div class="stats">
              <time datetime="{published}">{published_day}</time>
              · {likes} likes · {comments} comments
            </div>
            <div class="actions">
              <a class="button" href="/summarize/{id}">Read as article</a>
            </div>
          </div>
        </article>
"#,
        id = attr(&video.video_id),
        thumb = attr(&video.thumbnail_url),
        title = text(&video.title),
        channel = text(&video.channel_title),
        published = video.published_at,
        published_day = video.published_at.strftime("%Y-%m-%d"),
        likes = text(&video.like_count),
        comments = text(&video.comment_count),
    )
}

/// In-band replacement for an article that could not be written.
pub fn error_fragment(err: &SummarizeError) -> String {
    format!(
        "<h2>{}</h2><p>{}</p>",
        err.heading(),
        text(&err.to_string())
    )
}

pub fn article_page(result: &ArticleResult) -> String {
    let article = match &result.article {
        Ok(html) => html.clone(),
        Err(e) => error_fragment(e),
    };

    let body = format!(
        r#"      <article>
        <img class="hero" src="{thumb}" alt="">
        <p class="byline">{title} · {channel} ·
          <a href="https://www.youtube.com/watch?v={id}" target="_blank" rel="noopener">Watch on YouTube</a>
        </p>
        {article}
      </article>"#,
        thumb = attr(&result.thumbnail_url),
        title = text(&result.title),
        channel = text(&result.channel_title),
        id = attr(&result.video_id),
    );

    layout(&result.title, None, true, &body)
}
