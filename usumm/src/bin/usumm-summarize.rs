//! Writes the article for one video to stdout, without the web server or a Google sign-in.

use clap::Parser;
use tracing::level_filters::LevelFilter;
use usumm::config::GeminiArgs;

#[derive(Debug, Parser)]
#[command(name = "usumm-summarize", version, about = "Turn a YouTube video into an HTML article")]
struct Args {
    /// ID of the video, as in `watch?v=<ID>`.
    video_id: String,

    /// Channel name to mention in the introduction.
    #[arg(long, default_value = "the creator")]
    channel: String,

    #[command(flatten)]
    gemini: GeminiArgs,

    /// Default log level; `RUST_LOG` directives take precedence.
    #[arg(long, env = "USUMM_LOG_LEVEL", default_value = "warn")]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let _ = dotenv::dotenv();
    let args = Args::parse();
    usumm::init_tracing(args.log_level);

    let summarizer = args.gemini.summarizer()?;
    let video_url = usumm::summarizer::watch_url(&args.video_id);
    match summarizer
        .summarize(&args.video_id, &args.channel, &video_url)
        .await
    {
        Ok(html) => println!("{html}"),
        Err(e) => {
            println!("{}", usumm::render::error_fragment(&e));
            std::process::exit(1);
        }
    }
    Ok(())
}
