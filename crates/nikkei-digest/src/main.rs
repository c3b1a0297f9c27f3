use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use shared::{report_setup_failure, setup_notifier, Config, DigestRunner, Overrides};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "nikkei-digest")]
#[command(about = "Summarize today's Nikkei RSS feed to Markdown and push a LINE digest")]
struct Args {
    /// RSS feed to read (overrides RSS_URL)
    #[arg(long)]
    feed_url: Option<String>,

    /// Maximum number of articles to process (overrides MAX_ARTICLES)
    #[arg(short, long)]
    max_articles: Option<usize>,

    /// Directory for the dated Markdown file (overrides DIGEST_OUTPUT_DIR)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Write the Markdown file but do not send any LINE message
    #[arg(long)]
    dry_run: bool,

    /// Skip the AI providers and classify by keyword only
    #[arg(long)]
    keywords_only: bool,
}

fn build_runner(args: Args) -> Result<(Config, DigestRunner)> {
    let mut config = Config::from_env()?;
    config.apply_overrides(Overrides {
        feed_url: args.feed_url,
        max_articles: args.max_articles,
        output_dir: args.output_dir,
    })?;

    let runner = DigestRunner::from_config(&config)?
        .keywords_only(args.keywords_only)
        .dry_run(args.dry_run);

    Ok((config, runner))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nikkei_digest=info,shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let dry_run = args.dry_run;

    println!("{}", "=".repeat(50));
    println!("📰 Nikkei digest starting");
    println!("{}", "=".repeat(50));

    let (config, runner) = match build_runner(args) {
        Ok(built) => built,
        Err(e) => {
            error!("Setup failed: {:#}", e);
            println!("\n✗ Setup failed: {:#}", e);
            if !dry_run {
                let notifier = setup_notifier(Config::line_from_env());
                report_setup_failure(notifier.as_ref(), &e).await;
            }
            return Err(e);
        }
    };

    println!("\n→ Feed: {}", config.rss_url);

    let now = Utc::now().with_timezone(&config.utc_offset());

    match runner.run(now).await {
        Ok(report) => {
            println!("✓ Processed {} articles", report.article_count);
            println!("✓ Classified by: {}", report.provider);
            println!("✓ Markdown saved to: {}", report.markdown_path.display());
            if report.notified {
                println!("✓ LINE notification sent");
            } else {
                println!("→ LINE notification skipped");
            }
            println!("\n✅ Done");
            Ok(())
        }
        Err(e) => {
            error!("Digest run failed: {:#}", e);
            println!("\n✗ Digest run failed: {:#}", e);
            runner.report_failure(&e).await;
            Err(e)
        }
    }
}
