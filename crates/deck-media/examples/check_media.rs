//! Check a deck's media - reconcile the catalog, then fetch anything missing
//!
//! Usage: check_media <deck.anki> [--purge]

use deck_media::media::{fetch_missing, rebuild, FetchOutcome, RebuildOptions};
use deck_media::{Deck, HttpMediaSource, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "./example.anki".to_string());
    let purge = args.any(|arg| arg == "--purge");

    let deck = Deck::open(&path)?;
    let options = RebuildOptions {
        purge_unreferenced: purge,
        ..RebuildOptions::default()
    };

    let report = rebuild(&deck, options)?;
    println!("Missing ({}):", report.missing.len());
    for name in &report.missing {
        println!("  - {}", name);
    }
    println!("Unused ({}):", report.unused.len());
    for name in &report.unused {
        println!("  - {}", name);
    }

    let source = HttpMediaSource::new()?;
    match fetch_missing(&deck, &source).await? {
        FetchOutcome::NotConfigured => println!("No media URL configured, skipping download."),
        FetchOutcome::Completed {
            fetched,
            still_missing,
        } => println!("Fetched {} files, {} still missing.", fetched, still_missing),
        FetchOutcome::Aborted { url } => println!("Download aborted: {} is unavailable.", url),
    }

    Ok(())
}
