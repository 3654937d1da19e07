//! PGN archive scan worker
//!
//! Walks PGN archives game by game and reports positions or games matching
//! the configured criterion. Engine-backed features drive a local Stockfish
//! over UCI; the endgame and name features run without one.

use std::fs::File;
use std::io::BufReader;

use clap::Parser;
use tracing::info;

use chess_core::pgn::PgnStream;
use scan_worker::config::{ScanArgs, ScanConfig};
use scan_worker::output::ResultSink;
use scan_worker::scan::run_scan;
use scan_worker::stockfish::{NullProvider, RankProvider, StockfishEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env for local runs
    let _ = dotenvy::dotenv();

    let config = ScanConfig::from_args(ScanArgs::parse())?;
    info!(
        feature = ?config.feature,
        archives = config.archives.len(),
        "scan config loaded"
    );

    if config.feature.uses_engine() {
        let mut engine = StockfishEngine::new(&config.stockfish_path).await?;
        info!(path = %config.stockfish_path, "engine ready");
        scan_archives(&config, &mut engine).await?;
        engine.quit().await;
    } else {
        scan_archives(&config, &mut NullProvider).await?;
    }

    Ok(())
}

async fn scan_archives<P: RankProvider>(
    config: &ScanConfig,
    provider: &mut P,
) -> anyhow::Result<()> {
    for archive in &config.archives {
        info!(path = %archive.display(), "scanning archive");
        let file = File::open(archive)?;
        let mut stream = PgnStream::new(BufReader::new(file));

        let sink = ResultSink::new(&config.output_dir, config.feature);
        let buffer = run_scan(config, &mut stream, provider, &sink).await?;
        sink.flush(&buffer)?;

        info!(
            path = %archive.display(),
            games = buffer.games_parsed(),
            hits = buffer.hits(),
            "archive complete"
        );
    }
    Ok(())
}
