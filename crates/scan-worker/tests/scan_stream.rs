//! End-to-end controller tests over in-memory PGN text and a scripted
//! engine.

use std::io::Cursor;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use chess_core::pgn::PgnStream;
use scan_worker::config::{Feature, ResumeTarget, ScanConfig};
use scan_worker::error::ScanError;
use scan_worker::output::{HitBuffer, ResultSink};
use scan_worker::scan::run_scan;
use scan_worker::stockfish::{NullProvider, RankProvider, RankedMove};

const TWO_GAMES: &str = r#"[Event "Club Championship"]
[White "Alpha"]
[Black "Beta"]
[Date "2021.03.04"]

1. e4 e5 2. Nf3 Nc6 1-0

[Event "Club Championship"]
[White "Gamma"]
[Black "Delta"]
[Date "2021.03.05"]

1. d4 d5 2. c4 e6 1/2-1/2
"#;

const SCHOLARS_MATE: &str = r#"[Event "Casual"]
[White "Attacker"]
[Black "Defender"]
[Date "2020.01.01"]

1. e4 e5 2. Qh5 Nc6 3. Bc4 Nf6 4. Qxf7# 1-0
"#;

/// White walks a pawn to a7 and promotes on b8.
fn promotion_game(promotion_san: &str) -> String {
    format!(
        "[Event \"Casual\"]\n[White \"Pusher\"]\n[Black \"Defender\"]\n\n\
         1. a4 b5 2. axb5 a6 3. bxa6 Nc6 4. a7 Rb8 5. {promotion_san} 1-0\n"
    )
}

/// Scripted engine: the same ranked list for every query.
struct Scripted {
    moves: Vec<RankedMove>,
}

impl RankProvider for Scripted {
    async fn top_moves(
        &mut self,
        _fen: &str,
        _depth: u32,
        count: usize,
    ) -> Result<Vec<RankedMove>, ScanError> {
        Ok(self.moves.iter().take(count).cloned().collect())
    }
}

fn cp(uci: &str, cp: i32) -> RankedMove {
    RankedMove {
        uci: uci.to_string(),
        cp: Some(cp),
        mate: None,
    }
}

fn base_config(feature: Feature) -> ScanConfig {
    ScanConfig {
        feature,
        resume: ResumeTarget::GameCount(0),
        move_to_begin_at: 0,
        piece_specs: Vec::new(),
        piece_count: None,
        bounds: Vec::new(),
        name_substrings: Vec::new(),
        stockfish_path: String::new(),
        output_dir: PathBuf::new(),
        archives: Vec::new(),
    }
}

fn temp_sink(feature: Feature) -> (ResultSink, PathBuf) {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("scan-stream-test-{nanos}"));
    (ResultSink::new(&dir, feature), dir)
}

async fn run_over<P: RankProvider>(
    config: &ScanConfig,
    pgn: &str,
    provider: &mut P,
) -> HitBuffer {
    let (sink, dir) = temp_sink(config.feature);
    let mut stream = PgnStream::new(Cursor::new(pgn.to_string()));
    let buffer = run_scan(config, &mut stream, provider, &sink).await.unwrap();
    let _ = std::fs::remove_dir_all(dir);
    buffer
}

#[tokio::test]
async fn test_resume_zero_scans_the_first_game() {
    let mut config = base_config(Feature::Name);
    config.name_substrings = vec!["alpha".to_string()];

    let buffer = run_over(&config, TWO_GAMES, &mut NullProvider).await;
    assert_eq!(buffer.games_parsed(), 2);
    assert_eq!(buffer.hits(), 1);
    assert!(buffer.text().contains("Alpha-Beta"));
}

#[tokio::test]
async fn test_unreached_resume_target_finds_nothing() {
    let mut config = base_config(Feature::Name);
    config.name_substrings = vec!["alpha".to_string()];
    config.resume = ResumeTarget::GameDetails {
        white: "Nobody".to_string(),
        black: "Anybody".to_string(),
        date: "1900".to_string(),
    };

    let buffer = run_over(&config, TWO_GAMES, &mut NullProvider).await;
    // Both games were read (headers only) while skipping; none were scanned.
    assert_eq!(buffer.games_parsed(), 2);
    assert_eq!(buffer.hits(), 0);
    assert!(buffer.text().is_empty());
}

#[tokio::test]
async fn test_resume_details_start_scanning_after_the_matching_game() {
    let mut config = base_config(Feature::Name);
    // Matches the headers of every game in the stream.
    config.name_substrings = vec!["club".to_string()];
    config.resume = ResumeTarget::GameDetails {
        white: "Alpha".to_string(),
        black: "Beta".to_string(),
        date: "2021".to_string(),
    };

    let buffer = run_over(&config, TWO_GAMES, &mut NullProvider).await;
    // Game one satisfied the resume target; only game two was scanned.
    assert_eq!(buffer.games_parsed(), 2);
    assert_eq!(buffer.hits(), 1);
    assert!(buffer.text().contains("Gamma-Delta"));
}

#[tokio::test]
async fn test_resume_count_skips_that_many_games() {
    let mut config = base_config(Feature::Name);
    config.name_substrings = vec!["club".to_string()];
    config.resume = ResumeTarget::GameCount(1);

    let buffer = run_over(&config, TWO_GAMES, &mut NullProvider).await;
    assert_eq!(buffer.games_parsed(), 2);
    assert_eq!(buffer.hits(), 1);
    assert!(buffer.text().contains("Gamma-Delta"));
}

#[tokio::test]
async fn test_endgame_hit_stops_at_first_qualifying_position() {
    let mut config = base_config(Feature::Endgame);
    config.piece_specs = vec![scan_worker::spec::PositionSpec::parse("f7:Q").unwrap()];

    let buffer = run_over(&config, SCHOLARS_MATE, &mut NullProvider).await;
    assert_eq!(buffer.games_parsed(), 1);
    assert_eq!(buffer.hits(), 1);
    // The hit block carries the FEN of the mating position and the game text.
    assert!(buffer.text().contains("pppp1Qpp"));
    assert!(buffer.text().contains("from:"));
    assert!(buffer.text().contains("Qxf7#"));
}

#[tokio::test]
async fn test_endgame_piece_count_pruning() {
    let mut config = base_config(Feature::Endgame);
    config.piece_specs = vec![scan_worker::spec::PositionSpec::parse("Q").unwrap()];
    // 33 pieces can never be reached; every game is abandoned at once.
    config.piece_count = Some(33);

    let buffer = run_over(&config, SCHOLARS_MATE, &mut NullProvider).await;
    assert_eq!(buffer.hits(), 0);
}

#[tokio::test]
async fn test_top_moves_hits_every_qualifying_ply() {
    let mut config = base_config(Feature::TopMoves);
    config.bounds = vec![None, None, None, None];

    let mut provider = Scripted {
        moves: vec![cp("e2e4", 30), cp("d2d4", 20)],
    };
    let buffer = run_over(&config, TWO_GAMES, &mut provider).await;
    // Open bounds pass on every ply of both games (4 + 4).
    assert_eq!(buffer.hits(), 8);
    assert!(buffer.text().contains("Top moves:"));
    assert!(buffer.text().contains("e2e4 (cp 30)"));
}

#[tokio::test]
async fn test_top_moves_respects_move_start() {
    let mut config = base_config(Feature::TopMoves);
    config.bounds = vec![None, None, None, None];
    // Start at full move 2: plies 1-3 are skipped.
    config.move_to_begin_at = 2;

    let mut provider = Scripted {
        moves: vec![cp("e2e4", 30), cp("d2d4", 20)],
    };
    let buffer = run_over(&config, SCHOLARS_MATE, &mut provider).await;
    // Seven plies, the first three skipped.
    assert_eq!(buffer.hits(), 4);
}

#[tokio::test]
async fn test_underpromotion_player_found_it() {
    let mut config = base_config(Feature::Underpromotion);
    let mut provider = Scripted {
        moves: vec![cp("a7b8n", 250), cp("a7b8q", 30)],
    };

    let buffer = run_over(&config, &promotion_game("axb8=N"), &mut provider).await;
    // The under-promotion was best and the player made it: secondary only.
    assert_eq!(buffer.secondary_hits(), 1);
    assert_eq!(buffer.hits(), 0);
    assert!(buffer.secondary_text().contains("from:"));
    assert!(buffer.text().is_empty());
}

#[tokio::test]
async fn test_underpromotion_player_missed_it() {
    let mut config = base_config(Feature::Underpromotion);
    let mut provider = Scripted {
        moves: vec![cp("a7b8n", 250), cp("a7b8q", 30)],
    };

    let buffer = run_over(&config, &promotion_game("axb8=Q"), &mut provider).await;
    // Best move and played move differ: both buffers record it.
    assert_eq!(buffer.secondary_hits(), 1);
    assert_eq!(buffer.hits(), 1);
}

#[tokio::test]
async fn test_underpromotion_rejected_when_runner_up_wins_anyway() {
    let mut config = base_config(Feature::Underpromotion);
    let mut provider = Scripted {
        moves: vec![cp("a7b8n", 420), cp("a7b8q", 350)],
    };

    let buffer = run_over(&config, &promotion_game("axb8=N"), &mut provider).await;
    assert_eq!(buffer.secondary_hits(), 0);
    assert_eq!(buffer.hits(), 0);
}

#[tokio::test]
async fn test_same_scan_twice_is_identical() {
    let mut config = base_config(Feature::TopMoves);
    config.bounds = vec![Some(0.0), None, None, None];

    let mut provider = Scripted {
        moves: vec![cp("e2e4", 30), cp("d2d4", 20)],
    };
    let first = run_over(&config, TWO_GAMES, &mut provider).await;
    let second = run_over(&config, TWO_GAMES, &mut provider).await;
    assert_eq!(first, second);
    assert!(first.hits() > 0);
}
