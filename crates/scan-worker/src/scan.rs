//! The scan controller: skip-ahead to a resume point, per-game feature
//! dispatch, hit accumulation, and flush cadence.
//!
//! One game is fully processed (or skipped) before the next is read; every
//! engine query completes before scanning continues.

use std::io::BufRead;

use chess::{Board, ChessMove};
use tracing::info;

use chess_core::game_data::GameHeaders;
use chess_core::pgn::PgnStream;
use chess_core::san;

use crate::board_utils::{
    ascii_board, flip_side_to_move, is_valid_position, strip_lines_starting_with,
    total_piece_count,
};
use crate::bounds::{satisfies_bounds, BOUND_DEPTHS};
use crate::config::{Feature, ResumeTarget, ScanConfig};
use crate::error::ScanError;
use crate::output::{HitBuffer, ResultSink};
use crate::region::{all_specs_satisfied, BoardOracle};
use crate::stockfish::{RankProvider, RankedMove};
use crate::underpromotion::detect_underpromotion;

const LICHESS_SITE_PREFIX: &str = "[Site \"https://lichess.org/";
const SKIP_LOG_INTERVAL: u64 = 20_000;

/// Run one scan over a game stream. Returns the final buffer; the caller
/// owns the closing flush.
pub async fn run_scan<R: BufRead, P: RankProvider>(
    config: &ScanConfig,
    stream: &mut PgnStream<R>,
    provider: &mut P,
    sink: &ResultSink,
) -> Result<HitBuffer, ScanError> {
    let mut buffer = HitBuffer::new();
    let mut reached_resume = config.resume.skips_nothing();

    loop {
        buffer.start_game();

        if !reached_resume {
            let headers = match stream.next_headers()? {
                Some(h) => h,
                // Running out of games before the resume target is a normal
                // zero-hit outcome.
                None => break,
            };
            buffer.game_seen();
            reached_resume = resume_reached(&config.resume, buffer.games_parsed(), &headers);
            if reached_resume {
                info!(skipped = buffer.games_parsed(), "done skipping games");
            } else if buffer.games_parsed() % SKIP_LOG_INTERVAL == 0 {
                info!(skipped = buffer.games_parsed(), "skipping");
            }
            continue;
        }

        let progressed = match config.feature {
            Feature::Name => scan_name_game(config, stream, &mut buffer)?,
            _ => scan_move_game(config, stream, provider, sink, &mut buffer).await?,
        };
        if !progressed {
            break;
        }

        if buffer.newest_hit_exists()
            || buffer.games_parsed() % config.feature.flush_interval() == 0
        {
            sink.flush(&buffer)?;
        }
    }

    Ok(buffer)
}

fn resume_reached(resume: &ResumeTarget, games_seen: u64, headers: &GameHeaders) -> bool {
    match resume {
        ResumeTarget::GameCount(n) => games_seen >= *n,
        ResumeTarget::GameDetails { white, black, date } => {
            headers.white.contains(white.as_str())
                && headers.black.contains(black.as_str())
                && headers.date.contains(date.as_str())
        }
    }
}

/// Header-only scan: a game is a hit when any configured substring occurs in
/// any inspected header field. At most one hit per game.
fn scan_name_game<R: BufRead>(
    config: &ScanConfig,
    stream: &mut PgnStream<R>,
    buffer: &mut HitBuffer,
) -> Result<bool, ScanError> {
    let headers = match stream.next_headers()? {
        Some(h) => h,
        None => return Ok(false),
    };
    buffer.game_seen();

    let fields = [
        &headers.white,
        &headers.black,
        &headers.opening,
        &headers.event,
    ];
    let hit = config.name_substrings.iter().any(|needle| {
        fields
            .iter()
            .any(|field| field.to_lowercase().contains(needle.as_str()))
    });
    if hit {
        buffer.record_hit(
            &format!(
                "{}-{}, opening: {}, event: {}, source: {}",
                headers.white, headers.black, headers.opening, headers.event, headers.source
            ),
            true,
            false,
        );
    }
    Ok(true)
}

/// Replay one game's mainline and dispatch each position to the configured
/// matcher.
async fn scan_move_game<R: BufRead, P: RankProvider>(
    config: &ScanConfig,
    stream: &mut PgnStream<R>,
    provider: &mut P,
    sink: &ResultSink,
    buffer: &mut HitBuffer,
) -> Result<bool, ScanError> {
    let game = match stream.next_game()? {
        Some(g) => g,
        None => return Ok(false),
    };
    buffer.game_seen();

    let game_text = strip_lines_starting_with(&game.pgn, LICHESS_SITE_PREFIX);
    let mut board = Board::default();
    let mut ply: u32 = 0;
    let mut pending: Option<ChessMove> = None;

    for san_token in &game.san_moves {
        // A hit recorded on an earlier ply flushes before scanning continues.
        if buffer.newest_hit_exists() {
            sink.flush(buffer)?;
            buffer.clear_newest_hit();
        }

        let mv = san::resolve_san(&board, san_token)?;
        if config.feature == Feature::Underpromotion {
            // The board trails the iteration by one ply so the detector sees
            // the position before the current move; its verdict is compared
            // to what the player actually played.
            if let Some(prev) = pending.take() {
                board = board.make_move_new(prev);
            }
            pending = Some(mv);
        } else {
            board = board.make_move_new(mv);
        }

        ply += 1;
        if ply < config.move_to_begin_at * 2 {
            continue;
        }

        let fen = board.to_string();

        match config.feature {
            Feature::Endgame => {
                let piece_count = total_piece_count(&board);
                if let Some(desired) = config.piece_count {
                    if piece_count < desired {
                        // Material only decreases; the target count is out of
                        // reach for the rest of this game.
                        break;
                    }
                }
                let count_matches = config.piece_count.map_or(true, |d| piece_count == d);
                if count_matches
                    && all_specs_satisfied(&config.piece_specs, &BoardOracle::new(&board))
                {
                    buffer.record_hit(&hit_block(&fen, &board, &game_text), true, false);
                    // Only the first qualifying position per game is reported.
                    break;
                }
            }
            Feature::TopMoves => {
                if satisfies_bounds(&fen, &config.bounds, provider).await? {
                    let ranked = provider
                        .top_moves(&fen, BOUND_DEPTHS[BOUND_DEPTHS.len() - 1], 2)
                        .await?;
                    let block = format!(
                        "{}\nTop moves:\n{}",
                        hit_block(&fen, &board, &game_text),
                        format_ranked(&ranked)
                    );
                    buffer.record_hit(&block, true, false);
                }
            }
            Feature::SkipMove => {
                if satisfies_bounds(&fen, &config.bounds[0..2], provider).await? {
                    if let Some(flipped) = flip_side_to_move(&fen) {
                        if is_valid_position(&flipped)
                            && satisfies_bounds(&flipped, &config.bounds[2..4], provider).await?
                        {
                            buffer.record_hit(&hit_block(&fen, &board, &game_text), true, false);
                        }
                    }
                }
            }
            Feature::Underpromotion => {
                if let Some(best) = detect_underpromotion(&board, provider).await? {
                    let played = san::uci_string(mv);
                    // Always counts as "underpromotion was best"; counts as
                    // missed only when the player chose differently.
                    buffer.record_hit(&hit_block(&fen, &board, &game_text), best != played, true);
                }
            }
            Feature::Name => unreachable!("name scans read headers only"),
        }
    }

    Ok(true)
}

fn hit_block(fen: &str, board: &Board, game_text: &str) -> String {
    format!("{fen}\n{}\nfrom:\n{game_text}", ascii_board(board))
}

fn format_ranked(moves: &[RankedMove]) -> String {
    moves
        .iter()
        .map(|m| match (m.cp, m.mate) {
            (_, Some(mate)) => format!("{} (mate {mate})", m.uci),
            (Some(cp), None) => format!("{} (cp {cp})", m.uci),
            _ => m.uci.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
