//! Stockfish engine wrapper using UCI protocol (async I/O)

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use tracing::debug;

use crate::error::ScanError;

/// One ranked candidate move from a multi-PV search. Exactly one of the two
/// score fields is populated; scores are raw engine output (centipawns or
/// mate distance from the side to move's perspective).
#[derive(Debug, Clone, PartialEq)]
pub struct RankedMove {
    pub uci: String,
    pub cp: Option<i32>,
    pub mate: Option<i32>,
}

/// Capability to rank the top candidate moves of a position at a given depth.
/// Implemented by the engine wrapper; tests supply scripted fakes.
#[allow(async_fn_in_trait)]
pub trait RankProvider {
    /// Request the `count` best moves. A position with fewer legal moves than
    /// requested yields a shorter list; that is a defined outcome, not an
    /// error.
    async fn top_moves(
        &mut self,
        fen: &str,
        depth: u32,
        count: usize,
    ) -> Result<Vec<RankedMove>, ScanError>;
}

/// Provider for scans that never consult the engine (the name filter).
pub struct NullProvider;

impl RankProvider for NullProvider {
    async fn top_moves(
        &mut self,
        _fen: &str,
        _depth: u32,
        _count: usize,
    ) -> Result<Vec<RankedMove>, ScanError> {
        Ok(Vec::new())
    }
}

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn new(path: &str) -> Result<Self, ScanError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| ScanError::Engine(format!("Failed to spawn Stockfish: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| ScanError::Engine("Stockfish stdin unavailable".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| ScanError::Engine("Stockfish stdout unavailable".to_string()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
        };

        // Initialize UCI
        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        // The scan is strictly sequential; one search thread is enough.
        engine.send("setoption name Threads value 1").await?;
        engine.send("setoption name Hash value 256").await?;
        engine.send("setoption name UCI_AnalyseMode value true").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), ScanError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| ScanError::Engine(format!("Failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| ScanError::Engine(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), ScanError> {
        let mut line = String::new();
        loop {
            line.clear();
            self.stdout
                .read_line(&mut line)
                .await
                .map_err(|e| ScanError::Engine(format!("Failed to read from Stockfish: {e}")))?;
            let trimmed = line.trim();
            debug!(line = trimmed, "SF >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

impl RankProvider for StockfishEngine {
    async fn top_moves(
        &mut self,
        fen: &str,
        depth: u32,
        count: usize,
    ) -> Result<Vec<RankedMove>, ScanError> {
        self.send(&format!("setoption name MultiPV value {count}"))
            .await?;
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        // Slot per rank; later info lines for a rank overwrite earlier ones,
        // so each slot ends at the final iteration's score.
        let mut slots: Vec<Option<RankedMove>> = vec![None; count];
        let mut line = String::new();

        loop {
            line.clear();
            self.stdout
                .read_line(&mut line)
                .await
                .map_err(|e| ScanError::Engine(format!("Failed to read from Stockfish: {e}")))?;
            let trimmed = line.trim();

            if trimmed.starts_with("info") && trimmed.contains(" pv ") {
                let rank = parse_multipv_index(trimmed).unwrap_or(1) - 1;
                if let Some(first) = parse_first_pv_move(trimmed) {
                    if (rank as usize) < slots.len() {
                        slots[rank as usize] = Some(RankedMove {
                            uci: first,
                            cp: parse_cp(trimmed),
                            mate: parse_mate(trimmed),
                        });
                    }
                }
            } else if trimmed.starts_with("bestmove") {
                break;
            }
        }

        // Reset MultiPV to 1
        self.send("setoption name MultiPV value 1").await?;

        // Ranks the engine never reported (fewer legal moves) drop out;
        // reported ranks are contiguous from 1.
        Ok(slots.into_iter().flatten().collect())
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        let _ = self.process.start_kill();
    }
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "cp" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "mate" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse multipv index from info line
fn parse_multipv_index(line: &str) -> Option<u32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "multipv" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse the first PV move from an info line
fn parse_first_pv_move(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    while let Some(part) = parts.next() {
        if part == "pv" {
            return parts.next().map(|s| s.to_string());
        }
    }
    None
}
