//! Hit accumulation and result artifacts.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use tracing::info;

use crate::config::Feature;
use crate::error::ScanError;

/// Accumulated hit text and counters for one scan run. The secondary pair is
/// only used by the underpromotion feature ("best move" vs "player missed
/// it"). Flushed through a [`ResultSink`]; never read back.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HitBuffer {
    text: String,
    secondary_text: String,
    hits: u64,
    secondary_hits: u64,
    games_parsed: u64,
    newest_hit: Option<String>,
}

impl HitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-game state before processing the next game.
    pub fn start_game(&mut self) {
        self.newest_hit = None;
    }

    /// Count a game read from the stream (skipped or scanned).
    pub fn game_seen(&mut self) {
        self.games_parsed += 1;
    }

    /// Record a hit block into the selected buffers and stage it as the
    /// newest hit.
    pub fn record_hit(&mut self, text: &str, primary: bool, secondary: bool) {
        let block = format!("{text}\n\n\n");
        if primary {
            self.text.push_str(&block);
            self.hits += 1;
        }
        if secondary {
            self.secondary_text.push_str(&block);
            self.secondary_hits += 1;
        }
        self.newest_hit = Some(block);
    }

    pub fn clear_newest_hit(&mut self) {
        self.newest_hit = None;
    }

    pub fn newest_hit(&self) -> Option<&str> {
        self.newest_hit.as_deref()
    }

    pub fn newest_hit_exists(&self) -> bool {
        self.newest_hit.is_some()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn secondary_text(&self) -> &str {
        &self.secondary_text
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn secondary_hits(&self) -> u64 {
        self.secondary_hits
    }

    pub fn games_parsed(&self) -> u64 {
        self.games_parsed
    }
}

/// Writes accumulated hits and counters under the output directory. The
/// underpromotion feature produces two artifacts, every other feature one.
pub struct ResultSink {
    dir: PathBuf,
    stem: String,
    feature: Feature,
}

impl ResultSink {
    pub fn new(dir: impl Into<PathBuf>, feature: Feature) -> Self {
        Self {
            dir: dir.into(),
            stem: Utc::now().timestamp_micros().to_string(),
            feature,
        }
    }

    /// Persist the buffers and log progress. Called on every hit and on the
    /// per-feature game cadence, so artifacts stay current on long scans.
    pub fn flush(&self, buffer: &HitBuffer) -> Result<(), ScanError> {
        fs::create_dir_all(&self.dir)?;

        if self.feature == Feature::Underpromotion {
            self.write_artifact(
                format!("{}-best.pgn", self.stem),
                buffer.secondary_text(),
                buffer.secondary_hits(),
                buffer.games_parsed(),
            )?;
            self.write_artifact(
                format!("{}-missed.pgn", self.stem),
                buffer.text(),
                buffer.hits(),
                buffer.games_parsed(),
            )?;
            info!(
                games = buffer.games_parsed(),
                best = buffer.secondary_hits(),
                missed = buffer.hits(),
                "underpromotion progress"
            );
        } else {
            self.write_artifact(
                format!("{}.pgn", self.stem),
                buffer.text(),
                buffer.hits(),
                buffer.games_parsed(),
            )?;
            info!(
                games = buffer.games_parsed(),
                hits = buffer.hits(),
                "progress"
            );
        }

        let summary = serde_json::json!({
            "feature": self.feature,
            "games_parsed": buffer.games_parsed(),
            "hits": buffer.hits(),
            "secondary_hits": buffer.secondary_hits(),
        });
        fs::write(
            self.dir.join(format!("{}-summary.json", self.stem)),
            serde_json::to_string_pretty(&summary)?,
        )?;

        if let Some(hit) = buffer.newest_hit() {
            println!("{hit}");
        }
        Ok(())
    }

    fn write_artifact(
        &self,
        name: String,
        text: &str,
        hits: u64,
        games: u64,
    ) -> Result<(), ScanError> {
        let path = self.dir.join(name);
        fs::write(
            &path,
            format!("{text}#Games parsed: {games}\nHit counter: {hits}\n\n"),
        )?;
        Ok(())
    }
}
