//! Scan configuration from CLI arguments and environment variables.
//!
//! Everything the controller needs is resolved into a [`ScanConfig`] once,
//! before the scan starts; interactive prompting has no place in a batch
//! tool.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::spec::PositionSpec;

/// What to scan for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Endgame,
    TopMoves,
    SkipMove,
    Underpromotion,
    Name,
}

impl Feature {
    pub fn parse(s: &str) -> Result<Self, ScanError> {
        match s.to_ascii_lowercase().as_str() {
            "endgame" => Ok(Feature::Endgame),
            "top-moves" | "top moves" => Ok(Feature::TopMoves),
            "skip-move" | "skip move" => Ok(Feature::SkipMove),
            "underpromotion" => Ok(Feature::Underpromotion),
            "name" => Ok(Feature::Name),
            other => Err(ScanError::Config(format!("unknown feature: {other:?}"))),
        }
    }

    /// Whether this feature consults the engine. The endgame and name
    /// features are answered from the board and headers alone.
    pub fn uses_engine(self) -> bool {
        matches!(
            self,
            Feature::TopMoves | Feature::SkipMove | Feature::Underpromotion
        )
    }

    /// Progress-flush cadence in games, independent of hits.
    pub fn flush_interval(self) -> u64 {
        match self {
            Feature::Endgame => 200,
            Feature::Name => 40_000,
            _ => 40,
        }
    }
}

/// Where in the archive active scanning begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeTarget {
    /// Start scanning once this many games have been seen. Zero skips
    /// nothing.
    GameCount(u64),
    /// Start scanning after the game whose headers contain all three
    /// substrings (case-sensitive).
    GameDetails {
        white: String,
        black: String,
        date: String,
    },
}

impl ResumeTarget {
    pub fn skips_nothing(&self) -> bool {
        matches!(self, ResumeTarget::GameCount(0))
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "scan-worker",
    about = "Scan PGN archives for positions or games matching a criterion"
)]
pub struct ScanArgs {
    /// Feature to scan for: endgame, top-moves, skip-move, underpromotion, name
    #[arg(long)]
    pub feature: String,

    /// PGN archives, aliases from the alias file, or glob patterns
    #[arg(required = true)]
    pub archives: Vec<String>,

    /// Begin scanning after this many games
    #[arg(long)]
    pub start_after_game: Option<u64>,

    /// Begin scanning after the game matching "<white> <black> <date>"
    #[arg(long)]
    pub start_after: Option<String>,

    /// Full-move number at which to start examining positions in each game
    #[arg(long, default_value_t = 0)]
    pub start_move: u32,

    /// Piece requirement string for the endgame feature (repeatable),
    /// e.g. "~row2:PK2p"
    #[arg(long = "pieces")]
    pub piece_specs: Vec<String>,

    /// Exact total piece count for the endgame feature
    #[arg(long)]
    pub piece_count: Option<u32>,

    /// Four comma-separated eval bounds in pawns (lower,upper,lower,upper);
    /// an empty or "None" entry leaves that bound open
    #[arg(long)]
    pub bounds: Option<String>,

    /// Header substring for the name feature (repeatable)
    #[arg(long = "name")]
    pub name_substrings: Vec<String>,

    /// Path to the Stockfish binary (overrides STOCKFISH_PATH)
    #[arg(long)]
    pub stockfish_path: Option<String>,

    /// Directory for result artifacts
    #[arg(long, default_value = "results")]
    pub out_dir: PathBuf,

    /// Alias table mapping short names to archive paths
    #[arg(long, default_value = "aliases.txt")]
    pub alias_file: PathBuf,
}

/// Fully validated scan configuration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub feature: Feature,
    pub resume: ResumeTarget,
    pub move_to_begin_at: u32,
    pub piece_specs: Vec<PositionSpec>,
    pub piece_count: Option<u32>,
    pub bounds: Vec<Option<f64>>,
    pub name_substrings: Vec<String>,
    pub stockfish_path: String,
    pub output_dir: PathBuf,
    pub archives: Vec<PathBuf>,
}

impl ScanConfig {
    pub fn from_args(args: ScanArgs) -> Result<Self, ScanError> {
        let feature = Feature::parse(&args.feature)?;

        let resume = match (args.start_after_game, &args.start_after) {
            (Some(_), Some(_)) => {
                return Err(ScanError::Config(
                    "--start-after-game and --start-after are mutually exclusive".to_string(),
                ));
            }
            (Some(n), None) => ResumeTarget::GameCount(n),
            (None, Some(details)) => parse_resume_details(details)?,
            (None, None) => ResumeTarget::GameCount(0),
        };
        let piece_specs = args
            .piece_specs
            .iter()
            .map(|s| PositionSpec::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        let bounds = match &args.bounds {
            Some(s) => parse_bounds(s)?,
            None => Vec::new(),
        };

        match feature {
            Feature::Endgame if piece_specs.is_empty() => {
                return Err(ScanError::Config(
                    "the endgame feature needs at least one --pieces requirement".to_string(),
                ));
            }
            Feature::TopMoves | Feature::SkipMove if bounds.is_empty() => {
                return Err(ScanError::Config(
                    "this feature needs --bounds with four entries".to_string(),
                ));
            }
            Feature::Name if args.name_substrings.is_empty() => {
                return Err(ScanError::Config(
                    "the name feature needs at least one --name substring".to_string(),
                ));
            }
            _ => {}
        }

        let stockfish_path = args
            .stockfish_path
            .or_else(|| env::var("STOCKFISH_PATH").ok())
            .unwrap_or_else(|| "/usr/local/bin/stockfish".to_string());

        let archives = resolve_archives(&args.archives, &args.alias_file)?;

        Ok(ScanConfig {
            feature,
            resume,
            move_to_begin_at: args.start_move,
            piece_specs,
            piece_count: args.piece_count,
            bounds,
            name_substrings: args
                .name_substrings
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            stockfish_path,
            output_dir: args.out_dir,
            archives,
        })
    }
}

fn parse_resume_details(details: &str) -> Result<ResumeTarget, ScanError> {
    let words: Vec<&str> = details.split_whitespace().collect();
    match words.as_slice() {
        [white, black, date] => Ok(ResumeTarget::GameDetails {
            white: white.to_string(),
            black: black.to_string(),
            date: date.to_string(),
        }),
        _ => Err(ScanError::Config(format!(
            "--start-after expects \"<white> <black> <date>\", got {details:?}"
        ))),
    }
}

/// Parse "lower,upper,lower,upper"; empty or "None" entries leave a bound
/// open.
pub fn parse_bounds(s: &str) -> Result<Vec<Option<f64>>, ScanError> {
    let bounds = s
        .split(',')
        .map(|token| {
            let token = token.trim();
            if token.is_empty() || token.eq_ignore_ascii_case("none") {
                Ok(None)
            } else {
                token
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| ScanError::Config(format!("invalid bound: {token:?}")))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    if bounds.len() != 4 {
        return Err(ScanError::Config(format!(
            "expected four bounds (two ranks), got {}",
            bounds.len()
        )));
    }
    Ok(bounds)
}

/// Replace an archive name with its alias expansion, if the alias table has
/// one. Lines are "<alias> <expansion...>"; the match is case-insensitive.
fn apply_aliases(name: &str, alias_file: &Path) -> String {
    if let Ok(table) = fs::read_to_string(alias_file) {
        for line in table.lines() {
            if let Some((alias, expansion)) = line.trim().split_once(|c: char| c.is_whitespace()) {
                if alias.eq_ignore_ascii_case(name) {
                    return expansion.trim().to_string();
                }
            }
        }
    }
    name.to_string()
}

fn ensure_pgn_suffix(name: &str) -> String {
    if Path::new(name).extension().is_none() {
        format!("{name}.pgn")
    } else {
        name.to_string()
    }
}

/// Expand aliases and glob patterns into concrete archive paths.
fn resolve_archives(raw: &[String], alias_file: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut archives = Vec::new();
    for arg in raw {
        let expanded = apply_aliases(arg, alias_file);
        for name in expanded.split_whitespace() {
            let name = ensure_pgn_suffix(name);
            if name.contains(['*', '?', '[']) {
                let pattern = glob::glob(&name)
                    .map_err(|e| ScanError::Config(format!("bad glob {name:?}: {e}")))?;
                let mut matched = false;
                for entry in pattern {
                    let path = entry
                        .map_err(|e| ScanError::Config(format!("glob {name:?}: {e}")))?;
                    archives.push(path);
                    matched = true;
                }
                if !matched {
                    return Err(ScanError::Config(format!("no archives match {name:?}")));
                }
            } else {
                archives.push(PathBuf::from(name));
            }
        }
    }
    if archives.is_empty() {
        return Err(ScanError::Config("no archives to scan".to_string()));
    }
    Ok(archives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn base_args(feature: &str) -> ScanArgs {
        ScanArgs::parse_from(["scan-worker", "--feature", feature, "games.pgn"])
    }

    #[test]
    fn test_parse_bounds_with_open_entries() {
        let bounds = parse_bounds("0.5,,None,3").unwrap();
        assert_eq!(bounds, vec![Some(0.5), None, None, Some(3.0)]);

        assert!(parse_bounds("0.5,1.0").is_err());
        assert!(parse_bounds("a,b,c,d").is_err());
    }

    #[test]
    fn test_feature_parse() {
        assert_eq!(Feature::parse("endgame").unwrap(), Feature::Endgame);
        assert_eq!(Feature::parse("Top-Moves").unwrap(), Feature::TopMoves);
        assert_eq!(Feature::parse("skip move").unwrap(), Feature::SkipMove);
        assert!(Feature::parse("opening").is_err());
    }

    #[test]
    fn test_flush_intervals() {
        assert_eq!(Feature::Endgame.flush_interval(), 200);
        assert_eq!(Feature::Name.flush_interval(), 40_000);
        assert_eq!(Feature::TopMoves.flush_interval(), 40);
        assert_eq!(Feature::Underpromotion.flush_interval(), 40);
    }

    #[test]
    fn test_endgame_requires_piece_specs() {
        let args = base_args("endgame");
        assert!(matches!(
            ScanConfig::from_args(args),
            Err(ScanError::Config(_))
        ));
    }

    #[test]
    fn test_endgame_config_round_trip() {
        let args = ScanArgs::parse_from([
            "scan-worker",
            "--feature",
            "endgame",
            "--pieces",
            "~row2:PK2p",
            "--pieces",
            "K1k1",
            "--piece-count",
            "7",
            "--start-after-game",
            "10",
            "games.pgn",
        ]);
        let config = ScanConfig::from_args(args).unwrap();
        assert_eq!(config.feature, Feature::Endgame);
        assert_eq!(config.resume, ResumeTarget::GameCount(10));
        assert_eq!(config.piece_specs.len(), 2);
        assert_eq!(config.piece_count, Some(7));
        assert_eq!(config.archives, vec![PathBuf::from("games.pgn")]);
    }

    #[test]
    fn test_resume_details_need_three_words() {
        assert!(parse_resume_details("Kasparov Karpov 1985").is_ok());
        assert!(parse_resume_details("Kasparov 1985").is_err());
    }

    #[test]
    fn test_name_substrings_are_lowercased() {
        let args = ScanArgs::parse_from([
            "scan-worker",
            "--feature",
            "name",
            "--name",
            "Kasparov",
            "games.pgn",
        ]);
        let config = ScanConfig::from_args(args).unwrap();
        assert_eq!(config.name_substrings, vec!["kasparov".to_string()]);
    }

    #[test]
    fn test_missing_extension_gets_pgn_suffix() {
        assert_eq!(ensure_pgn_suffix("mega"), "mega.pgn");
        assert_eq!(ensure_pgn_suffix("mega.pgn"), "mega.pgn");
        assert_eq!(ensure_pgn_suffix("dump.txt"), "dump.txt");
    }

    #[test]
    fn test_alias_resolution() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let alias_file = std::env::temp_dir().join(format!("aliases-test-{nanos}.txt"));
        fs::write(&alias_file, "mega  path/to/mega2024.pgn other.pgn\n").unwrap();

        assert_eq!(
            apply_aliases("MEGA", &alias_file),
            "path/to/mega2024.pgn other.pgn"
        );
        assert_eq!(apply_aliases("unknown", &alias_file), "unknown");

        let archives = resolve_archives(&["mega".to_string()], &alias_file).unwrap();
        assert_eq!(
            archives,
            vec![
                PathBuf::from("path/to/mega2024.pgn"),
                PathBuf::from("other.pgn"),
            ]
        );

        fs::remove_file(&alias_file).unwrap();
    }
}
