/// Configuration management
use crate::error::{ChatError, Result};
use crate::realtime::DEFAULT_FEED_CAPACITY;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Istanbul is UTC+3 all year.
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 180;
const DEFAULT_PREVIEW_MAX_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the local sled database
    pub data_dir: PathBuf,

    /// Offset used for day separators and list timestamps
    pub utc_offset_minutes: i32,

    /// Longest last-message preview in the conversation list
    pub preview_max_chars: usize,

    /// Buffered change events per subscriber before it is told it lagged
    pub feed_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".kuryelink"),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            preview_max_chars: DEFAULT_PREVIEW_MAX_CHARS,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

impl Config {
    /// Parse leading `--data-dir <path>` / `--utc-offset <minutes>` flags.
    /// Returns the config and the remaining (positional) arguments.
    pub fn from_args(args: &[String]) -> Result<(Self, Vec<String>)> {
        let mut config = Self::default();
        let mut rest = Vec::new();

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--data-dir" => {
                    let path = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--data-dir requires a path argument".to_string())
                    })?;
                    config.data_dir = PathBuf::from(path);
                    i += 2;
                }
                "--utc-offset" => {
                    let raw = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--utc-offset requires a minutes argument".to_string())
                    })?;
                    config.utc_offset_minutes = parse_offset(raw)?;
                    i += 2;
                }
                other => {
                    rest.push(other.to_string());
                    i += 1;
                }
            }
        }

        // Env overrides (nice for scripts)
        if let Ok(dir) = std::env::var("KURYELINK_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = std::env::var("KURYELINK_UTC_OFFSET") {
            config.utc_offset_minutes = parse_offset(&raw)?;
        }

        Ok((config, rest))
    }

    pub fn timezone(&self) -> FixedOffset {
        // Out-of-range offsets can only come from a hand-edited config
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

fn parse_offset(raw: &str) -> Result<i32> {
    let minutes = raw
        .parse::<i32>()
        .map_err(|_| ChatError::Config(format!("invalid UTC offset: {}", raw)))?;
    if minutes.abs() >= 24 * 60 {
        return Err(ChatError::Config(format!(
            "UTC offset out of range: {} minutes",
            minutes
        )));
    }
    Ok(minutes)
}
