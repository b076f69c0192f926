//! Front-end settings read from `CHARM_*` environment variables.

use rustyline::EditMode;
use std::env;
use std::path::PathBuf;

pub const HISTORY_VAR: &str = "CHARM_HISTORY";
pub const EDIT_MODE_VAR: &str = "CHARM_EDIT_MODE";
pub const LOG_VAR: &str = "CHARM_LOG";

pub const DEFAULT_HISTORY_FILE: &str = "charm_history.txt";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq)]
pub struct ReplConfig {
    pub history_file: PathBuf,
    pub edit_mode: EditMode,
}

impl Default for ReplConfig {
    fn default() -> Self {
        ReplConfig {
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
            edit_mode: EditMode::Emacs,
        }
    }
}

impl ReplConfig {
    pub fn from_env() -> Self {
        Self::from_vars(env::var(HISTORY_VAR).ok(), env::var(EDIT_MODE_VAR).ok())
    }

    fn from_vars(history: Option<String>, edit_mode: Option<String>) -> Self {
        let mut config = ReplConfig::default();
        if let Some(history) = history.filter(|path| !path.trim().is_empty()) {
            config.history_file = PathBuf::from(history);
        }
        if let Some(mode) = edit_mode {
            match parse_edit_mode(&mode) {
                Some(edit_mode) => config.edit_mode = edit_mode,
                None => tracing::warn!(
                    value = %mode,
                    "unknown {}, falling back to emacs",
                    EDIT_MODE_VAR
                ),
            }
        }
        config
    }
}

fn parse_edit_mode(value: &str) -> Option<EditMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "vi" => Some(EditMode::Vi),
        "emacs" => Some(EditMode::Emacs),
        _ => None,
    }
}
