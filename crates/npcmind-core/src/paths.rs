//! Filesystem locations
//!
//! Everything lives under `~/.npcmind` unless `NPCMIND_HOME` points elsewhere.

use std::path::PathBuf;

use crate::constants::paths::{
    CONFIG_DIR_NAME, CONVERSATION_LOGS_DIR, HOME_ENV, RESPONSE_DB_NAME,
};

/// Root configuration directory
pub fn config_dir() -> PathBuf {
    if let Some(root) = std::env::var_os(HOME_ENV) {
        return PathBuf::from(root);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// `config.toml` location
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Runtime data (databases, conversation logs)
pub fn data_dir() -> PathBuf {
    config_dir().join("data")
}

pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

pub fn conversation_logs_dir() -> PathBuf {
    data_dir().join(CONVERSATION_LOGS_DIR)
}

pub fn response_db_path() -> PathBuf {
    data_dir().join(RESPONSE_DB_NAME)
}
