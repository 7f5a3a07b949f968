use std::path::PathBuf;

use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

/// Failures while driving host tooling or touching host state.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("core {0} cannot be expressed in a 64-bit affinity mask")]
    CoreOutOfRange(u32),
    #[error("malformed /proc/interrupts line: {0:?}")]
    MalformedInterrupts(String),
    #[error(
        "multiple bridge IDs {ids:?} recorded for one interface group; delete {} and try again",
        .state_file.display()
    )]
    ConflictingBridgeIds { ids: Vec<u32>, state_file: PathBuf },
    #[error("no bridge ID recorded for interfaces {0:?}")]
    MissingBridgeId(Vec<String>),
    #[error("state file {} is not valid JSON: {source}", .path.display())]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode state: {0}")]
    StateEncode(#[source] serde_json::Error),
}

/// Configuration file problems, reported before any host command runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config defines no interface groups")]
    NoGroups,
    #[error("interface group {0:?} is defined twice")]
    DuplicateGroup(String),
    #[error("interface group {group:?}: {reason}")]
    InvalidGroup { group: String, reason: String },
    #[error("invalid kernel tweak {key:?}: {reason}")]
    InvalidTweak { key: String, reason: String },
    #[error("invalid tc time value {0:?} (expected e.g. \"10ms\", \"500us\", \"1s\")")]
    InvalidTime(String),
}
