use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonically increasing counter for generating unique scratch file names.
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Returns a path in the system temp directory that no other test uses.
///
/// Combines the prefix, process ID, and an atomic counter to avoid
/// collisions when tests run in parallel. The file is not created.
pub fn unique_temp_path(prefix: &str) -> PathBuf {
    let seq = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    std::env::temp_dir().join(format!("delaysim_{prefix}_{pid:x}_{seq}.json"))
}
