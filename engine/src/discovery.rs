//! Locating the engine executable.
//!
//! Resolution order:
//! 1. an explicitly configured path
//! 2. the `STOCKFISH_PATH` environment variable
//! 3. platform system locations
//! 4. the bundled binary under `engines/` in the working directory
//! 5. `stockfish` anywhere on `PATH`
//!
//! A configured path (1 or 2) that does not exist ends the search: the
//! operator asked for a specific binary, so no other one is substituted.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const ENGINE_PATH_ENV: &str = "STOCKFISH_PATH";

#[cfg(windows)]
const SYSTEM_PATHS: &[&str] = &[];
#[cfg(not(windows))]
const SYSTEM_PATHS: &[&str] = &[
    "/usr/games/stockfish",
    "/usr/bin/stockfish",
    "/usr/local/bin/stockfish",
    "/opt/homebrew/bin/stockfish",
];

#[cfg(windows)]
const BINARY_NAME: &str = "stockfish.exe";
#[cfg(not(windows))]
const BINARY_NAME: &str = "stockfish";

const BUNDLED_DIR: &str = "engines";

/// Find the engine executable, or `None` if no candidate exists.
pub fn find_engine_path(explicit: Option<&Path>) -> Option<PathBuf> {
    resolve(
        explicit,
        std::env::var_os(ENGINE_PATH_ENV),
        std::env::var_os("PATH"),
    )
}

fn resolve(
    explicit: Option<&Path>,
    env_override: Option<OsString>,
    search_path: Option<OsString>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        tracing::error!("Configured engine path {:?} does not exist", path);
        return None;
    }

    if let Some(path) = env_override.filter(|p| !p.is_empty()).map(PathBuf::from) {
        if path.is_file() {
            return Some(path);
        }
        tracing::error!("{}={:?} does not exist", ENGINE_PATH_ENV, path);
        return None;
    }

    let system = SYSTEM_PATHS.iter().map(PathBuf::from);
    let bundled = std::iter::once(Path::new(BUNDLED_DIR).join(BINARY_NAME));
    if let Some(path) = system.chain(bundled).find(|p| p.is_file()) {
        return Some(path);
    }

    search_path.and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(BINARY_NAME))
            .find(|p| p.is_file())
    })
}
