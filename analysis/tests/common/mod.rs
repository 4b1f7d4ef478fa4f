//! Shell-script stand-ins for a UCI engine.
#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use analysis::AnalyzerConfig;

/// Write an executable `/bin/sh` engine script. `body` runs after the shebang.
pub fn write_stub_engine(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Answers the handshake and every `go` with one line whose score is the
/// FEN's fullmove number and whose node count is the requested depth.
pub const MARKER_ENGINE: &str = r#"
marker=0
while IFS= read -r line; do
  case "$line" in
    uci) echo "id name StubFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    "position fen "*) set -- $line; marker=$8 ;;
    go*)
      set -- $line
      sleep 0.05
      echo "info depth $3 multipv 1 score cp $marker nodes $3 pv e2e4 e7e5"
      echo "bestmove e2e4"
      ;;
    quit) exit 0 ;;
  esac
done
"#;

pub fn config_for(engine: &Path) -> AnalyzerConfig {
    let mut config = AnalyzerConfig::default();
    config.engine.path = Some(engine.to_path_buf());
    config.engine.handshake_timeout = Duration::from_millis(500);
    config.engine.stop_grace = Duration::from_millis(100);
    config.grace = Duration::from_millis(300);
    config.pool_size = 2;
    config
}

/// White to move, differing only in the fullmove number.
pub fn marker_fen(fullmove: u32) -> String {
    format!("4k3/8/8/8/8/8/8/4K2R w K - 0 {}", fullmove)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Whether `pid` is still a live process. A zombie awaiting reaping counts as
/// exited. Linux only.
pub fn is_running(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return false;
    };
    // The state field follows the parenthesised command name.
    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .is_some_and(|state| state != "Z" && state != "X")
}

/// Poll until `pid` exits or `within` passes. Returns whether it exited.
pub async fn wait_for_exit(pid: u32, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    while is_running(pid) {
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    true
}

/// Process ids written one per line by engines that record `$$`.
pub fn read_pids(path: &Path) -> Vec<u32> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}
