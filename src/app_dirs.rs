use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

const APP_NAME: &str = "type50";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", APP_NAME)
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("type50_config.json"))
    }

    /// Where the log file goes
    pub fn state_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME)
        } else {
            ProjectDirs::from("", "", APP_NAME)
                .map(|pd| pd.data_local_dir().to_path_buf())
                .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME))
        }
    }

    /// Parent of every per-shell scratch directory.
    pub fn sessions_root() -> PathBuf {
        std::env::temp_dir().join(APP_NAME)
    }

    /// Scratch directory tied to the launching shell. The shell's start time
    /// is part of the name where the OS exposes it, so a recycled pid does not
    /// inherit someone else's progress.
    pub fn terminal_session_dir() -> PathBuf {
        let pid = parent_pid();
        let name = match process_start_time(pid) {
            Some(start) => format!("session-{pid}-{start}"),
            None => format!("session-{pid}"),
        };
        Self::sessions_root().join(name)
    }
}

/// Remove session directories whose shell is gone. Returns how many went.
pub fn prune_stale_sessions(root: &Path, is_alive: impl Fn(u32) -> bool) -> usize {
    let Ok(entries) = fs::read_dir(root) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(session_pid) else {
            continue;
        };
        if is_alive(pid) {
            continue;
        }
        match fs::remove_dir_all(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => debug!(path = %entry.path().display(), "could not prune session: {e}"),
        }
    }
    removed
}

fn session_pid(dir_name: &str) -> Option<u32> {
    let rest = dir_name.strip_prefix("session-")?;
    rest.split('-').next()?.parse().ok()
}

/// Start time field of a `/proc/<pid>/stat` line, in clock ticks since boot.
fn stat_start_time(stat: &str) -> Option<u64> {
    // comm can hold spaces and parens, fields resume after the last ')'
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.split_whitespace().nth(19)?.parse().ok()
}

#[cfg(unix)]
fn parent_pid() -> u32 {
    std::os::unix::process::parent_id()
}

#[cfg(not(unix))]
fn parent_pid() -> u32 {
    std::process::id()
}

#[cfg(target_os = "linux")]
fn process_start_time(pid: u32) -> Option<u64> {
    let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    stat_start_time(&stat)
}

#[cfg(not(target_os = "linux"))]
fn process_start_time(_pid: u32) -> Option<u64> {
    None
}

/// Liveness check used when pruning; only Linux can answer it cheaply.
pub fn process_alive(pid: u32) -> bool {
    if cfg!(target_os = "linux") {
        Path::new(&format!("/proc/{pid}")).exists()
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_session_dir_is_stable_within_process() {
        assert_eq!(
            AppDirs::terminal_session_dir(),
            AppDirs::terminal_session_dir()
        );
        assert!(AppDirs::terminal_session_dir().starts_with(std::env::temp_dir()));
    }

    #[test]
    fn start_time_is_read_past_the_command_name() {
        let stat = "4242 (my (odd) shell) S 1 4242 4242 34816 4242 4194304 1000 0 0 0 \
                    3 1 0 0 20 0 1 0 987654 10000000 500";
        assert_eq!(stat_start_time(stat), Some(987654));
        assert_eq!(stat_start_time("garbage"), None);
    }

    #[test]
    fn session_dir_name_carries_pid() {
        let dir = AppDirs::terminal_session_dir();
        let name = dir.file_name().and_then(|n| n.to_str()).unwrap();
        assert_eq!(session_pid(name), Some(parent_pid()));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn session_dir_includes_shell_start_time_on_linux() {
        let dir = AppDirs::terminal_session_dir();
        let name = dir.file_name().and_then(|n| n.to_str()).unwrap();
        let start = process_start_time(parent_pid()).unwrap();
        assert!(name.ends_with(&format!("-{start}")), "{name}");
    }

    #[test]
    fn prune_removes_only_dead_sessions() {
        let root = tempfile::tempdir().unwrap();
        for name in ["session-10-555", "session-11", "session-12-1", "notes"] {
            fs::create_dir_all(root.path().join(name)).unwrap();
        }

        let removed = prune_stale_sessions(root.path(), |pid| pid == 12);

        assert_eq!(removed, 2);
        assert!(!root.path().join("session-10-555").exists());
        assert!(!root.path().join("session-11").exists());
        assert!(root.path().join("session-12-1").exists());
        assert!(root.path().join("notes").exists());
    }

    #[test]
    fn prune_missing_root_is_a_noop() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(prune_stale_sessions(&root.path().join("nope"), |_| false), 0);
    }

    #[test]
    fn config_path_is_json() {
        assert_eq!(
            AppDirs::config_path().extension().and_then(|e| e.to_str()),
            Some("json")
        );
    }
}
