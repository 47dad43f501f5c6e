use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Key/value port for state that should live as long as the terminal session.
pub trait ProgressStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
}

impl<T: ProgressStore + ?Sized> ProgressStore for Box<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        (**self).set(key, value)
    }
}

/// Process-lifetime store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Store scoped to the shell that launched us: relaunching from the same
    /// terminal finds the same directory, a new terminal starts empty.
    pub fn for_terminal_session() -> Self {
        use crate::app_dirs::{process_alive, prune_stale_sessions, AppDirs};

        prune_stale_sessions(&AppDirs::sessions_root(), process_alive);
        Self::with_dir(AppDirs::terminal_session_dir())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl ProgressStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("k"), None);

        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v2"));
    }

    #[test]
    fn boxed_store_delegates() {
        let mut store: Box<dyn ProgressStore> = Box::new(MemoryStore::new());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn file_store_creates_dir_and_reads_back() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::with_dir(dir.path().join("nested"));

        assert_eq!(store.get("type50.storyProgress"), None);
        store.set("type50.storyProgress", "{\"a\":1}").unwrap();

        assert_eq!(
            store.get("type50.storyProgress").as_deref(),
            Some("{\"a\":1}")
        );
        assert!(dir
            .path()
            .join("nested")
            .join("type50.storyProgress.json")
            .exists());
    }

    #[test]
    fn file_store_sanitizes_keys() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::with_dir(dir.path());

        store.set("../escape/key", "x").unwrap();
        assert!(dir.path().join(".._escape_key.json").exists());
        assert_eq!(store.get("../escape/key").as_deref(), Some("x"));
    }
}
