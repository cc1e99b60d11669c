use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::io::config_io;
use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::model::config::TallyConfig;
use crate::model::store::{Store, StoreFile};

pub const TALLY_DIR: &str = "tally";
pub const CONFIG_FILE: &str = "tally.toml";
pub const STORE_FILE: &str = "store.json";

/// Error type for workspace I/O
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not a tally workspace: no tally/tally.toml found (run `tl init`)")]
    NotAWorkspace,
    #[error("a tally workspace already exists at {0}")]
    AlreadyInitialized(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not parse tally.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit tally.toml: {0}")]
    ConfigEditError(#[from] toml_edit::TomlError),
    /// The in-memory change happened but is not on disk
    #[error("not saved: could not write {path}: {source}")]
    CommitFailure { path: PathBuf, source: io::Error },
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Where committed state goes. A commit is all-or-nothing: on error, nothing
/// previously committed is damaged and the caller still holds its state.
pub trait Backend {
    fn commit(&mut self, store: &Store) -> Result<(), StoreError>;
}

/// Persists to `tally/store.json` with an atomic replace. A failed write dumps
/// the unsaved store into the recovery log before reporting `CommitFailure`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    tally_dir: PathBuf,
}

impl FileBackend {
    pub fn new(tally_dir: impl Into<PathBuf>) -> Self {
        FileBackend {
            tally_dir: tally_dir.into(),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.tally_dir.join(STORE_FILE)
    }
}

impl Backend for FileBackend {
    fn commit(&mut self, store: &Store) -> Result<(), StoreError> {
        let path = self.store_path();
        let json = encode_store(store).map_err(|e| StoreError::CommitFailure {
            path: path.clone(),
            source: e.into(),
        })?;

        recovery::atomic_write(&path, json.as_bytes()).map_err(|source| {
            recovery::log_recovery(
                &self.tally_dir,
                RecoveryEntry::new(RecoveryCategory::Write, format!("{STORE_FILE} not saved"))
                    .field("path", path.display())
                    .field("error", &source)
                    .body(json.clone()),
            );
            StoreError::CommitFailure { path, source }
        })
    }
}

/// Keeps committed snapshots in memory. Used by tests, and able to fail a
/// given number of commits on purpose.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    pub snapshots: Vec<Store>,
    pub fail_next: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose next `n` commits fail.
    pub fn failing(n: usize) -> Self {
        MemoryBackend {
            snapshots: Vec::new(),
            fail_next: n,
        }
    }

    pub fn last_committed(&self) -> Option<&Store> {
        self.snapshots.last()
    }
}

impl Backend for MemoryBackend {
    fn commit(&mut self, store: &Store) -> Result<(), StoreError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(StoreError::CommitFailure {
                path: PathBuf::from("<memory>"),
                source: io::Error::other("simulated write failure"),
            });
        }
        self.snapshots.push(store.clone());
        Ok(())
    }
}

fn encode_store(store: &Store) -> Result<String, serde_json::Error> {
    let mut json = serde_json::to_string_pretty(store)?;
    json.push('\n');
    Ok(json)
}

// ---------------------------------------------------------------------------
// Workspace discovery and loading
// ---------------------------------------------------------------------------

/// A loaded workspace: `<root>/tally/` with its config and store.
#[derive(Debug)]
pub struct Workspace {
    pub root: PathBuf,
    pub tally_dir: PathBuf,
    pub config: TallyConfig,
    pub store: Store,
}

impl Workspace {
    pub fn backend(&self) -> FileBackend {
        FileBackend::new(&self.tally_dir)
    }
}

/// Walk up from `start` looking for `tally/tally.toml`. Returns the
/// workspace root (the parent of `tally/`).
pub fn discover_workspace(start: &Path) -> Result<PathBuf, StoreError> {
    start
        .ancestors()
        .find(|dir| dir.join(TALLY_DIR).join(CONFIG_FILE).is_file())
        .map(Path::to_path_buf)
        .ok_or(StoreError::NotAWorkspace)
}

pub fn load_workspace(root: &Path) -> Result<Workspace, StoreError> {
    let tally_dir = root.join(TALLY_DIR);
    if !tally_dir.is_dir() {
        return Err(StoreError::NotAWorkspace);
    }
    let config = config_io::load_config(&tally_dir)?;
    let store = Store::from(read_store_file(&tally_dir)?);
    Ok(Workspace {
        root: root.to_path_buf(),
        tally_dir,
        config,
        store,
    })
}

/// Read `store.json` as written, without normalizing. A missing file reads as
/// an empty store; an unreadable or malformed one is an error, never an
/// empty store.
pub fn read_store_file(tally_dir: &Path) -> Result<StoreFile, StoreError> {
    let path = tally_dir.join(STORE_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoreFile::from(Store::new())),
        Err(source) => return Err(StoreError::ReadError { path, source }),
    };
    serde_json::from_str(&text).map_err(|source| StoreError::ParseError { path, source })
}

/// Create `<root>/tally/` with the given config text and an empty store.
///
/// Refuses to touch an existing workspace unless `force` is set; even then
/// an existing store is kept and only the config is rewritten.
pub fn create_workspace(root: &Path, config_text: &str, force: bool) -> Result<PathBuf, StoreError> {
    let tally_dir = root.join(TALLY_DIR);
    let config_path = tally_dir.join(CONFIG_FILE);
    if config_path.exists() && !force {
        return Err(StoreError::AlreadyInitialized(tally_dir));
    }
    // Validate before anything hits disk
    toml::from_str::<TallyConfig>(config_text)?;

    fs::create_dir_all(&tally_dir)?;
    recovery::atomic_write(&config_path, config_text.as_bytes())?;

    let mut backend = FileBackend::new(&tally_dir);
    if !backend.store_path().exists() {
        backend.commit(&Store::new())?;
    }
    Ok(tally_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const CONFIG: &str = "[workspace]\nname = \"test\"\n";

    fn workspace() -> TempDir {
        let tmp = TempDir::new().unwrap();
        create_workspace(tmp.path(), CONFIG, false).unwrap();
        tmp
    }

    #[test]
    fn create_writes_config_and_empty_store() {
        let tmp = workspace();
        let ws = load_workspace(tmp.path()).unwrap();
        assert_eq!(ws.config.workspace.name, "test");
        assert_eq!(ws.store.item_count(), 0);
        assert!(tmp.path().join("tally/store.json").is_file());
    }

    #[test]
    fn create_refuses_existing_workspace_without_force() {
        let tmp = workspace();
        let err = create_workspace(tmp.path(), CONFIG, false).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyInitialized(_)));
    }

    #[test]
    fn forced_create_keeps_the_store() {
        let tmp = workspace();
        let tally_dir = tmp.path().join(TALLY_DIR);
        let mut store = Store::new();
        store.insert_item("Coffee".into(), 1).unwrap();
        FileBackend::new(&tally_dir).commit(&store).unwrap();

        create_workspace(tmp.path(), "[workspace]\nname = \"renamed\"\n", true).unwrap();
        let ws = load_workspace(tmp.path()).unwrap();
        assert_eq!(ws.config.workspace.name, "renamed");
        assert_eq!(ws.store.item_count(), 1);
    }

    #[test]
    fn create_rejects_bad_config() {
        let tmp = TempDir::new().unwrap();
        let err = create_workspace(tmp.path(), "[workspace]\n", false).unwrap_err();
        assert!(matches!(err, StoreError::ConfigParseError(_)));
        assert!(!tmp.path().join(TALLY_DIR).exists());
    }

    #[test]
    fn discover_walks_up() {
        let tmp = workspace();
        let nested = tmp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(discover_workspace(&nested).unwrap(), tmp.path());

        let other = TempDir::new().unwrap();
        assert!(matches!(
            discover_workspace(other.path()),
            Err(StoreError::NotAWorkspace)
        ));
    }

    #[test]
    fn commit_then_load_round_trips() {
        let tmp = workspace();
        let tally_dir = tmp.path().join(TALLY_DIR);
        let mut store = Store::new();
        let item = store.insert_item("Water".into(), 3).unwrap().id;
        let group = store.insert_group("Health".into(), "#FF5733".into()).unwrap().id;
        store.link(item, group);

        FileBackend::new(&tally_dir).commit(&store).unwrap();
        let loaded = load_workspace(tmp.path()).unwrap().store;
        assert_eq!(loaded.item(item).unwrap().name, "Water");
        assert_eq!(loaded.groups_of(item), vec![group]);
    }

    #[test]
    fn missing_store_reads_as_empty() {
        let tmp = workspace();
        fs::remove_file(tmp.path().join("tally/store.json")).unwrap();
        let ws = load_workspace(tmp.path()).unwrap();
        assert_eq!(ws.store.item_count(), 0);
    }

    #[test]
    fn malformed_store_is_an_error() {
        let tmp = workspace();
        fs::write(tmp.path().join("tally/store.json"), "{ not json").unwrap();
        let err = load_workspace(tmp.path()).unwrap_err();
        assert!(matches!(err, StoreError::ParseError { .. }));
    }

    #[test]
    fn failed_commit_is_reported_and_logged() {
        let tmp = workspace();
        let tally_dir = tmp.path().join(TALLY_DIR);
        // A directory where the store file should be makes the rename fail
        fs::remove_file(tally_dir.join(STORE_FILE)).unwrap();
        fs::create_dir(tally_dir.join(STORE_FILE)).unwrap();

        let mut store = Store::new();
        store.insert_item("Unsaved".into(), 9).unwrap();
        let err = FileBackend::new(&tally_dir).commit(&store).unwrap_err();
        assert!(matches!(err, StoreError::CommitFailure { .. }));
        assert!(err.to_string().starts_with("not saved"));

        let entries = recovery::read_recovery_entries(&tally_dir, None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Write);
        assert!(entries[0].body.contains("\"Unsaved\""));
    }

    #[test]
    fn memory_backend_can_fail_on_purpose() {
        let mut backend = MemoryBackend::failing(1);
        let store = Store::new();
        assert!(backend.commit(&store).is_err());
        assert!(backend.last_committed().is_none());
        assert!(backend.commit(&store).is_ok());
        assert_eq!(backend.snapshots.len(), 1);
    }
}
