use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const LOCK_FILE: &str = ".lock";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Exclusive advisory lock on a workspace's `tally/` directory.
///
/// Every `tl` command that changes the store holds one from load to commit,
/// so two processes never interleave a read-modify-write. Released on drop.
///
/// The lock file itself is left in place: unlinking it while another process
/// waits on the old inode would let two holders coexist.
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not create lock file at {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("workspace is busy: another tl process holds {path}")]
    Timeout { path: PathBuf },
}

impl FileLock {
    /// Wait up to `timeout` for the lock.
    pub fn acquire(tally_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = tally_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::CreateError {
                path: path.clone(),
                source,
            })?;

        let deadline = Instant::now() + timeout;
        while try_lock(&file).is_err() {
            if Instant::now() >= deadline {
                return Err(LockError::Timeout { path });
            }
            std::thread::sleep(RETRY_INTERVAL);
        }
        Ok(FileLock { _file: file, path })
    }

    pub fn acquire_default(tally_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(tally_dir, DEFAULT_TIMEOUT)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> std::io::Result<()> {
    Ok(())
}
