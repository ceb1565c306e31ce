use crate::CoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

pub const LOCK_FILE_NAME: &str = ".stack.lock";

/// Exclusive advisory lock on a stack checkout, held by mutating commands.
pub struct StackLock {
    lock_file: File,
}

impl StackLock {
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(LOCK_FILE_NAME)
    }

    fn open(lock_path: &Path) -> Result<File, CoreError> {
        Ok(OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?)
    }

    pub fn acquire(root: &Path) -> Result<Self, CoreError> {
        let file = Self::open(&Self::path_for(root))?;
        file.lock_exclusive()
            .map_err(|e| CoreError::Io(std::io::Error::new(std::io::ErrorKind::WouldBlock, e)))?;
        Ok(Self { lock_file: file })
    }

    /// `None` when another process holds the lock.
    pub fn try_acquire(root: &Path) -> Result<Option<Self>, CoreError> {
        let file = Self::open(&Self::path_for(root))?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { lock_file: file })),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for StackLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// First ^C asks multi-service loops to stop after the current service;
/// a second one exits at once.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            std::process::exit(130);
        }
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
        eprintln!("\ninterrupt received, stopping after the current service...");
    });
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _lock = StackLock::acquire(dir.path()).unwrap();
            assert!(StackLock::path_for(dir.path()).exists());
        }
        assert!(StackLock::try_acquire(dir.path()).unwrap().is_some());
    }

    #[test]
    fn try_acquire_returns_none_when_held() {
        let dir = tempfile::tempdir().unwrap();
        let _lock = StackLock::acquire(dir.path()).unwrap();
        assert!(StackLock::try_acquire(dir.path()).unwrap().is_none());
    }
}
