//! Cross-process advisory locking for a project directory.
//!
//! Within a process the [`Triage`](crate::coordinator::Triage) writer mutex
//! orders transitions. Separate `qt` processes sharing one database take a
//! [`ProjectLock`] instead: exclusive for commands that mutate, shared for
//! readers.

use crate::error::ErrorCode;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// Advisory lock errors.
#[derive(Debug)]
pub enum LockError {
    Timeout { path: PathBuf, waited: Duration },
    IoError(io::Error),
}

impl From<io::Error> for LockError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::IoError(_) => ErrorCode::PersistenceFailed,
        }
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { path, waited } => write!(
                f,
                "{}: lock timed out after {:?} at {}",
                self.code().code(),
                waited,
                path.display()
            ),
            Self::IoError(err) => write!(f, "{}: {}", self.code().code(), err),
        }
    }
}

impl std::error::Error for LockError {}

/// Lock mode for [`ProjectLock::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// RAII guard over `.qtriage/lock`. Released on drop.
#[derive(Debug)]
pub struct ProjectLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl ProjectLock {
    /// Poll for the lock until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] if another process holds a conflicting
    /// lock for longer than `timeout`, or [`LockError::IoError`] if the lock
    /// file cannot be created.
    pub fn acquire(path: &Path, mode: LockMode, timeout: Duration) -> Result<Self, LockError> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "lock path has no parent")
        })?;
        fs::create_dir_all(parent)?;

        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;

            let acquired = match mode {
                LockMode::Shared => fs2::FileExt::try_lock_shared(&file).is_ok(),
                LockMode::Exclusive => fs2::FileExt::try_lock_exclusive(&file).is_ok(),
            };

            if acquired {
                tracing::trace!(path = %path.display(), ?mode, "acquired project lock");
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                    mode,
                });
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn mode(&self) -> LockMode {
        self.mode
    }

    /// Release explicitly. Dropping the guard does the same.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::{LockError, LockMode, ProjectLock};
    use crate::error::ErrorCode;
    use std::{
        sync::{Arc, Barrier},
        thread,
        time::Duration,
    };

    #[test]
    fn exclusive_lock_times_out_when_held() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(".qtriage/lock");
        let _guard = ProjectLock::acquire(&path, LockMode::Exclusive, Duration::from_millis(50))
            .expect("first lock");
        let err = ProjectLock::acquire(&path, LockMode::Exclusive, Duration::from_millis(20))
            .expect_err("second lock must time out");

        assert!(matches!(err, LockError::Timeout { path: ref p, .. } if *p == path));
        assert_eq!(err.code(), ErrorCode::LockContention);
        assert!(err.hint().is_some());
    }

    #[test]
    fn shared_locks_are_compatible() -> Result<(), LockError> {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("lock");
        let first = ProjectLock::acquire(&path, LockMode::Shared, Duration::from_millis(50))?;
        let second = ProjectLock::acquire(&path, LockMode::Shared, Duration::from_millis(50))?;
        assert_eq!(first.mode(), LockMode::Shared);
        assert_eq!(second.path(), path.as_path());
        first.release();
        second.release();
        Ok(())
    }

    #[test]
    fn writer_blocks_readers_until_released() -> Result<(), LockError> {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("lock");

        let held = Arc::new(Barrier::new(2));
        let done = Arc::new(Barrier::new(2));
        let (held_thread, done_thread) = (Arc::clone(&held), Arc::clone(&done));
        let path_in_thread = path.clone();
        let handle = thread::spawn(move || {
            let _writer = ProjectLock::acquire(
                &path_in_thread,
                LockMode::Exclusive,
                Duration::from_millis(200),
            )
            .expect("writer lock");
            held_thread.wait();
            done_thread.wait();
        });

        held.wait();
        assert!(matches!(
            ProjectLock::acquire(&path, LockMode::Shared, Duration::from_millis(20)),
            Err(LockError::Timeout { .. })
        ));
        done.wait();
        handle.join().expect("writer thread");

        ProjectLock::acquire(&path, LockMode::Shared, Duration::from_millis(50))?.release();
        Ok(())
    }
}
