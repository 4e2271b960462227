//! Workspace start lock: at most one `start` per workspace root resolves
//! and writes the marker at a time.
//!
//! Two layers. Within this process, contenders queue on an async mutex
//! keyed by lock path. Across processes, the holder owns
//! `<root>/.context/.session_start.lock`, created exclusively and holding a
//! `<pid> <nonce>` token.
//!
//! A lock file is abandoned when its pid is not running, or when the pid is
//! this process's own while no task here holds the in-process mutex (a
//! previous incarnation with a recycled pid). Abandoned locks are moved
//! aside under a unique name and checked again before being discarded, so
//! two contenders can never both take over the same file.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{AppError, Result};

const RETRY_DELAY: Duration = Duration::from_millis(100);

type LocalLocks = Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>;

static LOCAL_LOCKS: OnceLock<LocalLocks> = OnceLock::new();

fn local_lock(lock_path: &Path) -> Arc<tokio::sync::Mutex<()>> {
    let locks = LOCAL_LOCKS.get_or_init(LocalLocks::default);
    let mut locks = locks.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(lock_path.to_path_buf()).or_default())
}

/// Identity written into the lock file by its holder.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LockToken {
    pid: u32,
    nonce: String,
}

impl LockToken {
    fn mint() -> Self {
        Self {
            pid: std::process::id(),
            nonce: Uuid::new_v4().simple().to_string(),
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let (pid, nonce) = raw.trim().split_once(' ')?;
        Some(Self {
            pid: pid.parse().ok()?,
            nonce: nonce.to_owned(),
        })
    }

    fn read(path: &Path) -> std::io::Result<Option<Self>> {
        fs::read_to_string(path).map(|raw| Self::parse(&raw))
    }

    /// Whether a process could still be using this token. Called only
    /// while holding the in-process lock, so a token carrying our own pid
    /// belongs to an earlier process.
    fn owner_alive(&self) -> bool {
        self.pid != std::process::id() && is_process_running(self.pid)
    }
}

impl Display for LockToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pid, self.nonce)
    }
}

/// What stood in the way of creating the lock file.
#[derive(Debug)]
enum Contention {
    Live(LockToken),
    Abandoned(LockToken),
    /// Empty, partially written, or unreadable; the owner may be between
    /// create and write.
    Unsettled,
}

/// Held start lock. Dropping it releases both layers.
#[derive(Debug)]
pub struct StartLock {
    path: PathBuf,
    token: LockToken,
    _local: OwnedMutexGuard<()>,
}

impl Drop for StartLock {
    fn drop(&mut self) {
        // Only remove the file while it still carries our token.
        if matches!(LockToken::read(&self.path), Ok(Some(ref t)) if *t == self.token) {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Acquire the start lock at `lock_path`, waiting at most `wait`.
///
/// # Errors
///
/// - `AppError::LockTimeout` if another start still holds the lock after `wait`.
/// - `AppError::Io` if the lock directory cannot be created.
pub async fn acquire(lock_path: &Path, wait: Duration) -> Result<StartLock> {
    let deadline = Instant::now() + wait;
    let local = tokio::time::timeout_at(deadline, local_lock(lock_path).lock_owned())
        .await
        .map_err(|_| {
            AppError::LockTimeout("another session start in this process is still running".into())
        })?;

    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| AppError::Io(format!("failed to create lock dir: {err}")))?;
    }

    let token = LockToken::mint();
    loop {
        let contention = match try_create(lock_path, &token) {
            Ok(()) => {
                debug!(path = %lock_path.display(), "start lock acquired");
                return Ok(StartLock {
                    path: lock_path.to_path_buf(),
                    token,
                    _local: local,
                });
            }
            Err(contention) => contention,
        };

        match contention {
            Contention::Abandoned(stale) => {
                take_over(lock_path, &stale);
                continue;
            }
            Contention::Live(ref owner) if Instant::now() >= deadline => {
                return Err(AppError::LockTimeout(format!(
                    "another session start is running (pid {})",
                    owner.pid
                )));
            }
            Contention::Unsettled if Instant::now() >= deadline => {
                return Err(AppError::LockTimeout(format!(
                    "could not acquire {}; remove it if no session start is running",
                    lock_path.display()
                )));
            }
            Contention::Live(_) | Contention::Unsettled => {}
        }
        tokio::time::sleep(RETRY_DELAY).await;
    }
}

fn try_create(lock_path: &Path, token: &LockToken) -> std::result::Result<(), Contention> {
    match OpenOptions::new().write(true).create_new(true).open(lock_path) {
        Ok(mut file) => {
            if writeln!(file, "{token}").is_err() {
                let _ = fs::remove_file(lock_path);
                return Err(Contention::Unsettled);
            }
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => match LockToken::read(lock_path) {
            Ok(Some(owner)) if owner.owner_alive() => Err(Contention::Live(owner)),
            Ok(Some(owner)) => Err(Contention::Abandoned(owner)),
            Ok(None) | Err(_) => Err(Contention::Unsettled),
        },
        Err(_) => Err(Contention::Unsettled),
    }
}

/// Move an abandoned lock aside and discard it, provided the file moved is
/// still the one judged abandoned. A fresh lock moved by mistake is linked
/// back into place.
fn take_over(lock_path: &Path, stale: &LockToken) {
    let aside = lock_path.with_extension(format!("lock.{}", Uuid::new_v4().simple()));
    if fs::rename(lock_path, &aside).is_err() {
        // Another contender moved it first.
        return;
    }

    match LockToken::read(&aside) {
        Ok(Some(ref moved)) if moved == stale => {
            warn!(path = %lock_path.display(), pid = stale.pid, "removed abandoned start lock");
        }
        _ => {
            if let Err(err) = fs::hard_link(&aside, lock_path) {
                warn!(%err, path = %lock_path.display(), "could not restore a live start lock");
            }
        }
    }
    let _ = fs::remove_file(&aside);
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM))
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}
