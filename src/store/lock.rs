// src/store/lock.rs
//! Advisory lock: a sentinel file holding the owner's pid, created with
//! `create_new` so only one holder exists across tasks and processes.
//! Waiting is a bounded poll loop that ends in [`StoreError::LockTimeout`].

use metrics::counter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{restrict_permissions, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub timeout: Duration,
    pub poll: Duration,
    /// A sentinel older than this is assumed abandoned by a crashed holder.
    pub stale_after: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll: Duration::from_millis(100),
            stale_after: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
    opts: LockOptions,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>, opts: LockOptions) -> Self {
        Self {
            path: path.into(),
            opts,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> LockOptions {
        self.opts
    }

    /// Wait for the sentinel, polling every `poll`, for at most `timeout`.
    pub async fn acquire(&self) -> Result<LockGuard, StoreError> {
        let started = Instant::now();
        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
                .await
            {
                Ok(mut f) => {
                    let guard = LockGuard {
                        path: self.path.clone(),
                        released: false,
                    };
                    f.write_all(std::process::id().to_string().as_bytes()).await?;
                    f.flush().await?;
                    restrict_permissions(&self.path, 0o600).await;
                    return Ok(guard);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if self.is_stale().await && self.break_stale().await {
                        continue;
                    }
                    let waited = started.elapsed();
                    if waited >= self.opts.timeout {
                        counter!("store_lock_timeouts_total").increment(1);
                        warn!(target: "store", lock = %self.path.display(), waited_ms = waited.as_millis() as u64, "lock timeout");
                        return Err(StoreError::LockTimeout {
                            path: self.path.clone(),
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    debug!(target: "store", lock = %self.path.display(), "lock busy, waiting");
                    tokio::time::sleep(self.opts.poll).await;
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
    }

    fn breaker_path(&self) -> PathBuf {
        let mut p = self.path.clone().into_os_string();
        p.push(".break");
        PathBuf::from(p)
    }

    /// Remove a stale sentinel. Breaking goes through its own `create_new`
    /// sentinel and staleness is re-checked while holding it, so a waiter
    /// never deletes a lock another waiter has just taken.
    async fn break_stale(&self) -> bool {
        let breaker = self.breaker_path();
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&breaker)
            .await
        {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // a breaker that crashed mid-break must not block recovery forever
                if age_of(&breaker).await.is_some_and(|age| age > self.opts.stale_after) {
                    let _ = tokio::fs::remove_file(&breaker).await;
                }
                return false;
            }
            Err(e) => {
                debug!(target: "store", lock = %breaker.display(), error = %e, "cannot take break sentinel");
                return false;
            }
        }

        let broke = if self.is_stale().await {
            warn!(target: "store", lock = %self.path.display(), "removing stale lock");
            tokio::fs::remove_file(&self.path).await.is_ok()
        } else {
            false
        };
        let _ = tokio::fs::remove_file(&breaker).await;
        broke
    }

    async fn is_stale(&self) -> bool {
        age_of(&self.path).await.is_some_and(|age| age > self.opts.stale_after)
    }
}

async fn age_of(path: &Path) -> Option<Duration> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    let modified = meta.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

/// Held lock; the sentinel is removed on [`LockGuard::release`] or drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    pub async fn release(mut self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!(target: "store", lock = %self.path.display(), error = %e, "lock release failed");
        }
        self.released = true;
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> LockOptions {
        LockOptions {
            timeout: Duration::from_millis(150),
            poll: Duration::from_millis(10),
            stale_after: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn second_holder_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("x.lock"), quick());
        let g = lock.acquire().await.unwrap();
        let pid = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(pid, std::process::id().to_string());

        let err = lock.acquire().await.unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));

        g.release().await;
        assert!(!lock.path().exists());
        lock.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::new(dir.path().join("x.lock"), quick());
        {
            let _g = lock.acquire().await.unwrap();
            assert!(lock.path().exists());
        }
        assert!(!lock.path().exists());
    }

    #[tokio::test]
    async fn stale_sentinel_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.lock");
        std::fs::write(&path, "99999").unwrap();
        let lock = FileLock::new(
            &path,
            LockOptions {
                stale_after: Duration::ZERO,
                ..quick()
            },
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        let g = lock.acquire().await.unwrap();
        drop(g);
    }

    fn backdate(path: &Path, by: Duration) {
        let f = std::fs::File::options().write(true).open(path).unwrap();
        f.set_modified(SystemTime::now() - by).unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_waiters_break_a_stale_lock_only_once() {
        for _ in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("x.lock");
            std::fs::write(&path, "99999").unwrap();
            backdate(&path, Duration::from_secs(120));

            let opts = LockOptions {
                timeout: Duration::from_millis(200),
                poll: Duration::from_millis(10),
                stale_after: Duration::from_secs(60),
            };
            let waiters: Vec<_> = (0..3)
                .map(|_| {
                    let lock = FileLock::new(&path, opts);
                    tokio::spawn(async move { lock.acquire().await })
                })
                .collect();

            let mut held = Vec::new();
            let mut timed_out = 0;
            for w in waiters {
                match w.await.unwrap() {
                    Ok(g) => held.push(g),
                    Err(StoreError::LockTimeout { .. }) => timed_out += 1,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            assert_eq!(held.len(), 1, "exactly one waiter owns the lock");
            assert_eq!(timed_out, 2);
            assert_eq!(std::fs::read_to_string(&path).unwrap(), std::process::id().to_string());
            assert!(!dir.path().join("x.lock.break").exists());
        }
    }

    #[tokio::test]
    async fn abandoned_break_sentinel_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.lock");
        let breaker = dir.path().join("x.lock.break");
        std::fs::write(&path, "99999").unwrap();
        std::fs::write(&breaker, "").unwrap();
        backdate(&path, Duration::from_secs(120));
        backdate(&breaker, Duration::from_secs(120));

        let lock = FileLock::new(
            &path,
            LockOptions {
                timeout: Duration::from_secs(1),
                poll: Duration::from_millis(10),
                stale_after: Duration::from_secs(60),
            },
        );
        let g = lock.acquire().await.unwrap();
        assert!(!breaker.exists());
        g.release().await;
    }
}
