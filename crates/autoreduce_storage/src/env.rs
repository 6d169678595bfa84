//! Environment and transactions.
//!
//! An [`Environment`] owns the committed snapshot and the commit log. There is
//! one writer at a time: [`Environment::write`] blocks until the previous
//! write transaction is committed or dropped. Readers never block; each
//! [`ReadTransaction`] sees the snapshot published by the last commit.
//!
//! ```text
//! <env_path>/
//! ├─ LOCK          # Advisory lock for single-process access
//! └─ commit.log    # Commit log
//! ```

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::file::FileBackend;
use crate::log::{CommitLog, LogOp};
use crate::memory::InMemoryBackend;
use crate::tree::{ReadView, Snapshot};
use fs2::FileExt;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "commit.log";

/// Exclusive hold on an environment directory.
#[derive(Debug)]
struct EnvDir {
    path: PathBuf,
    _lock_file: File,
}

impl EnvDir {
    fn open(path: &Path) -> StorageResult<Self> {
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }
}

/// A transactional store of named ordered trees.
pub struct Environment {
    committed: RwLock<Arc<Snapshot>>,
    log: Mutex<CommitLog>,
    dir: Option<EnvDir>,
}

impl Environment {
    /// Open an environment over a byte backend, replaying its commit log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is corrupted or cannot be read.
    pub fn open(backend: Box<dyn StorageBackend>) -> StorageResult<Self> {
        let (log, snapshot) = CommitLog::open(backend)?;
        info!(
            records = log.records(),
            trees = snapshot.tree_count(),
            "environment opened"
        );
        Ok(Self {
            committed: RwLock::new(Arc::new(snapshot)),
            log: Mutex::new(log),
            dir: None,
        })
    }

    /// Open a fresh, empty in-memory environment.
    pub fn in_memory() -> Self {
        Self {
            committed: RwLock::new(Arc::default()),
            log: Mutex::new(CommitLog::empty(Box::new(InMemoryBackend::new()))),
            dir: None,
        }
    }

    /// Open or create an environment in a directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another process holds the
    /// directory, or an error if the log cannot be opened.
    pub fn open_dir(path: &Path) -> StorageResult<Self> {
        let dir = EnvDir::open(path)?;
        let backend = FileBackend::open(&dir.path.join(LOG_FILE))?;
        let mut env = Self::open(Box::new(backend))?;
        env.dir = Some(dir);
        Ok(env)
    }

    /// Directory backing this environment, if any.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(|dir| dir.path.as_path())
    }

    /// Begin a read transaction on the latest committed snapshot.
    pub fn read(&self) -> ReadTransaction {
        ReadTransaction {
            snapshot: Arc::clone(&self.committed.read()),
        }
    }

    /// Begin the write transaction, waiting for any active writer to finish.
    pub fn write(&self) -> WriteTransaction<'_> {
        let log = self.log.lock();
        let working = Snapshot::clone(&self.committed.read());
        WriteTransaction {
            env: self,
            log,
            working,
            ops: Vec::new(),
        }
    }

    /// Number of transactions recorded in the commit log.
    pub fn commit_count(&self) -> u64 {
        self.log.lock().records()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("path", &self.path())
            .field("trees", &self.committed.read().tree_count())
            .finish_non_exhaustive()
    }
}

/// A stable view of the last committed state.
#[derive(Debug, Clone)]
pub struct ReadTransaction {
    snapshot: Arc<Snapshot>,
}

impl ReadView for ReadTransaction {
    fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

/// The single active write transaction.
///
/// Writes are visible to this transaction immediately and to everyone else
/// after [`commit`](Self::commit). Dropping the transaction without
/// committing discards every write.
pub struct WriteTransaction<'env> {
    env: &'env Environment,
    log: MutexGuard<'env, CommitLog>,
    working: Snapshot,
    ops: Vec<LogOp>,
}

impl WriteTransaction<'_> {
    /// Create a tree if it does not exist. Returns `true` if it was created.
    pub fn create_tree(&mut self, tree: &str) -> bool {
        let created = self.working.create_tree(tree);
        if created {
            self.ops.push(LogOp::CreateTree {
                tree: tree.to_string(),
            });
        }
        created
    }

    /// Set `key` to `value`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TreeNotFound`] if the tree does not exist.
    pub fn put(&mut self, tree: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.working
            .tree_mut(tree)?
            .insert(key.to_vec(), value.to_vec());
        self.ops.push(LogOp::Put {
            tree: tree.to_string(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    /// Remove `key`. Returns `true` if it was present.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TreeNotFound`] if the tree does not exist.
    pub fn delete(&mut self, tree: &str, key: &[u8]) -> StorageResult<bool> {
        let removed = self.working.tree_mut(tree)?.remove(key).is_some();
        if removed {
            self.ops.push(LogOp::Delete {
                tree: tree.to_string(),
                key: key.to_vec(),
            });
        }
        Ok(removed)
    }

    /// Number of mutations recorded so far.
    pub fn pending_ops(&self) -> usize {
        self.ops.len()
    }

    /// Commit and publish this transaction's writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit log cannot be written. Nothing is
    /// published in that case.
    pub fn commit(self) -> StorageResult<()> {
        self.finish(false)
    }

    /// Commit, syncing the commit log to durable storage before publishing.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit log cannot be written or synced.
    pub fn commit_and_sync(self) -> StorageResult<()> {
        self.finish(true)
    }

    fn finish(mut self, sync: bool) -> StorageResult<()> {
        if self.ops.is_empty() {
            return Ok(());
        }
        self.log.append(&self.ops, sync)?;
        debug!(ops = self.ops.len(), sync, "transaction committed");
        *self.env.committed.write() = Arc::new(self.working);
        Ok(())
    }
}

impl ReadView for WriteTransaction<'_> {
    fn snapshot(&self) -> &Snapshot {
        &self.working
    }
}
