//! # autoreduce storage
//!
//! The storage engine underneath autoreduce indexes: named ordered trees,
//! tables with secondary indexes, and scoped read/write transactions, made
//! durable by an append-only commit log.
//!
//! ## Layers
//!
//! - [`StorageBackend`] - opaque byte stores ([`InMemoryBackend`], [`FileBackend`])
//! - [`Environment`] - committed snapshot plus commit log; hands out transactions
//! - [`ReadView`] - tree reads shared by [`ReadTransaction`] and [`WriteTransaction`]
//! - [`TableSchema`] - rows and secondary indexes laid out over trees
//!
//! ## Example
//!
//! ```rust
//! use autoreduce_storage::{Environment, ReadView};
//!
//! let env = Environment::in_memory();
//! let mut txn = env.write();
//! txn.create_tree("bucket");
//! txn.put("bucket", b"key", b"blob").unwrap();
//! txn.commit().unwrap();
//!
//! assert_eq!(env.read().get("bucket", b"key").unwrap(), Some(b"blob".as_slice()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod env;
mod error;
mod file;
mod log;
mod memory;
mod table;
mod tree;

pub use backend::StorageBackend;
pub use env::{Environment, ReadTransaction, WriteTransaction};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use log::{LogOp, LOG_MAGIC, LOG_VERSION};
pub use memory::InMemoryBackend;
pub use table::{IndexDef, IndexKind, TableRow, TableSchema};
pub use tree::{ReadView, Snapshot, Tree, TreeRange};
