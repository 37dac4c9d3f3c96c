//! Storage backends for the snip URL shortener.
//!
//! Three implementations of the [`Repository`] contract live here: an
//! in-memory map, an append-only JSON-lines file and a Postgres table.
//! [`selector::open`] picks one of them from a [`StorageConfig`].

mod index;

pub mod file;
pub mod memory;
pub mod postgres;
pub mod selector;

pub use file::FileRepository;
pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;
pub use selector::{BackendKind, StorageConfig};
pub use snip_core::{ReadRepository, Repository, StorageError};
