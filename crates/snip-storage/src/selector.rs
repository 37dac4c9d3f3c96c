use crate::{FileRepository, InMemoryRepository, PostgresRepository};
use snip_core::error::Result;
use snip_core::Repository;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use typed_builder::TypedBuilder;

/// Settings that decide which backend the process uses.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct StorageConfig {
    /// Postgres connection string.
    #[builder(default, setter(into, strip_option))]
    pub database_dsn: Option<String>,
    /// Path of the append-only log used by the file backend.
    #[builder(default, setter(into, strip_option))]
    pub file_storage_path: Option<PathBuf>,
}

/// The backend chosen for a [`StorageConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    InMemory,
    File(PathBuf),
    Postgres(String),
}

impl BackendKind {
    /// Applies the selection precedence: a database DSN wins over a file
    /// path, which wins over the in-memory default. Blank values count as
    /// absent.
    pub fn select(config: &StorageConfig) -> Self {
        if let Some(dsn) = config
            .database_dsn
            .as_deref()
            .filter(|dsn| !dsn.trim().is_empty())
        {
            return BackendKind::Postgres(dsn.to_owned());
        }

        if let Some(path) = config
            .file_storage_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
        {
            return BackendKind::File(path.clone());
        }

        BackendKind::InMemory
    }

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::InMemory => "in-memory",
            BackendKind::File(_) => "file",
            BackendKind::Postgres(_) => "postgres",
        }
    }
}

impl Display for BackendKind {
    // The DSN may carry credentials and is never printed.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds the backend selected by `config`.
///
/// Called once at startup; the returned handle is shared for the lifetime
/// of the process.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn Repository>> {
    let kind = BackendKind::select(config);
    info!(backend = %kind, "opening storage backend");

    let repository: Arc<dyn Repository> = match kind {
        BackendKind::InMemory => Arc::new(InMemoryRepository::new()),
        BackendKind::File(path) => Arc::new(FileRepository::open(path).await?),
        BackendKind::Postgres(dsn) => Arc::new(PostgresRepository::connect(&dsn).await?),
    };

    Ok(repository)
}
