use testcontainers::TestcontainersError;
use thiserror::Error;

/// Errors raised while managing throwaway database containers.
#[derive(Debug, Error)]
pub enum TestInfraError {
    #[error("failed to start {image} container: {source}")]
    Startup {
        image: String,
        #[source]
        source: TestcontainersError,
    },

    #[error("container error: {0}")]
    Container(#[from] TestcontainersError),
}

pub type Result<T> = std::result::Result<T, TestInfraError>;
