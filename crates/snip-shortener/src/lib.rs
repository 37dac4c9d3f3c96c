//! URL shortener service and asynchronous deletion pipeline.
//!
//! Storage backends live in `snip_storage`; core types are re-exported from
//! `snip_core`.

pub mod deletion;
pub mod error;
pub mod service;

pub use deletion::{DeletionQueue, DeletionRequest, DeletionWorker, DEFAULT_QUEUE_CAPACITY};
pub use error::{DeletionError, ShortenerError};
pub use service::UrlService;
