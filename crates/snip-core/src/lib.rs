//! Core types and traits for the snip URL shortener.
//!
//! This crate holds the record model, the short code derivation and the
//! storage contract implemented by every backend in `snip-storage`.

pub mod error;
pub mod record;
pub mod repository;
pub mod shortcode;

pub use error::{CoreError, StorageError};
pub use record::{BatchItem, Stats, UrlRecord};
pub use repository::{ReadRepository, Repository};
pub use shortcode::ShortCode;
