//! Batch persistence: the repository contract and its implementations.

pub mod in_memory;
pub mod json_file;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryBatchRepository;
pub use json_file::JsonFileBatchRepository;
pub use postgres::PostgresBatchRepository;
pub use r#trait::{BatchRepository, RepositoryError};
