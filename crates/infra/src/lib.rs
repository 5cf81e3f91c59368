//! Infrastructure layer: batch storage, configuration, allocation use cases.

pub mod config;
pub mod repository;
pub mod service;

pub use config::{AppConfig, ConfigError, StoreConfig};
pub use repository::{
    BatchRepository, InMemoryBatchRepository, JsonFileBatchRepository, PostgresBatchRepository,
    RepositoryError,
};
pub use service::{AllocationService, ServiceError};
