//! Application state.

use std::sync::Arc;

use animo_db::{JobRepository, JobStore, MemoryStore, OrderRepository, OrderStore, PostgrestClient};
use animo_runway::{RunwayClient, VideoGenerator};
use animo_storage::{BlobStore, LocalStore, S3Store};
use animo_worker::{JobRunner, WorkerConfig};

use crate::config::{ApiConfig, DbBackend, StorageBackend};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orders: Arc<dyn OrderStore>,
    pub jobs: Arc<dyn JobStore>,
    pub storage: Arc<dyn BlobStore>,
    pub runner: JobRunner,
}

impl AppState {
    /// Create application state from environment-configured backends.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let (orders, jobs): (Arc<dyn OrderStore>, Arc<dyn JobStore>) = match config.db_backend {
            DbBackend::Postgrest => {
                let client = PostgrestClient::from_env()?;
                let orders: Arc<dyn OrderStore> = Arc::new(OrderRepository::new(client.clone()));
                (orders, Arc::new(JobRepository::new(client)))
            }
            DbBackend::Memory => {
                let store = Arc::new(MemoryStore::new());
                let orders: Arc<dyn OrderStore> = store.clone();
                (orders, store)
            }
        };

        let storage: Arc<dyn BlobStore> = match config.storage_backend {
            StorageBackend::S3 => Arc::new(S3Store::from_env()?),
            StorageBackend::Local => Arc::new(LocalStore::from_env()),
        };

        let generator: Arc<dyn VideoGenerator> = Arc::new(RunwayClient::from_env()?);

        Ok(Self::from_parts(
            config,
            orders,
            jobs,
            storage,
            generator,
            WorkerConfig::from_env(),
        ))
    }

    /// Assemble state from already-built backends.
    pub fn from_parts(
        config: ApiConfig,
        orders: Arc<dyn OrderStore>,
        jobs: Arc<dyn JobStore>,
        storage: Arc<dyn BlobStore>,
        generator: Arc<dyn VideoGenerator>,
        worker_config: WorkerConfig,
    ) -> Self {
        let runner = JobRunner::new(jobs.clone(), storage.clone(), generator, worker_config);
        Self {
            config,
            orders,
            jobs,
            storage,
            runner,
        }
    }
}
