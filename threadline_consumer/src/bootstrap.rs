use crate::config::{StoreLocation, ThreadlineConfig};
use crate::database::{Database, EntityStore, MemoryStore};
use anyhow::Result;
use std::fs;
use std::sync::Arc;

pub struct BootstrapResources {
    pub directories_created: Vec<String>,
    /// True when the store started out empty on this run.
    pub database_initialized: bool,
    pub store: Arc<dyn EntityStore>,
}

pub fn initialize(config: &ThreadlineConfig) -> Result<BootstrapResources> {
    let mut directories_created = Vec::new();
    if let StoreLocation::Sqlite(path) = &config.store.location {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_if_missing(parent, &mut directories_created)?;
        }
    }
    create_dir_if_missing(&config.paths.logs_dir, &mut directories_created)?;

    let (store, database_initialized): (Arc<dyn EntityStore>, bool) =
        match &config.store.location {
            StoreLocation::Memory => {
                tracing::warn!("using in-memory store; documents are lost on exit");
                (Arc::new(MemoryStore::new()), true)
            }
            StoreLocation::Sqlite(path) => {
                let database = Database::connect(path, config.store.operation_timeout)?;
                let created = database.ensure_migrations()?;
                (Arc::new(database), created)
            }
        };

    Ok(BootstrapResources {
        directories_created,
        database_initialized,
        store,
    })
}

fn create_dir_if_missing(path: &std::path::Path, created: &mut Vec<String>) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        created.push(path.display().to_string());
    }
    Ok(())
}
