//! JSON file-backed batch repository.
//!
//! The whole store is one JSON array of `BatchSnapshot`s. Every call reads the
//! file, and `add` rewrites it through a sibling temp file plus rename, so a
//! crash mid-write leaves the previous state in place. Meant for single-user
//! tooling (the CLI without Postgres), not for concurrent writers.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, instrument};

use batchalloc_allocation::{Batch, BatchSnapshot};
use batchalloc_core::{BatchReference, Sku};

use super::r#trait::{BatchRepository, RepositoryError};

#[derive(Debug)]
pub struct JsonFileBatchRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileBatchRepository {
    /// Use `path` as the state file. It is created on the first `add`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<BatchReference, BatchSnapshot>, RepositoryError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(RepositoryError::Storage(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        let snapshots: Vec<BatchSnapshot> = serde_json::from_slice(&raw).map_err(|e| {
            RepositoryError::Corrupt(format!("{} is not a batch file: {e}", self.path.display()))
        })?;

        Ok(snapshots
            .into_iter()
            .map(|snapshot| (snapshot.reference.clone(), snapshot))
            .collect())
    }

    fn write_all(
        &self,
        batches: &BTreeMap<BatchReference, BatchSnapshot>,
    ) -> Result<(), RepositoryError> {
        let snapshots: Vec<&BatchSnapshot> = batches.values().collect();
        let json = serde_json::to_vec_pretty(&snapshots)
            .map_err(|e| RepositoryError::Storage(format!("failed to encode batches: {e}")))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                RepositoryError::Storage(format!("failed to write {}: {e}", self.path.display()))
            })
    }
}

impl BatchRepository for JsonFileBatchRepository {
    #[instrument(skip(self, batch), fields(reference = %batch.reference()), err)]
    fn add(&self, batch: &Batch) -> Result<(), RepositoryError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;

        let mut batches = self.read_all()?;
        batches.insert(batch.reference().clone(), batch.snapshot());
        self.write_all(&batches)?;
        debug!(count = batches.len(), "batch file written");
        Ok(())
    }

    fn get(&self, reference: &BatchReference) -> Result<Batch, RepositoryError> {
        self.read_all()?
            .remove(reference)
            .map(Batch::from)
            .ok_or_else(|| RepositoryError::NotFound(reference.clone()))
    }

    fn list_for_sku(&self, sku: &Sku) -> Result<Vec<Batch>, RepositoryError> {
        Ok(self
            .read_all()?
            .into_values()
            .filter(|snapshot| snapshot.sku == *sku)
            .map(Batch::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchalloc_allocation::OrderLine;
    use batchalloc_core::OrderReference;
    use chrono::NaiveDate;

    use crate::service::AllocationService;

    fn line(order: &str, sku: &str, qty: u64) -> OrderLine {
        OrderLine::new(OrderReference::new(order), Sku::new(sku), qty)
    }

    #[test]
    fn missing_file_reads_as_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileBatchRepository::new(dir.path().join("batches.json"));

        assert!(repo.list_for_sku(&Sku::new("LAMP")).unwrap().is_empty());
        assert!(matches!(
            repo.get(&BatchReference::new("b1")),
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[test]
    fn state_survives_a_fresh_repository_on_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batches.json");
        let eta = NaiveDate::from_ymd_opt(2031, 3, 14);

        let first = AllocationService::new(JsonFileBatchRepository::new(&path));
        first
            .add_batch(BatchReference::new("b1"), Sku::new("LAMP"), 10, eta)
            .unwrap();

        // A new instance stands in for the next CLI invocation.
        let second = AllocationService::new(JsonFileBatchRepository::new(&path));
        let chosen = second.allocate(line("o1", "LAMP", 1)).unwrap();
        assert_eq!(chosen, BatchReference::new("b1"));

        let third = JsonFileBatchRepository::new(&path);
        let stored = third.get(&chosen).unwrap();
        assert_eq!(stored.eta(), eta);
        assert_eq!(stored.available_quantity(), 9);
        assert!(stored.is_allocated(&line("o1", "LAMP", 1)));
    }

    #[test]
    fn add_replaces_and_list_filters_by_sku() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileBatchRepository::new(dir.path().join("batches.json"));
        let mut lamp = Batch::new(BatchReference::new("b1"), Sku::new("LAMP"), 10, None);
        repo.add(&lamp).unwrap();
        let desk = Batch::new(BatchReference::new("b2"), Sku::new("DESK"), 4, None);
        repo.add(&desk).unwrap();

        lamp.allocate(line("o1", "LAMP", 3));
        repo.add(&lamp).unwrap();

        let lamps = repo.list_for_sku(&Sku::new("LAMP")).unwrap();
        assert_eq!(lamps.len(), 1);
        assert_eq!(lamps[0].available_quantity(), 7);
    }

    #[test]
    fn garbage_file_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batches.json");
        fs::write(&path, b"not json").unwrap();

        let err = JsonFileBatchRepository::new(&path)
            .get(&BatchReference::new("b1"))
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Corrupt(_)));
    }
}
