use std::collections::BTreeMap;
use std::sync::RwLock;

use batchalloc_allocation::{Batch, BatchSnapshot};
use batchalloc_core::{BatchReference, Sku};

use super::r#trait::{BatchRepository, RepositoryError};

/// In-memory batch repository.
///
/// Intended for tests/dev. Stores snapshots rather than live batches so that
/// callers never share mutable state with the store, and `get` goes through
/// the same restore path as the Postgres implementation.
#[derive(Debug, Default)]
pub struct InMemoryBatchRepository {
    batches: RwLock<BTreeMap<BatchReference, BatchSnapshot>>,
}

impl InMemoryBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BatchRepository for InMemoryBatchRepository {
    fn add(&self, batch: &Batch) -> Result<(), RepositoryError> {
        let mut batches = self
            .batches
            .write()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;

        batches.insert(batch.reference().clone(), batch.snapshot());
        Ok(())
    }

    fn get(&self, reference: &BatchReference) -> Result<Batch, RepositoryError> {
        let batches = self
            .batches
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;

        batches
            .get(reference)
            .cloned()
            .map(Batch::from)
            .ok_or_else(|| RepositoryError::NotFound(reference.clone()))
    }

    fn list_for_sku(&self, sku: &Sku) -> Result<Vec<Batch>, RepositoryError> {
        let batches = self
            .batches
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;

        Ok(batches
            .values()
            .filter(|snapshot| snapshot.sku == *sku)
            .cloned()
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

    fn line(order: &str, sku: &str, qty: u64) -> OrderLine {
        OrderLine::new(OrderReference::new(order), Sku::new(sku), qty)
    }

    #[test]
    fn get_returns_what_add_stored() {
        let repo = InMemoryBatchRepository::new();
        let eta = NaiveDate::from_ymd_opt(2031, 3, 14);
        let mut batch = Batch::new(
            BatchReference::new("batch1"),
            Sku::new("RUSTY-SOAPDISH"),
            100,
            eta,
        );
        batch.allocate(line("order1", "RUSTY-SOAPDISH", 10));
        batch.allocate(line("order2", "RUSTY-SOAPDISH", 5));

        repo.add(&batch).unwrap();
        let loaded = repo.get(&BatchReference::new("batch1")).unwrap();

        assert_eq!(loaded.sku(), &Sku::new("RUSTY-SOAPDISH"));
        assert_eq!(loaded.purchased_quantity(), 100);
        assert_eq!(loaded.eta(), eta);
        assert_eq!(loaded.available_quantity(), 85);
        assert!(loaded.is_allocated(&line("order1", "RUSTY-SOAPDISH", 10)));
        assert!(loaded.is_allocated(&line("order2", "RUSTY-SOAPDISH", 5)));
    }

    #[test]
    fn add_replaces_previous_state() {
        let repo = InMemoryBatchRepository::new();
        let mut batch = Batch::new(BatchReference::new("batch1"), Sku::new("TABLE"), 10, None);
        repo.add(&batch).unwrap();

        batch.allocate(line("order1", "TABLE", 3));
        repo.add(&batch).unwrap();

        assert_eq!(repo.list_for_sku(&Sku::new("TABLE")).unwrap().len(), 1);
        assert_eq!(repo.get(batch.reference()).unwrap().available_quantity(), 7);
    }

    #[test]
    fn loaded_batches_are_detached_from_the_store() {
        let repo = InMemoryBatchRepository::new();
        repo.add(&Batch::new(BatchReference::new("batch1"), Sku::new("TABLE"), 10, None))
            .unwrap();

        let mut loaded = repo.get(&BatchReference::new("batch1")).unwrap();
        loaded.allocate(line("order1", "TABLE", 3));

        assert_eq!(
            repo.get(&BatchReference::new("batch1")).unwrap().available_quantity(),
            10
        );
    }

    #[test]
    fn get_unknown_reference_is_not_found() {
        let repo = InMemoryBatchRepository::new();
        let err = repo.get(&BatchReference::new("missing")).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(r) if r.as_str() == "missing"));
    }

    #[test]
    fn list_for_sku_filters_by_sku() {
        let repo = InMemoryBatchRepository::new();
        repo.add(&Batch::new(BatchReference::new("b1"), Sku::new("LAMP"), 10, None)).unwrap();
        repo.add(&Batch::new(BatchReference::new("b2"), Sku::new("DESK"), 10, None)).unwrap();
        repo.add(&Batch::new(BatchReference::new("b3"), Sku::new("LAMP"), 5, None)).unwrap();

        let lamps = repo.list_for_sku(&Sku::new("LAMP")).unwrap();
        let refs: Vec<&str> = lamps.iter().map(|b| b.reference().as_str()).collect();

        assert_eq!(refs, vec!["b1", "b3"]);
        assert!(repo.list_for_sku(&Sku::new("SOFA")).unwrap().is_empty());
    }
}
