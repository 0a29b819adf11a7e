//! In-memory record store.

use super::traits::RecordStore;
use crate::models::{
    InsertOutcome, NewTrademark, RecordFilter, TrademarkId, TrademarkRecord, TrademarkSummary,
};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct State {
    next_id: i64,
    records: BTreeMap<TrademarkId, TrademarkRecord>,
    by_serial: HashMap<String, TrademarkId>,
}

/// Process-local [`RecordStore`].
///
/// Behaves like the `SQLite` store (unique serials, monotonically increasing
/// ids, newest-first results) without touching disk. Useful for tests and
/// throwaway demos.
#[derive(Default)]
pub struct InMemoryRecordStore {
    state: RwLock<State>,
}

impl InMemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| {
            tracing::warn!("In-memory store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| {
            tracing::warn!("In-memory store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl RecordStore for InMemoryRecordStore {
    fn insert(&self, record: &NewTrademark) -> Result<InsertOutcome> {
        let serial = record.serial_number.trim();
        if serial.is_empty() {
            return Err(Error::InvalidInput(
                "serial number must not be empty".to_string(),
            ));
        }

        let mut state = self.write();
        if state.by_serial.contains_key(serial) {
            return Ok(InsertOutcome::Duplicate);
        }

        state.next_id += 1;
        let id = TrademarkId::new(state.next_id);
        state.by_serial.insert(serial.to_string(), id);
        state.records.insert(
            id,
            TrademarkRecord {
                id,
                serial_number: serial.to_string(),
                class_indices: record.class_indices.clone(),
                registration_date: record.registration_date,
                description: record.description.clone(),
                applicant_name: record.applicant_name.clone(),
                agent_details: record.agent_details.clone(),
                logo: record.logo.clone(),
                text_embedding: record.text_embedding.clone(),
                logo_embedding: record.logo_embedding.clone(),
            },
        );
        Ok(InsertOutcome::Inserted(id))
    }

    fn get(&self, id: TrademarkId) -> Result<Option<TrademarkRecord>> {
        Ok(self.read().records.get(&id).cloned())
    }

    fn contains_serial(&self, serial_number: &str) -> Result<bool> {
        Ok(self.read().by_serial.contains_key(serial_number.trim()))
    }

    fn fetch_logo(&self, id: TrademarkId) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read()
            .records
            .get(&id)
            .and_then(|record| record.logo.clone())
            .filter(|bytes| !bytes.is_empty()))
    }

    fn fetch_all_embeddings(&self) -> Result<Vec<(TrademarkId, Option<Vec<f32>>)>> {
        Ok(self
            .read()
            .records
            .values()
            .map(|record| (record.id, record.logo_embedding.clone()))
            .collect())
    }

    fn filtered_search(&self, filter: &RecordFilter) -> Result<Vec<TrademarkSummary>> {
        if filter.excludes_everything() {
            return Ok(Vec::new());
        }
        Ok(self
            .read()
            .records
            .values()
            .rev()
            .filter(|record| {
                filter.matches(
                    record.id,
                    &record.class_indices,
                    &record.description,
                    &record.applicant_name,
                )
            })
            .map(TrademarkRecord::summary)
            .collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.read().records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = InMemoryRecordStore::new();
        let a = store.insert(&NewTrademark::new("A")).unwrap().id().unwrap();
        let b = store.insert(&NewTrademark::new("B")).unwrap().id().unwrap();
        assert!(b > a);
        assert_eq!(store.count().unwrap(), 2);
        assert!(store.contains_serial("A ").unwrap());
        assert!(!store.contains_serial("C").unwrap());
    }

    #[test]
    fn test_duplicate_serial() {
        let store = InMemoryRecordStore::new();
        store.insert(&NewTrademark::new("X")).unwrap();
        assert_eq!(
            store.insert(&NewTrademark::new(" X ")).unwrap(),
            InsertOutcome::Duplicate
        );
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_filtered_search_matches_sqlite_semantics() {
        let store = InMemoryRecordStore::new();
        let a = store
            .insert(&NewTrademark::new("A").with_applicant("Acme").with_classes("9"))
            .unwrap()
            .id()
            .unwrap();
        let _ = store
            .insert(&NewTrademark::new("B").with_applicant("Acme").with_classes("19"))
            .unwrap();
        let c = store
            .insert(&NewTrademark::new("C").with_description("ACME parts").with_classes("9"))
            .unwrap()
            .id()
            .unwrap();

        let filter = RecordFilter::new()
            .with_text(Some("acme"))
            .with_class_code(Some(9));
        let ids: Vec<_> = store
            .filtered_search(&filter)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![c, a]);

        let allow_a = filter.with_allowlist([a]);
        assert_eq!(store.filtered_search(&allow_a).unwrap().len(), 1);
    }

    #[test]
    fn test_fetch_logo_and_embeddings() {
        let store = InMemoryRecordStore::new();
        let id = store
            .insert(
                &NewTrademark::new("L")
                    .with_logo(vec![7])
                    .with_logo_embedding(vec![0.0, 1.0]),
            )
            .unwrap()
            .id()
            .unwrap();
        assert_eq!(store.fetch_logo(id).unwrap(), Some(vec![7]));
        assert_eq!(
            store.fetch_all_embeddings().unwrap(),
            vec![(id, Some(vec![0.0, 1.0]))]
        );
    }
}
