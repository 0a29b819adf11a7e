//! Record store trait.

use crate::Result;
use crate::models::{
    InsertOutcome, NewTrademark, RecordFilter, TrademarkId, TrademarkRecord, TrademarkSummary,
};

/// Authoritative store of trademark records.
///
/// Implementations must be safe for concurrent readers while a writer is
/// active. Every read reflects the records as of the moment it executes;
/// there is no cross-call consistency.
///
/// # Implementor Notes
///
/// - Ids are assigned on insert, never reused and never change
/// - Serial numbers are unique; inserting a known serial is a no-op that
///   reports [`InsertOutcome::Duplicate`]
/// - Failures to reach the backing storage surface as
///   [`Error::StoreUnavailable`](crate::Error::StoreUnavailable)
pub trait RecordStore: Send + Sync {
    /// Inserts a record unless its serial number already exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`](crate::Error::InvalidInput) for an
    /// empty serial number, or an error if the write fails.
    fn insert(&self, record: &NewTrademark) -> Result<InsertOutcome>;

    /// Retrieves a full record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get(&self, id: TrademarkId) -> Result<Option<TrademarkRecord>>;

    /// Returns whether a record with this serial number is stored.
    ///
    /// Serial numbers compare after trimming, as on insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn contains_serial(&self, serial_number: &str) -> Result<bool>;

    /// Returns the raw logo bytes for `id`.
    ///
    /// Returns `Ok(None)` if the record does not exist or has no logo.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn fetch_logo(&self, id: TrademarkId) -> Result<Option<Vec<u8>>>;

    /// Returns every record id with its logo embedding, in ascending id
    /// order. Records without a usable embedding carry `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn fetch_all_embeddings(&self) -> Result<Vec<(TrademarkId, Option<Vec<f32>>)>>;

    /// Returns summaries of the records matching every predicate of
    /// `filter`, newest (highest id) first.
    ///
    /// An allowlist that is present but empty yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn filtered_search(&self, filter: &RecordFilter) -> Result<Vec<TrademarkSummary>>;

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn count(&self) -> Result<usize>;
}
