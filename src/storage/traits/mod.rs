//! Storage backend traits.

mod record;

pub use record::RecordStore;
