//! Data models for marksearch.
//!
//! This module contains the core data structures shared by the store, the
//! index and the query path.

mod class_codes;
mod index;
mod search;
mod trademark;

pub use class_codes::{ClassCodes, parse_class_filter};
pub use index::{IndexState, IndexStatus};
pub use search::{RecordFilter, SearchRequest};
pub use trademark::{InsertOutcome, NewTrademark, TrademarkId, TrademarkRecord, TrademarkSummary};
