//! Trademark record types.

use super::ClassCodes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a trademark record.
///
/// Assigned by the record store on insertion and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrademarkId(i64);

impl TrademarkId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TrademarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TrademarkId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A stored trademark record.
#[derive(Debug, Clone, PartialEq)]
pub struct TrademarkRecord {
    /// Store-assigned identifier.
    pub id: TrademarkId,
    /// Registry serial number, unique across the store.
    pub serial_number: String,
    /// Class codes the mark is registered under.
    pub class_indices: ClassCodes,
    /// Registration date, if known.
    pub registration_date: Option<NaiveDate>,
    /// Goods and services description.
    pub description: String,
    /// Applicant (owner) name.
    pub applicant_name: String,
    /// Agent or correspondent details.
    pub agent_details: String,
    /// Raw logo image bytes.
    pub logo: Option<Vec<u8>>,
    /// Text embedding of the description.
    pub text_embedding: Option<Vec<f32>>,
    /// Logo embedding.
    pub logo_embedding: Option<Vec<f32>>,
}

impl TrademarkRecord {
    /// Returns the lightweight projection returned by searches.
    #[must_use]
    pub fn summary(&self) -> TrademarkSummary {
        TrademarkSummary {
            id: self.id,
            serial_number: self.serial_number.clone(),
            class_indices: self.class_indices.as_str().to_string(),
            registration_date: self.registration_date,
            applicant_name: self.applicant_name.clone(),
            description: self.description.clone(),
            has_logo: self.logo.is_some(),
        }
    }
}

/// A trademark record awaiting insertion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTrademark {
    /// Registry serial number. Must be non-empty.
    pub serial_number: String,
    /// Class codes.
    pub class_indices: ClassCodes,
    /// Registration date.
    pub registration_date: Option<NaiveDate>,
    /// Goods and services description.
    pub description: String,
    /// Applicant name.
    pub applicant_name: String,
    /// Agent details.
    pub agent_details: String,
    /// Logo bytes.
    pub logo: Option<Vec<u8>>,
    /// Precomputed text embedding.
    pub text_embedding: Option<Vec<f32>>,
    /// Precomputed logo embedding.
    pub logo_embedding: Option<Vec<f32>>,
}

impl NewTrademark {
    /// Creates a record with the given serial number and empty fields.
    #[must_use]
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            ..Self::default()
        }
    }

    /// Sets the class codes from their raw string form.
    #[must_use]
    pub fn with_classes(mut self, classes: impl Into<String>) -> Self {
        self.class_indices = ClassCodes::new(classes);
        self
    }

    /// Sets the registration date.
    #[must_use]
    pub const fn with_registration_date(mut self, date: NaiveDate) -> Self {
        self.registration_date = Some(date);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the applicant name.
    #[must_use]
    pub fn with_applicant(mut self, applicant: impl Into<String>) -> Self {
        self.applicant_name = applicant.into();
        self
    }

    /// Sets the agent details.
    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent_details = agent.into();
        self
    }

    /// Sets the logo bytes.
    #[must_use]
    pub fn with_logo(mut self, logo: Vec<u8>) -> Self {
        self.logo = Some(logo);
        self
    }

    /// Sets a precomputed text embedding.
    #[must_use]
    pub fn with_text_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.text_embedding = Some(embedding);
        self
    }

    /// Sets a precomputed logo embedding.
    #[must_use]
    pub fn with_logo_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.logo_embedding = Some(embedding);
        self
    }
}

/// Result of inserting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was stored under a fresh id.
    Inserted(TrademarkId),
    /// A record with the same serial number already exists; nothing changed.
    Duplicate,
}

impl InsertOutcome {
    /// Returns the new id if the record was inserted.
    #[must_use]
    pub const fn id(self) -> Option<TrademarkId> {
        match self {
            Self::Inserted(id) => Some(id),
            Self::Duplicate => None,
        }
    }
}

/// Search result projection of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrademarkSummary {
    /// Record id.
    pub id: TrademarkId,
    /// Serial number.
    pub serial_number: String,
    /// Class codes as stored.
    pub class_indices: String,
    /// Registration date (`YYYY-MM-DD`).
    pub registration_date: Option<NaiveDate>,
    /// Applicant name.
    pub applicant_name: String,
    /// Description.
    pub description: String,
    /// Whether a logo can be fetched for this record.
    pub has_logo: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trademark_builder() {
        let record = NewTrademark::new("TM-1")
            .with_classes("3, 9")
            .with_description("Widgets")
            .with_applicant("Acme Corp")
            .with_logo(vec![1, 2, 3])
            .with_logo_embedding(vec![1.0, 0.0]);

        assert_eq!(record.serial_number, "TM-1");
        assert!(record.class_indices.contains(9));
        assert_eq!(record.applicant_name, "Acme Corp");
        assert_eq!(record.logo.as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(record.text_embedding.is_none());
    }

    #[test]
    fn test_summary_projection() {
        let record = TrademarkRecord {
            id: TrademarkId::new(7),
            serial_number: "S7".to_string(),
            class_indices: ClassCodes::new("19"),
            registration_date: NaiveDate::from_ymd_opt(2020, 1, 2),
            description: "Stone".to_string(),
            applicant_name: "Quarry Ltd".to_string(),
            agent_details: String::new(),
            logo: None,
            text_embedding: None,
            logo_embedding: None,
        };

        let summary = record.summary();
        assert_eq!(summary.id, TrademarkId::new(7));
        assert_eq!(summary.class_indices, "19");
        assert!(!summary.has_logo);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["registration_date"], "2020-01-02");
    }

    #[test]
    fn test_insert_outcome_id() {
        assert_eq!(
            InsertOutcome::Inserted(TrademarkId::new(3)).id(),
            Some(TrademarkId::new(3))
        );
        assert_eq!(InsertOutcome::Duplicate.id(), None);
    }
}
