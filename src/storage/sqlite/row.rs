//! Row mapping for the `trademarks` table.

use super::sql::{decode_embedding, parse_date};
use crate::models::{ClassCodes, TrademarkId, TrademarkRecord, TrademarkSummary};
use rusqlite::Row;

/// Columns selected for a full record, in [`record_from_row`] order.
pub const RECORD_COLUMNS: &str = "id, serial_number, class_indices, registration_date, \
     description, applicant_name, agent_details, logo_data, text_embedding, logo_embedding";

/// Columns selected for a summary, in [`summary_from_row`] order.
pub const SUMMARY_COLUMNS: &str = "id, serial_number, class_indices, registration_date, \
     description, applicant_name, logo_data IS NOT NULL";

/// Maps a [`RECORD_COLUMNS`] row.
pub fn record_from_row(row: &Row<'_>) -> rusqlite::Result<TrademarkRecord> {
    let registration_date: Option<String> = row.get(3)?;
    let text_embedding: Option<Vec<u8>> = row.get(8)?;
    let logo_embedding: Option<Vec<u8>> = row.get(9)?;
    Ok(TrademarkRecord {
        id: TrademarkId::new(row.get(0)?),
        serial_number: row.get(1)?,
        class_indices: ClassCodes::new(row.get::<_, String>(2)?),
        registration_date: parse_date(registration_date.as_deref()),
        description: row.get(4)?,
        applicant_name: row.get(5)?,
        agent_details: row.get(6)?,
        logo: row.get(7)?,
        text_embedding: text_embedding.as_deref().and_then(decode_embedding),
        logo_embedding: logo_embedding.as_deref().and_then(decode_embedding),
    })
}

/// A [`SUMMARY_COLUMNS`] row, before filter predicates are applied.
pub struct SummaryRow {
    pub id: TrademarkId,
    pub serial_number: String,
    pub class_indices: ClassCodes,
    pub registration_date: Option<String>,
    pub description: String,
    pub applicant_name: String,
    pub has_logo: bool,
}

/// Maps a [`SUMMARY_COLUMNS`] row.
pub fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<SummaryRow> {
    Ok(SummaryRow {
        id: TrademarkId::new(row.get(0)?),
        serial_number: row.get(1)?,
        class_indices: ClassCodes::new(row.get::<_, String>(2)?),
        registration_date: row.get(3)?,
        description: row.get(4)?,
        applicant_name: row.get(5)?,
        has_logo: row.get(6)?,
    })
}

impl SummaryRow {
    /// Converts into the public projection.
    pub fn into_summary(self) -> TrademarkSummary {
        TrademarkSummary {
            id: self.id,
            serial_number: self.serial_number,
            class_indices: self.class_indices.as_str().to_string(),
            registration_date: parse_date(self.registration_date.as_deref()),
            applicant_name: self.applicant_name,
            description: self.description,
            has_logo: self.has_logo,
        }
    }
}
