//! Record ingestion.
//!
//! Inserts records into the store, computing the logo embedding from the
//! logo bytes when the caller does not supply one. Ingestion is idempotent
//! by serial number. New records become searchable after the next index
//! rebuild.

use crate::embedding::ImageEmbedder;
use crate::models::{ClassCodes, InsertOutcome, NewTrademark};
use crate::storage::RecordStore;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

/// Counts from a batch ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Rows stored as new records.
    pub inserted: usize,
    /// Rows whose serial number was already stored.
    pub duplicates: usize,
    /// Rows rejected (bad data, unreadable logo file).
    pub failed: usize,
    /// Inserted rows whose logo embedding was computed during ingestion.
    pub embedded_logos: usize,
}

impl IngestReport {
    /// Total rows processed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.inserted + self.duplicates + self.failed
    }
}

/// One row of a CSV manifest.
#[derive(Debug, Deserialize)]
struct ManifestRow {
    serial_number: String,
    #[serde(default)]
    class_indices: String,
    #[serde(default)]
    registration_date: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    applicant_name: String,
    #[serde(default)]
    agent_details: String,
    #[serde(default)]
    logo_path: Option<String>,
}

/// Writes records into the store.
#[derive(Clone)]
pub struct IngestService {
    store: Arc<dyn RecordStore>,
    embedder: Arc<dyn ImageEmbedder>,
    logo_dimensions: usize,
    text_dimensions: usize,
}

impl IngestService {
    /// Creates an ingestion service.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        embedder: Arc<dyn ImageEmbedder>,
        logo_dimensions: usize,
        text_dimensions: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            logo_dimensions,
            text_dimensions,
        }
    }

    /// Ingests one record.
    ///
    /// Supplied embeddings are validated against the configured
    /// dimensions. A known serial number is reported as a duplicate before
    /// any embedding work. A missing logo embedding is computed from the
    /// logo; an undecodable logo is stored without an embedding.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an empty serial number
    /// - [`Error::DimensionMismatch`] for wrongly sized embeddings
    /// - Store errors from the insert
    pub fn ingest(&self, record: NewTrademark) -> Result<InsertOutcome> {
        self.ingest_record(record).map(|(outcome, _)| outcome)
    }

    /// Ingests one record, also reporting whether a logo embedding was
    /// computed for a newly inserted record.
    #[instrument(skip(self, record), fields(serial_number = %record.serial_number))]
    fn ingest_record(&self, mut record: NewTrademark) -> Result<(InsertOutcome, bool)> {
        if record.serial_number.trim().is_empty() {
            return Err(Error::InvalidInput(
                "serial number must not be empty".to_string(),
            ));
        }
        check_dimensions(record.text_embedding.as_deref(), self.text_dimensions)?;
        check_dimensions(record.logo_embedding.as_deref(), self.logo_dimensions)?;

        if self.store.contains_serial(&record.serial_number)? {
            tracing::debug!("Serial number already stored, skipping");
            metrics::counter!("ingest_records_total", "status" => "duplicate").increment(1);
            return Ok((InsertOutcome::Duplicate, false));
        }

        let mut embedded = false;
        if record.logo_embedding.is_none()
            && let Some(logo) = record.logo.as_deref()
        {
            record.logo_embedding = self.embed_logo(logo)?;
            embedded = record.logo_embedding.is_some();
        }

        // A concurrent writer can still win the serial between the check and here
        let outcome = self.store.insert(&record)?;
        let status = match outcome {
            InsertOutcome::Inserted(_) => "inserted",
            InsertOutcome::Duplicate => "duplicate",
        };
        metrics::counter!("ingest_records_total", "status" => status).increment(1);
        Ok((outcome, embedded && outcome.id().is_some()))
    }

    fn embed_logo(&self, logo: &[u8]) -> Result<Option<Vec<f32>>> {
        match self.embedder.embed(logo) {
            Ok(vector) => {
                check_dimensions(Some(&vector), self.logo_dimensions)?;
                Ok(Some(vector))
            },
            Err(Error::Decode(cause)) => {
                tracing::warn!(cause, "Logo is not a decodable image, storing without embedding");
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    /// Ingests a CSV manifest.
    ///
    /// The manifest has a header row with the columns `serial_number`,
    /// `class_indices`, `registration_date` (`YYYY-MM-DD`), `description`,
    /// `applicant_name`, `agent_details` and `logo_path`. Only
    /// `serial_number` is required. Relative logo paths resolve against the
    /// manifest's directory.
    ///
    /// Bad rows are counted as failed and skipped. A store outage aborts
    /// the batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be opened, or on a retryable
    /// store failure.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn ingest_csv(&self, path: &Path) -> Result<IngestReport> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| Error::OperationFailed {
                operation: "open_manifest".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut report = IngestReport::default();
        for (line, row) in reader.deserialize::<ManifestRow>().enumerate() {
            let row_number = line + 2;
            let record = match row
                .map_err(|e| Error::InvalidInput(e.to_string()))
                .and_then(|row| self.record_from_row(row, &base_dir))
            {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(row = row_number, error = %e, "Skipping manifest row");
                    report.failed += 1;
                    continue;
                },
            };

            match self.ingest_record(record) {
                Ok((InsertOutcome::Inserted(_), embedded)) => {
                    report.inserted += 1;
                    if embedded {
                        report.embedded_logos += 1;
                    }
                },
                Ok((InsertOutcome::Duplicate, _)) => report.duplicates += 1,
                Err(e) if e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::warn!(row = row_number, error = %e, "Failed to ingest manifest row");
                    report.failed += 1;
                },
            }
        }

        tracing::info!(
            inserted = report.inserted,
            duplicates = report.duplicates,
            failed = report.failed,
            embedded_logos = report.embedded_logos,
            "Manifest ingested"
        );
        Ok(report)
    }

    fn record_from_row(&self, row: ManifestRow, base_dir: &Path) -> Result<NewTrademark> {
        let registration_date = match row.registration_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                Error::InvalidInput(format!("registration_date '{raw}': {e}"))
            })?),
        };

        let logo = match row.logo_path.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let path = resolve(base_dir, raw);
                Some(std::fs::read(&path).map_err(|e| Error::OperationFailed {
                    operation: "read_logo".to_string(),
                    cause: format!("{}: {e}", path.display()),
                })?)
            },
        };

        Ok(NewTrademark {
            serial_number: row.serial_number,
            class_indices: ClassCodes::new(row.class_indices),
            registration_date,
            description: row.description,
            applicant_name: row.applicant_name,
            agent_details: row.agent_details,
            logo,
            text_embedding: None,
            logo_embedding: None,
        })
    }
}

fn resolve(base_dir: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn check_dimensions(vector: Option<&[f32]>, expected: usize) -> Result<()> {
    match vector {
        Some(v) if v.len() != expected => Err(Error::DimensionMismatch {
            expected,
            actual: v.len(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::PixelFingerprintEmbedder;
    use crate::embedding::test_support::png;
    use crate::storage::InMemoryRecordStore;
    use std::io::Write;

    fn service() -> (Arc<InMemoryRecordStore>, IngestService) {
        let store = Arc::new(InMemoryRecordStore::new());
        let service = IngestService::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::new(PixelFingerprintEmbedder::with_dimensions(16)),
            16,
            4,
        );
        (store, service)
    }

    #[test]
    fn test_ingest_computes_logo_embedding() {
        let (store, service) = service();
        let id = service
            .ingest(NewTrademark::new("A").with_logo(png(3, 8)))
            .unwrap()
            .id()
            .unwrap();
        let stored = store.get(id).unwrap().unwrap();
        assert_eq!(stored.logo_embedding.map(|v| v.len()), Some(16));
    }

    #[test]
    fn test_ingest_keeps_supplied_embedding() {
        let (store, service) = service();
        let supplied = vec![0.25; 16];
        let id = service
            .ingest(
                NewTrademark::new("A")
                    .with_logo(png(3, 8))
                    .with_logo_embedding(supplied.clone()),
            )
            .unwrap()
            .id()
            .unwrap();
        assert_eq!(store.get(id).unwrap().unwrap().logo_embedding, Some(supplied));
    }

    #[test]
    fn test_undecodable_logo_stored_without_embedding() {
        let (store, service) = service();
        let id = service
            .ingest(NewTrademark::new("A").with_logo(b"not an image".to_vec()))
            .unwrap()
            .id()
            .unwrap();
        let stored = store.get(id).unwrap().unwrap();
        assert!(stored.logo.is_some());
        assert!(stored.logo_embedding.is_none());
    }

    #[test]
    fn test_wrong_dimensions_rejected() {
        let (_, service) = service();
        let result = service.ingest(NewTrademark::new("A").with_text_embedding(vec![1.0; 3]));
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_reingest_is_duplicate() {
        let (store, service) = service();
        service.ingest(NewTrademark::new("A")).unwrap();
        assert_eq!(
            service.ingest(NewTrademark::new("A")).unwrap(),
            InsertOutcome::Duplicate
        );
        assert_eq!(store.count().unwrap(), 1);
    }

    /// Counts calls and always fails.
    #[derive(Default)]
    struct DownEmbedder {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl ImageEmbedder for DownEmbedder {
        fn dimensions(&self) -> usize {
            16
        }

        fn embed(&self, _: &[u8]) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(Error::OperationFailed {
                operation: "embed".to_string(),
                cause: "model down".to_string(),
            })
        }
    }

    #[test]
    fn test_reingest_skips_embedding() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert(&NewTrademark::new("A")).unwrap();
        let embedder = Arc::new(DownEmbedder::default());
        let service = IngestService::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::clone(&embedder) as Arc<dyn ImageEmbedder>,
            16,
            4,
        );

        let outcome = service.ingest(NewTrademark::new(" A ").with_logo(png(3, 8)));
        assert_eq!(outcome.unwrap(), InsertOutcome::Duplicate);
        assert_eq!(embedder.calls.load(std::sync::atomic::Ordering::SeqCst), 0);

        // A new serial does reach the embedder, and its failure surfaces
        let err = service
            .ingest(NewTrademark::new("B").with_logo(png(3, 8)))
            .unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
        assert_eq!(embedder.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_ingest_csv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), png(5, 8)).unwrap();
        let manifest = dir.path().join("marks.csv");
        let mut file = std::fs::File::create(&manifest).unwrap();
        writeln!(
            file,
            "serial_number,class_indices,registration_date,description,applicant_name,agent_details,logo_path"
        )
        .unwrap();
        writeln!(file, "S1,\"3, 9\",2020-01-31,Rocket skates,Acme Corp,,logo.png").unwrap();
        writeln!(file, "S2,19,,Stone tablets,Quarry Ltd,,").unwrap();
        writeln!(file, "S1,9,,Duplicate row,Acme Corp,,").unwrap();
        writeln!(file, "S3,9,31/01/2020,Bad date,Someone,,").unwrap();
        writeln!(file, "S4,9,,Missing logo,Someone,,missing.png").unwrap();
        writeln!(file, ",9,,No serial,Someone,,").unwrap();
        drop(file);

        let (store, service) = service();
        let report = service.ingest_csv(&manifest).unwrap();
        assert_eq!(
            report,
            IngestReport {
                inserted: 2,
                duplicates: 1,
                failed: 3,
                embedded_logos: 1,
            }
        );
        assert_eq!(report.total(), 6);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_missing_manifest() {
        let (_, service) = service();
        assert!(service.ingest_csv(Path::new("/nonexistent/marks.csv")).is_err());
    }
}
