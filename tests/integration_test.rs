//! End-to-end tests against an on-disk `SQLite` store.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use marksearch::services::DEFAULT_TOP_K;
use marksearch::{
    EngineSettings, Error, ImageEmbedder, IndexState, InsertOutcome, NewTrademark, RecordStore,
    SearchEngine, SearchRequest, SqliteRecordStore, TrademarkId,
};
use std::sync::Arc;
use tempfile::TempDir;

/// Two-dimensional embedder keyed on the first byte of the "image".
struct AxisEmbedder;

impl ImageEmbedder for AxisEmbedder {
    fn dimensions(&self) -> usize {
        2
    }

    fn embed(&self, image: &[u8]) -> marksearch::Result<Vec<f32>> {
        match image.first() {
            Some(b'x') => Ok(vec![1.0, 0.0]),
            Some(b'y') => Ok(vec![0.0, 1.0]),
            Some(b'd') => Ok(vec![0.6, 0.8]),
            _ => Err(Error::Decode("unrecognised test image".to_string())),
        }
    }
}

struct Fixture {
    _dir: TempDir,
    store: Arc<SqliteRecordStore>,
    engine: SearchEngine,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteRecordStore::open(dir.path().join("marks.db")).unwrap());
    let engine = SearchEngine::new(
        Arc::clone(&store) as Arc<dyn RecordStore>,
        Arc::new(AxisEmbedder),
        EngineSettings {
            logo_dimensions: 2,
            text_dimensions: 2,
            top_k: DEFAULT_TOP_K,
            ..EngineSettings::default()
        },
    )
    .unwrap();
    Fixture {
        _dir: dir,
        store,
        engine,
    }
}

fn ids(rows: &[marksearch::TrademarkSummary]) -> Vec<i64> {
    rows.iter().map(|row| row.id.get()).collect()
}

#[tokio::test]
async fn test_acme_words_and_class_returns_only_exact_class() {
    let f = fixture();
    let shoes = f
        .engine
        .ingest()
        .ingest(
            NewTrademark::new("S-1")
                .with_classes("3, 9")
                .with_description("Acme Shoes"),
        )
        .unwrap();
    f.engine
        .ingest()
        .ingest(
            NewTrademark::new("S-2")
                .with_classes("19")
                .with_description("Acme Boots"),
        )
        .unwrap();
    assert_eq!(shoes, InsertOutcome::Inserted(TrademarkId::new(1)));

    let rows = f
        .engine
        .coordinator()
        .search(SearchRequest::new().with_words("Acme").with_class_filter("9"))
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec![1]);
    assert_eq!(rows[0].class_indices, "3, 9");
    assert!(!rows[0].has_logo);
}

#[tokio::test]
async fn test_class_token_matching() {
    let f = fixture();
    for (serial, classes) in [("A", "3, 9"), ("B", "19"), ("C", "29"), ("D", "9")] {
        f.engine
            .ingest()
            .ingest(NewTrademark::new(serial).with_classes(classes))
            .unwrap();
    }

    let rows = f
        .engine
        .coordinator()
        .search(SearchRequest::new().with_class_filter("9"))
        .await
        .unwrap();
    // Newest first
    assert_eq!(ids(&rows), vec![4, 1]);

    let unparseable = f
        .engine
        .coordinator()
        .search(SearchRequest::new().with_class_filter("nine"))
        .await
        .unwrap();
    assert_eq!(unparseable.len(), 4);
}

#[tokio::test]
async fn test_text_matches_description_or_applicant_case_insensitively() {
    let f = fixture();
    f.engine
        .ingest()
        .ingest(NewTrademark::new("A").with_description("ÉCLAIR bakery"))
        .unwrap();
    f.engine
        .ingest()
        .ingest(NewTrademark::new("B").with_applicant("Éclair Holdings"))
        .unwrap();
    f.engine
        .ingest()
        .ingest(NewTrademark::new("C").with_description("Bread"))
        .unwrap();

    let rows = f
        .engine
        .coordinator()
        .search(SearchRequest::new().with_words("éclair"))
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec![2, 1]);
}

#[tokio::test]
async fn test_duplicate_serial_does_not_add_row() {
    let f = fixture();
    f.engine
        .ingest()
        .ingest(NewTrademark::new("DUP").with_description("first"))
        .unwrap();
    let again = f
        .engine
        .ingest()
        .ingest(NewTrademark::new("DUP").with_description("second"))
        .unwrap();
    assert_eq!(again, InsertOutcome::Duplicate);
    assert_eq!(f.store.count().unwrap(), 1);

    let all = f.engine.coordinator().list_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].description, "first");
}

#[tokio::test]
async fn test_image_search_against_empty_index_returns_nothing() {
    let f = fixture();
    f.engine
        .ingest()
        .ingest(NewTrademark::new("A").with_description("Acme"))
        .unwrap();
    assert_eq!(f.engine.status().state, IndexState::Empty);

    let rows = f
        .engine
        .coordinator()
        .search(SearchRequest::new().with_words("Acme").with_image(b"x".to_vec()))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_rebuild_with_no_valid_embeddings_is_empty() {
    let f = fixture();
    f.engine
        .ingest()
        .ingest(NewTrademark::new("A").with_logo_embedding(vec![0.0, 0.0]))
        .unwrap();
    f.engine.ingest().ingest(NewTrademark::new("B")).unwrap();

    f.engine.builder().rebuild_async().await.unwrap();
    let status = f.engine.status();
    assert_eq!(status.state, IndexState::Empty);
    assert_eq!(status.excluded, 2);

    let rows = f
        .engine
        .coordinator()
        .search(SearchRequest::new().with_image(b"x".to_vec()))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_image_candidates_restrict_relational_filter() {
    let f = fixture();
    // Logo embeddings computed from the "image" bytes at ingestion
    f.engine
        .ingest()
        .ingest(
            NewTrademark::new("X")
                .with_description("Acme east")
                .with_logo(b"x".to_vec()),
        )
        .unwrap();
    f.engine
        .ingest()
        .ingest(
            NewTrademark::new("Y")
                .with_description("Acme north")
                .with_logo(b"y".to_vec()),
        )
        .unwrap();
    f.engine
        .ingest()
        .ingest(NewTrademark::new("Z").with_description("Acme, no logo"))
        .unwrap();
    f.engine.builder().rebuild_async().await.unwrap();
    assert_eq!(f.engine.status().entries, 2);

    let rows = f
        .engine
        .coordinator()
        .search(SearchRequest::new().with_words("acme").with_image(b"d".to_vec()))
        .await
        .unwrap();
    // Both logos are candidates; the logo-less record is not
    assert_eq!(ids(&rows), vec![2, 1]);
    assert!(rows.iter().all(|row| row.has_logo));
}

#[tokio::test]
async fn test_undecodable_image_degrades_to_text_search() {
    let f = fixture();
    f.engine
        .ingest()
        .ingest(NewTrademark::new("A").with_description("Acme"))
        .unwrap();
    f.engine.builder().rebuild_async().await.unwrap();

    let rows = f
        .engine
        .coordinator()
        .search(SearchRequest::new().with_words("Acme").with_image(b"?".to_vec()))
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec![1]);
}

#[tokio::test]
async fn test_logo_roundtrip_and_not_found() {
    let f = fixture();
    let id = f
        .engine
        .ingest()
        .ingest(NewTrademark::new("L").with_logo(b"x-logo".to_vec()))
        .unwrap()
        .id()
        .unwrap();

    assert_eq!(
        f.engine.coordinator().fetch_logo(id).await.unwrap(),
        b"x-logo".to_vec()
    );
    assert!(matches!(
        f.engine.coordinator().fetch_logo(TrademarkId::new(999)).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("marks.db");
    {
        let store = SqliteRecordStore::open(&path).unwrap();
        store
            .insert(
                &NewTrademark::new("P")
                    .with_description("persisted")
                    .with_logo_embedding(vec![0.5, 0.5]),
            )
            .unwrap();
    }
    let store = SqliteRecordStore::open(&path).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    let embeddings = store.fetch_all_embeddings().unwrap();
    assert_eq!(embeddings, vec![(TrademarkId::new(1), Some(vec![0.5, 0.5]))]);
}
