use super::*;
use crate::documents::FileLoader;
use crate::embeddings::ChunkingConfig;
use crate::testing::{HashEmbedder, MemoryCollection, StalledEmbedder, TEST_TIMEOUT};
use tempfile::TempDir;

fn splitter(chunk_size: usize, chunk_overlap: usize) -> TextSplitter {
    TextSplitter::new(ChunkingConfig {
        chunk_size,
        chunk_overlap,
    })
    .expect("chunking config should be valid")
}

fn ingester(collection: Arc<MemoryCollection>) -> Ingester {
    Ingester::new(
        Arc::new(FileLoader),
        Arc::new(HashEmbedder::default()),
        collection,
        splitter(1000, 200),
        4,
        TEST_TIMEOUT,
    )
}

fn write_doc(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).expect("should write document");
    path
}

fn long_text(words: usize) -> String {
    (0..words)
        .map(|i| format!("word{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn chunk_ids_are_content_derived() {
    let first = chunk_id("resume.pdf", 0, "Karthik Rajan is a software engineer.");
    let again = chunk_id("resume.pdf", 0, "Karthik Rajan is a software engineer.");
    assert_eq!(first, again);

    assert_ne!(first, chunk_id("story.pdf", 0, "Karthik Rajan is a software engineer."));
    assert_ne!(first, chunk_id("resume.pdf", 1, "Karthik Rajan is a software engineer."));
    assert_ne!(first, chunk_id("resume.pdf", 0, "Karthik Rajan is a teacher."));
    assert!(Uuid::parse_str(&first).is_ok());
}

#[tokio::test]
async fn ingests_documents_into_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let paths = vec![
        write_doc(&temp_dir, "about.txt", "Karthik Rajan is a software engineer."),
        write_doc(&temp_dir, "story.md", &long_text(600)),
    ];
    let collection = Arc::new(MemoryCollection::default());

    let report = ingester(Arc::clone(&collection))
        .ingest(&paths)
        .await
        .expect("ingestion should succeed");

    assert_eq!(report.documents_loaded, 2);
    assert!(report.documents_failed.is_empty());
    assert!(report.chunks_stored > 2);
    assert_eq!(
        collection.count().await.expect("should count"),
        report.chunks_stored as u64
    );

    let records = collection.records.lock().expect("lock should not be poisoned");
    let story_indices: Vec<u32> = records
        .iter()
        .filter(|r| r.metadata.source.ends_with("story.md"))
        .map(|r| r.metadata.chunk_index)
        .collect();
    assert_eq!(story_indices, (0..story_indices.len() as u32).collect::<Vec<_>>());
}

#[tokio::test]
async fn failed_document_is_reported_and_skipped() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let missing = temp_dir.path().join("missing.pdf");
    let paths = vec![
        missing.clone(),
        write_doc(&temp_dir, "about.txt", "Karthik Rajan is a software engineer."),
    ];
    let collection = Arc::new(MemoryCollection::default());

    let report = ingester(Arc::clone(&collection))
        .ingest(&paths)
        .await
        .expect("ingestion should continue past a bad document");

    assert_eq!(report.documents_loaded, 1);
    assert_eq!(report.chunks_stored, 1);
    assert_eq!(report.documents_failed.len(), 1);
    assert_eq!(report.documents_failed[0].0, missing);
    assert_eq!(collection.count().await.expect("should count"), 1);
}

#[tokio::test]
async fn reingesting_does_not_grow_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let paths = vec![write_doc(&temp_dir, "story.txt", &long_text(800))];
    let collection = Arc::new(MemoryCollection::default());
    let ingester = ingester(Arc::clone(&collection));

    let first = ingester.ingest(&paths).await.expect("first run");
    let count = collection.count().await.expect("should count");
    let second = ingester.ingest(&paths).await.expect("second run");

    assert_eq!(first.chunks_stored, second.chunks_stored);
    assert_eq!(collection.count().await.expect("should count"), count);
}

#[tokio::test]
async fn empty_document_stores_nothing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let paths = vec![write_doc(&temp_dir, "short.txt", "")];
    let collection = Arc::new(MemoryCollection::default());

    let report = ingester(Arc::clone(&collection))
        .ingest(&paths)
        .await
        .expect("empty document is not an error");

    assert_eq!(report.documents_loaded, 1);
    assert_eq!(report.chunks_stored, 0);
}

#[tokio::test]
async fn embedding_failure_aborts_the_run() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let paths = vec![
        write_doc(&temp_dir, "a.txt", "first document"),
        write_doc(&temp_dir, "b.txt", "second document"),
    ];
    let collection = Arc::new(MemoryCollection::default());
    let ingester = Ingester::new(
        Arc::new(FileLoader),
        Arc::new(StalledEmbedder),
        Arc::clone(&collection),
        splitter(1000, 200),
        4,
        Duration::from_millis(20),
    );

    let result = ingester.ingest(&paths).await;

    assert!(matches!(result, Err(BotError::Timeout { .. })));
    assert_eq!(collection.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn cancelled_run_stops_before_loading() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let paths = vec![write_doc(&temp_dir, "a.txt", "first document")];
    let token = CancellationToken::new();
    token.cancel();

    let result = ingester(Arc::new(MemoryCollection::default()))
        .with_cancellation(token)
        .ingest(&paths)
        .await;

    assert!(matches!(result, Err(BotError::Cancelled(_))));
}
