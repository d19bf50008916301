#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// Integration tests for the LanceDB collection with realistic profile data
use karrybot::database::{ChunkMetadata, ChunkRecord, Collection, VectorStore};
use karrybot::ingest::chunk_id;
use std::sync::Arc;
use tempfile::TempDir;

/// text-embedding-ada-002 dimension
const DIMENSIONS: usize = 1536;

async fn create_store(temp_dir: &TempDir) -> VectorStore {
    VectorStore::get_or_create(&temp_dir.path().join("knowledge_base"), "FAQs")
        .await
        .expect("should create vector store")
}

fn create_profile_record(
    source: &str,
    chunk_index: u32,
    content: &str,
    vector_variation: f32,
) -> ChunkRecord {
    let vector: Vec<f32> = (0..DIMENSIONS)
        .map(|i| {
            let base = (i as f32).mul_add(0.01, vector_variation).sin() * 0.1;
            (content.len() as f32).mul_add(0.001, base)
        })
        .collect();

    ChunkRecord {
        id: chunk_id(source, chunk_index as usize, content),
        vector,
        metadata: ChunkMetadata {
            content: content.to_string(),
            source: source.to_string(),
            chunk_index,
            created_at: chrono::Utc::now().to_rfc3339(),
        },
    }
}

fn create_profile_dataset() -> Vec<ChunkRecord> {
    vec![
        create_profile_record(
            "resume.pdf",
            0,
            "Karthik Rajan is a software engineer with eight years of experience building backend services.",
            0.1,
        ),
        create_profile_record(
            "resume.pdf",
            1,
            "Skills: Rust, Python, Kubernetes, PostgreSQL and event-driven architectures.",
            0.15,
        ),
        create_profile_record(
            "resume.pdf",
            2,
            "Certifications: AWS Solutions Architect Associate, Certified Kubernetes Administrator.",
            0.2,
        ),
        create_profile_record(
            "story.pdf",
            0,
            "Karthik grew up in Chennai and started programming on a shared family computer.",
            1.5,
        ),
        create_profile_record(
            "story.pdf",
            1,
            "After university he moved to Bangalore to join a payments startup.",
            1.55,
        ),
        create_profile_record(
            "project-3.pdf",
            0,
            "Project 3 was a real-time fraud detection pipeline processing two million events per hour.",
            3.0,
        ),
        create_profile_record(
            "short.pdf",
            0,
            "Karthik is 32 years old and enjoys long-distance cycling.",
            4.5,
        ),
    ]
}

#[tokio::test]
async fn realistic_profile_storage_and_search() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = create_store(&temp_dir).await;

    let dataset = create_profile_dataset();
    let result = store.add(dataset.clone()).await;
    assert!(
        result.is_ok(),
        "Failed to store profile dataset: {:?}",
        result.err()
    );

    let count = store.count().await.expect("count should succeed");
    assert_eq!(count, dataset.len() as u64);

    let results = store
        .query(&dataset[0].vector, 3)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 3, "Should respect limit");
    assert_eq!(results[0].id, dataset[0].id, "Exact match should rank first");
    assert_eq!(results[0].metadata, dataset[0].metadata);
    assert!(results[0].distance < 1e-3);
}

#[tokio::test]
async fn search_results_are_ranked_by_distance() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = create_store(&temp_dir).await;

    let dataset = create_profile_dataset();
    store
        .add(dataset.clone())
        .await
        .expect("should store records successfully");

    let results = store
        .query(&dataset[3].vector, 5)
        .await
        .expect("search should succeed");

    assert!(!results.is_empty(), "Should find relevant results");
    for pair in results.windows(2) {
        assert!(
            pair[0].distance <= pair[1].distance,
            "Results should be ordered nearest first"
        );
    }

    // Neighbouring vectors come from the same document
    assert_eq!(results[0].metadata.source, "story.pdf");
    assert_eq!(results[1].metadata.source, "story.pdf");
}

#[tokio::test]
async fn large_batch_processing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = create_store(&temp_dir).await;

    let records: Vec<ChunkRecord> = (0..500)
        .map(|i| {
            create_profile_record(
                "resume.pdf",
                i,
                &format!("Chunk {i} of a long resume describing project work in detail."),
                i as f32 * 0.01,
            )
        })
        .collect();

    for batch in records.chunks(64) {
        store
            .add(batch.to_vec())
            .await
            .expect("should store batch successfully");
    }

    assert_eq!(store.count().await.expect("count should succeed"), 500);

    let results = store
        .query(&records[250].vector, 10)
        .await
        .expect("search should succeed");
    assert_eq!(results.len(), 10);
    assert_eq!(results[0].metadata.chunk_index, 250);
}

#[tokio::test]
async fn readding_records_replaces_them() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = create_store(&temp_dir).await;

    let dataset = create_profile_dataset();
    store
        .add(dataset.clone())
        .await
        .expect("first add should succeed");
    store
        .add(dataset.clone())
        .await
        .expect("second add should succeed");

    assert_eq!(
        store.count().await.expect("count should succeed"),
        dataset.len() as u64
    );
}

#[tokio::test]
async fn collection_survives_reopen() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let dataset = create_profile_dataset();

    {
        let store = create_store(&temp_dir).await;
        store.add(dataset.clone()).await.expect("should store records");
    }

    let reopened = create_store(&temp_dir).await;
    assert_eq!(
        reopened.count().await.expect("count should succeed"),
        dataset.len() as u64
    );
    let results = reopened
        .query(&dataset[5].vector, 1)
        .await
        .expect("search should succeed");
    assert_eq!(results[0].metadata.source, "project-3.pdf");
}

#[tokio::test]
async fn collections_are_isolated_by_name() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("knowledge_base");
    let faqs = VectorStore::get_or_create(&path, "FAQs")
        .await
        .expect("should open FAQs");
    let other = VectorStore::get_or_create(&path, "Projects")
        .await
        .expect("should open Projects");

    faqs.add(create_profile_dataset())
        .await
        .expect("should store records");

    assert_eq!(other.count().await.expect("count should succeed"), 0);
    assert!(
        other
            .query(&[0.1; DIMENSIONS], 5)
            .await
            .expect("search should succeed")
            .is_empty()
    );
}

#[tokio::test]
async fn reset_clears_the_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = create_store(&temp_dir).await;

    store
        .add(create_profile_dataset())
        .await
        .expect("should store records");
    store.reset().await.expect("reset should succeed");

    assert_eq!(store.count().await.expect("count should succeed"), 0);
    assert!(
        store
            .query(&[0.1; DIMENSIONS], 5)
            .await
            .expect("search should succeed")
            .is_empty()
    );

    // The collection is usable again after a reset
    store
        .add(create_profile_dataset())
        .await
        .expect("should store records after reset");
    assert_eq!(store.count().await.expect("count should succeed"), 7);
}

#[tokio::test]
async fn concurrent_access_simulation() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = Arc::new(create_store(&temp_dir).await);

    let dataset = create_profile_dataset();
    store
        .add(dataset.clone())
        .await
        .expect("should store records");

    let mut handles = Vec::new();
    for (index, record) in dataset.iter().enumerate() {
        let store = Arc::clone(&store);
        let vector = record.vector.clone();
        handles.push(tokio::spawn(async move {
            let results = store.query(&vector, 1).await?;
            Ok::<_, karrybot::BotError>((index, results))
        }));
    }

    for handle in handles {
        let (index, results) = handle
            .await
            .expect("task should not panic")
            .expect("concurrent search should succeed");
        assert_eq!(results[0].id, dataset[index].id);
    }
}
