//! Integration tests for [`graphrag::GraphRagService`] workspace handling.
//!
//! Uses temporary data directories; the GraphRAG CLI is replaced by a shell script where needed.

use graphrag::{GraphRagConfig, GraphRagError, GraphRagService, SearchMethod};
use serial_test::serial;
use std::path::Path;
use tempfile::TempDir;
use uuid::Uuid;

const LEASE: &str = "This lease agreement is made between the landlord and the tenant. \
The tenant shall pay the monthly rent before the fifth day of every month. \
The landlord may terminate the lease with sixty days written notice to the tenant. \
The security deposit equals two months of rent and is returned within thirty days.";

fn service(dir: &TempDir) -> GraphRagService {
    GraphRagService::new(GraphRagConfig::new(dir.path()).with_api_key("sk-test"))
}

/// Writes an executable shell script standing in for the `graphrag` CLI.
#[cfg(unix)]
fn fake_cli(dir: &Path, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-graphrag.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

/// **Test: save_document forces .txt, formats paragraphs and lists the file.**
///
/// **Setup:** Save a long single-paragraph "lease.pdf".
/// **Expected:** Stored as lease.txt with paragraph breaks; listed with its char count.
#[tokio::test]
async fn test_save_and_list_document() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);
    let id = Uuid::new_v4();

    let saved = svc.save_document(id, "lease.pdf", LEASE).await.unwrap();
    assert_eq!(saved.file_name, "lease.txt");
    assert_eq!(saved.path, svc.input_dir(id).join("lease.txt"));

    let written = std::fs::read_to_string(&saved.path).unwrap();
    assert!(written.contains("tenant.\n\nThe tenant"));
    assert!(written.ends_with('\n'));

    let docs = svc.list_documents(id).await.unwrap();
    assert_eq!(docs, vec![("lease.txt".to_string(), saved.char_count)]);
    assert!(svc.has_documents(id).await);
    assert!(svc.output_dir(id).is_dir());
    assert!(svc.cache_dir(id).is_dir());
}

/// **Test: A second upload with the same name does not overwrite the first.**
#[tokio::test]
async fn test_save_document_name_collision() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);
    let id = Uuid::new_v4();

    let first = svc.save_document(id, "contract.txt", LEASE).await.unwrap();
    let second = svc.save_document(id, "contract.txt", "Second version of the contract text.").await.unwrap();
    assert_eq!(first.file_name, "contract.txt");
    assert_ne!(second.file_name, first.file_name);
    assert!(second.file_name.starts_with("contract-"));
    assert!(second.file_name.ends_with(".txt"));
    assert_eq!(svc.list_documents(id).await.unwrap().len(), 2);
}

/// **Test: Workspaces are isolated per conversation.**
#[tokio::test]
async fn test_workspaces_are_isolated() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    svc.save_document(a, "lease.txt", LEASE).await.unwrap();
    assert!(svc.has_documents(a).await);
    assert!(!svc.has_documents(b).await);
    assert!(svc.simple_search(b, "rent", 3).await.unwrap().is_none());
}

/// **Test: Stats, keyword search, remove, clear and delete.**
#[tokio::test]
async fn test_stats_search_and_cleanup() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);
    let id = Uuid::new_v4();

    let stats = svc.index_stats(id).await;
    assert!(!stats.has_documents);
    assert_eq!(stats.document_count, 0);

    let saved = svc.save_document(id, "lease.txt", LEASE).await.unwrap();
    std::fs::write(svc.output_dir(id).join("create_final_entities.parquet"), b"x").unwrap();

    let stats = svc.index_stats(id).await;
    assert!(stats.has_documents);
    assert!(stats.has_index);
    assert_eq!(stats.document_count, 1);
    assert_eq!(stats.total_characters, saved.char_count);
    assert_eq!(stats.artifact_count, 1);
    assert!(!stats.indexing);

    let hit = svc
        .simple_search(id, "When is the security deposit returned?", 3)
        .await
        .unwrap()
        .expect("keyword match");
    assert!(hit.starts_with("[From: lease.txt]\nThe security deposit"));

    svc.clear_index(id).await.unwrap();
    assert!(!svc.has_index(id).await);
    assert!(svc.has_documents(id).await);

    assert!(!svc.remove_document(id, "../secret.txt").await.unwrap());
    assert!(svc.remove_document(id, "lease.txt").await.unwrap());
    assert!(!svc.remove_document(id, "lease.txt").await.unwrap());

    assert!(svc.delete_conversation_data(id).await.unwrap());
    assert!(!svc.conversation_dir(id).exists());
    assert!(!svc.delete_conversation_data(id).await.unwrap());
}

/// **Test: build_index validation errors come before the CLI is run.**
#[tokio::test]
async fn test_build_index_validation() {
    let dir = TempDir::new().unwrap();
    let id = Uuid::new_v4();

    let svc = service(&dir);
    assert!(matches!(svc.build_index(id).await, Err(GraphRagError::NoDocuments)));

    svc.save_document(id, "tiny.txt", "Too short.").await.unwrap();
    assert!(matches!(
        svc.build_index(id).await,
        Err(GraphRagError::InsufficientContent { .. })
    ));

    let keyless = GraphRagService::new(GraphRagConfig::new(dir.path()));
    keyless.save_document(id, "lease.txt", LEASE).await.unwrap();
    assert!(matches!(keyless.build_index(id).await, Err(GraphRagError::MissingApiKey)));
}

/// **Test: A missing executable maps to CliNotFound; query without index is NoIndex.**
#[tokio::test]
async fn test_cli_not_found_and_no_index() {
    let dir = TempDir::new().unwrap();
    let svc = GraphRagService::new(
        GraphRagConfig::new(dir.path())
            .with_api_key("sk-test")
            .with_bin("graphrag-binary-that-does-not-exist"),
    );
    let id = Uuid::new_v4();

    assert!(matches!(
        svc.query(id, "rent?", SearchMethod::Local).await,
        Err(GraphRagError::NoIndex)
    ));

    svc.save_document(id, "lease.txt", LEASE).await.unwrap();
    assert!(matches!(svc.build_index(id).await, Err(GraphRagError::CliNotFound(_))));
    assert!(!svc.is_indexing(id));
    assert!(svc.settings_path(id).is_file());
}

/// **Test: A concurrent build for the same conversation is rejected.**
#[tokio::test]
async fn test_build_index_rejects_concurrent_build() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);
    let id = Uuid::new_v4();

    let _guard = svc.try_begin_indexing(id).unwrap();
    assert!(matches!(svc.build_index(id).await, Err(GraphRagError::AlreadyIndexing(_))));
    assert!(svc.index_stats(id).await.indexing);
}

/// **Test: Successful index and query through a fake CLI.**
///
/// **Setup:** Script that writes a parquet file on `index` and echoes method + query on `query`.
/// **Expected:** Report counts the artifact; query returns trimmed stdout.
#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_index_and_query_with_fake_cli() {
    let dir = TempDir::new().unwrap();
    let bin = fake_cli(
        dir.path(),
        r#"case "$1" in
  index) touch "$3/output/create_final_entities.parquet"; echo "indexed"; exit 0 ;;
  query) echo "  answer via $7: $9  "; exit 0 ;;
esac
exit 2"#,
    );
    let svc = GraphRagService::new(
        GraphRagConfig::new(dir.path().join("data"))
            .with_api_key("sk-test")
            .with_bin(bin),
    );
    let id = Uuid::new_v4();
    svc.save_document(id, "lease.txt", LEASE).await.unwrap();

    let report = svc.build_index(id).await.unwrap();
    assert_eq!(report.document_count, 1);
    assert_eq!(report.artifact_count, 1);
    assert_eq!(report.files, vec!["lease.txt".to_string()]);
    assert!(svc.has_index(id).await);

    let settings = std::fs::read_to_string(svc.settings_path(id)).unwrap();
    assert!(settings.contains("model: gpt-4o"));

    let answer = svc
        .query(id, "What is the deposit?", SearchMethod::Global)
        .await
        .unwrap();
    assert_eq!(answer, "answer via global: What is the deposit?");
}

/// **Test: Non-zero exits and empty output become errors.**
#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_cli_failures() {
    let dir = TempDir::new().unwrap();
    let bin = fake_cli(
        dir.path(),
        r#"case "$1" in
  index) echo "Empty DataFrame"; echo "boom" >&2; exit 1 ;;
  query) exit 0 ;;
esac"#,
    );
    let svc = GraphRagService::new(
        GraphRagConfig::new(dir.path().join("data"))
            .with_api_key("sk-test")
            .with_bin(bin),
    );
    let id = Uuid::new_v4();
    svc.save_document(id, "lease.txt", LEASE).await.unwrap();

    match svc.build_index(id).await {
        Err(GraphRagError::IndexFailed { code, stderr }) => {
            assert_eq!(code, Some(1));
            assert_eq!(stderr, "boom");
        }
        other => panic!("expected IndexFailed, got {:?}", other),
    }

    std::fs::write(svc.output_dir(id).join("entities.parquet"), b"x").unwrap();
    assert!(matches!(
        svc.query(id, "rent?", SearchMethod::Local).await,
        Err(GraphRagError::EmptyResponse)
    ));
}
