//! Behaviour shared by every [`storage::ChatStore`] implementation.
//!
//! Each function sets up its own conversations so it can run against a shared database.

use std::time::Duration;

use storage::{
    ChatStore, ConversationRepository, DocumentRecord, DocumentRepository, DocumentStatus,
    MessageRecord, MessageRepository, MessageRole,
};

pub async fn conversation_lifecycle(store: &dyn ChatStore) {
    let conversation = store
        .create_conversation("Employment contract")
        .await
        .expect("Failed to create conversation");

    let fetched = store
        .get_conversation(conversation.id)
        .await
        .expect("Failed to get conversation")
        .expect("conversation should exist");
    assert_eq!(fetched.title, "Employment contract");

    let renamed = store
        .update_title(conversation.id, "Non-compete clause")
        .await
        .expect("Failed to update title")
        .expect("conversation should exist");
    assert_eq!(renamed.title, "Non-compete clause");
    assert!(renamed.updated_at >= conversation.updated_at);

    assert!(store
        .delete_conversation(conversation.id)
        .await
        .expect("Failed to delete"));
    assert!(store
        .get_conversation(conversation.id)
        .await
        .expect("Failed to get conversation")
        .is_none());
    assert!(!store
        .delete_conversation(conversation.id)
        .await
        .expect("Failed to delete"));
}

pub async fn messages_are_chronological(store: &dyn ChatStore) {
    let conversation = store.create_conversation("").await.expect("create");

    for i in 0..6 {
        let role = if i % 2 == 0 {
            MessageRole::User
        } else {
            MessageRole::Assistant
        };
        let message = MessageRecord::new(conversation.id, role, format!("Message {}", i));
        store.save_message(&message).await.expect("save message");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let all = store
        .list_messages(conversation.id, None)
        .await
        .expect("list messages");
    let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec!["Message 0", "Message 1", "Message 2", "Message 3", "Message 4", "Message 5"]
    );

    let first_two = store
        .list_messages(conversation.id, Some(2))
        .await
        .expect("list messages");
    assert_eq!(first_two.len(), 2);
    assert_eq!(first_two[0].content, "Message 0");

    let recent = store
        .recent_messages(conversation.id, 3)
        .await
        .expect("recent messages");
    let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["Message 3", "Message 4", "Message 5"]);

    assert_eq!(store.count_messages(conversation.id).await.expect("count"), 6);

    store
        .delete_conversation(conversation.id)
        .await
        .expect("cleanup");
}

pub async fn saving_message_touches_conversation(store: &dyn ChatStore) {
    let conversation = store.create_conversation("Touch").await.expect("create");
    tokio::time::sleep(Duration::from_millis(5)).await;

    let message = MessageRecord::assistant(conversation.id, "Answer").with_retrieval("keyword");
    store.save_message(&message).await.expect("save message");

    let fetched = store
        .get_conversation(conversation.id)
        .await
        .expect("get")
        .expect("exists");
    assert!(fetched.updated_at > conversation.updated_at);

    let stored = store
        .list_messages(conversation.id, None)
        .await
        .expect("list");
    assert_eq!(stored.len(), 1);
    assert!(stored[0].used_rag);
    assert_eq!(stored[0].retrieval_method.as_deref(), Some("keyword"));

    store
        .delete_conversation(conversation.id)
        .await
        .expect("cleanup");
}

pub async fn documents_follow_status_updates(store: &dyn ChatStore) {
    let conversation = store.create_conversation("Docs").await.expect("create");

    let lease = DocumentRecord::new(
        conversation.id,
        "lease.pdf".to_string(),
        "lease.txt".to_string(),
        Some("application/pdf".to_string()),
        4096,
        2400,
    );
    let nda = DocumentRecord::new(
        conversation.id,
        "nda.txt".to_string(),
        "nda.txt".to_string(),
        Some("text/plain".to_string()),
        800,
        790,
    );
    store.save_document(&lease).await.expect("save lease");
    store.save_document(&nda).await.expect("save nda");

    let listed = store.list_documents(conversation.id).await.expect("list");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].filename, "lease.pdf");
    assert_eq!(listed[1].filename, "nda.txt");

    let updated = store
        .set_conversation_document_status(conversation.id, DocumentStatus::Indexing, None)
        .await
        .expect("set status");
    assert_eq!(updated, 2);

    store
        .update_document_status(nda.id, DocumentStatus::Failed, Some("graphrag exited with 1"))
        .await
        .expect("update status");

    let nda_stored = store
        .get_document(nda.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(nda_stored.status, DocumentStatus::Failed);
    assert_eq!(nda_stored.error.as_deref(), Some("graphrag exited with 1"));

    let lease_stored = store
        .get_document(lease.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(lease_stored.status, DocumentStatus::Indexing);

    assert!(store.delete_document(lease.id).await.expect("delete"));
    assert!(!store.delete_document(lease.id).await.expect("delete"));
    assert_eq!(
        store.list_documents(conversation.id).await.expect("list").len(),
        1
    );

    store
        .delete_conversation(conversation.id)
        .await
        .expect("cleanup");
}

pub async fn deleting_conversation_cascades(store: &dyn ChatStore) {
    let conversation = store.create_conversation("Cascade").await.expect("create");
    store
        .save_message(&MessageRecord::user(conversation.id, "Question"))
        .await
        .expect("save message");
    let document = DocumentRecord::new(
        conversation.id,
        "will.txt".to_string(),
        "will.txt".to_string(),
        None,
        300,
        300,
    );
    store.save_document(&document).await.expect("save document");

    let summaries = store.list_conversations(100, 0).await.expect("list");
    let summary = summaries
        .iter()
        .find(|s| s.id == conversation.id)
        .expect("summary present");
    assert_eq!(summary.message_count, 1);
    assert_eq!(summary.document_count, 1);

    store
        .delete_conversation(conversation.id)
        .await
        .expect("delete");

    assert!(store
        .list_messages(conversation.id, None)
        .await
        .expect("list")
        .is_empty());
    assert!(store.get_document(document.id).await.expect("get").is_none());
}
