use docchat_common::{ConversationEvent, ConversationId, MessageId};

use super::*;
use crate::attachment::Attachment;

fn store() -> ConversationStore {
    ConversationStore::new(ConversationId::generate())
}

fn streaming_assistant(store: &mut ConversationStore) -> MessageId {
    let message = Message::assistant_placeholder();
    let id = message.id.clone();
    store.append_message(message).unwrap();
    store
        .update_message(&id, MessagePatch::status(MessageStatus::Streaming))
        .unwrap();
    id
}

#[test]
fn append_preserves_order() {
    let mut store = store();
    let first = Message::user("hello", &[]);
    let second = Message::assistant_placeholder();
    let (a, b) = (first.id.clone(), second.id.clone());

    store.append_message(first).unwrap();
    store.append_message(second).unwrap();

    let ids: Vec<_> = store.messages().iter().map(|m| m.id.clone()).collect();
    assert_eq!(ids, vec![a, b]);
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut store = store();
    let message = Message::user("hi", &[]);
    store.append_message(message.clone()).unwrap();

    let err = store.append_message(message.clone()).unwrap_err();
    assert_eq!(err, StoreError::DuplicateId(message.id));
    assert_eq!(store.len(), 1);
}

#[test]
fn only_one_message_may_stream() {
    let mut store = store();
    let first = streaming_assistant(&mut store);

    let second = Message::assistant_placeholder();
    let second_id = second.id.clone();
    store.append_message(second).unwrap();

    let err = store
        .update_message(&second_id, MessagePatch::status(MessageStatus::Streaming))
        .unwrap_err();
    assert_eq!(err, StoreError::AlreadyStreaming { active: first.clone() });

    let mut third = Message::assistant_placeholder();
    third.status = MessageStatus::Streaming;
    assert!(matches!(
        store.append_message(third),
        Err(StoreError::AlreadyStreaming { .. })
    ));

    store
        .update_message(&first, MessagePatch::status(MessageStatus::Complete))
        .unwrap();
    assert!(store.streaming_message().is_none());
    store
        .update_message(&second_id, MessagePatch::status(MessageStatus::Streaming))
        .unwrap();
    assert_eq!(store.streaming_message().unwrap().id, second_id);
}

#[test]
fn chunks_append_in_order() {
    let mut store = store();
    let id = streaming_assistant(&mut store);
    for chunk in ["The ", "report ", "covers Q3."] {
        store.update_message(&id, MessagePatch::append(chunk)).unwrap();
    }
    assert_eq!(store.message(&id).unwrap().text, "The report covers Q3.");
}

#[test]
fn finalized_messages_are_immutable() {
    let mut store = store();
    let id = streaming_assistant(&mut store);
    store
        .update_message(
            &id,
            MessagePatch::append("done").with_status(MessageStatus::Complete),
        )
        .unwrap();

    assert_eq!(
        store.update_message(&id, MessagePatch::append("late")),
        Err(StoreError::Finalized(id.clone()))
    );
    assert_eq!(
        store.update_message(&id, MessagePatch::status(MessageStatus::Error)),
        Err(StoreError::Finalized(id.clone()))
    );
    // re-asserting the same terminal status is a no-op
    store
        .update_message(&id, MessagePatch::status(MessageStatus::Complete))
        .unwrap();
    assert_eq!(store.message(&id).unwrap().text, "done");
}

#[test]
fn streaming_cannot_return_to_pending() {
    let mut store = store();
    let id = streaming_assistant(&mut store);
    let err = store
        .update_message(&id, MessagePatch::status(MessageStatus::Pending))
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
}

#[test]
fn patch_writes_text_before_closing() {
    let mut store = store();
    let id = streaming_assistant(&mut store);
    store.update_message(&id, MessagePatch::append("partial")).unwrap();
    store
        .update_message(
            &id,
            MessagePatch::status(MessageStatus::Error).with_text("Error: connection reset"),
        )
        .unwrap();

    let message = store.message(&id).unwrap();
    assert_eq!(message.status, MessageStatus::Error);
    assert_eq!(message.text, "Error: connection reset");
}

#[test]
fn unknown_message_is_an_error() {
    let mut store = store();
    let id = MessageId::new();
    assert_eq!(
        store.update_message(&id, MessagePatch::append("x")),
        Err(StoreError::UnknownMessage(id.clone()))
    );
}

#[test]
fn active_documents_drop_payloads() {
    let mut store = store();
    store.set_active_documents(vec![Attachment::new("report.pdf", None, vec![1, 2, 3])]);
    assert_eq!(store.active_documents().len(), 1);
    assert!(!store.active_documents()[0].has_payload());
}

#[test]
fn reset_replaces_everything() {
    let mut store = store();
    streaming_assistant(&mut store);
    store.set_active_documents(vec![Attachment::descriptor("a.pdf", None)]);

    let new_id = ConversationId::generate();
    let restored = vec![
        Message::restored(Role::User, "q", Vec::new(), chrono::Utc::now()),
        Message::restored(Role::Assistant, "a", Vec::new(), chrono::Utc::now()),
    ];
    store.reset(new_id.clone(), restored).unwrap();

    assert_eq!(store.id(), &new_id);
    assert_eq!(store.len(), 2);
    assert!(store.streaming_message().is_none());
    assert!(store.active_documents().is_empty());
}

#[test]
fn reset_with_duplicates_leaves_store_untouched() {
    let mut store = store();
    store.append_message(Message::user("keep", &[])).unwrap();
    let original = store.id().clone();

    let dup = Message::restored(Role::User, "q", Vec::new(), chrono::Utc::now());
    let err = store
        .reset(ConversationId::generate(), vec![dup.clone(), dup])
        .unwrap_err();

    assert!(matches!(err, StoreError::DuplicateId(_)));
    assert_eq!(store.id(), &original);
    assert_eq!(store.messages()[0].text, "keep");
}

#[test]
fn set_id_reports_changes_only() {
    let mut store = store();
    let same = store.id().clone();
    assert!(!store.set_id(same));
    assert!(store.set_id(ConversationId::from_server("abc-123")));
    assert_eq!(store.id().as_str(), "abc-123");
}

#[tokio::test]
async fn mutations_are_broadcast() {
    let mut store = store();
    let mut rx = store.subscribe();

    let message = Message::user("hi", &[]);
    let id = message.id.clone();
    store.append_message(message).unwrap();
    store
        .update_message(&id, MessagePatch::status(MessageStatus::Complete))
        .unwrap();
    store.set_active_documents(Vec::new());
    let from = store.id().clone();
    store.set_id(ConversationId::from_server("abc-123"));
    store.reset(ConversationId::from_server("abc-123"), Vec::new()).unwrap();

    assert_eq!(rx.recv().await.unwrap(), ConversationEvent::MessageAppended(id.clone()));
    assert_eq!(rx.recv().await.unwrap(), ConversationEvent::MessageUpdated(id));
    assert_eq!(
        rx.recv().await.unwrap(),
        ConversationEvent::ActiveDocumentsChanged { count: 0 }
    );
    assert_eq!(
        rx.recv().await.unwrap(),
        ConversationEvent::ConversationIdChanged {
            from,
            to: ConversationId::from_server("abc-123"),
        }
    );
    assert!(matches!(
        rx.recv().await.unwrap(),
        ConversationEvent::ConversationReset { message_count: 0, .. }
    ));
}

#[test]
fn user_messages_keep_descriptors_only() {
    let attachment = Attachment::new("report.pdf", None, b"%PDF".to_vec());
    let message = Message::user("Summarize this", &[attachment]);
    assert_eq!(message.role, Role::User);
    assert_eq!(message.attachments[0].name, "report.pdf");
    assert!(!message.attachments[0].has_payload());
}
