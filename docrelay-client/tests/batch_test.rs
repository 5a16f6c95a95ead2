/// Multi-document operations against the in-memory server
mod common;

use common::{users_client, HangingConnection, MemoryServer, StubConnection};
use docrelay_client::{
    BatchOutcome, CallConfig, CancelHandle, Client, DocumentMeta, Error, ItemOutcome, Method, Sink,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_create_reports_per_item() {
    let (client, server, conn) = users_client();
    server.seed("b", json!({"name": "existing"}));
    let users = client.collection("users").unwrap();

    let config = CallConfig::new().with_wait_for_sync();
    let outcome = users
        .create_documents(&vec![json!({"_key": "a"}), json!({"_key": "b"})], &config)
        .await
        .unwrap();

    let items = outcome.items();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].meta().unwrap().key, "a");
    assert!(matches!(items[1], ItemOutcome::Failed(Error::Conflict(_))));
    assert_eq!(outcome.failure_count(), 1);
    assert_eq!(outcome.metas()[1], DocumentMeta::default());

    // Both items were sent, each with the call's options
    assert_eq!(conn.request_count(), 2);
    for request in conn.requests() {
        assert_eq!(request.query_param("waitForSync"), Some("true"));
    }
    assert_eq!(server.stored("b").unwrap()["name"], json!("existing"));
}

#[tokio::test]
async fn test_outcomes_follow_input_order() {
    let (client, _server, conn) = users_client();
    let users = client.collection("users").unwrap();

    let docs: Vec<Value> = (0..5).map(|i| json!({"_key": format!("u{}", i), "n": i})).collect();
    let outcome = users.create_documents(&docs, &CallConfig::new()).await.unwrap();

    let metas = outcome.metas();
    assert_eq!(metas.len(), 5);
    for (i, meta) in metas.iter().enumerate() {
        assert_eq!(meta.key, format!("u{}", i));
    }
    let sent: Vec<Value> = conn.requests().iter().map(|r| r.body().unwrap()["n"].clone()).collect();
    assert_eq!(sent, (0..5).map(|i| json!(i)).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_generated_keys() {
    let (client, _server, _conn) = users_client();
    let users = client.collection("users").unwrap();

    let outcome = users
        .create_documents(&vec![json!({"v": 1}), json!({"v": 2})], &CallConfig::new())
        .await
        .unwrap();

    let metas = outcome.metas();
    assert!(!metas[0].key.is_empty());
    assert_ne!(metas[0].key, metas[1].key);
}

#[tokio::test]
async fn test_empty_batch() {
    let (client, _server, conn) = users_client();
    let users = client.collection("users").unwrap();

    let outcome = users
        .create_documents(&Vec::<Value>::new(), &CallConfig::new())
        .await
        .unwrap();
    assert_eq!(outcome, BatchOutcome::Items(Vec::new()));
    assert_eq!(conn.request_count(), 0);
}

#[tokio::test]
async fn test_silent_batch_collapses() {
    let (client, server, conn) = users_client();
    let users = client.collection("users").unwrap();

    let new = Sink::<Value>::new();
    let config = CallConfig::new().with_silent().with_return_new(&new);
    let outcome = users
        .create_documents(&vec![json!({"_key": "a"}), json!({"_key": "b"})], &config)
        .await
        .unwrap();

    assert!(outcome.is_silent());
    assert!(outcome.items().is_empty());
    assert!(new.is_empty());
    assert_eq!(conn.request_count(), 2);
    assert!(server.stored("a").is_some());
    assert!(server.stored("b").is_some());
}

#[tokio::test]
async fn test_silent_batch_collapses_despite_failures() {
    let (client, server, _conn) = users_client();
    server.seed("a", json!({}));
    let users = client.collection("users").unwrap();

    let config = CallConfig::new().with_silent();
    let outcome = users
        .remove_documents(&["a", "missing"], &config)
        .await
        .unwrap();
    assert_eq!(outcome, BatchOutcome::Silent);
}

#[tokio::test]
async fn test_structural_errors_send_nothing() {
    let (client, _server, conn) = users_client();
    let users = client.collection("users").unwrap();
    let config = CallConfig::new();
    let two = vec![json!({"v": 1}), json!({"v": 2})];

    let err = users.update_documents(Some(&["a"][..]), &two, &config).await.unwrap_err();
    assert_eq!(err, Error::InvalidArgument("expected 2 keys, got 1".into()));

    let err = users.replace_documents(Some(&["a", "b/c"][..]), &two, &config).await.unwrap_err();
    assert!(matches!(err, Error::InvalidKey(_)));

    let err = users.remove_documents(&["a", ""], &config).await.unwrap_err();
    assert!(matches!(err, Error::InvalidKey(_)));

    let err = users.read_documents::<Value>(&["ok", "not ok"]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidKey(_)));

    let err = users.create_documents(&json!({"_key": "a"}), &config).await.unwrap_err();
    assert_eq!(
        err,
        Error::InvalidArgument("documents data must be of kind Array, got object".into())
    );

    let err = users.update_documents(None::<&[&str]>, &"text", &config).await.unwrap_err();
    assert_eq!(
        err,
        Error::InvalidArgument("updates data must be of kind Array, got string".into())
    );

    assert_eq!(conn.request_count(), 0);
}

#[tokio::test]
async fn test_update_takes_keys_from_items() {
    let (client, server, conn) = users_client();
    server.seed("x", json!({"v": 0}));
    let users = client.collection("users").unwrap();

    let outcome = users
        .update_documents(None::<&[&str]>, &vec![json!({"_key": "x", "v": 1})], &CallConfig::new())
        .await
        .unwrap();

    assert!(outcome.items()[0].is_done());
    let request = &conn.requests()[0];
    assert_eq!(request.method(), Method::Patch);
    assert_eq!(request.path(), "_api/document/users/x");
    assert_eq!(server.stored("x").unwrap()["v"], json!(1));
}

#[tokio::test]
async fn test_item_without_key_fails_alone() {
    let (client, server, conn) = users_client();
    server.seed("a", json!({}));
    server.seed("c", json!({}));
    let users = client.collection("users").unwrap();

    let updates = vec![
        json!({"_key": "a", "v": 1}),
        json!({"v": 2}),
        json!({"_key": 7, "v": 3}),
        json!({"_key": "c", "v": 4}),
    ];
    let outcome = users.update_documents(None::<&[&str]>, &updates, &CallConfig::new()).await.unwrap();

    let items = outcome.items();
    assert!(items[0].is_done());
    assert!(matches!(items[1], ItemOutcome::Failed(Error::InvalidArgument(_))));
    assert!(matches!(items[2], ItemOutcome::Failed(Error::InvalidArgument(_))));
    assert!(items[3].is_done());
    assert_eq!(conn.request_count(), 2);
}

#[tokio::test]
async fn test_batch_sinks_use_item_slots() {
    let (client, server, _conn) = users_client();
    server.seed("b", json!({}));
    let users = client.collection("users").unwrap();

    let new = Sink::<Value>::new();
    let config = CallConfig::new().with_return_new(&new);
    let docs = vec![
        json!({"_key": "a", "name": "A"}),
        json!({"_key": "b", "name": "B"}),
        json!({"_key": "c", "name": "C"}),
    ];
    users.create_documents(&docs, &config).await.unwrap();

    assert_eq!(new.len(), 2);
    assert_eq!(new.get_at(0).unwrap()["name"], json!("A"));
    assert!(new.get_at(1).is_none());
    assert_eq!(new.get_at(2).unwrap()["name"], json!("C"));
}

#[tokio::test]
async fn test_replace_with_explicit_keys() {
    let (client, server, conn) = users_client();
    server.seed("a", json!({"name": "A", "age": 1}));
    server.seed("b", json!({"name": "B", "age": 2}));
    let users = client.collection("users").unwrap();

    let old = Sink::<Value>::new();
    let config = CallConfig::new().with_return_old(&old);
    let outcome = users
        .replace_documents(Some(&["a", "b"][..]), &vec![json!({"name": "A2"}), json!({"name": "B2"})], &config)
        .await
        .unwrap();

    assert_eq!(outcome.failure_count(), 0);
    assert_eq!(outcome.metas()[1].key, "b");
    assert!(outcome.metas()[1].old_rev.is_some());
    assert_eq!(old.get_at(0).unwrap()["age"], json!(1));
    assert!(server.stored("a").unwrap().get("age").is_none());
    assert!(conn.requests().iter().all(|r| r.method() == Method::Put));
}

#[tokio::test]
async fn test_remove_with_missing_document() {
    let (client, server, _conn) = users_client();
    server.seed("a", json!({}));
    server.seed("c", json!({}));
    let users = client.collection("users").unwrap();

    let outcome = users
        .remove_documents(&["a", "b", "c"], &CallConfig::new())
        .await
        .unwrap();

    let items = outcome.items();
    assert!(items[0].is_done());
    assert!(matches!(items[1], ItemOutcome::Failed(Error::NotFound(_))));
    assert!(items[2].is_done());
    assert!(server.stored("a").is_none());
    assert!(server.stored("c").is_none());
}

#[tokio::test]
async fn test_read_documents() {
    let (client, server, _conn) = users_client();
    server.seed("a", json!({"name": "A"}));
    let users = client.collection("users").unwrap();

    let results = users.read_documents::<Value>(&["a", "zz"]).await.unwrap();
    assert_eq!(results.len(), 2);

    let (meta, doc) = results[0].as_ref().unwrap();
    assert_eq!(meta.key, "a");
    assert_eq!(doc["name"], json!("A"));
    assert!(matches!(results[1], Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_cancel_between_items() {
    let server = MemoryServer::new("users");
    let cancel = CancelHandle::new();
    let trigger = cancel.clone();
    let backend = Arc::clone(&server);
    let conn = StubConnection::new(move |req| {
        // Cancelled while the first item is being served
        trigger.cancel();
        backend.handle(req)
    });
    let users = Client::with_connection(conn.clone()).collection("users").unwrap();

    let config = CallConfig::new().with_cancellation(&cancel);
    let docs = vec![json!({"_key": "a"}), json!({"_key": "b"}), json!({"_key": "c"})];
    let outcome = users.create_documents(&docs, &config).await.unwrap();

    let items = outcome.items();
    assert!(items[0].is_done());
    assert_eq!(items[1], ItemOutcome::NotAttempted);
    assert_eq!(items[2], ItemOutcome::NotAttempted);
    assert_eq!(conn.request_count(), 1);
    assert!(server.stored("b").is_none());
}

#[tokio::test]
async fn test_cancel_in_flight_item() {
    let users = Client::with_connection(Arc::new(HangingConnection))
        .collection("users")
        .unwrap();
    let cancel = CancelHandle::new();
    let config = CallConfig::new().with_cancellation(&cancel);

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let outcome = users
        .remove_documents(&["a", "b", "c"], &config)
        .await
        .unwrap();

    assert_eq!(
        outcome.into_items(),
        vec![
            ItemOutcome::Failed(Error::Cancelled),
            ItemOutcome::NotAttempted,
            ItemOutcome::NotAttempted,
        ]
    );
}

#[tokio::test]
async fn test_owned_string_keys() {
    let (client, server, conn) = users_client();
    server.seed("a", json!({"v": 0}));
    server.seed("b", json!({"v": 0}));
    let users = client.collection("users").unwrap();
    let keys: Vec<String> = vec!["a".to_string(), "b".to_string()];

    let outcome = users
        .update_documents(Some(keys.as_slice()), &vec![json!({"v": 1}), json!({"v": 2})], &CallConfig::new())
        .await
        .unwrap();
    assert_eq!(outcome.failure_count(), 0);
    assert_eq!(server.stored("b").unwrap()["v"], json!(2));

    let results = users.read_documents::<Value>(keys.as_slice()).await.unwrap();
    assert!(results.iter().all(Result::is_ok));

    let outcome = users.remove_documents(keys.as_slice(), &CallConfig::new()).await.unwrap();
    assert_eq!(outcome.metas()[0].key, "a");
    assert!(server.stored("a").is_none());
    assert_eq!(conn.requests()[5].path(), "_api/document/users/b");
}
