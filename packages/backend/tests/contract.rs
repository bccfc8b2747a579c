use std::sync::Arc;

use kvfs_backend::{AttributeValue, InMemoryBackend, Item, KvBackend, KvError, LocalDiskBackend};

fn item(key: &str, owner: &str) -> Item {
    let mut item = Item::new();
    item.insert("Key".to_string(), AttributeValue::S(key.to_string()));
    item.insert("Owner".to_string(), AttributeValue::S(owner.to_string()));
    item
}

async fn exercise_contract(backend: Arc<dyn KvBackend>) {
    assert_eq!(backend.get("missing").await.unwrap(), None);
    assert_eq!(backend.delete("missing").await.unwrap(), None);

    backend.put("dir/a", item("dir/a", "one")).await.unwrap();
    backend.put("dir/a", item("dir/a", "two")).await.unwrap();
    assert_eq!(
        backend.get("dir/a").await.unwrap(),
        Some(item("dir/a", "two"))
    );

    backend.put("dir/b/c", item("dir/b/c", "one")).await.unwrap();
    backend.put("dirt", item("dirt", "one")).await.unwrap();
    assert_eq!(backend.scan_prefix("dir/").await.unwrap().len(), 2);
    assert_eq!(backend.scan_prefix("dir").await.unwrap().len(), 3);

    backend
        .put_if_absent("LOCK-x", item("LOCK-x", "first"))
        .await
        .unwrap();
    match backend.put_if_absent("LOCK-x", item("LOCK-x", "second")).await {
        Err(KvError::ConditionFailed { current }) => {
            assert_eq!(current, item("LOCK-x", "first"))
        }
        other => panic!("expected condition failure, got {other:?}"),
    }

    assert_eq!(
        backend.delete("LOCK-x").await.unwrap(),
        Some(item("LOCK-x", "first"))
    );
    backend
        .put_if_absent("LOCK-x", item("LOCK-x", "second"))
        .await
        .unwrap();
}

async fn exactly_one_conditional_winner(backend: Arc<dyn KvBackend>) {
    let mut tasks = Vec::new();
    for i in 0..16 {
        let backend = backend.clone();
        tasks.push(tokio::spawn(async move {
            backend
                .put_if_absent("LOCK-race", item("LOCK-race", &i.to_string()))
                .await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => winners += 1,
            Err(e) => assert!(
                matches!(e, KvError::ConditionFailed { .. }),
                "unexpected error: {e}"
            ),
        }
    }
    assert_eq!(winners, 1);
}

async fn long_keys_round_trip(backend: Arc<dyn KvBackend>) {
    let domain = format!("{}.example.com", "a".repeat(180));
    let dir = format!("certificates/acme-v02.api.letsencrypt.org-directory/{domain}");
    let key = format!("{dir}/{domain}.crt");
    assert!(key.len() >= 400);

    backend.put(&key, item(&key, "one")).await.unwrap();
    assert_eq!(backend.get(&key).await.unwrap(), Some(item(&key, "one")));

    let found = backend.scan_prefix(&format!("{dir}/")).await.unwrap();
    assert_eq!(found, vec![item(&key, "one")]);
    assert!(backend.scan_prefix("certificates/other/").await.unwrap().is_empty());

    match backend.put_if_absent(&key, item(&key, "two")).await {
        Err(KvError::ConditionFailed { current }) => assert_eq!(current, item(&key, "one")),
        other => panic!("expected condition failure, got {other:?}"),
    }

    assert_eq!(backend.delete(&key).await.unwrap(), Some(item(&key, "one")));
    assert_eq!(backend.get(&key).await.unwrap(), None);
}

#[tokio::test]
async fn in_memory_backend_honors_contract() {
    exercise_contract(Arc::new(InMemoryBackend::new())).await;
}

#[tokio::test]
async fn local_disk_backend_honors_contract() {
    let dir = tempfile::tempdir().unwrap();
    exercise_contract(Arc::new(LocalDiskBackend::new(dir.path()).unwrap())).await;
}

#[tokio::test]
async fn in_memory_long_keys() {
    long_keys_round_trip(Arc::new(InMemoryBackend::new())).await;
}

#[tokio::test]
async fn local_disk_long_keys() {
    let dir = tempfile::tempdir().unwrap();
    long_keys_round_trip(Arc::new(LocalDiskBackend::new(dir.path()).unwrap())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_memory_conditional_put_has_one_winner() {
    exactly_one_conditional_winner(Arc::new(InMemoryBackend::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn local_disk_conditional_put_has_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    exactly_one_conditional_winner(Arc::new(LocalDiskBackend::new(dir.path()).unwrap())).await;
}
