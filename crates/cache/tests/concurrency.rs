use std::any::TypeId;
use std::sync::Arc;

use serde_json::json;
use tessera_cache::{CacheConfig, CacheKey, ResultCache};

struct Ticket;

fn key(id: i64) -> CacheKey {
    CacheKey::for_filter(TypeId::of::<Ticket>(), &json!({ "id": id })).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_and_invalidation() {
    let cache = Arc::new(ResultCache::new(CacheConfig::default()));

    let mut handles = Vec::new();
    for worker in 0..8i64 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            for n in 0..50i64 {
                let id = worker * 100 + n;
                cache.put(key(id), json!({ "id": id, "worker": worker }), Some("id"));
                assert!(cache.get(&key(id)).is_some());
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.len(), 400);

    let list = CacheKey::for_filter(TypeId::of::<Ticket>(), &json!({})).unwrap();
    cache.put(list.clone(), json!([{ "id": 1, "worker": 0 }, { "id": 2, "worker": 0 }]), Some("id"));

    let editors: Vec<_> = (0..4)
        .map(|round| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache.refresh(TypeId::of::<Ticket>(), "id", &json!({ "id": 2, "worker": round }));
            })
        })
        .collect();
    for editor in editors {
        editor.await.unwrap();
    }

    let refreshed = cache.get(&list).unwrap();
    assert_eq!(refreshed[0], json!({ "id": 1, "worker": 0 }));
    assert_eq!(refreshed[1]["id"], json!(2));

    assert_eq!(cache.del(&key(0), true), 401);
    assert!(cache.is_empty());
}
