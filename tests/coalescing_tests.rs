//! End-to-end tests of the cache and batcher through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::{advance, Instant};
use upstream_shield::keys::analysis_key;
use upstream_shield::{
    with_batching, with_cache, BatchConfig, BatchError, Batcher, Processor, TtlCache,
};

#[derive(Debug, thiserror::Error)]
#[error("upstream quota exceeded")]
struct QuotaExceeded;

type Log = Arc<Mutex<Vec<Vec<&'static str>>>>;

fn logging_processor(log: &Log) -> impl Processor<&'static str, String, QuotaExceeded> + Clone {
    let log = Arc::clone(log);
    move |payloads: Vec<&'static str>| {
        log.lock().unwrap().push(payloads.clone());
        async move {
            Ok::<Vec<String>, QuotaExceeded>(payloads.iter().map(|p| format!("done:{}", p)).collect())
        }
    }
}

// Scenario: capacity two, third insert evicts the first.
#[test]
fn test_eviction_scenario() {
    let cache = TtlCache::new(2, Duration::from_secs(60));

    cache.put("A", 1);
    cache.put("B", 2);
    cache.put("C", 3);

    assert_eq!(cache.get("A"), None);
    assert_eq!(cache.get("B"), Some(2));
    assert_eq!(cache.get("C"), Some(3));
    assert_eq!(cache.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_ttl_scenario() {
    let cache = TtlCache::new(10, Duration::from_secs(3600));

    cache.put_with_ttl("k", "v", Duration::from_millis(200));
    advance(Duration::from_millis(150)).await;
    assert_eq!(cache.get("k"), Some("v"));

    advance(Duration::from_millis(100)).await;
    assert_eq!(cache.get("k"), None);
    assert!(!cache.has("k"));
}

// Scenario: size threshold reached on the third submit, 10ms in.
#[tokio::test(start_paused = true)]
async fn test_size_flush_scenario() {
    let log = Log::default();
    let batcher = Batcher::new(BatchConfig {
        batch_size: 3,
        batch_timeout: Duration::from_millis(1000),
    });
    let start = Instant::now();

    let p1 = batcher.submit("job", "P1", logging_processor(&log));
    let p2 = batcher.submit("job", "P2", logging_processor(&log));
    assert!(log.lock().unwrap().is_empty());

    advance(Duration::from_millis(10)).await;
    let p3 = batcher.submit("job", "P3", logging_processor(&log));
    assert_eq!(*log.lock().unwrap(), vec![vec!["P1", "P2", "P3"]]);

    let (r1, r2, r3) = tokio::join!(p1, p2, p3);
    assert_eq!(r1.unwrap(), "done:P1");
    assert_eq!(r2.unwrap(), "done:P2");
    assert_eq!(r3.unwrap(), "done:P3");
    assert!(start.elapsed() < Duration::from_millis(1000));
}

// Scenario: a lone submit flushes at the timeout.
#[tokio::test(start_paused = true)]
async fn test_timeout_flush_scenario() {
    let log = Log::default();
    let batcher = Batcher::new(BatchConfig {
        batch_size: 3,
        batch_timeout: Duration::from_millis(500),
    });
    let start = Instant::now();

    let result = batcher.submit("job", "P1", logging_processor(&log)).await;

    assert_eq!(result.unwrap(), "done:P1");
    assert!(start.elapsed() >= Duration::from_millis(500));
    assert_eq!(*log.lock().unwrap(), vec![vec!["P1"]]);
}

// Scenario: three waiters, two results.
#[tokio::test]
async fn test_missing_result_scenario() {
    let batcher = Batcher::new(BatchConfig {
        batch_size: 3,
        batch_timeout: Duration::from_secs(10),
    });
    let two_results =
        |_: Vec<u8>| async { Ok::<Vec<&'static str>, QuotaExceeded>(vec!["r0", "r1"]) };

    let w0 = batcher.submit("k", 0, two_results);
    let w1 = batcher.submit("k", 1, two_results);
    let w2 = batcher.submit("k", 2, two_results);

    assert_eq!(w0.await.unwrap(), "r0");
    assert_eq!(w1.await.unwrap(), "r1");
    match w2.await {
        Err(BatchError::MissingResult { index, .. }) => assert_eq!(index, 2),
        other => panic!("expected missing result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_group_failure_rejects_every_waiter() {
    let batcher = Batcher::new(BatchConfig {
        batch_size: 2,
        batch_timeout: Duration::from_secs(10),
    });
    let failing = |_: Vec<u8>| async { Err::<Vec<u8>, _>(QuotaExceeded) };

    let a = batcher.submit("k", 1, failing);
    let b = batcher.submit("k", 2, failing);

    for result in [a.await, b.await] {
        let err = result.unwrap_err();
        assert!(matches!(err, BatchError::Processor(_)));
        assert_eq!(err.to_string(), "Batch processor failed: upstream quota exceeded");
    }
}

// Concurrent identical lookups collapse into one upstream call, later
// lookups are served from the cache.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memoized_coalesced_lookup_across_tasks() {
    let upstream_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&upstream_calls);
    let processor = move |payloads: Vec<Value>| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<Vec<Value>, QuotaExceeded>(
                payloads.into_iter().map(|p| json!({"analysis": p})).collect(),
            )
        }
    };

    let cache = TtlCache::new(16, Duration::from_secs(60));
    let batcher = Batcher::new(BatchConfig {
        batch_size: 8,
        batch_timeout: Duration::from_millis(50),
    });
    let key = |payload: &Value| analysis_key(payload).unwrap_or_default();
    let analyze = with_cache(
        cache.clone(),
        key,
        None,
        with_batching(batcher.clone(), key, processor),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let analyze = analyze.clone();
            tokio::spawn(async move { analyze(json!({"clip": "intro", "fps": 24})).await })
        })
        .collect();

    for handle in handles {
        let value = handle.await.unwrap().unwrap();
        assert_eq!(value["analysis"]["clip"], "intro");
    }
    assert_eq!(upstream_calls.load(Ordering::SeqCst), 1);

    let again = analyze(json!({"fps": 24, "clip": "intro"})).await.unwrap();
    assert_eq!(again["analysis"]["fps"], 24);
    assert_eq!(upstream_calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().total_hits, 1);
}
