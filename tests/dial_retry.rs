//! Tests for the downstream dial retry policy.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tuple_relay::retry::{with_retry, RetryPolicy};

#[test]
fn default_policy_values() {
    let p = RetryPolicy::default();
    assert_eq!(p.max_retries, 3);
    assert_eq!(p.initial_delay, Duration::from_millis(500));
    assert_eq!(p.max_delay, Duration::from_secs(10));
    assert!((p.backoff_multiplier - 2.0).abs() < f64::EPSILON);
}

#[test]
fn delay_for_attempt_increases() {
    let p = RetryPolicy {
        max_retries: 5,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(10),
        backoff_multiplier: 2.0,
    };

    // With jitter in [0.5, 1.0], attempt 0 delay should be in [50ms, 100ms].
    let d0 = p.delay_for_attempt(0);
    assert!(d0 >= Duration::from_millis(50));
    assert!(d0 <= Duration::from_millis(100));

    // attempt 2 base = 100ms * 4 = 400ms, jittered [200ms, 400ms].
    let d2 = p.delay_for_attempt(2);
    assert!(d2 >= Duration::from_millis(200));
    assert!(d2 <= Duration::from_millis(400));
}

#[test]
fn delay_capped_at_max() {
    let p = RetryPolicy {
        max_retries: 10,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_millis(500),
        backoff_multiplier: 10.0,
    };

    // attempt 5 base is enormous; capped to 500ms, jittered to [250ms, 500ms].
    let d = p.delay_for_attempt(5);
    assert!(d <= Duration::from_millis(500));
    assert!(d >= Duration::from_millis(250));
}

#[tokio::test]
async fn retry_succeeds_after_failures() {
    let counter = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy {
        max_retries: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        backoff_multiplier: 1.0,
    };

    let counter_clone = Arc::clone(&counter);
    let result: Result<&str, String> = with_retry(&policy, || {
        let c = Arc::clone(&counter_clone);
        async move {
            let attempt = c.fetch_add(1, Ordering::SeqCst);
            if attempt < 2 {
                Err(format!("attempt {attempt} failed"))
            } else {
                Ok("success")
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), "success");
    assert_eq!(counter.load(Ordering::SeqCst), 3); // 2 failures + 1 success
}

#[tokio::test]
async fn retry_exhausted_returns_last_error() {
    let counter = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy {
        max_retries: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        backoff_multiplier: 1.0,
    };

    let counter_clone = Arc::clone(&counter);
    let result: Result<(), String> = with_retry(&policy, || {
        let c = Arc::clone(&counter_clone);
        async move {
            let attempt = c.fetch_add(1, Ordering::SeqCst);
            Err(format!("attempt {attempt} failed"))
        }
    })
    .await;

    assert!(result.is_err());
    assert!(result.unwrap_err().contains("attempt 2")); // last error
    assert_eq!(counter.load(Ordering::SeqCst), 3); // initial + 2 retries
}

#[tokio::test]
async fn dial_retry_reaches_a_late_listener() {
    // A port nothing is listening on yet.
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    // Bring the listener up while the dial is still retrying.
    let server = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        let _ = listener.accept().await;
    });

    let policy = RetryPolicy {
        max_retries: 10,
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(100),
        backoff_multiplier: 1.5,
    };

    let stream = with_retry(&policy, || tokio::net::TcpStream::connect(addr))
        .await
        .unwrap();
    assert!(stream.peer_addr().is_ok());

    server.await.unwrap();
}
