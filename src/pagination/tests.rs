//! Tests for the pagination module

use super::*;
use crate::error::Error;
use crate::retry::RetryPolicy;
use crate::source::InMemorySource;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn fetcher_over(source: &Arc<InMemorySource>, attempts: u32) -> PaginatedFetcher {
    PaginatedFetcher::new(
        source.clone(),
        RetryPolicy::fixed(attempts, Duration::from_secs(5)),
    )
}

// ============================================================================
// Cursor Tests
// ============================================================================

#[test]
fn test_cursor_starts_at_zero() {
    let cursor = PaginationCursor::new(1000);
    assert_eq!(cursor.offset(), 0);
    assert_eq!(cursor.limit(), 1000);
}

#[test]
fn test_cursor_advances_by_limit() {
    let mut cursor = PaginationCursor::new(250);
    let mut previous = cursor.offset();
    for _ in 0..5 {
        cursor.advance();
        assert_eq!(cursor.offset(), previous + 250);
        previous = cursor.offset();
    }
    assert_eq!(cursor.offset(), 1250);
}

// ============================================================================
// Fetcher Tests
// ============================================================================

#[tokio::test]
async fn test_fetch_batch_returns_page() {
    let source = Arc::new(InMemorySource::synthetic(25));
    let fetcher = fetcher_over(&source, 3);

    let page = fetcher.fetch_batch(10, 10).await.unwrap();
    assert_eq!(page.len(), 10);
    assert_eq!(page[0].element_id, "4:memory:00000010");

    let tail = fetcher.fetch_batch(20, 10).await.unwrap();
    assert_eq!(tail.len(), 5);

    let past_end = fetcher.fetch_batch(30, 10).await.unwrap();
    assert!(past_end.is_empty());
}

#[tokio::test]
async fn test_fetch_is_deterministic() {
    let source = Arc::new(InMemorySource::synthetic(50));
    let fetcher = fetcher_over(&source, 1);

    let first = fetcher.fetch_batch(20, 15).await.unwrap();
    let second = fetcher.fetch_batch(20, 15).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_fetch_at_cursor() {
    let source = Arc::new(InMemorySource::synthetic(3));
    let fetcher = fetcher_over(&source, 1);
    let mut cursor = PaginationCursor::new(2);

    assert_eq!(fetcher.fetch_at(&cursor).await.unwrap().len(), 2);
    cursor.advance();
    assert_eq!(fetcher.fetch_at(&cursor).await.unwrap().len(), 1);
    assert_eq!(source.calls(), vec![(0, 2), (2, 2)]);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_retries_transient_failures() {
    let source = Arc::new(InMemorySource::synthetic(5).with_transient_failures(2));
    let fetcher = fetcher_over(&source, 3);
    let start = Instant::now();

    let page = fetcher.fetch_batch(0, 10).await.unwrap();

    assert_eq!(page.len(), 5);
    assert_eq!(source.calls().len(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_fetch_fails_after_budget() {
    let source = Arc::new(InMemorySource::synthetic(5).with_transient_failures(3));
    let fetcher = fetcher_over(&source, 3);

    let err = fetcher.fetch_batch(0, 10).await.unwrap_err();

    assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(source.calls(), vec![(0, 10); 3]);
}
