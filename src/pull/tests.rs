//! Tests for the pull module

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::catalog::{PullMode, StreamSpec};
use crate::error::{Error, Result};
use crate::metrics::NoopObserver;
use crate::retry::{Fetcher, RetryPolicy};
use crate::state::StateStore;
use crate::testutil::{batch, journal, CountingRefresher, ScriptedSource};
use crate::types::{parse_timestamp, Batch};

const START: &str = "2020-01-01T00:00:00Z";

fn context_for(
    spec: StreamSpec,
    state: &StateStore,
    script: Vec<Result<Batch>>,
) -> (PullContext, Arc<ScriptedSource>) {
    let source = Arc::new(ScriptedSource::new(script));
    let fetcher = Fetcher::new(
        source.clone(),
        Arc::new(CountingRefresher::new()),
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)),
        Arc::new(NoopObserver),
    );
    let cx = PullContext::new(fetcher, state.clone(), spec, START);
    (cx, source)
}

fn invoices(mode: PullMode) -> StreamSpec {
    StreamSpec::new("invoices", "/invoices").with_mode(mode)
}

// ============================================================================
// PullContext Tests
// ============================================================================

#[tokio::test]
async fn test_start_cursor_seeds_missing_bookmark() {
    let state = StateStore::in_memory();
    let (cx, _) = context_for(invoices(PullMode::Incremental), &state, vec![]);

    let start = cx.start_cursor().await.unwrap();
    assert_eq!(start, parse_timestamp(START).unwrap());
    assert_eq!(state.updated_at("invoices").await.as_deref(), Some(START));
}

#[tokio::test]
async fn test_start_cursor_uses_existing_bookmark() {
    let state = StateStore::in_memory();
    state
        .set_updated_at("invoices", "2021-05-05T10:00:00Z")
        .await;
    let (cx, _) = context_for(invoices(PullMode::Incremental), &state, vec![]);

    let start = cx.start_cursor().await.unwrap();
    assert_eq!(start, parse_timestamp("2021-05-05T10:00:00Z").unwrap());
    assert_eq!(
        state.updated_at("invoices").await.as_deref(),
        Some("2021-05-05T10:00:00Z")
    );
}

#[tokio::test]
async fn test_start_cursor_reseeds_unparseable_bookmark() {
    let state = StateStore::in_memory();
    state.set_updated_at("invoices", "not-a-timestamp").await;
    let (cx, _) = context_for(invoices(PullMode::Incremental), &state, vec![]);

    let start = cx.start_cursor().await.unwrap();
    assert_eq!(start, parse_timestamp(START).unwrap());
    assert_eq!(state.updated_at("invoices").await.as_deref(), Some(START));
}

#[tokio::test]
async fn test_advance_cursor_stores_last_record_value_verbatim() {
    let state = StateStore::in_memory();
    let (cx, _) = context_for(invoices(PullMode::Incremental), &state, vec![]);

    // Remote timestamp formats survive round-trip untouched.
    let records = batch(&[
        ("a", "2021-02-01T00:00:00Z"),
        ("b", "2021-02-03T04:05:06.1234567Z"),
    ]);
    cx.advance_cursor(&records).await.unwrap();
    assert_eq!(
        state.updated_at("invoices").await.as_deref(),
        Some("2021-02-03T04:05:06.1234567Z")
    );
}

#[tokio::test]
async fn test_advance_cursor_missing_property_is_fatal() {
    let state = StateStore::in_memory();
    let (cx, _) = context_for(invoices(PullMode::Incremental), &state, vec![]);

    let records = vec![json!({"InvoiceID": "a"})];
    let err = cx.advance_cursor(&records).await.unwrap_err();
    assert!(matches!(err, Error::MissingRecordField { .. }));
    assert!(state.updated_at("invoices").await.is_none());
}

#[tokio::test]
async fn test_advance_cursor_empty_batch_is_noop() {
    let state = StateStore::in_memory();
    let (cx, _) = context_for(invoices(PullMode::Incremental), &state, vec![]);

    cx.advance_cursor(&[]).await.unwrap();
    assert!(state.updated_at("invoices").await.is_none());
}

#[tokio::test]
async fn test_order_clause_uses_bookmark_property() {
    let state = StateStore::in_memory();
    let (cx, _) = context_for(invoices(PullMode::Paged), &state, vec![]);
    assert_eq!(cx.order_clause(), "UpdatedDateUTC ASC");

    let spec = invoices(PullMode::Paged).with_bookmark_property("CreatedDateUTC");
    let (cx, _) = context_for(spec, &state, vec![]);
    assert_eq!(cx.order_clause(), "CreatedDateUTC ASC");
}

// ============================================================================
// IncrementalPull Tests
// ============================================================================

#[tokio::test]
async fn test_incremental_yields_once_and_advances() {
    let state = StateStore::in_memory();
    let (cx, source) = context_for(
        invoices(PullMode::Incremental),
        &state,
        vec![Ok(batch(&[
            ("a", "2020-02-01T00:00:00Z"),
            ("b", "2020-02-02T00:00:00Z"),
        ]))],
    );
    let mut pull = IncrementalPull::new(cx);

    let first = pull.next_batch().await.unwrap().unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(
        state.updated_at("invoices").await.as_deref(),
        Some("2020-02-02T00:00:00Z")
    );

    assert!(pull.next_batch().await.unwrap().is_none());
    assert_eq!(source.call_count(), 1);

    // Single fetch filtered by the start cursor, nothing else.
    let options = source.options_at(0);
    assert_eq!(options.since, Some(parse_timestamp(START).unwrap()));
    assert!(options.order_by.is_none());
    assert!(options.page.is_none());
    assert!(options.offset.is_none());
}

#[tokio::test]
async fn test_incremental_empty_result_ends_run() {
    let state = StateStore::in_memory();
    let (cx, source) = context_for(invoices(PullMode::Incremental), &state, vec![Ok(vec![])]);
    let mut pull = IncrementalPull::new(cx);

    assert!(pull.next_batch().await.unwrap().is_none());
    assert_eq!(source.call_count(), 1);
    // The seed write is the only bookmark change.
    assert_eq!(state.updated_at("invoices").await.as_deref(), Some(START));
}

// ============================================================================
// PagedPull Tests
// ============================================================================

#[tokio::test]
async fn test_paged_sweep_until_empty_page() {
    let state = StateStore::in_memory();
    let (cx, source) = context_for(
        invoices(PullMode::Paged),
        &state,
        vec![
            Ok(batch(&[
                ("a", "2020-02-01T00:00:00Z"),
                ("b", "2020-02-02T00:00:00Z"),
            ])),
            Ok(batch(&[("c", "2020-02-03T00:00:00Z")])),
            Ok(vec![]),
        ],
    );
    let mut pull = PagedPull::new(cx);

    let first = pull.next_batch().await.unwrap().unwrap();
    assert_eq!(first.len(), 2);
    // Bookmarks move before the batch is yielded.
    assert_eq!(state.page("invoices").await, Some(2));
    assert_eq!(
        state.updated_at("invoices").await.as_deref(),
        Some("2020-02-02T00:00:00Z")
    );

    let second = pull.next_batch().await.unwrap().unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(state.page("invoices").await, Some(3));

    assert!(pull.next_batch().await.unwrap().is_none());
    assert!(pull.next_batch().await.unwrap().is_none());
    assert_eq!(source.call_count(), 3);

    // Completed sweep clears the page bookmark and keeps the cursor.
    assert_eq!(state.page("invoices").await, None);
    assert_eq!(
        state.updated_at("invoices").await.as_deref(),
        Some("2020-02-03T00:00:00Z")
    );

    for (index, expected_page) in [(0usize, 1u64), (1, 2), (2, 3)] {
        let options = source.options_at(index);
        assert_eq!(options.page, Some(expected_page));
        assert_eq!(options.since, Some(parse_timestamp(START).unwrap()));
        assert_eq!(options.order_by.as_deref(), Some("UpdatedDateUTC ASC"));
    }
}

#[tokio::test]
async fn test_paged_resumes_from_bookmarked_page() {
    let state = StateStore::in_memory();
    state.set_updated_at("invoices", "2020-06-01T00:00:00Z").await;
    state.set_page("invoices", Some(3)).await;
    let (cx, source) = context_for(
        invoices(PullMode::Paged),
        &state,
        vec![
            Ok(batch(&[("k", "2020-06-02T00:00:00Z")])),
            Ok(vec![]),
        ],
    );
    let mut pull = PagedPull::new(cx);

    pull.next_batch().await.unwrap().unwrap();
    assert!(pull.next_batch().await.unwrap().is_none());

    // Interrupted sweeps restart at the saved page, not page one.
    assert_eq!(source.options_at(0).page, Some(3));
    assert_eq!(source.options_at(1).page, Some(4));
    assert_eq!(
        source.options_at(0).since,
        Some(parse_timestamp("2020-06-01T00:00:00Z").unwrap())
    );
    assert_eq!(state.page("invoices").await, None);
}

#[tokio::test]
async fn test_paged_honors_configured_first_page() {
    let state = StateStore::in_memory();
    let spec = invoices(PullMode::Paged).with_first_page(0);
    let (cx, source) = context_for(spec, &state, vec![Ok(vec![])]);
    let mut pull = PagedPull::new(cx);

    assert!(pull.next_batch().await.unwrap().is_none());
    assert_eq!(source.options_at(0).page, Some(0));
}

#[tokio::test]
async fn test_paged_empty_first_page_clears_page_bookmark() {
    let state = StateStore::in_memory();
    let (cx, _) = context_for(invoices(PullMode::Paged), &state, vec![Ok(vec![])]);
    let mut pull = PagedPull::new(cx);

    assert!(pull.next_batch().await.unwrap().is_none());
    assert_eq!(state.page("invoices").await, None);
    assert_eq!(state.updated_at("invoices").await.as_deref(), Some(START));
}

#[tokio::test]
async fn test_paged_runaway_guard_aborts() {
    let state = StateStore::in_memory();
    let script = (0..3)
        .map(|_| Ok(batch(&[("x", "2020-02-01T00:00:00Z")])))
        .collect();
    let (cx, _) = context_for(invoices(PullMode::Paged), &state, script);
    let mut pull = PagedPull::new(cx).with_page_cap(2);

    assert!(pull.next_batch().await.unwrap().is_some());
    assert!(pull.next_batch().await.unwrap().is_some());
    let err = pull.next_batch().await.unwrap_err();
    assert!(matches!(
        err,
        Error::RunawayPagination { pages: 3, .. }
    ));
}

// ============================================================================
// SequencePull Tests
// ============================================================================

fn journals() -> StreamSpec {
    StreamSpec::new("journals", "/journals")
        .with_mode(PullMode::Sequence {
            sequence_field: "JournalNumber".to_string(),
        })
        .with_bookmark_property("CreatedDateUTC")
}

#[tokio::test]
async fn test_sequence_starts_at_zero() {
    let state = StateStore::in_memory();
    let (cx, source) = context_for(
        journals(),
        &state,
        vec![
            Ok(vec![
                journal(12, "2020-02-01T00:00:00Z"),
                journal(41, "2020-02-02T00:00:00Z"),
            ]),
            Ok(vec![]),
        ],
    );
    let mut pull = SequencePull::new(cx, "JournalNumber");

    pull.next_batch().await.unwrap().unwrap();
    assert_eq!(state.journal_number("journals").await, Some(41));

    assert!(pull.next_batch().await.unwrap().is_none());
    assert_eq!(source.options_at(0).offset, Some(0));
    assert_eq!(source.options_at(1).offset, Some(41));
    // The sequence bookmark is cumulative, never reset on completion.
    assert_eq!(state.journal_number("journals").await, Some(41));
}

#[tokio::test]
async fn test_sequence_bookmark_is_last_record_value() {
    let state = StateStore::in_memory();
    state.set_journal_number("journals", 41).await;
    let (cx, source) = context_for(
        journals(),
        &state,
        vec![
            Ok(vec![
                journal(45, "2020-03-01T00:00:00Z"),
                journal(57, "2020-03-02T00:00:00Z"),
            ]),
            Ok(vec![]),
        ],
    );
    let mut pull = SequencePull::new(cx, "JournalNumber");

    pull.next_batch().await.unwrap().unwrap();
    // Exactly the record's own number, not an increment of the offset.
    assert_eq!(state.journal_number("journals").await, Some(57));

    assert!(pull.next_batch().await.unwrap().is_none());
    assert_eq!(source.options_at(0).offset, Some(41));
    assert_eq!(source.options_at(1).offset, Some(57));
}

#[tokio::test]
async fn test_sequence_requests_carry_offset_only() {
    let state = StateStore::in_memory();
    let (cx, source) = context_for(journals(), &state, vec![Ok(vec![])]);
    let mut pull = SequencePull::new(cx, "JournalNumber");

    assert!(pull.next_batch().await.unwrap().is_none());
    let options = source.options_at(0);
    assert_eq!(options.offset, Some(0));
    assert!(options.since.is_none());
    assert!(options.order_by.is_none());
    assert!(options.page.is_none());
}

#[tokio::test]
async fn test_sequence_missing_field_is_fatal() {
    let state = StateStore::in_memory();
    let (cx, _) = context_for(
        journals(),
        &state,
        vec![Ok(vec![json!({"JournalID": "j-9"})])],
    );
    let mut pull = SequencePull::new(cx, "JournalNumber");

    let err = pull.next_batch().await.unwrap_err();
    assert!(matches!(err, Error::MissingRecordField { .. }));
    assert_eq!(state.journal_number("journals").await, None);
}

#[tokio::test]
async fn test_sequence_does_not_touch_updated_at() {
    let state = StateStore::in_memory();
    let (cx, _) = context_for(
        journals(),
        &state,
        vec![Ok(vec![journal(7, "2020-02-01T00:00:00Z")]), Ok(vec![])],
    );
    let mut pull = SequencePull::new(cx, "JournalNumber");

    pull.next_batch().await.unwrap().unwrap();
    assert!(pull.next_batch().await.unwrap().is_none());
    assert!(state.updated_at("journals").await.is_none());
}

// ============================================================================
// FilteredSweepPull Tests
// ============================================================================

#[tokio::test]
async fn test_filtered_sweep_drops_records_before_start_cursor() {
    let state = StateStore::in_memory();
    let (cx, source) = context_for(
        invoices(PullMode::FilteredSweep),
        &state,
        vec![
            Ok(batch(&[
                ("old", "2019-12-31T23:59:59Z"),
                ("new", "2020-01-02T00:00:00Z"),
            ])),
            Ok(vec![]),
        ],
    );
    let mut pull = FilteredSweepPull::new(cx);

    let first = pull.next_batch().await.unwrap().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0]["InvoiceID"], "new");
    // Bookmarks advance as if both records had been yielded.
    assert_eq!(state.page("invoices").await, Some(2));
    assert_eq!(
        state.updated_at("invoices").await.as_deref(),
        Some("2020-01-02T00:00:00Z")
    );

    assert!(pull.next_batch().await.unwrap().is_none());
    assert_eq!(state.page("invoices").await, None);

    // Pages only: the endpoint cannot filter or order server-side.
    let options = source.options_at(0);
    assert_eq!(options.page, Some(1));
    assert!(options.since.is_none());
    assert!(options.order_by.is_none());
}

#[tokio::test]
async fn test_filtered_sweep_yields_empty_batch_when_all_records_are_old() {
    let state = StateStore::in_memory();
    let (cx, _) = context_for(
        invoices(PullMode::FilteredSweep),
        &state,
        vec![
            Ok(batch(&[("old", "2019-06-01T00:00:00Z")])),
            Ok(vec![]),
        ],
    );
    let mut pull = FilteredSweepPull::new(cx);

    let first = pull.next_batch().await.unwrap();
    assert_eq!(first.map(|records| records.len()), Some(0));
    assert_eq!(state.page("invoices").await, Some(2));

    assert!(pull.next_batch().await.unwrap().is_none());
}

#[tokio::test]
async fn test_filtered_sweep_unparseable_timestamp_is_fatal() {
    let state = StateStore::in_memory();
    let (cx, _) = context_for(
        invoices(PullMode::FilteredSweep),
        &state,
        vec![Ok(batch(&[("x", "garbage")]))],
    );
    let mut pull = FilteredSweepPull::new(cx);

    let err = pull.next_batch().await.unwrap_err();
    assert!(matches!(err, Error::InvalidCursor { .. }));
}

#[tokio::test]
async fn test_filtered_sweep_runaway_guard_aborts() {
    let state = StateStore::in_memory();
    let (cx, _) = context_for(
        invoices(PullMode::FilteredSweep),
        &state,
        vec![
            Ok(batch(&[("a", "2020-02-01T00:00:00Z")])),
            Ok(batch(&[("b", "2020-02-02T00:00:00Z")])),
        ],
    );
    let mut pull = FilteredSweepPull::new(cx).with_page_cap(1);

    assert!(pull.next_batch().await.unwrap().is_some());
    let err = pull.next_batch().await.unwrap_err();
    assert!(matches!(err, Error::RunawayPagination { pages: 2, .. }));
}

// ============================================================================
// FullRefreshPull Tests
// ============================================================================

#[tokio::test]
async fn test_full_refresh_yields_once_with_no_options() {
    let state = StateStore::in_memory();
    let (cx, source) = context_for(
        invoices(PullMode::FullRefresh),
        &state,
        vec![Ok(batch(&[("a", "2020-02-01T00:00:00Z")]))],
    );
    let mut pull = FullRefreshPull::new(cx);

    let first = pull.next_batch().await.unwrap().unwrap();
    assert_eq!(first.len(), 1);
    assert!(pull.next_batch().await.unwrap().is_none());

    assert_eq!(source.call_count(), 1);
    assert!(source.options_at(0).is_empty());
    // Full refresh leaves no trace in the bookmark store.
    assert!(state.snapshot().await.bookmarks.is_empty());
}

#[tokio::test]
async fn test_full_refresh_yields_even_when_empty() {
    let state = StateStore::in_memory();
    let (cx, _) = context_for(invoices(PullMode::FullRefresh), &state, vec![Ok(vec![])]);
    let mut pull = FullRefreshPull::new(cx);

    let first = pull.next_batch().await.unwrap();
    assert_eq!(first.map(|records| records.len()), Some(0));
    assert!(pull.next_batch().await.unwrap().is_none());
    assert!(state.snapshot().await.bookmarks.is_empty());
}

// ============================================================================
// Factory Tests
// ============================================================================

#[tokio::test]
async fn test_strategy_for_incremental_mode() {
    let state = StateStore::in_memory();
    let (cx, source) = context_for(
        invoices(PullMode::Incremental),
        &state,
        vec![Ok(batch(&[("a", "2020-02-01T00:00:00Z")]))],
    );
    let mut pull = strategy_for(cx);

    assert!(pull.next_batch().await.unwrap().is_some());
    assert!(pull.next_batch().await.unwrap().is_none());
    assert_eq!(source.call_count(), 1);
    assert!(source.options_at(0).since.is_some());
}

#[tokio::test]
async fn test_strategy_for_sequence_mode_uses_configured_field() {
    let state = StateStore::in_memory();
    let (cx, _) = context_for(
        journals(),
        &state,
        vec![Ok(vec![journal(19, "2020-02-01T00:00:00Z")]), Ok(vec![])],
    );
    let mut pull = strategy_for(cx);

    pull.next_batch().await.unwrap().unwrap();
    assert_eq!(state.journal_number("journals").await, Some(19));
}

#[tokio::test]
async fn test_strategy_for_paged_resume_and_clear() {
    let state = StateStore::in_memory();
    state.set_page("record_batches", Some(2)).await;
    let spec = StreamSpec::new("record_batches", "/batches");
    let (cx, source) = context_for(spec, &state, vec![Ok(vec![])]);
    let mut pull = strategy_for(cx);

    assert!(pull.next_batch().await.unwrap().is_none());
    assert_eq!(source.options_at(0).page, Some(2));
    assert_eq!(state.page("record_batches").await, None);
}
