//! PositionLedger interface tests.
//!
//! These tests verify the contract of the PositionLedger trait.
//! Each storage implementation should run these tests. Every test writes to
//! its own namespace, so they can share one database.

use futures::{StreamExt, TryStreamExt};
use position_ledger::PositionLedger;

fn batch(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

async fn range<L: PositionLedger>(ledger: &L, ns: &str, from: &str, to: &str) -> Vec<String> {
    ledger
        .read_positions(ns, from, to)
        .map_ok(|p| p.opaque_id)
        .try_collect()
        .await
        .expect("read_positions should succeed")
}

// =============================================================================
// Edge queries
// =============================================================================

pub async fn test_empty_namespace<L: PositionLedger>(ledger: &L) {
    let ns = "test_empty_namespace";

    assert!(ledger.get_first_position(ns).await.unwrap().is_none());
    assert!(ledger.get_last_position(ns).await.unwrap().is_none());
    assert!(ledger
        .get_offset_position(ns, "a", 1)
        .await
        .unwrap()
        .is_none());
    assert!(range(ledger, ns, "a", "b").await.is_empty());
}

pub async fn test_first_and_last<L: PositionLedger>(ledger: &L) {
    let ns = "test_first_and_last";

    assert!(ledger
        .track_completed_positions(ns, &batch(&["m", "a", "z"]))
        .await
        .expect("track should succeed"));

    // Order is insertion order, never the lexical order of the ids.
    assert_eq!(
        ledger.get_first_position(ns).await.unwrap().as_deref(),
        Some("m")
    );
    assert_eq!(
        ledger.get_last_position(ns).await.unwrap().as_deref(),
        Some("z")
    );
}

// =============================================================================
// Offset queries
// =============================================================================

pub async fn test_offset<L: PositionLedger>(ledger: &L) {
    let ns = "test_offset";
    ledger
        .track_completed_positions(ns, &batch(&["a", "b", "c", "d"]))
        .await
        .unwrap();

    let offset = |from: &'static str, n: u32| ledger.get_offset_position(ns, from, n);

    assert_eq!(offset("a", 1).await.unwrap().as_deref(), Some("b"));
    assert_eq!(offset("a", 3).await.unwrap().as_deref(), Some("d"));
    assert_eq!(
        offset("b", 10).await.unwrap().as_deref(),
        Some("d"),
        "offset past the end clamps to the last position"
    );
    assert!(offset("d", 1).await.unwrap().is_none());
    assert!(offset("a", 0).await.unwrap().is_none());
    assert!(offset("missing", 1).await.unwrap().is_none());
}

pub async fn test_duplicate_anchor<L: PositionLedger>(ledger: &L) {
    let ns = "test_duplicate_anchor";
    ledger
        .track_completed_positions(ns, &batch(&["x", "y", "x", "z"]))
        .await
        .unwrap();

    assert_eq!(
        ledger
            .get_offset_position(ns, "x", 1)
            .await
            .unwrap()
            .as_deref(),
        Some("z"),
        "a repeated anchor resolves to its latest occurrence"
    );
}

// =============================================================================
// Range queries
// =============================================================================

pub async fn test_range_inclusive<L: PositionLedger>(ledger: &L) {
    let ns = "test_range_inclusive";
    ledger
        .track_completed_positions(ns, &batch(&["a", "b", "c", "d", "e"]))
        .await
        .unwrap();

    assert_eq!(range(ledger, ns, "b", "d").await, vec!["b", "c", "d"]);
    assert_eq!(range(ledger, ns, "c", "c").await, vec!["c"]);
    assert!(range(ledger, ns, "d", "b").await.is_empty());
    assert!(range(ledger, ns, "a", "missing").await.is_empty());
}

pub async fn test_range_sequences_increase<L: PositionLedger>(ledger: &L) {
    let ns = "test_range_sequences";
    ledger
        .track_completed_positions(ns, &batch(&["a", "b"]))
        .await
        .unwrap();
    ledger
        .track_completed_positions(ns, &batch(&["c"]))
        .await
        .unwrap();

    let loaded: Vec<_> = ledger
        .read_positions(ns, "a", "c")
        .try_collect()
        .await
        .unwrap();

    assert_eq!(loaded.len(), 3);
    assert!(loaded.iter().all(|p| p.namespace == ns));
    assert!(loaded.windows(2).all(|w| w[0].sequence < w[1].sequence));
}

// =============================================================================
// Tracking
// =============================================================================

pub async fn test_empty_batch<L: PositionLedger>(ledger: &L) {
    let ns = "test_empty_batch";

    assert!(ledger.track_completed_positions(ns, &[]).await.unwrap());
    assert!(ledger.get_first_position(ns).await.unwrap().is_none());
}

pub async fn test_large_batch<L: PositionLedger>(ledger: &L) {
    let ns = "test_large_batch";
    let positions: Vec<String> = (0..2500).map(|i| format!("pos-{i:05}")).collect();

    assert!(ledger
        .track_completed_positions(ns, &positions)
        .await
        .unwrap());

    assert_eq!(
        ledger.get_last_position(ns).await.unwrap().as_deref(),
        Some("pos-02499")
    );
    let loaded = range(ledger, ns, "pos-00000", "pos-02499").await;
    assert_eq!(loaded, positions);
}

pub async fn test_namespace_isolation<L: PositionLedger>(ledger: &L) {
    let ns_a = "test_isolation_a";
    let ns_b = "test_isolation_b";

    ledger
        .track_completed_positions(ns_a, &batch(&["a1", "shared"]))
        .await
        .unwrap();
    ledger
        .track_completed_positions(ns_b, &batch(&["b1", "shared", "b2"]))
        .await
        .unwrap();

    assert_eq!(
        ledger.get_last_position(ns_a).await.unwrap().as_deref(),
        Some("shared")
    );
    assert_eq!(
        ledger
            .get_offset_position(ns_b, "shared", 1)
            .await
            .unwrap()
            .as_deref(),
        Some("b2")
    );
    assert!(ledger
        .get_offset_position(ns_a, "b1", 1)
        .await
        .unwrap()
        .is_none());
    assert!(range(ledger, ns_a, "a1", "b2").await.is_empty());
}

// =============================================================================
// End to end
// =============================================================================

pub async fn test_end_to_end<L: PositionLedger>(ledger: &L) {
    let ns = "test_end_to_end";

    assert!(ledger
        .track_completed_positions(ns, &batch(&["a", "b"]))
        .await
        .unwrap());
    assert_eq!(
        ledger.get_last_position(ns).await.unwrap().as_deref(),
        Some("b")
    );
    assert_eq!(
        ledger
            .get_offset_position(ns, "a", 1)
            .await
            .unwrap()
            .as_deref(),
        Some("b")
    );

    assert!(ledger
        .track_completed_positions(ns, &batch(&["c", "d", "e"]))
        .await
        .unwrap());
    assert_eq!(
        ledger.get_last_position(ns).await.unwrap().as_deref(),
        Some("e")
    );
    assert_eq!(
        ledger
            .get_offset_position(ns, "c", 3)
            .await
            .unwrap()
            .as_deref(),
        Some("e")
    );

    let streamed: Vec<_> = ledger.read_positions(ns, "b", "e").collect().await;
    let ids: Vec<String> = streamed
        .into_iter()
        .map(|p| p.expect("range item should load").opaque_id)
        .collect();
    assert_eq!(ids, vec!["b", "c", "d", "e"]);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all PositionLedger interface tests against a ledger implementation.
#[macro_export]
macro_rules! run_position_ledger_tests {
    ($ledger:expr) => {
        use $crate::storage::position_ledger_tests::*;

        test_empty_namespace($ledger).await;
        println!("  test_empty_namespace: PASSED");

        test_first_and_last($ledger).await;
        println!("  test_first_and_last: PASSED");

        test_offset($ledger).await;
        println!("  test_offset: PASSED");

        test_duplicate_anchor($ledger).await;
        println!("  test_duplicate_anchor: PASSED");

        test_range_inclusive($ledger).await;
        println!("  test_range_inclusive: PASSED");

        test_range_sequences_increase($ledger).await;
        println!("  test_range_sequences_increase: PASSED");

        test_empty_batch($ledger).await;
        println!("  test_empty_batch: PASSED");

        test_large_batch($ledger).await;
        println!("  test_large_batch: PASSED");

        test_namespace_isolation($ledger).await;
        println!("  test_namespace_isolation: PASSED");

        test_end_to_end($ledger).await;
        println!("  test_end_to_end: PASSED");
    };
}
