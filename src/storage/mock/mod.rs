//! Mock ledger implementation for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::{future, stream, StreamExt};
use tokio::sync::RwLock;

use crate::interfaces::{
    CompletedPosition, PersistenceError, PositionLedger, PositionStream, Result,
};

#[derive(Default)]
struct State {
    namespaces: HashMap<String, Vec<CompletedPosition>>,
    next_sequence: i64,
    fail_on_track: bool,
    fail_on_read: bool,
    reject_batches: bool,
    closed: bool,
}

impl State {
    fn positions(&self, namespace: &str) -> &[CompletedPosition] {
        self.namespaces
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_on_read {
            return Err(injected_failure());
        }
        Ok(())
    }

    fn range(&self, namespace: &str, from: &str, to: &str) -> Result<Vec<CompletedPosition>> {
        self.check_read()?;
        let positions = self.positions(namespace);

        match (anchor(positions, from), anchor(positions, to)) {
            (Some(start), Some(end)) if start <= end => Ok(positions[start..=end].to_vec()),
            _ => Ok(Vec::new()),
        }
    }
}

/// Index of the most recent occurrence of `opaque_id`.
fn anchor(positions: &[CompletedPosition], opaque_id: &str) -> Option<usize> {
    positions.iter().rposition(|p| p.opaque_id == opaque_id)
}

fn injected_failure() -> PersistenceError {
    PersistenceError::Statement(sqlx::Error::Protocol("injected failure".to_string()))
}

/// Mock ledger that keeps positions in memory.
///
/// Sequences come from one counter shared by all namespaces, so they are
/// strictly increasing within each namespace but not contiguous.
#[derive(Default)]
pub struct MockPositionLedger {
    state: Arc<RwLock<State>>,
}

impl MockPositionLedger {
    /// Create an empty mock ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `track_completed_positions` fail with a statement error.
    pub async fn set_fail_on_track(&self, fail: bool) {
        self.state.write().await.fail_on_track = fail;
    }

    /// Make every read fail with a statement error.
    pub async fn set_fail_on_read(&self, fail: bool) {
        self.state.write().await.fail_on_read = fail;
    }

    /// Simulate an inserted row count mismatch: batches are dropped and
    /// `track_completed_positions` returns `Ok(false)`.
    pub async fn set_reject_batches(&self, reject: bool) {
        self.state.write().await.reject_batches = reject;
    }

    /// Total number of tracked positions across namespaces.
    pub async fn len(&self) -> usize {
        self.state
            .read()
            .await
            .namespaces
            .values()
            .map(Vec::len)
            .sum()
    }

    /// True if no positions have been tracked.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// True once `close` has been called.
    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }
}

#[async_trait]
impl PositionLedger for MockPositionLedger {
    async fn track_completed_positions(
        &self,
        namespace: &str,
        positions: &[String],
    ) -> Result<bool> {
        if positions.is_empty() {
            return Ok(true);
        }

        let mut state = self.state.write().await;
        if state.fail_on_track {
            return Err(injected_failure());
        }
        if state.reject_batches {
            return Ok(false);
        }

        let recorded_at = Utc::now();
        let mut batch = Vec::with_capacity(positions.len());
        for opaque_id in positions {
            state.next_sequence += 1;
            batch.push(CompletedPosition {
                namespace: namespace.to_string(),
                opaque_id: opaque_id.clone(),
                sequence: state.next_sequence,
                recorded_at,
            });
        }
        state
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .extend(batch);
        Ok(true)
    }

    async fn get_first_position(&self, namespace: &str) -> Result<Option<String>> {
        let state = self.state.read().await;
        state.check_read()?;
        Ok(state.positions(namespace).first().map(|p| p.opaque_id.clone()))
    }

    async fn get_last_position(&self, namespace: &str) -> Result<Option<String>> {
        let state = self.state.read().await;
        state.check_read()?;
        Ok(state.positions(namespace).last().map(|p| p.opaque_id.clone()))
    }

    async fn get_offset_position(
        &self,
        namespace: &str,
        from_position: &str,
        offset: u32,
    ) -> Result<Option<String>> {
        let state = self.state.read().await;
        state.check_read()?;
        if offset == 0 {
            return Ok(None);
        }

        let positions = state.positions(namespace);
        let Some(start) = anchor(positions, from_position) else {
            return Ok(None);
        };

        Ok(positions[start + 1..]
            .iter()
            .take(offset as usize)
            .last()
            .map(|p| p.opaque_id.clone()))
    }

    fn read_positions(
        &self,
        namespace: &str,
        from_position: &str,
        to_position: &str,
    ) -> PositionStream {
        let state = Arc::clone(&self.state);
        let namespace = namespace.to_owned();
        let from_position = from_position.to_owned();
        let to_position = to_position.to_owned();

        stream::once(async move {
            let loaded = state
                .read()
                .await
                .range(&namespace, &from_position, &to_position);
            loaded
        })
        .flat_map(|loaded| match loaded {
            Ok(positions) => stream::iter(positions.into_iter().map(Ok)).left_stream(),
            Err(e) => stream::once(future::ready(Err(e))).right_stream(),
        })
        .boxed()
    }

    async fn close(&self) -> Result<()> {
        self.state.write().await.closed = true;
        Ok(())
    }
}
