//! Correlation Table - async-to-sync bridge for authorize calls.
//!
//! Maps correlation IDs to waiting authorize calls until the matching verdict
//! arrives on the response channel.

use crate::domain::correlation::CorrelationId;
use crate::domain::error::CorrelationError;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use shared_types::AuthenticationStatus;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Receiving half of a pending slot.
pub type PendingReceiver = oneshot::Receiver<AuthenticationStatus>;

/// Stale ids tolerated in the registration queue before it is compacted
const ORDER_SLACK: usize = 64;

/// A pending authorize call waiting for its verdict
struct PendingSlot {
    /// Single-assignment result cell
    sender: oneshot::Sender<AuthenticationStatus>,
    /// When the slot was registered
    created_at: Instant,
}

/// Read-only view of a pending slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    pub correlation_id: CorrelationId,
    /// Time since registration
    pub age: Duration,
}

/// Why a slot was evicted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvictionCause {
    /// Table was full when a new slot was registered
    Size,
    /// Slot outlived the TTL
    Expired,
}

impl EvictionCause {
    fn as_str(self) -> &'static str {
        match self {
            Self::Size => "SIZE",
            Self::Expired => "EXPIRED",
        }
    }
}

/// Bounds on the correlation table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLimits {
    /// Maximum pending slots before the oldest is evicted
    pub max_entries: usize,
    /// Maximum slot age before the sweep evicts it
    pub ttl: Duration,
}

impl Default for TableLimits {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(10 * 60),
        }
    }
}

/// Statistics for the correlation table
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total slots registered
    pub total_registered: AtomicU64,
    /// Total slots completed with a verdict
    pub total_completed: AtomicU64,
    /// Total slots released by their dispatcher without a verdict
    pub total_removed: AtomicU64,
    /// Total slots evicted by size or TTL
    pub total_evicted: AtomicU64,
    /// Total responses that matched no pending slot
    pub total_unmatched: AtomicU64,
}

impl PendingStats {
    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            registered: self.total_registered.load(Ordering::Relaxed),
            completed: self.total_completed.load(Ordering::Relaxed),
            removed: self.total_removed.load(Ordering::Relaxed),
            evicted: self.total_evicted.load(Ordering::Relaxed),
            unmatched: self.total_unmatched.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of [`PendingStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub removed: u64,
    pub evicted: u64,
    pub unmatched: u64,
}

/// Correlation table for request/reply bridging.
///
/// Flow:
/// 1. Dispatcher mints a CorrelationId and calls `register()`
/// 2. Dispatcher publishes the request keyed by that id
/// 3. Response handler calls `complete_and_remove()` when the verdict arrives
/// 4. Dispatcher awaits the receiver or times out
/// 5. Dispatcher calls `remove()` on every exit path
///
/// Completion is exactly-once: `DashMap::remove` hands the slot to one caller
/// and the oneshot sender is consumed by `send`.
///
/// Registrations are serialized on the order queue, so the table never holds
/// more than `max_entries` slots. Completion and removal stay lock-free with
/// respect to that queue.
pub struct CorrelationTable {
    /// Map of correlation ID to pending slot
    pending: DashMap<CorrelationId, PendingSlot>,
    /// Ids in registration order, oldest first. May still hold ids that were
    /// completed or removed since.
    order: Mutex<VecDeque<CorrelationId>>,
    /// Size and age bounds
    limits: TableLimits,
    /// Statistics
    stats: Arc<PendingStats>,
}

impl CorrelationTable {
    /// Create a new correlation table
    pub fn new(limits: TableLimits) -> Self {
        Self {
            pending: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            limits,
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Register an empty slot and get the receiver for its verdict.
    ///
    /// Evicts the oldest slot first if the table is full. A duplicate id is
    /// rejected before anything is evicted.
    pub fn register(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<PendingReceiver, CorrelationError> {
        let mut order = self.order.lock();

        if self.pending.contains_key(&correlation_id) {
            return Err(CorrelationError::DuplicateCorrelationId(correlation_id));
        }

        while self.pending.len() >= self.limits.max_entries {
            if !self.evict_oldest(&mut order) {
                break;
            }
        }

        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            correlation_id,
            PendingSlot {
                sender: tx,
                created_at: Instant::now(),
            },
        );
        order.push_back(correlation_id);
        self.compact_order(&mut order);
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(correlation_id = %correlation_id, "Registered pending slot");
        Ok(rx)
    }

    /// Look up a pending slot without changing it
    pub fn lookup(&self, correlation_id: &CorrelationId) -> Option<SlotInfo> {
        self.pending.get(correlation_id).map(|slot| SlotInfo {
            correlation_id: *correlation_id,
            age: slot.created_at.elapsed(),
        })
    }

    /// Complete a pending slot with a verdict and remove it.
    ///
    /// Returns true if the slot was present and pending. Returns false, and
    /// changes nothing, if it was absent (never registered, already completed,
    /// removed or evicted).
    pub fn complete_and_remove(
        &self,
        correlation_id: CorrelationId,
        status: AuthenticationStatus,
    ) -> bool {
        let Some((_, slot)) = self.pending.remove(&correlation_id) else {
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        let response_time = slot.created_at.elapsed();
        self.stats.total_completed.fetch_add(1, Ordering::Relaxed);

        if slot.sender.send(status).is_err() {
            // Dispatcher stopped waiting between its deadline and its remove()
            debug!(
                correlation_id = %correlation_id,
                "Completed slot whose waiter is already gone"
            );
        } else {
            debug!(
                correlation_id = %correlation_id,
                status = %status,
                response_time_ms = response_time.as_millis() as u64,
                "Completed pending slot"
            );
        }
        true
    }

    /// Remove a slot regardless of its state.
    ///
    /// Returns true if a slot was removed.
    pub fn remove(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.total_removed.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %correlation_id, "Removed pending slot");
            true
        } else {
            false
        }
    }

    /// Evict slots older than the TTL.
    ///
    /// Returns the number of slots evicted.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let ttl = self.limits.ttl;
        let mut evicted = 0;

        self.pending.retain(|id, slot| {
            let age = now.saturating_duration_since(slot.created_at);
            if age > ttl {
                self.log_eviction(id, age, EvictionCause::Expired);
                evicted += 1;
                false // Remove
            } else {
                true // Keep
            }
        });

        evicted
    }

    /// Evict the oldest live slot. Returns false if there was none.
    fn evict_oldest(&self, order: &mut VecDeque<CorrelationId>) -> bool {
        while let Some(id) = order.pop_front() {
            if let Some((_, slot)) = self.pending.remove(&id) {
                self.log_eviction(&id, slot.created_at.elapsed(), EvictionCause::Size);
                return true;
            }
        }
        false
    }

    /// Drop ids of finished slots once they outnumber the live ones.
    fn compact_order(&self, order: &mut VecDeque<CorrelationId>) {
        if order.len() > self.pending.len().saturating_mul(2) + ORDER_SLACK {
            order.retain(|id| self.pending.contains_key(id));
        }
    }

    fn log_eviction(&self, correlation_id: &CorrelationId, age: Duration, cause: EvictionCause) {
        self.stats.total_evicted.fetch_add(1, Ordering::Relaxed);
        warn!(
            correlation_id = %correlation_id,
            cause = cause.as_str(),
            age_ms = age.as_millis() as u64,
            "Pending request evicted from correlation table"
        );
    }

    /// Get number of currently pending slots
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Check if a correlation ID is pending
    pub fn contains(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    /// Get statistics
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }

    /// Get configured bounds
    pub fn limits(&self) -> TableLimits {
        self.limits
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new(TableLimits::default())
    }
}

/// Background task that evicts expired slots
pub async fn cleanup_task(table: Arc<CorrelationTable>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let evicted = table.remove_expired();
        if evicted > 0 {
            debug!(evicted = evicted, "Swept expired pending slots");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::sync::oneshot::error::TryRecvError;

    fn table() -> CorrelationTable {
        CorrelationTable::default()
    }

    #[tokio::test]
    async fn test_register_and_complete() {
        let table = table();
        let id = CorrelationId::new();

        let rx = table.register(id).unwrap();
        assert!(table.contains(&id));
        assert_eq!(table.len(), 1);

        assert!(table.complete_and_remove(id, AuthenticationStatus::Accepted));

        assert_eq!(rx.await.unwrap(), AuthenticationStatus::Accepted);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_complete_twice_only_first_wins() {
        let table = table();
        let id = CorrelationId::new();
        let mut rx = table.register(id).unwrap();

        assert!(table.complete_and_remove(id, AuthenticationStatus::Rejected));
        assert!(!table.complete_and_remove(id, AuthenticationStatus::Accepted));

        assert_eq!(rx.try_recv().unwrap(), AuthenticationStatus::Rejected);
        assert_eq!(table.stats().snapshot().completed, 1);
        assert_eq!(table.stats().snapshot().unmatched, 1);
    }

    #[test]
    fn test_duplicate_register_rejected() {
        let table = table();
        let id = CorrelationId::new();

        let _rx = table.register(id).unwrap();
        assert_eq!(
            table.register(id).unwrap_err(),
            CorrelationError::DuplicateCorrelationId(id)
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_duplicate_register_on_full_table_evicts_nothing() {
        let table = CorrelationTable::new(TableLimits {
            max_entries: 2,
            ttl: Duration::from_secs(60),
        });
        let first = CorrelationId::new();
        let second = CorrelationId::new();
        let _first_rx = table.register(first).unwrap();
        let _second_rx = table.register(second).unwrap();

        assert_eq!(
            table.register(second).unwrap_err(),
            CorrelationError::DuplicateCorrelationId(second)
        );
        assert!(table.contains(&first));
        assert!(table.contains(&second));
        assert_eq!(table.len(), 2);
        assert_eq!(table.stats().snapshot().evicted, 0);
        assert_eq!(table.stats().snapshot().registered, 2);
    }

    #[test]
    fn test_concurrent_registers_respect_capacity() {
        let table = CorrelationTable::new(TableLimits {
            max_entries: 16,
            ttl: Duration::from_secs(60),
        });

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let _rx = table.register(CorrelationId::new()).unwrap();
                        assert!(table.len() <= 16);
                    }
                });
            }
        });

        let stats = table.stats().snapshot();
        assert_eq!(table.len(), 16);
        assert_eq!(stats.registered, 1600);
        assert_eq!(stats.evicted, 1600 - 16);
    }

    #[test]
    fn test_finished_slots_do_not_pile_up_in_order_queue() {
        let table = table();
        for _ in 0..1_000 {
            let id = CorrelationId::new();
            let _rx = table.register(id).unwrap();
            assert!(table.complete_and_remove(id, AuthenticationStatus::Accepted));
        }

        assert!(table.is_empty());
        assert!(table.order.lock().len() <= ORDER_SLACK + 2);
    }

    #[test]
    fn test_complete_unknown_id() {
        let table = table();
        let _rx = table.register(CorrelationId::new()).unwrap();

        assert!(!table.complete_and_remove(CorrelationId::new(), AuthenticationStatus::Accepted));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_lookup_does_not_mutate() {
        let table = table();
        let id = CorrelationId::new();
        let mut rx = table.register(id).unwrap();

        let info = table.lookup(&id).unwrap();
        assert_eq!(info.correlation_id, id);
        assert!(table.contains(&id));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(table.lookup(&CorrelationId::new()).is_none());
    }

    #[test]
    fn test_remove() {
        let table = table();
        let id = CorrelationId::new();
        let mut rx = table.register(id).unwrap();

        assert!(table.remove(&id));
        assert!(!table.contains(&id));
        // Sender dropped without a value
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Closed)));

        // Remove again should return false
        assert!(!table.remove(&id));
        assert!(!table.complete_and_remove(id, AuthenticationStatus::Accepted));
    }

    #[tokio::test]
    async fn test_remove_expired() {
        let table = CorrelationTable::new(TableLimits {
            max_entries: 100,
            ttl: Duration::from_millis(10),
        });

        let id1 = CorrelationId::new();
        let id2 = CorrelationId::new();
        let _rx1 = table.register(id1).unwrap();
        let _rx2 = table.register(id2).unwrap();

        // Wait for expiry
        tokio::time::sleep(Duration::from_millis(50)).await;
        let id3 = CorrelationId::new();
        let _rx3 = table.register(id3).unwrap();

        assert_eq!(table.remove_expired(), 2);
        assert_eq!(table.len(), 1);
        assert!(!table.contains(&id1));
        assert!(!table.contains(&id2));
        assert!(table.contains(&id3));
        assert_eq!(table.stats().snapshot().evicted, 2);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let table = CorrelationTable::new(TableLimits {
            max_entries: 2,
            ttl: Duration::from_secs(60),
        });

        let oldest = CorrelationId::new();
        let mut oldest_rx = table.register(oldest).unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let middle = CorrelationId::new();
        let _middle_rx = table.register(middle).unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let newest = CorrelationId::new();
        let _newest_rx = table.register(newest).unwrap();

        assert_eq!(table.len(), 2);
        assert!(!table.contains(&oldest));
        assert!(table.contains(&middle));
        assert!(table.contains(&newest));
        assert_eq!(table.stats().snapshot().evicted, 1);

        // Eviction never delivers a value
        assert!(matches!(oldest_rx.try_recv(), Err(TryRecvError::Closed)));
        // A late response for the evicted slot is unmatched
        assert!(!table.complete_and_remove(oldest, AuthenticationStatus::Accepted));
    }

    #[test]
    fn test_complete_after_receiver_dropped() {
        let table = table();
        let id = CorrelationId::new();
        let rx = table.register(id).unwrap();
        drop(rx);

        // Slot is still present and pending, so completion succeeds
        assert!(table.complete_and_remove(id, AuthenticationStatus::Unknown));
        assert!(table.is_empty());
    }

    #[test]
    fn test_stats() {
        let table = table();
        let id1 = CorrelationId::new();
        let id2 = CorrelationId::new();
        let _rx1 = table.register(id1).unwrap();
        let _rx2 = table.register(id2).unwrap();

        table.complete_and_remove(id1, AuthenticationStatus::Accepted);
        table.remove(&id2);
        table.complete_and_remove(CorrelationId::new(), AuthenticationStatus::Accepted);

        assert_eq!(
            table.stats().snapshot(),
            StatsSnapshot {
                registered: 2,
                completed: 1,
                removed: 1,
                evicted: 0,
                unmatched: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_cleanup_task_sweeps() {
        let table = Arc::new(CorrelationTable::new(TableLimits {
            max_entries: 10,
            ttl: Duration::from_millis(5),
        }));
        let _rx = table.register(CorrelationId::new()).unwrap();

        let sweeper = tokio::spawn(cleanup_task(Arc::clone(&table), Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(60)).await;
        sweeper.abort();

        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_completion_exactly_once() {
        let table = Arc::new(table());
        let id = CorrelationId::new();
        let rx = table.register(id).unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let table = Arc::clone(&table);
            handles.push(tokio::spawn(async move {
                table.complete_and_remove(id, AuthenticationStatus::Accepted)
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(rx.await.unwrap(), AuthenticationStatus::Accepted);
    }

    fn status_strategy() -> impl Strategy<Value = AuthenticationStatus> {
        prop_oneof![
            Just(AuthenticationStatus::Accepted),
            Just(AuthenticationStatus::Rejected),
            Just(AuthenticationStatus::Unknown),
            Just(AuthenticationStatus::Invalid),
        ]
    }

    proptest! {
        #[test]
        fn prop_first_completion_is_the_only_one(
            first in status_strategy(),
            second in status_strategy(),
        ) {
            let table = table();
            let id = CorrelationId::new();
            let mut rx = table.register(id).unwrap();

            prop_assert!(table.complete_and_remove(id, first));
            prop_assert!(!table.complete_and_remove(id, second));
            prop_assert_eq!(rx.try_recv().unwrap(), first);
        }

        #[test]
        fn prop_slots_never_see_each_others_results(
            statuses in proptest::collection::vec(status_strategy(), 1..32),
        ) {
            let table = table();
            let mut slots: Vec<_> = statuses
                .iter()
                .map(|status| {
                    let id = CorrelationId::new();
                    (id, *status, table.register(id).unwrap())
                })
                .collect();

            // Complete in reverse registration order
            for (id, status, _) in slots.iter().rev() {
                prop_assert!(table.complete_and_remove(*id, *status));
            }

            for (_, status, rx) in slots.iter_mut() {
                prop_assert_eq!(rx.try_recv().unwrap(), *status);
            }
            prop_assert!(table.is_empty());
        }

        #[test]
        fn prop_unknown_responses_leave_table_unchanged(extra in 0usize..16) {
            let table = table();
            let _receivers: Vec<_> = (0..extra)
                .map(|_| table.register(CorrelationId::new()).unwrap())
                .collect();

            prop_assert!(!table.complete_and_remove(CorrelationId::new(), AuthenticationStatus::Accepted));
            prop_assert_eq!(table.len(), extra);
        }
    }
}
