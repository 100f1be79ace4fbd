use std::collections::VecDeque;
use std::sync::Arc;

use super::entity::Snapshot;

pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 30;

/// Bounded server-time-ordered timeline of received snapshots.
///
/// The clock offset between local wall time and server time is taken from
/// the first snapshot ever pushed and never re-estimated, so drift between
/// the two clocks is not corrected.
#[derive(Debug)]
pub struct SnapshotBuffer {
    snapshots: VecDeque<Arc<Snapshot>>,
    capacity: usize,
    clock_offset_ms: Option<f64>,
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_CAPACITY)
    }
}

impl SnapshotBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity + 1),
            capacity,
            clock_offset_ms: None,
        }
    }

    /// Inserts in server-time order and evicts the oldest beyond capacity.
    /// Returns false when the snapshot is not kept: its server time is
    /// already buffered, or the buffer is full and it is older than
    /// everything in it.
    pub fn push(&mut self, snapshot: Arc<Snapshot>, local_now_ms: f64) -> bool {
        let server_time = snapshot.server_time_ms;

        let index = match self
            .snapshots
            .binary_search_by_key(&server_time, |s| s.server_time_ms)
        {
            Ok(_) => return false,
            Err(index) => index,
        };
        if index == 0 && self.snapshots.len() >= self.capacity {
            return false;
        }

        if self.clock_offset_ms.is_none() {
            self.clock_offset_ms = Some(local_now_ms - server_time as f64);
        }

        self.snapshots.insert(index, snapshot);
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
        true
    }

    /// Local wall clock minus server time, fixed at the first snapshot.
    pub fn clock_offset_ms(&self) -> Option<f64> {
        self.clock_offset_ms
    }

    pub fn newest(&self) -> Option<&Arc<Snapshot>> {
        self.snapshots.back()
    }

    pub fn oldest(&self) -> Option<&Arc<Snapshot>> {
        self.snapshots.front()
    }

    /// `(previous, newest)` once at least two snapshots are buffered.
    pub fn last_two(&self) -> Option<(Arc<Snapshot>, Arc<Snapshot>)> {
        let len = self.snapshots.len();
        if len < 2 {
            return None;
        }
        Some((
            Arc::clone(&self.snapshots[len - 2]),
            Arc::clone(&self.snapshots[len - 1]),
        ))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<Snapshot>> {
        self.snapshots.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.clock_offset_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::entity::test_support::player_at;
    use uuid::Uuid;

    fn at(server_time_ms: i64) -> Arc<Snapshot> {
        Arc::new(player_at(server_time_ms, Uuid::nil(), 0.0))
    }

    fn times(buffer: &SnapshotBuffer) -> Vec<i64> {
        buffer.iter().map(|s| s.server_time_ms).collect()
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut buffer = SnapshotBuffer::default();
        for tick in 0..40 {
            buffer.push(at(tick * 50), 0.0);
        }

        assert_eq!(buffer.len(), DEFAULT_SNAPSHOT_CAPACITY);
        assert_eq!(buffer.oldest().unwrap().server_time_ms, 10 * 50);
        assert_eq!(buffer.newest().unwrap().server_time_ms, 39 * 50);
    }

    #[test]
    fn test_reordered_arrivals_are_sorted() {
        let mut buffer = SnapshotBuffer::new(8);
        for time in [100, 300, 200, 400] {
            buffer.push(at(time), 0.0);
        }
        assert_eq!(times(&buffer), vec![100, 200, 300, 400]);

        let (previous, newest) = buffer.last_two().unwrap();
        assert_eq!(previous.server_time_ms, 300);
        assert_eq!(newest.server_time_ms, 400);
    }

    #[test]
    fn test_duplicate_timestamp_is_ignored() {
        let mut buffer = SnapshotBuffer::new(8);
        assert!(buffer.push(at(100), 0.0));
        assert!(!buffer.push(at(100), 0.0));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_clock_offset_is_fixed_at_first_snapshot() {
        let mut buffer = SnapshotBuffer::new(8);
        assert!(buffer.clock_offset_ms().is_none());

        buffer.push(at(1000), 5000.0);
        buffer.push(at(1100), 9000.0);

        assert_eq!(buffer.clock_offset_ms(), Some(4000.0));
    }

    #[test]
    fn test_last_two_needs_two_snapshots() {
        let mut buffer = SnapshotBuffer::new(8);
        assert!(buffer.last_two().is_none());
        buffer.push(at(100), 0.0);
        assert!(buffer.last_two().is_none());
    }

    #[test]
    fn test_stale_snapshot_on_full_buffer_is_rejected() {
        let mut buffer = SnapshotBuffer::new(3);
        for time in [100, 200, 300] {
            assert!(buffer.push(at(time), 0.0));
        }

        assert!(!buffer.push(at(50), 0.0));
        assert_eq!(times(&buffer), vec![100, 200, 300]);

        assert!(buffer.push(at(150), 0.0));
        assert_eq!(times(&buffer), vec![150, 200, 300]);
    }
}
