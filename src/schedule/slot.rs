use std::sync::{Arc, Mutex, PoisonError};

/// Latest-value slot shared between workers and the presentation side.
///
/// Guarded by its own lock, never the gate's. Readers get an `Arc` snapshot
/// and never block a writer for longer than a pointer swap.
#[derive(Debug)]
pub struct FrameSlot<T> {
    inner: Mutex<SlotInner<T>>,
}

#[derive(Debug)]
struct SlotInner<T> {
    latest: Option<Arc<T>>,
    sequence: u64,
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                latest: None,
                sequence: 0,
            }),
        }
    }

    /// Replace the stored value; returns its sequence number (starting at 1).
    pub fn publish(&self, value: T) -> u64 {
        let value = Arc::new(value);
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.latest = Some(value);
        inner.sequence += 1;
        inner.sequence
    }

    pub fn latest(&self) -> Option<Arc<T>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest
            .clone()
    }

    /// Latest value with its sequence number.
    pub fn snapshot(&self) -> Option<(u64, Arc<T>)> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.latest.clone().map(|v| (inner.sequence, v))
    }

    pub fn sequence(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sequence
    }
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_latest() {
        let slot = FrameSlot::new();
        assert!(slot.latest().is_none());
        assert_eq!(slot.publish("a"), 1);
        assert_eq!(slot.publish("b"), 2);
        assert_eq!(*slot.latest().unwrap(), "b");
        let (seq, value) = slot.snapshot().unwrap();
        assert_eq!((seq, *value), (2, "b"));
    }

    #[test]
    fn snapshot_outlives_replacement() {
        let slot = FrameSlot::new();
        slot.publish(vec![1, 2, 3]);
        let held = slot.latest().unwrap();
        slot.publish(vec![4]);
        assert_eq!(*held, vec![1, 2, 3]);
        assert_eq!(slot.sequence(), 2);
    }
}
