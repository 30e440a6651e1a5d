// Sample domain model - Bounded ring of sensor readings shared by producer and readers
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// A single reading tagged with its arrival sequence number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub index: u64,
    pub value: f64,
}

impl Sample {
    pub fn new(index: u64, value: f64) -> Self {
        Self { index, value }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("sample buffer capacity must be at least 1")]
pub struct CapacityError;

#[derive(Debug)]
struct Ring {
    next_index: u64,
    samples: VecDeque<Sample>,
}

/// Fixed-capacity FIFO store of samples.
///
/// One writer appends, any number of readers take snapshots. Index assignment,
/// eviction and insertion happen under a single lock, so a snapshot always sees
/// whole samples and a length of either the old or the new size.
#[derive(Debug)]
pub struct SampleBuffer {
    capacity: usize,
    ring: Mutex<Ring>,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Result<Self, CapacityError> {
        if capacity == 0 {
            return Err(CapacityError);
        }

        Ok(Self {
            capacity,
            ring: Mutex::new(Ring {
                next_index: 0,
                samples: VecDeque::with_capacity(capacity),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store a new reading, evicting the oldest one when full.
    pub fn append(&self, value: f64) -> Sample {
        let mut ring = self.lock();
        let sample = Sample::new(ring.next_index, value);
        ring.next_index += 1;

        if ring.samples.len() == self.capacity {
            ring.samples.pop_front();
        }
        ring.samples.push_back(sample);

        sample
    }

    /// Owned copy of the current contents in arrival order.
    pub fn snapshot(&self) -> Vec<Sample> {
        let ring = self.lock();
        ring.samples.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Samples are plain values, so a panicked holder cannot leave a torn entry behind.
    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    fn values(samples: &[Sample]) -> Vec<f64> {
        samples.iter().map(|s| s.value).collect()
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        assert_eq!(SampleBuffer::new(0).unwrap_err(), CapacityError);
    }

    #[test]
    fn test_partial_fill_keeps_everything() {
        let buffer = SampleBuffer::new(5).unwrap();
        buffer.append(1.0);
        buffer.append(2.0);

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(values(&snapshot), vec![1.0, 2.0]);
        assert_eq!(snapshot[0].index, 0);
        assert_eq!(snapshot[1].index, 1);
    }

    #[test]
    fn test_eviction_keeps_latest_and_indices_stay_monotonic() {
        let buffer = SampleBuffer::new(3).unwrap();
        for v in 0..7 {
            buffer.append(v as f64 * 10.0);
        }

        let snapshot = buffer.snapshot();
        assert_eq!(values(&snapshot), vec![40.0, 50.0, 60.0]);
        let indices: Vec<u64> = snapshot.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![4, 5, 6]);
    }

    #[test]
    fn test_snapshot_is_not_affected_by_later_appends() {
        let buffer = SampleBuffer::new(2).unwrap();
        buffer.append(1.0);
        let before = buffer.snapshot();

        buffer.append(2.0);
        buffer.append(3.0);

        assert_eq!(values(&before), vec![1.0]);
        assert_eq!(values(&buffer.snapshot()), vec![2.0, 3.0]);
    }

    #[test]
    fn test_concurrent_snapshots_never_see_torn_state() {
        let capacity = 64;
        let total = 20_000u64;
        let buffer = Arc::new(SampleBuffer::new(capacity).unwrap());

        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for i in 0..total {
                    // value mirrors index so a mismatched pair would reveal a torn write
                    buffer.append(i as f64);
                }
            })
        };

        let reader = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                let mut last_len = 0;
                loop {
                    let snapshot = buffer.snapshot();
                    assert!(snapshot.len() <= capacity);
                    assert!(snapshot.len() >= last_len || snapshot.len() == capacity);
                    last_len = snapshot.len();

                    for pair in snapshot.windows(2) {
                        assert_eq!(pair[1].index, pair[0].index + 1);
                    }
                    for sample in &snapshot {
                        assert_eq!(sample.value, sample.index as f64);
                    }

                    if snapshot.last().map(|s| s.index) == Some(total - 1) {
                        break;
                    }
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(buffer.len(), capacity);
    }

    proptest! {
        #[test]
        fn prop_snapshot_holds_last_n_values(
            capacity in 1usize..40,
            input in proptest::collection::vec(-1000.0f64..1000.0, 0..200)
        ) {
            let buffer = SampleBuffer::new(capacity).unwrap();
            for &v in &input {
                buffer.append(v);
            }

            let snapshot = buffer.snapshot();
            let expected_len = input.len().min(capacity);
            prop_assert_eq!(snapshot.len(), expected_len);

            let tail = &input[input.len() - expected_len..];
            prop_assert_eq!(values(&snapshot), tail.to_vec());
        }
    }
}
