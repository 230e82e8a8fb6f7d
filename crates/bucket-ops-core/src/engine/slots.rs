//! Write-once result slots shared between batch workers.
//!
//! The dispatcher allocates one slot per input key and hands each batch a
//! disjoint [`SlotRange`]. A slot can be written once; results are read back
//! in input order after every writer has been dropped.

use std::sync::{Arc, OnceLock};

use crate::{Error, Result};

pub struct SlotBuffer<T> {
    slots: Arc<Vec<OnceLock<T>>>,
}

impl<T: Send + Sync> SlotBuffer<T> {
    pub fn new(len: usize) -> Self {
        Self {
            slots: Arc::new((0..len).map(|_| OnceLock::new()).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Hand out slots `offset..offset + len`, clamped to the buffer.
    pub fn range(&self, offset: usize, len: usize) -> SlotRange<T> {
        let start = offset.min(self.slots.len());
        let end = offset.saturating_add(len).min(self.slots.len());
        SlotRange {
            slots: Arc::clone(&self.slots),
            start,
            end,
        }
    }

    /// Every slot in order. Fails if a range is still alive or a slot was
    /// never written.
    pub fn into_vec(self) -> Result<Vec<T>> {
        let slots = Arc::try_unwrap(self.slots)
            .map_err(|_| Error::Internal("result slots still shared".to_string()))?;
        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.into_inner()
                    .ok_or_else(|| Error::Internal(format!("result slot {} never written", i)))
            })
            .collect()
    }

    /// Written slots in order, skipping empty ones.
    pub fn into_present(self) -> Result<Vec<T>> {
        let slots = Arc::try_unwrap(self.slots)
            .map_err(|_| Error::Internal("result slots still shared".to_string()))?;
        Ok(slots.into_iter().filter_map(OnceLock::into_inner).collect())
    }
}

/// A batch's window into a [`SlotBuffer`]. Indices are relative to the
/// start of the window.
pub struct SlotRange<T> {
    slots: Arc<Vec<OnceLock<T>>>,
    start: usize,
    end: usize,
}

impl<T> SlotRange<T> {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Absolute position of the first slot
    pub fn offset(&self) -> usize {
        self.start
    }

    /// Store `value` at window index `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index` is outside the window or the slot was already
    /// written; both mean two batches overlap.
    pub fn write(&self, index: usize, value: T) {
        assert!(index < self.len(), "slot {} outside window of {}", index, self.len());
        if self.slots[self.start + index].set(value).is_err() {
            panic!("slot {} written twice", self.start + index);
        }
    }

    pub fn is_written(&self, index: usize) -> bool {
        index < self.len() && self.slots[self.start + index].get().is_some()
    }
}
