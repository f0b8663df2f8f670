// src/pipeline/frame_slots.rs

//! Index-keyed deposit of per-frame results.
//!
//! Parallel workers finish frames in whatever order the scheduler
//! likes; the container writer needs them in source order. Each worker
//! deposits into its slot, and the single drainer takes everything out
//! in ascending index order once all slots are ready.

use crate::utils::error::{Result, XtcError};
use std::sync::RwLock;

#[derive(Clone)]
enum Slot<T> {
    Pending,
    Ready(T),
}

/// A fixed-size collection of result slots, one per source frame.
pub struct FrameSlots<T> {
    slots: RwLock<Vec<Slot<T>>>,
}

impl<T> FrameSlots<T> {
    pub fn new(total: usize) -> Self {
        let mut slots = Vec::with_capacity(total);
        slots.resize_with(total, || Slot::Pending);
        FrameSlots {
            slots: RwLock::new(slots),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deposits the result for frame `index`. Each slot may be filled
    /// exactly once.
    pub fn insert(&self, index: usize, value: T) -> Result<()> {
        let mut slots = self.slots.write().unwrap();
        match slots.get_mut(index) {
            None => Err(XtcError::InternalInvariant(format!(
                "frame index {} exceeds {} slots",
                index,
                slots.len()
            ))),
            Some(Slot::Ready(_)) => Err(XtcError::InternalInvariant(format!(
                "frame {} deposited twice",
                index
            ))),
            Some(slot @ Slot::Pending) => {
                *slot = Slot::Ready(value);
                Ok(())
            }
        }
    }

    pub fn ready_count(&self) -> usize {
        self.slots
            .read()
            .unwrap()
            .iter()
            .filter(|s| matches!(s, Slot::Ready(_)))
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.slots
            .read()
            .unwrap()
            .iter()
            .all(|s| matches!(s, Slot::Ready(_)))
    }

    /// Drains all results in ascending index order. Fails if any slot is
    /// still pending.
    pub fn into_ordered(self) -> Result<Vec<T>> {
        let slots = self.slots.into_inner().unwrap();
        let mut ordered = Vec::with_capacity(slots.len());
        for (i, slot) in slots.into_iter().enumerate() {
            match slot {
                Slot::Ready(value) => ordered.push(value),
                Slot::Pending => {
                    return Err(XtcError::InternalInvariant(format!(
                        "frame {} never arrived",
                        i
                    )))
                }
            }
        }
        Ok(ordered)
    }
}
