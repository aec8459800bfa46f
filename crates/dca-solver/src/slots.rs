//! Arena of walker and accumulator handles indexed by id.
//!
//! Each slot records where its handle currently lives:
//!
//! - `Vacant`: not yet started in this `integrate()` call.
//! - `Running`: owned by exactly one task; the slot holds nothing.
//! - `Queued`: parked in the slot, its id in a rendezvous queue.
//! - `Retired`: parked in the slot for good.
//!
//! A handle moves out of the slot on `unpark` and back in on `park` or
//! `retire`. Any other transition is a scheduling bug and is reported as
//! [`SolverError::Consistency`].

use std::fmt;
use std::sync::Mutex;

use crate::error::SolverError;
use crate::signal::lock;

/// Where a slot's handle is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Not started.
    Vacant,
    /// Held by a running task.
    Running,
    /// Waiting in a rendezvous queue.
    Queued,
    /// Finished for this integration.
    Retired,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vacant => "vacant",
            Self::Running => "running",
            Self::Queued => "queued",
            Self::Retired => "retired",
        };
        f.write_str(name)
    }
}

/// Count of slots per [`Phase`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Census {
    /// Slots not started.
    pub vacant: usize,
    /// Slots whose handle a task holds.
    pub running: usize,
    /// Slots parked in a queue.
    pub queued: usize,
    /// Slots finished for this integration.
    pub retired: usize,
}

impl Census {
    /// Sum over all phases; always the number of slots.
    pub fn total(&self) -> usize {
        self.vacant + self.running + self.queued + self.retired
    }
}

struct Slot<T> {
    phase: Phase,
    handle: Option<T>,
}

pub(crate) struct Slots<T> {
    kind: &'static str,
    slots: Vec<Mutex<Slot<T>>>,
}

impl<T> Slots<T> {
    pub(crate) fn new(kind: &'static str, len: usize) -> Self {
        Self {
            kind,
            slots: (0..len)
                .map(|_| {
                    Mutex::new(Slot {
                        phase: Phase::Vacant,
                        handle: None,
                    })
                })
                .collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    fn transition(
        &self,
        index: usize,
        from: Phase,
        to: Phase,
        handle: Option<T>,
    ) -> Result<Option<T>, SolverError> {
        let slot = self.slots.get(index).ok_or_else(|| {
            SolverError::consistency(format!("{} {index} does not exist", self.kind))
        })?;
        let mut slot = lock(slot);
        if slot.phase != from {
            return Err(SolverError::consistency(format!(
                "{} {index} is {} but was expected {from} on the way to {to}",
                self.kind, slot.phase
            )));
        }
        slot.phase = to;
        Ok(std::mem::replace(&mut slot.handle, handle))
    }

    /// `Vacant -> Running`.
    pub(crate) fn start(&self, index: usize) -> Result<(), SolverError> {
        self.transition(index, Phase::Vacant, Phase::Running, None)
            .map(drop)
    }

    /// `Running -> Queued`, storing the handle.
    pub(crate) fn park(&self, index: usize, handle: T) -> Result<(), SolverError> {
        self.transition(index, Phase::Running, Phase::Queued, Some(handle))
            .map(drop)
    }

    /// `Queued -> Running`, handing the handle to the caller.
    pub(crate) fn unpark(&self, index: usize) -> Result<T, SolverError> {
        self.transition(index, Phase::Queued, Phase::Running, None)?
            .ok_or_else(|| {
                SolverError::consistency(format!(
                    "{} {index} was queued without a parked handle",
                    self.kind
                ))
            })
    }

    /// `Running -> Retired`, storing the handle.
    pub(crate) fn retire(&self, index: usize, handle: T) -> Result<(), SolverError> {
        self.transition(index, Phase::Running, Phase::Retired, Some(handle))
            .map(drop)
    }

    pub(crate) fn census(&self) -> Census {
        let mut census = Census::default();
        for slot in &self.slots {
            match lock(slot).phase {
                Phase::Vacant => census.vacant += 1,
                Phase::Running => census.running += 1,
                Phase::Queued => census.queued += 1,
                Phase::Retired => census.retired += 1,
            }
        }
        census
    }

    /// Reset every slot to `Vacant` and return what each held, in id order.
    ///
    /// A `Running` slot yields `None`: its handle was lost with a failed
    /// task.
    pub(crate) fn drain(&self) -> Vec<(Phase, Option<T>)> {
        self.slots
            .iter()
            .map(|slot| {
                let mut slot = lock(slot);
                let phase = std::mem::replace(&mut slot.phase, Phase::Vacant);
                (phase, slot.handle.take())
            })
            .collect()
    }
}
