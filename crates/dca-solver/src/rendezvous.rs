//! Pairing of idle walkers with idle accumulators.
//!
//! Both FIFO queues sit behind one lock, so "take the first party waiting
//! on the other side, or queue myself" is a single atomic step. At most
//! one queue is non-empty at any time, and a walker and an accumulator can
//! never both be waiting while the other side also waits.
//!
//! Queues hold ids; the handles stay parked in their [`Slots`]. The lock
//! order is queues, then slot.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::SolverError;
use crate::signal::lock;
use crate::slots::Slots;

/// Outcome of offering a handle to the rendezvous.
pub(crate) enum Offer<M, T> {
    /// A party was waiting: the offered handle comes back with it.
    Paired(M, T),
    /// Nobody was waiting: the offered handle is parked.
    Parked,
}

#[derive(Debug, Default)]
struct Queues {
    walkers: VecDeque<usize>,
    accumulators: VecDeque<usize>,
}

/// Queue lengths observed under the rendezvous lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueDepths {
    /// Walkers waiting for an accumulator.
    pub walkers: usize,
    /// Accumulators waiting for a walker.
    pub accumulators: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Rendezvous {
    queues: Mutex<Queues>,
}

fn offer<M, T>(
    mine: &mut VecDeque<usize>,
    theirs: &mut VecDeque<usize>,
    index: usize,
    handle: M,
    my_slots: &Slots<M>,
    their_slots: &Slots<T>,
) -> Result<Offer<M, T>, SolverError> {
    if let Some(other) = theirs.pop_front() {
        let partner = their_slots.unpark(other)?;
        return Ok(Offer::Paired(handle, partner));
    }
    my_slots.park(index, handle)?;
    mine.push_back(index);
    Ok(Offer::Parked)
}

impl Rendezvous {
    pub(crate) fn offer_walker<W, A>(
        &self,
        index: usize,
        walker: W,
        walkers: &Slots<W>,
        accumulators: &Slots<A>,
    ) -> Result<Offer<W, A>, SolverError> {
        let mut guard = lock(&self.queues);
        let q = &mut *guard;
        offer(
            &mut q.walkers,
            &mut q.accumulators,
            index,
            walker,
            walkers,
            accumulators,
        )
    }

    pub(crate) fn offer_accumulator<W, A>(
        &self,
        index: usize,
        accumulator: A,
        walkers: &Slots<W>,
        accumulators: &Slots<A>,
    ) -> Result<Offer<A, W>, SolverError> {
        let mut guard = lock(&self.queues);
        let q = &mut *guard;
        offer(
            &mut q.accumulators,
            &mut q.walkers,
            index,
            accumulator,
            accumulators,
            walkers,
        )
    }

    /// Run `f` with the queue depths while holding the lock, so that
    /// `f` sees slots consistent with the queues.
    pub(crate) fn observe<R>(&self, f: impl FnOnce(QueueDepths) -> R) -> R {
        let q = lock(&self.queues);
        f(QueueDepths {
            walkers: q.walkers.len(),
            accumulators: q.accumulators.len(),
        })
    }

    pub(crate) fn clear(&self) {
        self.clear_with(|| ());
    }

    /// Empty both queues and run `f` before releasing the lock. Slots
    /// drained inside `f` are never observed as queued without a queue
    /// entry.
    pub(crate) fn clear_with<R>(&self, f: impl FnOnce() -> R) -> R {
        let mut q = lock(&self.queues);
        q.walkers.clear();
        q.accumulators.clear();
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(kind: &'static str, n: usize) -> Slots<usize> {
        let slots = Slots::new(kind, n);
        for i in 0..n {
            slots.start(i).unwrap();
        }
        slots
    }

    #[test]
    fn first_offer_parks_second_pairs() {
        let walkers = running("walker", 2);
        let accumulators = running("accumulator", 1);
        let r = Rendezvous::default();

        assert!(matches!(
            r.offer_walker(0, 10, &walkers, &accumulators).unwrap(),
            Offer::Parked
        ));
        match r.offer_accumulator(0, 20, &walkers, &accumulators).unwrap() {
            Offer::Paired(acc, walker) => assert_eq!((acc, walker), (20, 10)),
            Offer::Parked => panic!("walker 0 was waiting"),
        }
        r.observe(|d| assert_eq!(d, QueueDepths::default()));
    }

    #[test]
    fn walkers_pair_in_fifo_order() {
        let walkers = running("walker", 3);
        let accumulators = running("accumulator", 1);
        let r = Rendezvous::default();
        for w in [2, 0, 1] {
            assert!(matches!(
                r.offer_walker(w, w * 100, &walkers, &accumulators).unwrap(),
                Offer::Parked
            ));
        }
        r.observe(|d| assert_eq!(d.walkers, 3));
        let mut order = Vec::new();
        for _ in 0..3 {
            match r.offer_accumulator(0, 0, &walkers, &accumulators).unwrap() {
                Offer::Paired(_, walker) => order.push(walker),
                Offer::Parked => panic!("walkers were waiting"),
            }
        }
        assert_eq!(order, vec![200, 0, 100]);
    }

    #[test]
    fn stale_queue_entry_is_consistency_error() {
        let walkers = running("walker", 1);
        let accumulators = running("accumulator", 1);
        let r = Rendezvous::default();
        r.offer_walker(0, 1, &walkers, &accumulators).unwrap();
        // Take the handle behind the queue's back.
        walkers.unpark(0).unwrap();
        assert!(matches!(
            r.offer_accumulator(0, 2, &walkers, &accumulators),
            Err(SolverError::Consistency { .. })
        ));
    }
}
