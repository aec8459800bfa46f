//! Static assignment of logical thread ids to walker and accumulator roles.
//!
//! Walkers and accumulators are interleaved: logical id 0 is walker 0,
//! id 1 is accumulator 0, and so on, until the smaller population runs
//! out and the rest of the table belongs to the larger one. Each walker
//! owns the generator slot with its own index.

use std::fmt;

use dca_core::{AccumulatorId, LogicalThreadId, RngIndex, WalkerId};

use crate::config::ConfigError;

/// Role of a logical thread id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Runs a walker chain.
    Walker(WalkerId),
    /// Runs an accumulator chain.
    Accumulator(AccumulatorId),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Walker(id) => write!(f, "{id}"),
            Self::Accumulator(id) => write!(f, "{id}"),
        }
    }
}

/// The logical-id table for one solver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadTaskHandler {
    roles: Vec<Role>,
    walkers: usize,
    accumulators: usize,
}

impl ThreadTaskHandler {
    /// Build the table for `walkers` walkers and `accumulators` accumulators.
    pub fn new(walkers: usize, accumulators: usize) -> Result<Self, ConfigError> {
        if walkers == 0 {
            return Err(ConfigError::NoWalkers);
        }
        if accumulators == 0 {
            return Err(ConfigError::NoAccumulators);
        }
        let mut roles = Vec::with_capacity(walkers + accumulators);
        for i in 0..walkers.max(accumulators) {
            if i < walkers {
                roles.push(Role::Walker(WalkerId(i)));
            }
            if i < accumulators {
                roles.push(Role::Accumulator(AccumulatorId(i)));
            }
        }
        Ok(Self {
            roles,
            walkers,
            accumulators,
        })
    }

    /// Number of walkers.
    pub fn walkers(&self) -> usize {
        self.walkers
    }

    /// Number of accumulators.
    pub fn accumulators(&self) -> usize {
        self.accumulators
    }

    /// Total number of logical ids.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Always `false`: construction requires at least two roles.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Role of logical id `id`, or `None` if out of range.
    pub fn role(&self, id: LogicalThreadId) -> Option<Role> {
        self.roles.get(id.0).copied()
    }

    /// Generator slot owned by `walker`.
    pub fn walker_id_to_rng_index(&self, walker: WalkerId) -> RngIndex {
        RngIndex(walker.0)
    }

    /// Logical id of `walker`, or `None` if out of range.
    pub fn walker_logical_id(&self, walker: WalkerId) -> Option<LogicalThreadId> {
        self.position(Role::Walker(walker))
    }

    /// Logical id of `accumulator`, or `None` if out of range.
    pub fn accumulator_logical_id(&self, accumulator: AccumulatorId) -> Option<LogicalThreadId> {
        self.position(Role::Accumulator(accumulator))
    }

    fn position(&self, role: Role) -> Option<LogicalThreadId> {
        self.roles.iter().position(|r| *r == role).map(LogicalThreadId)
    }

    /// Iterate `(logical id, role)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (LogicalThreadId, Role)> + '_ {
        self.roles
            .iter()
            .enumerate()
            .map(|(i, role)| (LogicalThreadId(i), *role))
    }

    /// Emit the table as `info` events.
    pub fn print(&self) {
        tracing::info!(
            walkers = self.walkers,
            accumulators = self.accumulators,
            "thread task table"
        );
        for (id, role) in self.iter() {
            match role {
                Role::Walker(w) => tracing::info!(
                    thread = id.0,
                    role = %role,
                    rng = %self.walker_id_to_rng_index(w),
                    "walker task"
                ),
                Role::Accumulator(_) => {
                    tracing::info!(thread = id.0, role = %role, "accumulator task")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn interleaves_then_fills() {
        let h = ThreadTaskHandler::new(3, 1).unwrap();
        let roles: Vec<_> = h.iter().map(|(_, r)| r).collect();
        assert_eq!(
            roles,
            vec![
                Role::Walker(WalkerId(0)),
                Role::Accumulator(AccumulatorId(0)),
                Role::Walker(WalkerId(1)),
                Role::Walker(WalkerId(2)),
            ]
        );
        assert_eq!(h.walker_logical_id(WalkerId(2)), Some(LogicalThreadId(3)));
        assert_eq!(h.accumulator_logical_id(AccumulatorId(1)), None);
    }

    #[test]
    fn empty_population_rejected() {
        assert_eq!(ThreadTaskHandler::new(0, 2), Err(ConfigError::NoWalkers));
        assert_eq!(ThreadTaskHandler::new(2, 0), Err(ConfigError::NoAccumulators));
    }

    #[test]
    fn out_of_range_role_is_none() {
        let h = ThreadTaskHandler::new(1, 1).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.role(LogicalThreadId(2)), None);
    }

    proptest! {
        #[test]
        fn every_role_appears_once(walkers in 1usize..40, accumulators in 1usize..40) {
            let h = ThreadTaskHandler::new(walkers, accumulators).unwrap();
            prop_assert_eq!(h.len(), walkers + accumulators);
            let roles: HashSet<_> = h.iter().map(|(_, r)| r).collect();
            prop_assert_eq!(roles.len(), walkers + accumulators);
            let rngs: HashSet<_> = (0..walkers)
                .map(|w| h.walker_id_to_rng_index(WalkerId(w)))
                .collect();
            prop_assert_eq!(rngs.len(), walkers);
        }
    }
}
