//! Shared test doubles and utilities for the Vitae resume service.

mod clock;
mod collections;
mod faults;

pub use clock::{FixedClock, fixed_now};
pub use collections::{InMemoryAggregateCollection, InMemoryChildCollection};
pub use faults::{
    ContendedAggregateCollection, FailingAggregateCollection, FailingChildCollection, Faults,
    FaultyChildCollection, StalledChildCollection,
};
