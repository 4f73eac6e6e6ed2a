//! Resume aggregate coordination.
//!
//! A resume is an aggregate root that references work-history and reference
//! documents stored in their own collections. The store has no
//! cross-collection transactions, so every multi-step flow here is a saga:
//! ordered forward steps, no rollback, and explicit reporting of orphans.

pub mod application;
pub mod domain;
