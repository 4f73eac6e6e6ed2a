//! Vitae Core: shared document and store abstractions.
//!
//! Every other crate in the workspace depends on the traits defined here.
//! The crate holds no infrastructure code: stores live in `vitae-store`
//! (PostgreSQL) and `vitae-test-support` (in-memory).

pub mod clock;
pub mod command;
pub mod document;
pub mod error;
pub mod repository;
