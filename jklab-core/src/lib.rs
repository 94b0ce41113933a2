//! JKLab Core: domain types and the J/K momentum engine.
//!
//! This crate is pure computation, no I/O:
//! - Domain types (return panels, benchmark series, generations, leg series)
//! - Portfolio generator: rolling formation/holding windows, decile ranking
//! - Return aggregator: two-level monthly mean across overlapping generations
//! - Spread math: leg join, summary, cumulative benchmark comparison
//! - Fingerprints for panels and runs

pub mod domain;
pub mod fingerprint;
pub mod portfolio;
